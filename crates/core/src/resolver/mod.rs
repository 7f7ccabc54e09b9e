//! Video metadata lookup, stream selection and media download.

mod config;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use config::ResolverConfig;
pub use error::ResolverError;
pub use traits::StreamResolver;
pub use types::{MediaStream, StreamKind, StreamManifest, VideoInfo};
pub use ytdlp::YtDlpResolver;
