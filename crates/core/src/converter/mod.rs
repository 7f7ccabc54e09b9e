//! Converter module: turns downloaded media into a tagged audio file.
//!
//! The transcoder is an external ffmpeg process reached through the
//! [`ProcessRunner`] trait, so tests can script its stderr and exit status.
//!
//! # Example
//!
//! ```ignore
//! use tubetone_core::converter::{ConverterConfig, FfmpegTranscoder, TokioProcessRunner};
//!
//! let transcoder = FfmpegTranscoder::new(
//!     ConverterConfig::default(),
//!     Arc::new(TokioProcessRunner::new()),
//! );
//! let output = transcoder.output_path("attempt-1", "Daft Punk - One More Time");
//! transcoder.transcode(&input, &output, Some(lines_tx), cancel.clone()).await?;
//! if let Some(tags) = extract_tags("Daft Punk - One More Time") {
//!     transcoder.write_tags(&output, &tags, cancel).await?;
//! }
//! ```

mod config;
mod error;
mod ffmpeg;
mod runner;
mod traits;
mod types;

pub use config::ConverterConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegTranscoder;
pub use runner::TokioProcessRunner;
pub use traits::{ProcessOutput, ProcessRunner};
pub use types::{extract_tags, replace_invalid_chars, sanitize_file_name, TrackTags};
