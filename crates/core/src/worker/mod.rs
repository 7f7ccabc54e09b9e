//! Conversion worker and the pool that drives it.
//!
//! The worker takes one [`QueueMessage`](crate::job::QueueMessage) at a time
//! through resolution, download, transcoding, tagging and storage, publishing
//! a snapshot at every step. The pool bounds how many run at once.

mod config;
mod conversion;
mod error;
mod pool;

pub use config::{NotificationRouting, WorkerConfig};
pub use conversion::{ConversionWorker, JobOutcome};
pub use error::ConversionError;
pub use pool::WorkerPool;
