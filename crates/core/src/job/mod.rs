//! Job data model shared by the dispatcher, the worker and the cache.

pub mod duration;
mod stage;
mod types;

pub use stage::{
    converting_message, JobStage, CANCELLED_MESSAGE, CONVERTING_MESSAGE, ENQUEUED_MESSAGE,
};
pub use types::{JobItem, JobSnapshot, QueueMessage};
