//! Lifecycle stages of a conversion job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message text published while converting, before any percentage is known.
pub const CONVERTING_MESSAGE: &str = "Converting...";

/// Fixed error text recorded on a job that was terminated by request.
pub const CANCELLED_MESSAGE: &str = "Download cancelled";

/// Message set by the dispatcher on a freshly enqueued job.
pub const ENQUEUED_MESSAGE: &str = "Enqueued";

/// Stage of a job inside the conversion worker.
///
/// `Done`, `Failed` and `Cancelled` are terminal; every other stage can move to
/// `Failed` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Processing,
    Downloading,
    Converting,
    Storing,
    Done,
    Failed,
    Cancelled,
}

impl JobStage {
    /// Human-readable message published when the stage starts.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Processing => "Processing...",
            Self::Downloading => "Downloading...",
            Self::Converting => CONVERTING_MESSAGE,
            Self::Storing => "Storing...",
            Self::Done | Self::Failed | Self::Cancelled => "",
        }
    }

    /// Whether no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Position in the lifecycle, used to check notification ordering.
    pub fn position(&self) -> u8 {
        match self {
            Self::Processing => 0,
            Self::Downloading => 1,
            Self::Converting => 2,
            Self::Storing => 3,
            Self::Done | Self::Failed | Self::Cancelled => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Downloading => "downloading",
            Self::Converting => "converting",
            Self::Storing => "storing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message published while converting once a percentage is known.
pub fn converting_message(percent: u32) -> String {
    format!("{} ({}%)", CONVERTING_MESSAGE, percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stages() {
        assert!(JobStage::Done.is_terminal());
        assert!(JobStage::Failed.is_terminal());
        assert!(JobStage::Cancelled.is_terminal());
        assert!(!JobStage::Converting.is_terminal());
    }

    #[test]
    fn test_positions_follow_pipeline_order() {
        let order = [
            JobStage::Processing,
            JobStage::Downloading,
            JobStage::Converting,
            JobStage::Storing,
            JobStage::Done,
        ];
        assert!(order.windows(2).all(|w| w[0].position() < w[1].position()));
    }

    #[test]
    fn test_converting_message() {
        assert_eq!(converting_message(42), "Converting... (42%)");
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&JobStage::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
