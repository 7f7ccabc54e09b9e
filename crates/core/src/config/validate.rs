use super::{types::Config, ConfigError};
use crate::worker::NotificationRouting;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker concurrency is not 0
/// - Broadcast routing has a channel name
/// - Storage list page size is not 0
/// - Unclaimed cancellation cap is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.worker.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "worker.concurrency cannot be 0".to_string(),
        ));
    }

    if config.worker.routing == NotificationRouting::Broadcast
        && config.worker.broadcast_channel.trim().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "worker.broadcast_channel cannot be empty with broadcast routing".to_string(),
        ));
    }

    if config.storage.list_page_size == 0 {
        return Err(ConfigError::ValidationError(
            "storage.list_page_size cannot be 0".to_string(),
        ));
    }

    if config.worker.cancel_max_pending == 0 {
        return Err(ConfigError::ValidationError(
            "worker.cancel_max_pending cannot be 0".to_string(),
        ));
    }

    Ok(())
}
