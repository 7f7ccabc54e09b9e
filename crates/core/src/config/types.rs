use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::converter::ConverterConfig;
use crate::resolver::ResolverConfig;
use crate::worker::{NotificationRouting, WorkerConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory backing the blob store.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// URL under which `root` is reachable (served at `/files` by this binary).
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Objects per listing page.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            list_page_size: default_list_page_size(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/blobs")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/files".to_string()
}

fn default_list_page_size() -> usize {
    1000
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for API responses (local paths hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: SanitizedStorageConfig,
    pub converter: SanitizedConverterConfig,
    pub resolver: SanitizedResolverConfig,
    pub worker: SanitizedWorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub public_base_url: String,
    pub list_page_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConverterConfig {
    pub audio_extension: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedResolverConfig {
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedWorkerConfig {
    pub concurrency: usize,
    pub routing: String,
    pub broadcast_channel: String,
    pub queue_capacity: usize,
    pub cancel_pending_ttl_secs: u64,
    pub cancel_max_pending: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: SanitizedStorageConfig {
                public_base_url: config.storage.public_base_url.clone(),
                list_page_size: config.storage.list_page_size,
            },
            converter: SanitizedConverterConfig {
                audio_extension: config.converter.audio_extension.clone(),
            },
            resolver: SanitizedResolverConfig {
                user_agent: config.resolver.user_agent.clone(),
            },
            worker: SanitizedWorkerConfig {
                concurrency: config.worker.concurrency,
                routing: match config.worker.routing {
                    NotificationRouting::Broadcast => "broadcast".to_string(),
                    NotificationRouting::Session => "session".to_string(),
                },
                broadcast_channel: config.worker.broadcast_channel.clone(),
                queue_capacity: config.worker.queue_capacity,
                cancel_pending_ttl_secs: config.worker.cancel_pending_ttl_secs,
                cancel_max_pending: config.worker.cancel_max_pending,
            },
            logging: config.logging.clone(),
        }
    }
}
