use std::sync::Arc;
use tubetone_core::{
    BroadcastNotifier, CacheStore, CancellationRegistry, Config, JobDispatcher, JobQueue,
    SanitizedConfig, WorkerPool,
};

/// Shared application state
pub struct AppState {
    config: Config,
    dispatcher: JobDispatcher,
    cache: Arc<CacheStore>,
    registry: Arc<dyn CancellationRegistry>,
    notifier: Arc<BroadcastNotifier>,
    queue: Arc<dyn JobQueue>,
    pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(
        config: Config,
        dispatcher: JobDispatcher,
        cache: Arc<CacheStore>,
        registry: Arc<dyn CancellationRegistry>,
        notifier: Arc<BroadcastNotifier>,
        queue: Arc<dyn JobQueue>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            cache,
            registry,
            notifier,
            queue,
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn dispatcher(&self) -> &JobDispatcher {
        &self.dispatcher
    }

    pub fn cache(&self) -> &CacheStore {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &dyn CancellationRegistry {
        self.registry.as_ref()
    }

    pub fn notifier(&self) -> &BroadcastNotifier {
        self.notifier.as_ref()
    }

    pub fn queue(&self) -> &dyn JobQueue {
        self.queue.as_ref()
    }

    pub fn pool(&self) -> &WorkerPool {
        self.pool.as_ref()
    }
}
