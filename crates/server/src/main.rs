use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubetone_core::{
    load_config, validate_config, BroadcastNotifier, CacheStore, CancellationRegistry,
    ConversionWorker, FfmpegTranscoder, FsBlobStore, InMemoryCancellationRegistry,
    JobDispatcher, JobQueue, MemoryQueue, Notifier, StreamResolver, TokioProcessRunner,
    WorkerPool, YtDlpResolver,
};
use tubetone_server::api::create_router;
use tubetone_server::api::handlers::VERSION;
use tubetone_server::state::AppState;

/// Buffer size for the notification channel
const NOTIFICATION_BUFFER_SIZE: usize = 1024;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        // The subscriber may not be installed yet if the config failed to load.
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("TUBETONE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_tracing(config.logging.json);
    info!(version = VERSION, "Loaded configuration from {:?}", config_path);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Storage root: {:?}", config.storage.root);
    info!(
        "Worker concurrency: {}, routing: {:?}",
        config.worker.concurrency, config.worker.routing
    );

    // Stream resolution
    let resolver: Arc<dyn StreamResolver> = Arc::new(
        YtDlpResolver::new(config.resolver.clone()).context("Failed to create stream resolver")?,
    );

    // Transcoder
    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.converter.clone(),
        Arc::new(TokioProcessRunner::new()),
    ));

    // Artifact cache
    tokio::fs::create_dir_all(&config.storage.root)
        .await
        .with_context(|| format!("Failed to create storage root {:?}", config.storage.root))?;
    let blobs = Arc::new(FsBlobStore::new(
        config.storage.root.clone(),
        config.storage.public_base_url.clone(),
    ));
    let cache = Arc::new(CacheStore::new(blobs, config.storage.list_page_size));
    info!("Artifact cache initialized");

    // Queue, notifications and cancellation
    let queue: Arc<dyn JobQueue> = Arc::new(MemoryQueue::new(config.worker.queue_capacity));
    let notifier = Arc::new(BroadcastNotifier::new(NOTIFICATION_BUFFER_SIZE));
    let registry: Arc<dyn CancellationRegistry> = Arc::new(InMemoryCancellationRegistry::with_limits(
        config.worker.cancel_pending_ttl(),
        config.worker.cancel_max_pending,
    ));

    // Dispatcher and workers
    let dispatcher = JobDispatcher::new(
        Arc::clone(&resolver),
        Arc::clone(&cache),
        Arc::clone(&queue),
    );
    let worker = Arc::new(ConversionWorker::new(
        config.worker.clone(),
        resolver,
        transcoder,
        Arc::clone(&cache),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&registry),
    ));
    let pool = Arc::new(WorkerPool::new(
        worker,
        Arc::clone(&queue),
        config.worker.concurrency,
    ));
    pool.start();
    info!("Worker pool started");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        dispatcher,
        cache,
        registry,
        notifier,
        Arc::clone(&queue),
        Arc::clone(&pool),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    // Stop first so queued jobs are left behind instead of drained.
    pool.stop().await;
    queue.close();
    info!("Worker pool stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
