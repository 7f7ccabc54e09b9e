//! Dequeue loop feeding a bounded number of concurrent conversions.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::conversion::ConversionWorker;
use crate::queue::JobQueue;

/// Pulls messages off the queue and runs each in its own task, at most
/// `concurrency` at a time.
pub struct WorkerPool {
    worker: Arc<ConversionWorker>,
    queue: Arc<dyn JobQueue>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    active: Arc<AtomicUsize>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(worker: Arc<ConversionWorker>, queue: Arc<dyn JobQueue>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            worker,
            queue,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            active: Arc::new(AtomicUsize::new(0)),
            running: AtomicBool::new(false),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Jobs currently being processed.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawns the dequeue loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }
        info!(concurrency = self.concurrency, "Starting worker pool");

        let worker = Arc::clone(&self.worker);
        let queue = Arc::clone(&self.queue);
        let semaphore = Arc::clone(&self.semaphore);
        let active = Arc::clone(&self.active);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // A slot is reserved before a message is taken, so shutdown never
        // strands a message that was already removed from the queue.
        let handle = tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let message = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    message = queue.dequeue() => match message {
                        Some(message) => message,
                        None => {
                            debug!("Queue closed");
                            break;
                        }
                    },
                };

                let worker = Arc::clone(&worker);
                let active = Arc::clone(&active);
                active.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _permit = permit;
                    worker.process(message).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
            info!("Worker pool loop stopped");
        });

        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stops dequeuing and waits for in-flight jobs to reach a terminal stage.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker pool not running");
            return;
        }
        info!("Stopping worker pool");
        let _ = self.shutdown_tx.send(());

        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        // Every permit back means every spawned job has finished.
        if let Ok(permits) = self.semaphore.acquire_many(self.concurrency as u32).await {
            drop(permits);
        }
        info!("Worker pool stopped");
    }
}
