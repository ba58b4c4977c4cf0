//! Bounded download pool.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::downloader::{DownloadError, Downloader};
use crate::metrics::{
    DOWNLOADS_FINISHED, DOWNLOADS_STARTED, DOWNLOADS_SUBMITTED, DOWNLOAD_DURATION,
};
use crate::settings::Settings;
use crate::song::WorkItem;

use super::types::{DownloadHandle, ExecutorError, JobState, PoolStatus, ShutdownMode};

/// A queued job: the item, the settings snapshot it was submitted with, and
/// the channel its handles observe.
struct Job {
    item: WorkItem,
    settings: Arc<Settings>,
    state: watch::Sender<JobState>,
    dispatch_index: Arc<OnceLock<u64>>,
}

/// Tracks statistics for a pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
    total_cancelled: AtomicU64,
}

/// State shared between the pool and its workers.
struct Shared {
    /// Workers take turns holding this lock while waiting for the next job.
    /// The tokio mutex is fair, so jobs leave the queue in submission order.
    queue: Mutex<mpsc::UnboundedReceiver<Job>>,
    downloader: Arc<dyn Downloader>,
    stats: PoolStats,
    dispatched: AtomicU64,
    cancel_queued: AtomicBool,
}

/// Runs downloads on a fixed number of workers.
///
/// Submissions never wait for a free worker; they join an unbounded FIFO
/// queue. Each worker runs one blocking download at a time on tokio's
/// blocking thread pool, so at most `size` downloads run concurrently.
pub struct DownloadPool {
    size: usize,
    sender: RwLock<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl DownloadPool {
    /// Creates a pool and spawns its workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(size: usize, downloader: Arc<dyn Downloader>) -> Result<Self, ExecutorError> {
        if size == 0 {
            return Err(ExecutorError::InvalidPoolSize);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            queue: Mutex::new(rx),
            downloader,
            stats: PoolStats::default(),
            dispatched: AtomicU64::new(0),
            cancel_queued: AtomicBool::new(false),
        });

        let workers = (0..size)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, Arc::clone(&shared))))
            .collect();

        info!(size, downloader = shared.downloader.name(), "Download pool started");

        Ok(Self {
            size,
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(workers),
            shared,
        })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues `item` for download with `settings`.
    ///
    /// Returns immediately. Fails only once shutdown has begun.
    pub async fn submit(
        &self,
        item: WorkItem,
        settings: Arc<Settings>,
    ) -> Result<DownloadHandle, ExecutorError> {
        let sender = self.sender.read().await;
        let sender = sender.as_ref().ok_or(ExecutorError::Closed)?;

        let (state_tx, state_rx) = watch::channel(JobState::Pending);
        let dispatch_index = Arc::new(OnceLock::new());
        let handle = DownloadHandle::new(
            item.id,
            Arc::clone(&item.song),
            state_rx,
            Arc::clone(&dispatch_index),
        );

        // Count before sending so a fast worker never decrements below zero.
        self.shared.stats.queued.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            item,
            settings,
            state: state_tx,
            dispatch_index,
        };
        if sender.send(job).is_err() {
            self.shared.stats.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(ExecutorError::Closed);
        }

        DOWNLOADS_SUBMITTED.inc();
        debug!(request_id = %handle.id(), song = %handle.song().display_name(), "Job queued");
        Ok(handle)
    }

    /// Current counters.
    pub async fn status(&self) -> PoolStatus {
        let stats = &self.shared.stats;
        PoolStatus {
            size: self.size,
            active: stats.active.load(Ordering::Relaxed) as usize,
            queued: stats.queued.load(Ordering::Relaxed) as usize,
            total_processed: stats.total_processed.load(Ordering::Relaxed),
            total_failed: stats.total_failed.load(Ordering::Relaxed),
            total_cancelled: stats.total_cancelled.load(Ordering::Relaxed),
            closed: self.is_closed().await,
        }
    }

    /// Whether the pool stopped accepting submissions.
    pub async fn is_closed(&self) -> bool {
        self.sender.read().await.is_none()
    }

    /// Stops accepting submissions and waits for the workers to exit.
    ///
    /// Calling it again after the workers exited returns immediately.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        if mode == ShutdownMode::CancelQueued {
            self.shared.cancel_queued.store(true, Ordering::SeqCst);
        }

        // Dropping the sender closes the queue once it is empty.
        if self.sender.write().await.take().is_some() {
            info!(?mode, "Download pool shutting down");
        }

        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                warn!("Download worker exited abnormally: {}", e);
            }
        }
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    debug!(worker_id, "Download worker started");

    loop {
        let (job, dispatch_index) = {
            let mut queue = shared.queue.lock().await;
            match queue.recv().await {
                Some(job) => {
                    let index = shared.dispatched.fetch_add(1, Ordering::SeqCst);
                    let _ = job.dispatch_index.set(index);
                    (job, index)
                }
                None => break,
            }
        };
        shared.stats.queued.fetch_sub(1, Ordering::SeqCst);

        if shared.cancel_queued.load(Ordering::SeqCst) {
            shared.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            DOWNLOADS_FINISHED.with_label_values(&["cancelled"]).inc();
            job.state.send_replace(JobState::Cancelled);
            continue;
        }

        run_job(worker_id, dispatch_index, job, &shared).await;
    }

    debug!(worker_id, "Download worker stopped");
}

async fn run_job(worker_id: usize, dispatch_index: u64, job: Job, shared: &Shared) {
    let Job {
        item,
        settings,
        state,
        ..
    } = job;

    shared.stats.active.fetch_add(1, Ordering::SeqCst);
    state.send_replace(JobState::Running { dispatch_index });
    DOWNLOADS_STARTED.inc();
    debug!(
        worker_id,
        dispatch_index,
        request_id = %item.id,
        settings_version = settings.version,
        "Download started"
    );

    let started = Instant::now();
    let downloader = Arc::clone(&shared.downloader);
    let song = Arc::clone(&item.song);
    let result = tokio::task::spawn_blocking(move || downloader.download(&song, &settings))
        .await
        .unwrap_or_else(|e| Err(panic_error(e)));
    let elapsed = started.elapsed().as_secs_f64();

    let next = match result {
        Ok(path) => {
            shared.stats.total_processed.fetch_add(1, Ordering::Relaxed);
            DOWNLOAD_DURATION
                .with_label_values(&["success"])
                .observe(elapsed);
            let label = if path.is_some() {
                "completed"
            } else {
                "metadata_only"
            };
            DOWNLOADS_FINISHED.with_label_values(&[label]).inc();
            info!(request_id = %item.id, ?path, "Download completed");
            JobState::Completed(path)
        }
        Err(e) => {
            shared.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            DOWNLOAD_DURATION.with_label_values(&["failed"]).observe(elapsed);
            DOWNLOADS_FINISHED.with_label_values(&["failed"]).inc();
            warn!(request_id = %item.id, error = %e, "Download failed");
            JobState::Failed(e)
        }
    };

    shared.stats.active.fetch_sub(1, Ordering::SeqCst);
    state.send_replace(next);
}

fn panic_error(e: JoinError) -> DownloadError {
    if !e.is_panic() {
        return DownloadError::Panicked(e.to_string());
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    DownloadError::Panicked(message)
}
