//! Types for the download pool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::downloader::DownloadError;
use crate::song::Song;

/// Execution state of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Waiting in the queue.
    Pending,
    /// Handed to the downloader. `dispatch_index` counts dispatches from 0.
    Running { dispatch_index: u64 },
    /// The downloader finished. `None` means no file was produced.
    Completed(Option<PathBuf>),
    /// The downloader returned an error or panicked.
    Failed(DownloadError),
    /// Dropped from the queue before it ran.
    Cancelled,
}

impl JobState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Cancelled)
    }
}

/// How a pool treats queued jobs when shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Run every queued job before the workers exit.
    Drain,
    /// Resolve queued jobs to `Cancelled`. Running jobs still finish.
    CancelQueued,
}

/// Errors returned by the download pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("download pool is shut down")]
    Closed,

    #[error("download pool size must be at least 1")]
    InvalidPoolSize,

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("download was cancelled before it ran")]
    Cancelled,
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Number of worker tasks.
    pub size: usize,
    /// Jobs currently running.
    pub active: usize,
    /// Jobs waiting for a worker.
    pub queued: usize,
    /// Jobs finished without error since the pool started.
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    /// Whether the pool stopped accepting submissions.
    pub closed: bool,
}

/// Handle to a submitted job.
///
/// Cloning is cheap; every clone observes the same job.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    id: Uuid,
    song: Arc<Song>,
    state: watch::Receiver<JobState>,
    dispatch_index: Arc<OnceLock<u64>>,
}

impl DownloadHandle {
    pub(crate) fn new(
        id: Uuid,
        song: Arc<Song>,
        state: watch::Receiver<JobState>,
        dispatch_index: Arc<OnceLock<u64>>,
    ) -> Self {
        Self {
            id,
            song,
            state,
            dispatch_index,
        }
    }

    /// Id of the work item this job runs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn song(&self) -> &Arc<Song> {
        &self.song
    }

    /// Current state, without waiting.
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Position in the pool's dispatch order, once the job left the queue.
    ///
    /// Kept after the job finishes, unlike the `Running` state.
    pub fn dispatch_index(&self) -> Option<u64> {
        self.dispatch_index.get().copied()
    }

    /// Waits until the job reaches a terminal state.
    ///
    /// Returns the produced path (if any) on completion. If the job is
    /// dropped without finishing, the result is `Cancelled`.
    pub async fn wait(&self) -> Result<Option<PathBuf>, ExecutorError> {
        let mut state = self.state.clone();
        let result = match state.wait_for(JobState::is_terminal).await {
            Ok(terminal) => match &*terminal {
                JobState::Completed(path) => Ok(path.clone()),
                JobState::Failed(e) => Err(ExecutorError::Download(e.clone())),
                _ => Err(ExecutorError::Cancelled),
            },
            Err(_) => Err(ExecutorError::Cancelled),
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn handle(state: watch::Receiver<JobState>) -> DownloadHandle {
        DownloadHandle::new(
            Uuid::new_v4(),
            Arc::new(fixtures::song("Boards of Canada", "Roygbiv")),
            state,
            Arc::new(OnceLock::new()),
        )
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running { dispatch_index: 0 }.is_terminal());
        assert!(JobState::Completed(None).is_terminal());
        assert!(JobState::Failed(DownloadError::provider("x")).is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[tokio::test]
    async fn test_all_clones_see_the_same_result() {
        let (tx, rx) = watch::channel(JobState::Pending);
        let first = handle(rx);
        let second = first.clone();

        let waiter = tokio::spawn(async move { second.wait().await });
        tx.send_replace(JobState::Running { dispatch_index: 0 });
        tx.send_replace(JobState::Completed(Some(PathBuf::from("/tmp/a.mp3"))));

        assert_eq!(
            first.wait().await.unwrap(),
            Some(PathBuf::from("/tmp/a.mp3"))
        );
        assert_eq!(
            waiter.await.unwrap().unwrap(),
            Some(PathBuf::from("/tmp/a.mp3"))
        );
    }

    #[tokio::test]
    async fn test_failure_is_shared() {
        let (tx, rx) = watch::channel(JobState::Pending);
        let handle = handle(rx);
        tx.send_replace(JobState::Failed(DownloadError::Timeout { timeout_secs: 5 }));

        let err = handle.wait().await.unwrap_err();
        assert_eq!(
            err,
            ExecutorError::Download(DownloadError::Timeout { timeout_secs: 5 })
        );
        assert!(handle.clone().wait().await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_job_resolves_to_cancelled() {
        let (tx, rx) = watch::channel(JobState::Pending);
        let handle = handle(rx);
        drop(tx);

        assert_eq!(handle.wait().await.unwrap_err(), ExecutorError::Cancelled);
    }

    #[tokio::test]
    async fn test_terminal_state_survives_sender_drop() {
        let (tx, rx) = watch::channel(JobState::Pending);
        let handle = handle(rx);
        tx.send_replace(JobState::Completed(None));
        drop(tx);

        assert_eq!(handle.wait().await.unwrap(), None);
    }
}
