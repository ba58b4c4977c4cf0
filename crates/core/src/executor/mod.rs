//! Bounded executor for download jobs.
//!
//! A [`DownloadPool`] owns a fixed number of workers and an unbounded FIFO
//! queue. Submitting returns a [`DownloadHandle`] right away; awaiting the
//! handle suspends the caller until the job finishes.
//!
//! ```ignore
//! let pool = DownloadPool::new(settings.threads, downloader)?;
//! let handle = pool.submit(WorkItem::new(song), settings).await?;
//! let path = handle.wait().await?;
//! ```

mod pool;
mod types;

pub use pool::DownloadPool;
pub use types::{DownloadHandle, ExecutorError, JobState, PoolStatus, ShutdownMode};
