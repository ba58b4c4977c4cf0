//! Error types for the downloader module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading a song.
///
/// Cloneable so one failure can be handed to every waiter of a download.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    /// The download tool binary was not found.
    #[error("download tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// The download tool exited unsuccessfully.
    #[error("download tool failed (exit code {code:?}): {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    /// The download did not finish in time.
    #[error("download timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while preparing or running the download.
    #[error("I/O error: {0}")]
    Io(String),

    /// The downloader panicked.
    #[error("downloader panicked: {0}")]
    Panicked(String),

    /// Provider-specific failure.
    #[error("{0}")]
    Provider(String),
}

impl DownloadError {
    /// Creates a provider error.
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider(reason.into())
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
