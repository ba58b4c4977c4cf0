//! Types for the download orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::downloader::DownloadError;
use crate::executor::{ExecutorError, PoolStatus};
use crate::searcher::SearchError;
use crate::settings::SettingsError;
use crate::song::{Song, ValidationError};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The search returned no songs.
    #[error("no song found for: {0}")]
    NoMatchFound(String),

    /// A submitted song object was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The query is empty.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The download pool no longer accepts work.
    #[error("download pool is shut down")]
    ExecutorClosed,

    /// The downloader failed for this item.
    #[error("download failed: {0}")]
    DownloadFailed(DownloadError),

    /// A file was requested but the download produced none.
    #[error("download finished without producing a file")]
    FileNotProduced,

    /// Another settings change was installed first.
    #[error("settings changed concurrently: expected version {expected}, active is {actual}")]
    ConfigurationConflict { expected: u64, actual: u64 },

    /// The requested settings are invalid.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The item was dropped before it ran.
    #[error("download was cancelled")]
    Cancelled,

    /// The search provider failed.
    #[error("search failed: {0}")]
    Search(SearchError),

    /// No search provider is configured, or it has no credentials.
    #[error("no search provider configured")]
    SearcherUnavailable,
}

impl OrchestratorError {
    /// Stable snake_case category, used as the `kind` of error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoMatchFound(_) => "no_match_found",
            Self::Validation(_) => "validation_error",
            Self::InvalidQuery(_) => "invalid_query",
            Self::ExecutorClosed => "executor_closed",
            Self::DownloadFailed(_) => "download_failed",
            Self::FileNotProduced => "file_not_produced",
            Self::ConfigurationConflict { .. } => "configuration_conflict",
            Self::InvalidSettings(_) => "invalid_settings",
            Self::Cancelled => "cancelled",
            Self::Search(_) => "search_failed",
            Self::SearcherUnavailable => "searcher_unavailable",
        }
    }
}

impl From<ExecutorError> for OrchestratorError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::Closed => Self::ExecutorClosed,
            ExecutorError::Download(e) => Self::DownloadFailed(e),
            ExecutorError::Cancelled => Self::Cancelled,
            ExecutorError::InvalidPoolSize => {
                Self::InvalidSettings("threads must be at least 1".to_string())
            }
        }
    }
}

impl From<SearchError> for OrchestratorError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::NotConfigured(_) => Self::SearcherUnavailable,
            other => Self::Search(other),
        }
    }
}

impl From<SettingsError> for OrchestratorError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Invalid(reason) => Self::InvalidSettings(reason),
            SettingsError::Conflict { expected, actual } => {
                Self::ConfigurationConflict { expected, actual }
            }
        }
    }
}

/// Result of a finished download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Id of the work item.
    pub request_id: Uuid,
    pub song: Song,
    /// Produced file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Version of the settings snapshot the download ran with.
    pub settings_version: u64,
    /// Time from submission to completion.
    pub elapsed_ms: u64,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Version of the active settings snapshot.
    pub settings_version: u64,
    /// The pool new submissions go to.
    pub pool: PoolStatus,
    /// Replaced pools still finishing their work.
    pub retiring_pools: usize,
    /// Name of the search provider, if one is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searcher: Option<String>,
    pub downloader: String,
}
