//! Downloader settings and the registry holding the active snapshot.
//!
//! Settings are immutable snapshots. A change produces a new snapshot with a
//! bumped version and swaps it in as a whole; readers either see the old
//! snapshot or the new one.

mod registry;
mod types;

pub use registry::SettingsRegistry;
pub use types::{
    AudioFormat, OverwritePolicy, SanitizedSettings, Settings, SettingsPatch, MAX_THREADS,
};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The merged snapshot failed validation.
    #[error("invalid settings: {0}")]
    Invalid(String),

    /// Another writer installed a snapshot first.
    #[error("settings changed concurrently: expected version {expected}, active is {actual}")]
    Conflict { expected: u64, actual: u64 },
}
