//! Holds the active settings snapshot.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::types::{Settings, SettingsPatch};
use super::SettingsError;

/// The single source of the active settings snapshot.
///
/// Readers get an `Arc` to an immutable snapshot. Replacement swaps the `Arc`
/// under a write lock, so no reader ever sees a half-applied change.
#[derive(Debug)]
pub struct SettingsRegistry {
    active: RwLock<Arc<Settings>>,
}

impl SettingsRegistry {
    /// Creates a registry with a validated initial snapshot.
    pub fn new(initial: Settings) -> Result<Self, SettingsError> {
        initial.validate()?;
        Ok(Self {
            active: RwLock::new(Arc::new(initial)),
        })
    }

    /// Returns the active snapshot.
    pub async fn get(&self) -> Arc<Settings> {
        Arc::clone(&*self.active.read().await)
    }

    /// Merges `patch` over the active snapshot and installs the result.
    pub async fn replace(&self, patch: &SettingsPatch) -> Result<Arc<Settings>, SettingsError> {
        let mut active = self.active.write().await;
        let next = Arc::new(Self::merge(&active, patch)?);
        *active = Arc::clone(&next);

        info!(version = next.version, "Settings replaced");
        Ok(next)
    }

    /// Builds the snapshot `patch` would produce, without installing it.
    pub async fn stage(&self, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        let active = self.active.read().await;
        Self::merge(&active, patch)
    }

    /// Installs a snapshot produced by [`stage`](Self::stage).
    ///
    /// Fails if another snapshot was installed after staging.
    pub async fn commit(&self, staged: Arc<Settings>) -> Result<Arc<Settings>, SettingsError> {
        let mut active = self.active.write().await;
        if staged.version != active.version + 1 {
            return Err(SettingsError::Conflict {
                expected: staged.version.saturating_sub(1),
                actual: active.version,
            });
        }
        *active = Arc::clone(&staged);

        info!(version = staged.version, "Settings replaced");
        Ok(staged)
    }

    fn merge(active: &Settings, patch: &SettingsPatch) -> Result<Settings, SettingsError> {
        if let Some(expected) = patch.expected_version {
            if expected != active.version {
                return Err(SettingsError::Conflict {
                    expected,
                    actual: active.version,
                });
            }
        }

        let next = active.merged(patch);
        next.validate()?;
        Ok(next)
    }
}
