use std::sync::Arc;
use tunefetch_core::{Config, DownloadOrchestrator, SanitizedConfig, SanitizedSettings};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<DownloadOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<DownloadOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Startup configuration with the downloader section replaced by the
    /// active settings snapshot.
    pub async fn sanitized_config(&self) -> SanitizedConfig {
        let settings = self.orchestrator.settings().await;
        SanitizedConfig {
            downloader: SanitizedSettings::from(settings.as_ref()),
            ..SanitizedConfig::from(&self.config)
        }
    }

    pub fn orchestrator(&self) -> &Arc<DownloadOrchestrator> {
        &self.orchestrator
    }
}
