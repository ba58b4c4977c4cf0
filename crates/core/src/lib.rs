pub mod config;
pub mod downloader;
pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod searcher;
pub mod settings;
pub mod song;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig, SpotifyConfig,
};
pub use downloader::{CommandDownloader, DownloadError, Downloader};
pub use executor::{
    DownloadHandle, DownloadPool, ExecutorError, JobState, PoolStatus, ShutdownMode,
};
pub use orchestrator::{
    DownloadOrchestrator, DownloadOutcome, OrchestratorError, OrchestratorStatus,
};
pub use searcher::{parse_track_id, SearchError, SongSearcher, SpotifySearcher, StructuredQuery};
pub use settings::{
    AudioFormat, OverwritePolicy, SanitizedSettings, Settings, SettingsError, SettingsPatch,
    SettingsRegistry, MAX_THREADS,
};
pub use song::{SchemaValidator, Song, SongValidator, ValidationError, WorkItem};
