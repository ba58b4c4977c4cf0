use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunefetch_core::{
    load_config, validate_config, CommandDownloader, Config, DownloadOrchestrator, Downloader,
    SettingsRegistry, ShutdownMode, SongSearcher, SpotifySearcher,
};
use tunefetch_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TUNEFETCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        threads = config.downloader.threads,
        output = %config.downloader.output.display(),
        "Configuration loaded successfully"
    );

    let registry = Arc::new(
        SettingsRegistry::new(config.downloader.clone())
            .context("Invalid initial downloader settings")?,
    );

    let searcher: Arc<dyn SongSearcher> = Arc::new(create_searcher(&config, &registry)?);
    let downloader: Arc<dyn Downloader> = Arc::new(CommandDownloader::new());

    let orchestrator = Arc::new(
        DownloadOrchestrator::new(Arc::clone(&registry), downloader, Some(searcher))
            .await
            .context("Failed to create download orchestrator")?,
    );

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let running and queued downloads finish
    info!("Server shutting down...");
    orchestrator.shutdown(ShutdownMode::Drain).await;

    Ok(())
}

/// Builds the Spotify searcher.
///
/// Credentials are read from the active settings on every token fetch, so
/// the searcher is built even when none are configured yet.
fn create_searcher(config: &Config, registry: &Arc<SettingsRegistry>) -> Result<SpotifySearcher> {
    if !config.downloader.has_credentials() {
        info!("No Spotify credentials configured yet, search fails until they are set");
    }

    let searcher = SpotifySearcher::new(Arc::clone(registry))
        .context("Failed to create Spotify searcher")?
        .with_endpoints(&config.spotify.api_url, &config.spotify.auth_url)
        .with_limit(config.spotify.search_limit);
    info!("Initializing Spotify searcher at {}", config.spotify.api_url);

    Ok(searcher)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
