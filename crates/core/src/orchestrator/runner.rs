//! Download orchestrator implementation.
//!
//! Turns client requests into work items, runs them on the current download
//! pool and replaces the pool when a settings change needs a different one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::downloader::Downloader;
use crate::executor::{DownloadHandle, DownloadPool, ShutdownMode};
use crate::metrics::{RESOLUTIONS_TOTAL, SETTINGS_CHANGES};
use crate::searcher::{SongSearcher, StructuredQuery};
use crate::settings::{Settings, SettingsError, SettingsPatch, SettingsRegistry};
use crate::song::{SchemaValidator, Song, SongValidator, WorkItem};

use super::types::{DownloadOutcome, OrchestratorError, OrchestratorStatus};

/// Front door of the core: search, resolve, download and reconfigure.
pub struct DownloadOrchestrator {
    settings: Arc<SettingsRegistry>,
    /// The pool new submissions go to. Held for writing while it is replaced.
    pool: RwLock<Arc<DownloadPool>>,
    downloader: Arc<dyn Downloader>,
    searcher: Option<Arc<dyn SongSearcher>>,
    validator: Arc<dyn SongValidator>,

    // Replaced pools draining in the background
    retiring: Arc<AtomicUsize>,
    retire_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Set once by `shutdown`. Only written under the pool write lock.
    closed: AtomicBool,
}

impl DownloadOrchestrator {
    /// Create an orchestrator with a pool sized from the active settings.
    ///
    /// Without a searcher, search and query/URL resolution fail with
    /// `SearcherUnavailable`; object resolution still works.
    pub async fn new(
        settings: Arc<SettingsRegistry>,
        downloader: Arc<dyn Downloader>,
        searcher: Option<Arc<dyn SongSearcher>>,
    ) -> Result<Self, OrchestratorError> {
        let active = settings.get().await;
        let pool = DownloadPool::new(active.threads, Arc::clone(&downloader))?;

        info!(
            threads = active.threads,
            output = %active.output.display(),
            downloader = downloader.name(),
            searcher = searcher.as_ref().map(|s| s.name()).unwrap_or("none"),
            "Download orchestrator ready"
        );

        Ok(Self {
            settings,
            pool: RwLock::new(Arc::new(pool)),
            downloader,
            searcher,
            validator: Arc::new(SchemaValidator),
            retiring: Arc::new(AtomicUsize::new(0)),
            retire_tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Replace the song object validator.
    pub fn with_validator(mut self, validator: Arc<dyn SongValidator>) -> Self {
        self.validator = validator;
        self
    }

    fn searcher(&self) -> Result<&Arc<dyn SongSearcher>, OrchestratorError> {
        self.searcher
            .as_ref()
            .ok_or(OrchestratorError::SearcherUnavailable)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Free-text search.
    pub async fn search(&self, text: &str) -> Result<Vec<Song>, OrchestratorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrchestratorError::InvalidQuery(
                "query cannot be empty".to_string(),
            ));
        }
        Ok(self.searcher()?.search(text).await?)
    }

    /// Field-based search.
    pub async fn search_structured(
        &self,
        query: &StructuredQuery,
    ) -> Result<Vec<Song>, OrchestratorError> {
        let text = query.to_query_string().ok_or_else(|| {
            OrchestratorError::InvalidQuery("at least one field is required".to_string())
        })?;

        let mut songs = self.searcher()?.search(&text).await?;
        if let Some(limit) = query.limit {
            songs.truncate(limit as usize);
        }
        Ok(songs)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Build a work item from the best match for `text`.
    pub async fn resolve_by_query(&self, text: &str) -> Result<WorkItem, OrchestratorError> {
        let result = self.search(text).await.and_then(|songs| {
            songs
                .into_iter()
                .next()
                .ok_or_else(|| OrchestratorError::NoMatchFound(text.to_string()))
        });
        resolved("query", result)
    }

    /// Build a work item from a provider track URL.
    pub async fn resolve_by_url(&self, url: &str) -> Result<WorkItem, OrchestratorError> {
        let result = match self.searcher() {
            Ok(searcher) => match searcher.lookup_url(url).await {
                Ok(Some(song)) => Ok(song),
                Ok(None) => Err(OrchestratorError::NoMatchFound(url.to_string())),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        resolved("url", result)
    }

    /// Build a work item from a client-supplied song object. No search.
    pub fn resolve_by_object(&self, raw: Value) -> Result<WorkItem, OrchestratorError> {
        let result = self.validator.validate(raw).map_err(OrchestratorError::from);
        resolved("object", result)
    }

    // =========================================================================
    // Downloads
    // =========================================================================

    /// Queue `item` on the current pool with the active settings.
    pub async fn submit(&self, item: WorkItem) -> Result<DownloadHandle, OrchestratorError> {
        let (handle, _) = self.submit_with_settings(item).await?;
        Ok(handle)
    }

    async fn submit_with_settings(
        &self,
        item: WorkItem,
    ) -> Result<(DownloadHandle, Arc<Settings>), OrchestratorError> {
        // The read lock keeps the pool from being swapped between reading the
        // snapshot and queueing, so the item never lands on a retired pool.
        let pool = self.pool.read().await;
        let settings = self.settings.get().await;
        let handle = pool.submit(item, Arc::clone(&settings)).await?;
        Ok((handle, settings))
    }

    /// Download `item` and wait for it.
    ///
    /// With `want_file`, a download that produced no file is an error.
    pub async fn run(
        &self,
        item: WorkItem,
        want_file: bool,
    ) -> Result<DownloadOutcome, OrchestratorError> {
        let started = Instant::now();
        let request_id = item.id;
        let (handle, settings) = self.submit_with_settings(item).await?;

        let path = handle.wait().await?;
        if want_file && path.is_none() {
            warn!(%request_id, "Download produced no file");
            return Err(OrchestratorError::FileNotProduced);
        }

        Ok(DownloadOutcome {
            request_id,
            song: Song::clone(handle.song()),
            path,
            settings_version: settings.version,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// The active settings snapshot.
    pub async fn settings(&self) -> Arc<Settings> {
        self.settings.get().await
    }

    /// The registry holding the active snapshot.
    pub fn registry(&self) -> &Arc<SettingsRegistry> {
        &self.settings
    }

    /// Change the output directory.
    pub async fn change_output(&self, path: PathBuf) -> Result<Arc<Settings>, OrchestratorError> {
        self.change_settings(SettingsPatch::output(path)).await
    }

    /// Apply `patch` and, if the concurrency limit or output changed,
    /// replace the download pool.
    ///
    /// Queued and running items keep the snapshot they were submitted with.
    /// On failure the previous snapshot and pool stay in place. After
    /// `shutdown` every change fails with `ExecutorClosed`.
    pub async fn change_settings(
        &self,
        patch: SettingsPatch,
    ) -> Result<Arc<Settings>, OrchestratorError> {
        let mut pool = self.pool.write().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(OrchestratorError::ExecutorClosed);
        }

        let current = self.settings.get().await;
        let staged = self
            .settings
            .stage(&patch)
            .await
            .and_then(|staged| {
                if staged.version == current.version + 1 {
                    Ok(staged)
                } else {
                    Err(SettingsError::Conflict {
                        expected: current.version,
                        actual: staged.version - 1,
                    })
                }
            })
            .inspect_err(record_rejection)?;

        let replacement = if current.requires_new_pool(&staged) {
            Some(Arc::new(DownloadPool::new(
                staged.threads,
                Arc::clone(&self.downloader),
            )?))
        } else {
            None
        };

        let installed = match self.settings.commit(Arc::new(staged)).await {
            Ok(installed) => installed,
            Err(e) => {
                record_rejection(&e);
                if let Some(unused) = replacement {
                    unused.shutdown(ShutdownMode::CancelQueued).await;
                }
                return Err(e.into());
            }
        };

        match replacement {
            Some(next) => {
                let previous = std::mem::replace(&mut *pool, next);
                self.retire(previous).await;
                SETTINGS_CHANGES.with_label_values(&["pool_replaced"]).inc();
                info!(
                    version = installed.version,
                    threads = installed.threads,
                    output = %installed.output.display(),
                    "Download pool replaced"
                );
            }
            None => {
                SETTINGS_CHANGES.with_label_values(&["applied"]).inc();
            }
        }

        Ok(installed)
    }

    /// Drain `pool` in the background.
    async fn retire(&self, pool: Arc<DownloadPool>) {
        self.retiring.fetch_add(1, Ordering::SeqCst);
        let retiring = Arc::clone(&self.retiring);

        let task = tokio::spawn(async move {
            pool.shutdown(ShutdownMode::Drain).await;
            retiring.fetch_sub(1, Ordering::SeqCst);
            debug!("Retired download pool drained");
        });

        let mut tasks = self.retire_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Current status.
    pub async fn status(&self) -> OrchestratorStatus {
        let pool = Arc::clone(&*self.pool.read().await);

        OrchestratorStatus {
            settings_version: self.settings.get().await.version,
            pool: pool.status().await,
            retiring_pools: self.retiring.load(Ordering::SeqCst),
            searcher: self.searcher.as_ref().map(|s| s.name().to_string()),
            downloader: self.downloader.name().to_string(),
        }
    }

    /// Stop accepting work and wait for the current and retired pools.
    ///
    /// Terminal: later submissions and settings changes fail with
    /// `ExecutorClosed`.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        info!(?mode, "Shutting down download orchestrator");

        let pool = {
            let guard = self.pool.write().await;
            self.closed.store(true, Ordering::SeqCst);
            Arc::clone(&*guard)
        };
        pool.shutdown(mode).await;

        let tasks: Vec<_> = self.retire_tasks.lock().await.drain(..).collect();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!("Retired pool task failed: {}", e);
            }
        }

        info!("Download orchestrator stopped");
    }
}

fn resolved(source: &str, result: Result<Song, OrchestratorError>) -> Result<WorkItem, OrchestratorError> {
    match result {
        Ok(song) => {
            RESOLUTIONS_TOTAL.with_label_values(&[source, "success"]).inc();
            let item = WorkItem::new(song);
            debug!(request_id = %item.id, source, song = %item.song.display_name(), "Resolved work item");
            Ok(item)
        }
        Err(e) => {
            RESOLUTIONS_TOTAL.with_label_values(&[source, e.kind()]).inc();
            Err(e)
        }
    }
}

fn record_rejection(e: &SettingsError) {
    let label = match e {
        SettingsError::Invalid(_) => "rejected",
        SettingsError::Conflict { .. } => "conflict",
    };
    SETTINGS_CHANGES.with_label_values(&[label]).inc();
    warn!("Settings change rejected: {}", e);
}
