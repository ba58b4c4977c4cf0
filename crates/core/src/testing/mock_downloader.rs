//! Mock downloader for testing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::downloader::{DownloadError, Downloader};
use crate::settings::Settings;
use crate::song::Song;

/// A recorded download for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDownload {
    /// Title of the song.
    pub title: String,
    /// Version of the settings snapshot the download ran with.
    pub settings_version: u64,
    /// Output directory of that snapshot.
    pub output: PathBuf,
}

/// Mock implementation of the Downloader trait.
///
/// Blocking like the real thing: the configured delay is a thread sleep, so
/// it occupies a blocking thread exactly as a real download would.
///
/// Tracks how many downloads run at once, which order they start in and
/// which settings snapshot each one saw.
pub struct MockDownloader {
    delay: Duration,
    produce_file: bool,
    write_files: bool,
    failures: Mutex<HashMap<String, DownloadError>>,
    panics: Mutex<HashSet<String>>,
    next_error: Mutex<Option<DownloadError>>,
    started: Mutex<Vec<RecordedDownload>>,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl std::fmt::Debug for MockDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDownloader")
            .field("delay", &self.delay)
            .field("produce_file", &self.produce_file)
            .field("write_files", &self.write_files)
            .finish()
    }
}

impl Default for MockDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDownloader {
    /// Create a mock that completes instantly and reports a file path.
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            produce_file: true,
            write_files: false,
            failures: Mutex::new(HashMap::new()),
            panics: Mutex::new(HashSet::new()),
            next_error: Mutex::new(None),
            started: Mutex::new(Vec::new()),
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    /// Each download blocks for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Downloads succeed without producing a file.
    pub fn metadata_only(mut self) -> Self {
        self.produce_file = false;
        self
    }

    /// Actually write a small file at the reported path.
    pub fn writing_files(mut self) -> Self {
        self.write_files = true;
        self
    }

    /// Fail every download of the song titled `title`.
    pub fn fail_on(&self, title: &str, error: DownloadError) {
        lock(&self.failures).insert(title.to_string(), error);
    }

    /// Panic while downloading the song titled `title`.
    pub fn panic_on(&self, title: &str) {
        lock(&self.panics).insert(title.to_string());
    }

    /// Fail the next download, whatever it is.
    pub fn fail_next(&self, error: DownloadError) {
        *lock(&self.next_error) = Some(error);
    }

    /// Number of downloads started.
    pub fn call_count(&self) -> usize {
        lock(&self.started).len()
    }

    /// Titles in the order their downloads started.
    pub fn started_titles(&self) -> Vec<String> {
        lock(&self.started).iter().map(|r| r.title.clone()).collect()
    }

    /// Every started download.
    pub fn recorded_downloads(&self) -> Vec<RecordedDownload> {
        lock(&self.started).clone()
    }

    /// Highest number of downloads observed running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    /// Downloads running right now.
    pub fn running(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn target(song: &Song, settings: &Settings) -> PathBuf {
        settings
            .output
            .join(format!("{}.{}", song.file_stem(), settings.format.extension()))
    }
}

/// Poisoning only happens after a test already panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Decrements the running counter even if the download panics.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Downloader for MockDownloader {
    fn name(&self) -> &str {
        "mock"
    }

    fn download(&self, song: &Song, settings: &Settings) -> Result<Option<PathBuf>, DownloadError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = RunningGuard(&self.current);
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        lock(&self.started).push(RecordedDownload {
            title: song.name.clone(),
            settings_version: settings.version,
            output: settings.output.clone(),
        });

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if lock(&self.panics).contains(&song.name) {
            panic!("mock downloader panic for {}", song.name);
        }
        if let Some(err) = lock(&self.next_error).take() {
            return Err(err);
        }
        if let Some(err) = lock(&self.failures).get(&song.name) {
            return Err(err.clone());
        }

        if !self.produce_file {
            return Ok(None);
        }

        let path = Self::target(song, settings);
        if self.write_files {
            std::fs::create_dir_all(&settings.output)?;
            std::fs::write(&path, format!("mock audio for {}", song.display_name()))?;
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_reports_target_path() {
        let downloader = MockDownloader::new();
        let settings = Settings::default().with_output(PathBuf::from("/music"));
        let path = downloader
            .download(&fixtures::song("Air", "Sexy Boy"), &settings)
            .unwrap();
        assert_eq!(path, Some(PathBuf::from("/music/Air - Sexy Boy.mp3")));
        assert_eq!(downloader.call_count(), 1);
        assert_eq!(downloader.running(), 0);
    }

    #[test]
    fn test_metadata_only() {
        let downloader = MockDownloader::new().metadata_only();
        let path = downloader
            .download(&fixtures::song("Air", "Playground Love"), &Settings::default())
            .unwrap();
        assert!(path.is_none());
    }

    #[test]
    fn test_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = MockDownloader::new().writing_files();
        let settings = Settings::default().with_output(dir.path().to_path_buf());

        let path = downloader
            .download(&fixtures::song("Air", "Alone in Kyoto"), &settings)
            .unwrap()
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_fail_next_applies_once() {
        let downloader = MockDownloader::new();
        downloader.fail_next(DownloadError::provider("boom"));
        let song = fixtures::song("Air", "Cherry Blossom Girl");

        assert!(downloader.download(&song, &Settings::default()).is_err());
        assert!(downloader.download(&song, &Settings::default()).is_ok());
    }
}
