//! Mock searcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::searcher::{SearchError, SongSearcher};
use crate::song::Song;

/// A recorded call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The query text, or the URL for lookups.
    pub query: String,
    /// Whether this was a URL lookup.
    pub lookup: bool,
    /// When the call was made.
    pub timestamp: Instant,
}

/// A query handler that produces results dynamically based on the query.
type QueryHandler = Box<dyn Fn(&str) -> Option<Vec<Song>> + Send + Sync>;

/// Mock implementation of the SongSearcher trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable search results
/// - Map track URLs to songs
/// - Track queries for assertions
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// use tunefetch_core::testing::{MockSearcher, fixtures};
///
/// let searcher = MockSearcher::new();
/// searcher.set_results(vec![
///     fixtures::song("Portishead", "Roads"),
///     fixtures::song("Portishead", "Glory Box"),
/// ]).await;
///
/// let songs = searcher.search("portishead roads").await?;
/// assert_eq!(songs.len(), 1);
/// ```
pub struct MockSearcher {
    /// Configured results to return.
    results: Arc<RwLock<Vec<Song>>>,
    /// Songs returned by URL lookups.
    by_url: Arc<RwLock<HashMap<String, Song>>>,
    /// Recorded calls.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<SearchError>>>,
    /// Query handler for dynamic result generation based on query string.
    query_handler: Arc<RwLock<Option<QueryHandler>>>,
}

impl std::fmt::Debug for MockSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearcher")
            .field("results", &"<results>")
            .field("by_url", &"<by_url>")
            .field("searches", &"<searches>")
            .field("next_error", &"<next_error>")
            .field("query_handler", &"<handler>")
            .finish()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearcher {
    /// Create a new mock searcher with empty results.
    pub fn new() -> Self {
        Self::with_results(Vec::new())
    }

    /// Create a mock searcher with predefined results.
    pub fn with_results(results: Vec<Song>) -> Self {
        Self {
            results: Arc::new(RwLock::new(results)),
            by_url: Arc::new(RwLock::new(HashMap::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            query_handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the results to return for subsequent searches.
    pub async fn set_results(&self, results: Vec<Song>) {
        *self.results.write().await = results;
    }

    /// Add a single result.
    pub async fn add_result(&self, result: Song) {
        self.results.write().await.push(result);
    }

    /// Make `lookup_url(url)` return `song`.
    pub async fn set_url_result(&self, url: &str, song: Song) {
        self.by_url.write().await.insert(url.to_string(), song);
    }

    /// Get recorded calls.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of calls performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: SearchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set a query handler that dynamically generates results based on the query string.
    ///
    /// Returning `None` falls back to the configured results.
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<Vec<Song>> + Send + Sync + 'static,
    {
        *self.query_handler.write().await = Some(Box::new(handler));
    }

    async fn record(&self, query: &str, lookup: bool) {
        self.searches.write().await.push(RecordedSearch {
            query: query.to_string(),
            lookup,
            timestamp: Instant::now(),
        });
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<SearchError> {
        self.next_error.write().await.take()
    }
}

/// Every query word, minus any `field:` prefix, appears in the song.
fn matches_query(song: &Song, query: &str) -> bool {
    let haystack = format!("{} {} {}", song.artist, song.name, song.album_name).to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.split_once(':').map_or(word, |(_, value)| value))
        .filter(|word| !word.is_empty())
        .all(|word| haystack.contains(word))
}

#[async_trait]
impl SongSearcher for MockSearcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str) -> Result<Vec<Song>, SearchError> {
        self.record(query, false).await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let handler = self.query_handler.read().await;
        if let Some(ref h) = *handler {
            if let Some(results) = h(query) {
                return Ok(results);
            }
        }
        drop(handler);

        Ok(self
            .results
            .read()
            .await
            .iter()
            .filter(|song| matches_query(song, query))
            .cloned()
            .collect())
    }

    async fn lookup_url(&self, url: &str) -> Result<Option<Song>, SearchError> {
        self.record(url, true).await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self.by_url.read().await.get(url).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_filters_by_query_words() {
        let searcher = MockSearcher::with_results(vec![
            fixtures::song("Portishead", "Roads"),
            fixtures::song("Portishead", "Glory Box"),
            fixtures::song("Massive Attack", "Teardrop"),
        ]);

        let songs = searcher.search("portishead glory").await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].name, "Glory Box");

        let songs = searcher.search("track:teardrop artist:massive").await.unwrap();
        assert_eq!(songs.len(), 1);

        assert_eq!(searcher.search_count().await, 2);
    }

    #[tokio::test]
    async fn test_next_error_applies_once() {
        let searcher = MockSearcher::new();
        searcher.set_next_error(SearchError::RateLimited).await;

        assert!(matches!(
            searcher.search("anything").await,
            Err(SearchError::RateLimited)
        ));
        assert!(searcher.search("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_url() {
        let searcher = MockSearcher::new();
        let song = fixtures::song("Tricky", "Overcome");
        searcher.set_url_result(&song.url, song.clone()).await;

        assert_eq!(searcher.lookup_url(&song.url).await.unwrap(), Some(song));
        assert_eq!(searcher.lookup_url("https://nowhere").await.unwrap(), None);

        let recorded = searcher.recorded_searches().await;
        assert!(recorded.iter().all(|r| r.lookup));
    }
}
