//! Types for the song search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::song::Song;

/// Field-based search input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Maximum results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl StructuredQuery {
    /// Renders the query in the provider's field-filter syntax.
    ///
    /// Returns `None` when no field is set.
    pub fn to_query_string(&self) -> Option<String> {
        let mut parts = Vec::new();

        let fields = [
            ("track", self.title.as_deref()),
            ("artist", self.artist.as_deref()),
            ("album", self.album.as_deref()),
        ];
        for (key, value) in fields {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                parts.push(format!("{}:{}", key, value));
            }
        }
        if let Some(year) = self.year {
            parts.push(format!("year:{}", year));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider credentials are missing.
    #[error("search provider not configured: {0}")]
    NotConfigured(String),

    /// Credentials were rejected.
    #[error("authentication with search provider failed: {0}")]
    AuthFailed(String),

    /// The query cannot be sent as-is.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Provider rate limit hit.
    #[error("search provider rate limit exceeded")]
    RateLimited,

    /// Non-success response from the provider.
    #[error("search provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("failed to parse search response: {0}")]
    Parse(String),

    /// Transport-level failure.
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Trait for song metadata providers.
#[async_trait]
pub trait SongSearcher: Send + Sync {
    /// Returns the name of this searcher implementation.
    fn name(&self) -> &str;

    /// Free-text search. Results are ordered best match first.
    async fn search(&self, query: &str) -> Result<Vec<Song>, SearchError>;

    /// Looks up a single track by its provider URL.
    ///
    /// Returns `Ok(None)` when the provider has no such track.
    async fn lookup_url(&self, url: &str) -> Result<Option<Song>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_query_rendering() {
        let query = StructuredQuery {
            title: Some("Around the World".to_string()),
            artist: Some("Daft Punk".to_string()),
            album: None,
            year: Some(1997),
            limit: Some(5),
        };
        assert_eq!(
            query.to_query_string().unwrap(),
            "track:Around the World artist:Daft Punk year:1997"
        );
    }

    #[test]
    fn test_structured_query_empty() {
        let query = StructuredQuery {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(query.to_query_string().is_none());
    }

    #[test]
    fn test_structured_query_deserialize() {
        let query: StructuredQuery =
            serde_json::from_str(r#"{"album": "Homework", "limit": 3}"#).unwrap();
        assert_eq!(query.album.as_deref(), Some("Homework"));
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.to_query_string().unwrap(), "album:Homework");
    }

    #[test]
    fn test_error_display() {
        let err = SearchError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "search provider returned 502: bad gateway");
    }
}
