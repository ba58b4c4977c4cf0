//! Types for song metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Metadata for a single track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Track title.
    pub name: String,
    /// All credited artists.
    pub artists: Vec<String>,
    /// Primary artist.
    pub artist: String,
    /// Album title.
    pub album_name: String,
    /// Album artist.
    #[serde(default)]
    pub album_artist: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub disc_number: u32,
    #[serde(default)]
    pub disc_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright_text: Option<String>,
    /// Duration in seconds.
    pub duration: u32,
    #[serde(default)]
    pub year: u32,
    /// Release date as reported by the provider (YYYY, YYYY-MM or YYYY-MM-DD).
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub tracks_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    /// Provider-specific track id.
    pub song_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Provider URL of the track.
    pub url: String,
    /// Direct media URL, when already known. Skips the audio provider search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl Song {
    /// "Artist - Title", used for logs, file names and audio searches.
    pub fn display_name(&self) -> String {
        let artist = if self.artist.is_empty() {
            self.artists.first().map(String::as_str).unwrap_or_default()
        } else {
            self.artist.as_str()
        };

        if artist.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", artist, self.name)
        }
    }

    /// File name stem safe for common filesystems.
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .display_name()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        stem.trim().trim_end_matches('.').to_string()
    }
}

/// A single song-download request.
///
/// The metadata is shared and never mutated after construction. Execution
/// state lives in the pool and is observed through a `DownloadHandle`.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Request correlation id.
    pub id: Uuid,
    /// The song to download.
    pub song: Arc<Song>,
    /// When the item was built.
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    /// Wraps a song into a new work item with a fresh id.
    pub fn new(song: Song) -> Self {
        Self {
            id: Uuid::new_v4(),
            song: Arc::new(song),
            created_at: Utc::now(),
        }
    }
}
