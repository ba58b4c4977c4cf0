//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits,
//! allowing orchestrator and HTTP tests without network access or external
//! tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use tunefetch_core::testing::{fixtures, MockDownloader, MockSearcher};
//!
//! let searcher = MockSearcher::with_results(vec![fixtures::song("Bonobo", "Kerala")]);
//! let downloader = MockDownloader::new().with_delay(Duration::from_millis(50));
//!
//! // Hand them to a DownloadOrchestrator...
//! ```

mod mock_downloader;
mod mock_searcher;

pub use mock_downloader::{MockDownloader, RecordedDownload};
pub use mock_searcher::{MockSearcher, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::song::Song;

    /// Create a song with reasonable defaults.
    pub fn song(artist: &str, title: &str) -> Song {
        let song_id = format!(
            "{}-{}",
            artist.to_lowercase().replace(' ', "-"),
            title.to_lowercase().replace(' ', "-")
        );

        Song {
            name: title.to_string(),
            artists: vec![artist.to_string()],
            artist: artist.to_string(),
            album_name: format!("{} Album", title),
            album_artist: artist.to_string(),
            genres: Vec::new(),
            disc_number: 1,
            disc_count: 1,
            copyright_text: None,
            duration: 210,
            year: 2001,
            date: "2001-01-01".to_string(),
            track_number: 1,
            tracks_count: 10,
            isrc: None,
            url: format!("https://open.spotify.com/track/{}", song_id),
            song_id,
            cover_url: None,
            explicit: false,
            publisher: None,
            download_url: None,
        }
    }

    /// The JSON object a client would post for `song(artist, title)`.
    pub fn song_json(artist: &str, title: &str) -> Value {
        // Song always serializes to an object.
        serde_json::to_value(song(artist, title)).unwrap_or_else(|_| json!({}))
    }
}
