//! Song metadata search abstraction.
//!
//! This module provides a `SongSearcher` trait for looking up track metadata
//! from a provider, and a Spotify Web API implementation.

mod spotify;
mod types;

pub use spotify::{parse_track_id, SpotifySearcher};
pub use types::*;
