//! Spotify Web API searcher.
//!
//! Uses the client-credentials flow with the credentials of the active
//! settings snapshot. The access token is cached until shortly before it
//! expires, or until the configured client id changes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{SearchError, SongSearcher};
use crate::metrics::{EXTERNAL_SERVICE_DURATION, EXTERNAL_SERVICE_REQUESTS};
use crate::settings::SettingsRegistry;
use crate::song::Song;

const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_LIMIT: u32 = 10;

/// Refresh tokens this long before they expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(30);

/// Cap on the lifetime the token endpoint may claim.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

struct CachedToken {
    client_id: String,
    access_token: String,
    expires_at: Instant,
}

/// Spotify track search.
pub struct SpotifySearcher {
    client: Client,
    api_base: String,
    auth_url: String,
    limit: u32,
    settings: Arc<SettingsRegistry>,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifySearcher {
    /// Creates a searcher reading credentials from `settings`.
    pub fn new(settings: Arc<SettingsRegistry>) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            limit: DEFAULT_LIMIT,
            settings,
            token: Mutex::new(None),
        })
    }

    /// Overrides the API endpoints (useful for testing against a stub server).
    pub fn with_endpoints(mut self, api_base: impl Into<String>, auth_url: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.auth_url = auth_url.into();
        self
    }

    /// Sets how many results a search returns.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, 50);
        self
    }

    /// Returns a valid access token, fetching a new one if needed.
    async fn access_token(&self) -> Result<String, SearchError> {
        let settings = self.settings.get().await;
        if !settings.has_credentials() {
            return Err(SearchError::NotConfigured(
                "client_id and client_secret are required".to_string(),
            ));
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.client_id == settings.client_id
                && token.expires_at.saturating_duration_since(Instant::now()) > TOKEN_MARGIN
            {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting Spotify access token");
        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&settings.client_id, Some(&settings.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::AuthFailed(body));
        }
        let response = check_status(response).await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Failed to parse token response: {}", e)))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            client_id: settings.client_id.clone(),
            access_token: token.access_token,
            expires_at: token_expiry(Instant::now(), token.expires_in),
        });

        Ok(access_token)
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<Song>, SearchError> {
        let token = self.access_token().await?;
        let url = format!("{}/search", self.api_base);

        debug!("Spotify track search: query='{}'", query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", &self.limit.to_string()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Failed to parse search response: {}", e)))?;

        Ok(body.tracks.items.into_iter().map(Song::from).collect())
    }

    async fn get_track(&self, id: &str) -> Result<Option<Song>, SearchError> {
        let token = self.access_token().await?;
        let url = format!("{}/tracks/{}", self.api_base, id);

        debug!("Spotify get track: id={}", id);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        let response = check_status(response).await?;

        let track: SpotifyTrack = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("Failed to parse track response: {}", e)))?;

        Ok(Some(track.into()))
    }
}

#[async_trait]
impl SongSearcher for SpotifySearcher {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn search(&self, query: &str) -> Result<Vec<Song>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query cannot be empty".to_string()));
        }

        let timer = EXTERNAL_SERVICE_DURATION
            .with_label_values(&["spotify", "search"])
            .start_timer();
        let result = self.search_tracks(query).await;
        timer.observe_duration();

        record_request("search", result.is_ok());
        result
    }

    async fn lookup_url(&self, url: &str) -> Result<Option<Song>, SearchError> {
        let id = parse_track_id(url).ok_or_else(|| {
            SearchError::InvalidQuery(format!("not a Spotify track URL: {}", url))
        })?;

        let timer = EXTERNAL_SERVICE_DURATION
            .with_label_values(&["spotify", "track"])
            .start_timer();
        let result = self.get_track(&id).await;
        timer.observe_duration();

        record_request("track", result.is_ok());
        result
    }
}

/// When a token issued at `now` with a lifetime of `expires_in` seconds expires.
fn token_expiry(now: Instant, expires_in: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME);
    now.checked_add(lifetime).unwrap_or(now)
}

fn record_request(operation: &str, ok: bool) {
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&["spotify", operation, if ok { "success" } else { "error" }])
        .inc();
}

async fn check_status(response: Response) -> Result<Response, SearchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SearchError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SearchError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(response)
}

/// Extracts the track id from an `open.spotify.com` URL or a `spotify:track:` URI.
pub fn parse_track_id(url: &str) -> Option<String> {
    let url = url.trim();

    let id = if let Some(rest) = url.strip_prefix("spotify:track:") {
        rest
    } else {
        let path = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let path = path.strip_prefix("open.spotify.com/")?;
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        // Skip an optional locale segment such as "intl-de".
        let mut kind = segments.next()?;
        if kind.starts_with("intl-") {
            kind = segments.next()?;
        }
        if kind != "track" {
            return None;
        }
        segments.next()?
    };

    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(id.to_string())
    } else {
        None
    }
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    #[serde(default)]
    disc_number: u32,
    #[serde(default)]
    track_number: u32,
    duration_ms: u64,
    #[serde(default)]
    explicit: bool,
    #[serde(default)]
    external_ids: ExternalIds,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    total_tracks: u32,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
    #[serde(default)]
    width: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIds {
    #[serde(default)]
    isrc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: Option<String>,
}

impl From<SpotifyTrack> for Song {
    fn from(track: SpotifyTrack) -> Self {
        let artists: Vec<String> = track.artists.into_iter().map(|a| a.name).collect();
        let artist = artists.first().cloned().unwrap_or_default();
        let album_artist = track
            .album
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| artist.clone());
        let year = track
            .album
            .release_date
            .get(..4)
            .and_then(|y| y.parse().ok())
            .unwrap_or_default();
        let cover_url = track
            .album
            .images
            .into_iter()
            .max_by_key(|image| image.width.unwrap_or_default())
            .map(|image| image.url);
        let url = track
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", track.id));

        Song {
            name: track.name,
            artists,
            artist,
            album_name: track.album.name,
            album_artist,
            genres: Vec::new(),
            disc_number: track.disc_number,
            disc_count: track.disc_number.max(1),
            copyright_text: None,
            duration: (track.duration_ms / 1000) as u32,
            year,
            date: track.album.release_date,
            track_number: track.track_number,
            tracks_count: track.album.total_tracks,
            isrc: track.external_ids.isrc,
            song_id: track.id,
            cover_url,
            explicit: track.explicit,
            publisher: None,
            url,
            download_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    const TRACK_JSON: &str = r#"{
        "id": "0DiWol3AO6WpXZgp0goxAV",
        "name": "One More Time",
        "artists": [{"name": "Daft Punk"}],
        "album": {
            "name": "Discovery",
            "artists": [{"name": "Daft Punk"}],
            "release_date": "2001-03-12",
            "total_tracks": 14,
            "images": [
                {"url": "https://i.scdn.co/small.jpg", "width": 64},
                {"url": "https://i.scdn.co/large.jpg", "width": 640}
            ]
        },
        "disc_number": 1,
        "track_number": 1,
        "duration_ms": 320357,
        "explicit": false,
        "external_ids": {"isrc": "GBDUW0000053"},
        "external_urls": {"spotify": "https://open.spotify.com/track/0DiWol3AO6WpXZgp0goxAV"}
    }"#;

    #[test]
    fn test_track_conversion() {
        let track: SpotifyTrack = serde_json::from_str(TRACK_JSON).unwrap();
        let song = Song::from(track);

        assert_eq!(song.name, "One More Time");
        assert_eq!(song.artist, "Daft Punk");
        assert_eq!(song.album_name, "Discovery");
        assert_eq!(song.year, 2001);
        assert_eq!(song.date, "2001-03-12");
        assert_eq!(song.duration, 320);
        assert_eq!(song.tracks_count, 14);
        assert_eq!(song.isrc.as_deref(), Some("GBDUW0000053"));
        assert_eq!(song.cover_url.as_deref(), Some("https://i.scdn.co/large.jpg"));
        assert_eq!(song.song_id, "0DiWol3AO6WpXZgp0goxAV");
    }

    #[test]
    fn test_search_response_parsing() {
        let json = format!(r#"{{"tracks": {{"items": [{}]}}}}"#, TRACK_JSON);
        let response: SearchResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response.tracks.items.len(), 1);
    }

    #[test]
    fn test_parse_track_id() {
        assert_eq!(
            parse_track_id("https://open.spotify.com/track/0DiWol3AO6WpXZgp0goxAV?si=abc"),
            Some("0DiWol3AO6WpXZgp0goxAV".to_string())
        );
        assert_eq!(
            parse_track_id("https://open.spotify.com/intl-de/track/0DiWol3AO6WpXZgp0goxAV"),
            Some("0DiWol3AO6WpXZgp0goxAV".to_string())
        );
        assert_eq!(
            parse_track_id("spotify:track:0DiWol3AO6WpXZgp0goxAV"),
            Some("0DiWol3AO6WpXZgp0goxAV".to_string())
        );
        assert_eq!(
            parse_track_id("https://open.spotify.com/album/2noRn2Aes5aoNVsU6iWThc"),
            None
        );
        assert_eq!(parse_track_id("https://example.com/track/abc"), None);
        assert_eq!(parse_track_id("spotify:track:../etc"), None);
    }

    #[test]
    fn test_token_expiry_caps_lifetime() {
        let now = Instant::now();
        assert_eq!(token_expiry(now, 3600), now + Duration::from_secs(3600));
        assert_eq!(token_expiry(now, 0), now);
        assert_eq!(token_expiry(now, u64::MAX), now + MAX_TOKEN_LIFETIME);
    }

    #[tokio::test]
    async fn test_search_without_credentials() {
        let registry = Arc::new(SettingsRegistry::new(Settings::default()).unwrap());
        let searcher = SpotifySearcher::new(registry).unwrap();

        let err = searcher.search("daft punk").await.unwrap_err();
        assert!(matches!(err, SearchError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let registry = Arc::new(SettingsRegistry::new(Settings::default()).unwrap());
        let searcher = SpotifySearcher::new(registry).unwrap();

        let err = searcher.search("  ").await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_lookup_rejects_non_track_url() {
        let registry = Arc::new(SettingsRegistry::new(Settings::default()).unwrap());
        let searcher = SpotifySearcher::new(registry).unwrap();

        let err = searcher
            .lookup_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }
}
