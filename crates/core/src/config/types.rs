use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::settings::{SanitizedSettings, Settings};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Initial downloader settings. Replaceable at runtime.
    #[serde(default)]
    pub downloader: Settings,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8800
}

/// Spotify Web API endpoints and search options.
///
/// Credentials live in the downloader settings so they can be changed at
/// runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpotifyConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Results per search (1-50).
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_search_limit() -> u32 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub downloader: SanitizedSettings,
    pub spotify: SpotifyConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            downloader: SanitizedSettings::from(&config.downloader),
            spotify: config.spotify.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AudioFormat;
    use std::path::PathBuf;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[downloader]
threads = 4
output = "/music"
format = "opus"
bitrate = "160k"
client_id = "id"
client_secret = "secret"

[spotify]
search_limit = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.downloader.threads, 4);
        assert_eq!(config.downloader.output, PathBuf::from("/music"));
        assert_eq!(config.downloader.format, AudioFormat::Opus);
        assert_eq!(config.spotify.search_limit, 5);
        assert_eq!(config.spotify.api_url, "https://api.spotify.com/v1");
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8800);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.downloader, Settings::default());
        assert_eq!(config.spotify.search_limit, 10);
    }

    #[test]
    fn test_sanitized_config() {
        let toml = r#"
[downloader]
client_id = "abc"
client_secret = "super-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.downloader.client_id, "abc");
        assert!(sanitized.downloader.client_secret_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
