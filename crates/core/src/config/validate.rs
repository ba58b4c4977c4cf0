use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Downloader settings pass their own validation
/// - Spotify search limit is within the API's range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    config
        .downloader
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("downloader: {}", e)))?;

    if !(1..=50).contains(&config.spotify.search_limit) {
        return Err(ConfigError::ValidationError(
            "spotify.search_limit must be between 1 and 50".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::settings::Settings;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Config::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_threads_fails() {
        let config = Config {
            downloader: Settings::default().with_threads(0),
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn test_validate_search_limit() {
        let mut config = Config::default();
        config.spotify.search_limit = 0;
        assert!(validate_config(&config).is_err());
    }
}
