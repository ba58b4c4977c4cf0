//! Validation of raw song objects submitted by clients.

use reqwest::Url;
use serde_json::Value;
use thiserror::Error;

use super::types::Song;

/// Errors produced while validating a submitted song object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The payload is not a JSON object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),

    /// Required fields are missing or empty.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// A field has the wrong shape.
    #[error("invalid song object: {0}")]
    Malformed(String),
}

/// Turns a raw client payload into a `Song`.
pub trait SongValidator: Send + Sync {
    fn validate(&self, raw: Value) -> Result<Song, ValidationError>;
}

/// Default validator: serde shape check plus required-field checks.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator;

const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "artists",
    "artist",
    "album_name",
    "duration",
    "song_id",
    "url",
];

impl SongValidator for SchemaValidator {
    fn validate(&self, raw: Value) -> Result<Song, ValidationError> {
        let object = match &raw {
            Value::Object(map) => map,
            other => return Err(ValidationError::NotAnObject(json_type(other).to_string())),
        };

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| match object.get(**field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Array(items)) => items.is_empty(),
                _ => false,
            })
            .map(|field| field.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let song: Song =
            serde_json::from_value(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;

        if song.duration == 0 {
            return Err(ValidationError::Malformed(
                "duration must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &song.download_url {
            check_download_url(url)?;
        }

        Ok(song)
    }
}

/// Only absolute http(s) URLs may be handed to the download tool.
fn check_download_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url)
        .map_err(|e| ValidationError::Malformed(format!("download_url {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ValidationError::Malformed(format!(
            "download_url must use http or https, got {scheme}"
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "name": "Harder, Better, Faster, Stronger",
            "artists": ["Daft Punk"],
            "artist": "Daft Punk",
            "album_name": "Discovery",
            "album_artist": "Daft Punk",
            "duration": 224,
            "song_id": "5W3cjX2J3tjhG8zb6u0qHn",
            "url": "https://open.spotify.com/track/5W3cjX2J3tjhG8zb6u0qHn"
        })
    }

    #[test]
    fn test_valid_payload() {
        let song = SchemaValidator.validate(valid_payload()).unwrap();
        assert_eq!(song.name, "Harder, Better, Faster, Stronger");
        assert_eq!(song.duration, 224);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = SchemaValidator.validate(json!(["not", "a", "song"])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject("array".to_string()));
    }

    #[test]
    fn test_reports_all_missing_fields() {
        let mut payload = valid_payload();
        payload["name"] = json!("  ");
        payload["artists"] = json!([]);
        payload.as_object_mut().unwrap().remove("url");

        let err = SchemaValidator.validate(payload).unwrap_err();
        match err {
            ValidationError::MissingFields(fields) => {
                assert_eq!(fields, vec!["name", "artists", "url"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_wrong_types() {
        let mut payload = valid_payload();
        payload["duration"] = json!("three minutes");
        let err = SchemaValidator.validate(payload).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn test_rejects_zero_duration() {
        let mut payload = valid_payload();
        payload["duration"] = json!(0);
        let err = SchemaValidator.validate(payload).unwrap_err();
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn test_accepts_http_download_url() {
        let mut payload = valid_payload();
        payload["download_url"] = json!("https://www.youtube.com/watch?v=GDpmVUEjagg");
        let song = SchemaValidator.validate(payload).unwrap();
        assert_eq!(
            song.download_url.as_deref(),
            Some("https://www.youtube.com/watch?v=GDpmVUEjagg")
        );
    }

    #[test]
    fn test_rejects_option_like_download_url() {
        let mut payload = valid_payload();
        payload["download_url"] = json!("--exec=touch /tmp/owned");
        let err = SchemaValidator.validate(payload).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
        assert!(err.to_string().contains("download_url"));
    }

    #[test]
    fn test_rejects_non_http_download_url() {
        let mut payload = valid_payload();
        payload["download_url"] = json!("file:///etc/passwd");
        let err = SchemaValidator.validate(payload).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Malformed("download_url must use http or https, got file".to_string())
        );
    }

    #[test]
    fn test_error_display_lists_fields() {
        let err = ValidationError::MissingFields(vec!["name".to_string(), "url".to_string()]);
        assert_eq!(err.to_string(), "missing required fields: name, url");
    }
}
