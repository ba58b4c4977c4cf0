//! Settings snapshot and patch types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::SettingsError;

/// Upper bound for `threads`.
pub const MAX_THREADS: usize = 64;

/// Output audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    M4a,
    Flac,
    Opus,
    Ogg,
    Wav,
}

impl AudioFormat {
    /// File extension produced for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Flac => "flac",
            Self::Opus => "opus",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
        }
    }

    /// Whether a bitrate setting means anything for this format.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }
}

/// What to do when the target file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Keep the existing file and report it as the result.
    Skip,
    /// Download again and replace the file.
    Overwrite,
    /// Like `Overwrite`, and also ignore any cached download state.
    Force,
}

/// An immutable settings snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Snapshot version. Bumped on every replacement.
    #[serde(skip_deserializing, default = "default_version")]
    pub version: u64,

    /// Maximum number of downloads running at the same time.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Directory downloaded files are written to.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default = "default_format")]
    pub format: AudioFormat,

    /// Target bitrate, e.g. "320k". `None` keeps the tool's default.
    #[serde(default)]
    pub bitrate: Option<String>,

    #[serde(default = "default_overwrite")]
    pub overwrite: OverwritePolicy,

    /// Path to the ffmpeg binary handed to the download tool.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Extra arguments passed to ffmpeg during post-processing.
    #[serde(default)]
    pub ffmpeg_args: Vec<String>,

    /// Path to the download tool.
    #[serde(default = "default_downloader")]
    pub downloader: PathBuf,

    /// Where audio is fetched from.
    #[serde(default = "default_audio_provider")]
    pub audio_provider: String,

    #[serde(default = "default_lyrics_provider")]
    pub lyrics_provider: String,

    /// Upper bound for a single download, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Metadata provider client id.
    #[serde(default)]
    pub client_id: String,

    /// Metadata provider client secret.
    #[serde(default)]
    pub client_secret: String,
}

fn default_version() -> u64 {
    1
}

fn default_threads() -> usize {
    1
}

fn default_output() -> PathBuf {
    PathBuf::from(".")
}

fn default_format() -> AudioFormat {
    AudioFormat::Mp3
}

fn default_overwrite() -> OverwritePolicy {
    OverwritePolicy::Overwrite
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_downloader() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_audio_provider() -> String {
    "youtube-music".to_string()
}

fn default_lyrics_provider() -> String {
    "musixmatch".to_string()
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            threads: default_threads(),
            output: default_output(),
            format: default_format(),
            bitrate: None,
            overwrite: default_overwrite(),
            ffmpeg: default_ffmpeg(),
            ffmpeg_args: Vec::new(),
            downloader: default_downloader(),
            audio_provider: default_audio_provider(),
            lyrics_provider: default_lyrics_provider(),
            timeout_secs: default_timeout(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

impl Settings {
    /// Sets the concurrency limit.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the output directory.
    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = output;
        self
    }

    /// Checks the snapshot is usable.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(SettingsError::Invalid(format!(
                "threads must be between 1 and {}, got {}",
                MAX_THREADS, self.threads
            )));
        }
        if self.output.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("output cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(bitrate) = &self.bitrate {
            parse_bitrate_kbps(bitrate).ok_or_else(|| {
                SettingsError::Invalid(format!(
                    "bitrate '{}' is not a number of kbps like '320k'",
                    bitrate
                ))
            })?;
        }
        Ok(())
    }

    /// Merges the present fields of `patch` over this snapshot.
    ///
    /// The result carries the next version number and is not validated.
    pub fn merged(&self, patch: &SettingsPatch) -> Settings {
        let mut next = self.clone();
        next.version = self.version + 1;

        if let Some(threads) = patch.threads {
            next.threads = threads;
        }
        if let Some(output) = &patch.output {
            next.output = output.clone();
        }
        if let Some(format) = patch.format {
            next.format = format;
        }
        if let Some(bitrate) = &patch.bitrate {
            // An empty string clears the bitrate.
            next.bitrate = if bitrate.is_empty() {
                None
            } else {
                Some(bitrate.clone())
            };
        }
        if let Some(overwrite) = patch.overwrite {
            next.overwrite = overwrite;
        }
        if let Some(args) = &patch.ffmpeg_args {
            next.ffmpeg_args = args.clone();
        }
        if let Some(provider) = &patch.audio_provider {
            next.audio_provider = provider.clone();
        }
        if let Some(provider) = &patch.lyrics_provider {
            next.lyrics_provider = provider.clone();
        }
        if let Some(timeout) = patch.timeout_secs {
            next.timeout_secs = timeout;
        }
        if let Some(client_id) = &patch.client_id {
            next.client_id = client_id.clone();
        }
        if let Some(client_secret) = &patch.client_secret {
            next.client_secret = client_secret.clone();
        }

        next
    }

    /// Whether moving to `next` needs a freshly sized download pool.
    pub fn requires_new_pool(&self, next: &Settings) -> bool {
        self.threads != next.threads || self.output != next.output
    }

    /// Whether metadata provider credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Parses "320k", "320K" or "320" into kbps.
pub(crate) fn parse_bitrate_kbps(bitrate: &str) -> Option<u32> {
    let digits = bitrate
        .strip_suffix('k')
        .or_else(|| bitrate.strip_suffix('K'))
        .unwrap_or(bitrate);
    digits.parse::<u32>().ok().filter(|kbps| *kbps > 0)
}

/// A partial settings update. Absent fields keep their current value.
///
/// The executable paths (`ffmpeg`, `downloader`) are not patchable; they only
/// come from the startup configuration. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// Reject the patch if the active version differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<OverwritePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl SettingsPatch {
    /// A patch changing only the output directory.
    pub fn output(path: PathBuf) -> Self {
        Self {
            output: Some(path),
            ..Default::default()
        }
    }

    /// A patch changing only the concurrency limit.
    pub fn threads(threads: usize) -> Self {
        Self {
            threads: Some(threads),
            ..Default::default()
        }
    }

    /// Requires the active version to match before applying.
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Settings for API responses (client secret hidden).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSettings {
    pub version: u64,
    pub threads: usize,
    pub output: PathBuf,
    pub format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    pub overwrite: OverwritePolicy,
    pub ffmpeg: PathBuf,
    pub ffmpeg_args: Vec<String>,
    pub downloader: PathBuf,
    pub audio_provider: String,
    pub lyrics_provider: String,
    pub timeout_secs: u64,
    pub client_id: String,
    pub client_secret_configured: bool,
}

impl From<&Settings> for SanitizedSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            version: settings.version,
            threads: settings.threads,
            output: settings.output.clone(),
            format: settings.format,
            bitrate: settings.bitrate.clone(),
            overwrite: settings.overwrite,
            ffmpeg: settings.ffmpeg.clone(),
            ffmpeg_args: settings.ffmpeg_args.clone(),
            downloader: settings.downloader.clone(),
            audio_provider: settings.audio_provider.clone(),
            lyrics_provider: settings.lyrics_provider.clone(),
            timeout_secs: settings.timeout_secs,
            client_id: settings.client_id.clone(),
            client_secret_configured: !settings.client_secret.is_empty(),
        }
    }
}
