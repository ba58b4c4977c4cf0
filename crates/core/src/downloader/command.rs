//! Downloader that shells out to a yt-dlp compatible tool.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::traits::Downloader;
use crate::settings::{AudioFormat, OverwritePolicy, Settings};
use crate::song::Song;

/// Keep at most this many bytes of the tool's stderr in errors.
const MAX_STDERR_BYTES: usize = 2000;

/// Runs the download tool from the settings snapshot for every song.
///
/// The tool does the audio search, the fetch and the ffmpeg post-processing;
/// this type only builds its command line and interprets the outcome.
#[derive(Debug, Clone, Default)]
pub struct CommandDownloader;

impl CommandDownloader {
    pub fn new() -> Self {
        Self
    }

    /// Where the file for `song` ends up under `settings`.
    pub fn target_path(song: &Song, settings: &Settings) -> PathBuf {
        settings
            .output
            .join(format!("{}.{}", song.file_stem(), settings.format.extension()))
    }

    /// Builds the tool arguments for `song`.
    fn build_args(song: &Song, settings: &Settings) -> Vec<String> {
        let template = settings
            .output
            .join(format!("{}.%(ext)s", song.file_stem()));

        let mut args = vec![
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-progress".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            audio_format_arg(settings.format).to_string(),
            "--output".to_string(),
            template.to_string_lossy().to_string(),
        ];

        if let Some(bitrate) = &settings.bitrate {
            if !settings.format.is_lossless() {
                args.extend(["--audio-quality".to_string(), bitrate.to_uppercase()]);
            }
        }

        if settings.ffmpeg != Path::new("ffmpeg") {
            args.extend([
                "--ffmpeg-location".to_string(),
                settings.ffmpeg.to_string_lossy().to_string(),
            ]);
        }

        if !settings.ffmpeg_args.is_empty() {
            args.extend([
                "--postprocessor-args".to_string(),
                format!("ffmpeg:{}", settings.ffmpeg_args.join(" ")),
            ]);
        }

        match settings.overwrite {
            OverwritePolicy::Skip => args.push("--no-overwrites".to_string()),
            OverwritePolicy::Overwrite => args.push("--force-overwrites".to_string()),
            OverwritePolicy::Force => {
                args.push("--force-overwrites".to_string());
                args.push("--no-continue".to_string());
            }
        }

        // Everything after "--" is a source, never an option.
        args.push("--".to_string());
        args.push(source_for(song, &settings.audio_provider));
        args
    }
}

impl Downloader for CommandDownloader {
    fn name(&self) -> &str {
        "command"
    }

    fn download(&self, song: &Song, settings: &Settings) -> Result<Option<PathBuf>, DownloadError> {
        let target = Self::target_path(song, settings);

        if settings.overwrite == OverwritePolicy::Skip && target.exists() {
            debug!("Skipping {}, file exists at {:?}", song.display_name(), target);
            return Ok(Some(target));
        }

        std::fs::create_dir_all(&settings.output)?;

        let args = Self::build_args(song, settings);
        debug!("Running {:?} {:?}", settings.downloader, args);

        let start = Instant::now();
        let limit = Duration::from_secs(settings.timeout_secs);
        let run = run_tool(&settings.downloader, &args, limit);

        // Pool workers run on tokio's blocking threads, which can drive the
        // runtime directly. Anything else gets a private one.
        let outcome = match Handle::try_current() {
            Ok(handle) => handle.block_on(run)?,
            Err(_) => Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(run)?,
        };

        let (status, stderr) = match outcome {
            Some(done) => done,
            None => {
                warn!(
                    "Download of {} timed out after {}s",
                    song.display_name(),
                    settings.timeout_secs
                );
                return Err(DownloadError::Timeout {
                    timeout_secs: settings.timeout_secs,
                });
            }
        };

        if !status.success() {
            return Err(DownloadError::ToolFailed {
                code: status.code(),
                stderr: tail(stderr.trim(), MAX_STDERR_BYTES).to_string(),
            });
        }

        if target.exists() {
            info!(
                "Downloaded {} to {:?} in {} ms",
                song.display_name(),
                target,
                start.elapsed().as_millis()
            );
            Ok(Some(target))
        } else {
            warn!(
                "Download tool finished but {:?} was not produced",
                target
            );
            Ok(None)
        }
    }
}

/// Runs `program`, collecting its stderr, and kills it once `limit` elapses.
///
/// Returns `Ok(None)` on timeout.
async fn run_tool(
    program: &Path,
    args: &[String],
    limit: Duration,
) -> Result<Option<(ExitStatus, String)>, DownloadError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DownloadError::ToolNotFound {
                    path: program.to_path_buf(),
                }
            } else {
                DownloadError::from(e)
            }
        })?;

    let stderr = child.stderr.take();

    let result = timeout(limit, async {
        let mut error_output = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                error_output.push_str(&line);
                error_output.push('\n');
                if error_output.len() > MAX_STDERR_BYTES * 2 {
                    error_output = tail(&error_output, MAX_STDERR_BYTES).to_string();
                }
            }
        }

        let status = child.wait().await?;
        Ok::<(ExitStatus, String), std::io::Error>((status, error_output))
    })
    .await;

    match result {
        Ok(Ok(done)) => Ok(Some(done)),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            // Kill the process on timeout
            let _ = child.kill().await;
            Ok(None)
        }
    }
}

/// The value the tool expects for `--audio-format`.
fn audio_format_arg(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Ogg => "vorbis",
        other => other.extension(),
    }
}

/// A direct URL when the song carries one, otherwise a provider search.
fn source_for(song: &Song, audio_provider: &str) -> String {
    if let Some(url) = &song.download_url {
        return url.clone();
    }

    let prefix = match audio_provider {
        "soundcloud" => "scsearch1",
        _ => "ytsearch1",
    };
    format!("{}:{}", prefix, song.display_name())
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
