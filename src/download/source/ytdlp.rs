//! yt-dlp extraction backend.
//!
//! Shells out to the yt-dlp binary for both metadata resolution
//! (`--dump-json`) and the actual download. Progress is read from stdout
//! using a structured `--progress-template` so parsing never depends on
//! yt-dlp's human-readable progress bar.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use url::Url;

use crate::core::{config, AppError, AppResult};
use crate::download::source::{FetchEvent, FetchRequest, MediaInfo, MediaResolver};

/// Marker prefix of structured progress lines on stdout.
const PROGRESS_PREFIX: &str = "PROGRESS|";

/// Template producing `PROGRESS|<downloaded>|<total>|<estimate>` lines.
const PROGRESS_TEMPLATE: &str =
    "download:PROGRESS|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s\n";

/// Resolver backed by the yt-dlp command line tool.
#[derive(Debug, Clone, Default)]
pub struct YtDlpResolver;

impl YtDlpResolver {
    pub fn new() -> Self {
        YtDlpResolver
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, url: &Url) -> AppResult<MediaInfo> {
        log::info!("Resolving media info for {url}");
        let output = tokio::time::timeout(
            config::download::ytdlp_timeout(),
            Command::new(&*config::YTDL_BIN)
                .args(["--dump-single-json", "--no-warnings", "--flat-playlist"])
                .arg(url.as_str())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| {
            AppError::Fetch(format!(
                "yt-dlp timed out after {}s resolving {url}",
                config::download::ytdlp_timeout().as_secs()
            ))
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Resolve(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::Resolve(format!("Failed to parse yt-dlp output: {e}")))
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<FetchEvent>,
    ) -> AppResult<()> {
        log::info!(
            "Fetching {} with selector {} into {}",
            request.url,
            request.selector,
            request.dest_dir
        );

        let mut cmd = Command::new(&*config::YTDL_BIN);
        cmd.args(["-f", &request.selector])
            .args(["-P", &request.dest_dir])
            .args(["-o", "%(title)s.%(ext)s"])
            .args(["--newline", "--no-warnings", "--progress-template", PROGRESS_TEMPLATE]);
        if request.transcode_mp3 {
            cmd.args(["-x", "--audio-format", "mp3"])
                .args(["--audio-quality", config::download::AUDIO_MP3_QUALITY]);
        }
        cmd.arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            AppError::Fetch(format!("Failed to start {}: {e}", &*config::YTDL_BIN))
        })?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(event) = parse_progress_line(&line) {
                    // Receiver may be gone, progress is best-effort
                    let _ = progress_tx.send(event);
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(AppError::Fetch(format!("yt-dlp exited with {status}")))
        }
    }
}

/// Parses one structured progress line. Returns `None` for every other
/// line yt-dlp prints.
fn parse_progress_line(line: &str) -> Option<FetchEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.splitn(3, '|');
    let downloaded = parse_bytes(fields.next()?)?;
    let total = fields.next().and_then(parse_bytes);
    let estimate = fields.next().and_then(parse_bytes);
    Some(FetchEvent {
        downloaded_bytes: downloaded,
        total_bytes: total,
        total_bytes_estimate: estimate,
    })
}

/// yt-dlp renders unknown numeric fields as "NA" and byte counts may come
/// through as floats.
fn parse_bytes(field: &str) -> Option<u64> {
    let field = field.trim();
    if field.is_empty() || field == "NA" {
        return None;
    }
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Progress Parsing Tests ====================

    #[test]
    fn test_parses_full_progress_line() {
        let event = parse_progress_line("PROGRESS|1024|4096|NA").unwrap();
        assert_eq!(event.downloaded_bytes, 1024);
        assert_eq!(event.total_bytes, Some(4096));
        assert_eq!(event.total_bytes_estimate, None);
    }

    #[test]
    fn test_parses_estimate_only_line() {
        let event = parse_progress_line("PROGRESS|512|NA|2048.7").unwrap();
        assert_eq!(event.total_bytes, None);
        assert_eq!(event.total_bytes_estimate, Some(2048));
    }

    #[test]
    fn test_ignores_non_progress_lines() {
        assert!(parse_progress_line("[download] Destination: video.mp4").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn test_ignores_unparseable_downloaded_field() {
        assert!(parse_progress_line("PROGRESS|NA|4096|NA").is_none());
    }

    #[test]
    fn test_handles_float_byte_counts() {
        let event = parse_progress_line("PROGRESS|1536.5|NA|NA").unwrap();
        assert_eq!(event.downloaded_bytes, 1536);
    }
}
