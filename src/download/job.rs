//! Single download job execution.
//!
//! A job runs detached from the submitter and reports exclusively through
//! the [`ProgressTracker`]: byte-level fetch events become a clamped,
//! monotonic percentage, and every fault lands the job in a terminal error
//! status instead of propagating anywhere.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{AppError, AppResult};
use crate::download::catalog::DownloadKind;
use crate::download::progress::{JobState, ProgressTracker};
use crate::download::source::{FetchRequest, MediaResolver};

/// Resolves the kind a download actually executes as.
///
/// A `"{video}+{audio}"` selector always produces a muxed video file, so a
/// stale audio hint from the client must not trigger an MP3 transcode of it.
pub fn resolve_kind(selector: &str, hint: DownloadKind) -> DownloadKind {
    if hint.transcodes_to_mp3() && selector.contains('+') {
        log::warn!("Selector {selector} pairs video and audio, overriding {hint} hint");
        DownloadKind::Enhanced
    } else {
        hint
    }
}

/// Runs one fetch, converting its byte events into percent callbacks.
///
/// Cancellation aborts the underlying fetch task and surfaces as an error.
pub(crate) async fn run_fetch<F>(
    resolver: Arc<dyn MediaResolver>,
    request: FetchRequest,
    cancel: &CancellationToken,
    mut on_percent: F,
) -> AppResult<()>
where
    F: FnMut(f64),
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut fetch = {
        let resolver = Arc::clone(&resolver);
        let request = request.clone();
        tokio::spawn(async move { resolver.fetch(&request, tx).await })
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                fetch.abort();
                return Err(AppError::Fetch("Download cancelled".to_string()));
            }
            event = rx.recv() => match event {
                Some(event) => {
                    if let Some(percent) = event.percent() {
                        on_percent(percent.min(100.0));
                    }
                }
                // Sender dropped, the fetch is finishing
                None => break,
            }
        }
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            fetch.abort();
            Err(AppError::Fetch("Download cancelled".to_string()))
        }
        joined = &mut fetch => match joined {
            Ok(result) => result,
            Err(e) => Err(AppError::Fetch(format!("Download task failed: {e}"))),
        }
    }
}

/// Directory failures are job-fatal, never process-fatal.
pub(crate) async fn ensure_dest_dir(dest_dir: &str) -> AppResult<()> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| AppError::Directory(format!("Failed to create download directory: {e}")))
}

/// Body of a detached single-download job.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_download_job(
    tracker: Arc<ProgressTracker>,
    resolver: Arc<dyn MediaResolver>,
    job_id: String,
    url: String,
    selector: String,
    kind: DownloadKind,
    dest_dir: String,
    cancel: CancellationToken,
) {
    log::info!("Starting download job {job_id} for {url}");
    tracker.update(&job_id, |s| s.state = JobState::Downloading);

    let result = async {
        ensure_dest_dir(&dest_dir).await?;
        let kind = resolve_kind(&selector, kind);
        let request = FetchRequest {
            url,
            selector,
            dest_dir,
            transcode_mp3: kind.transcodes_to_mp3(),
        };
        run_fetch(resolver, request, &cancel, |percent| {
            tracker.set_progress(&job_id, percent, format!("Downloading... {percent:.1}%"));
        })
        .await
    }
    .await;

    match result {
        Ok(()) => {
            log::info!("Download job {job_id} completed");
            tracker.update(&job_id, |s| {
                s.state = JobState::Completed;
                s.progress = 100.0;
                s.message = "Download completed successfully!".to_string();
            });
        }
        Err(e) => {
            log::error!("Download job {job_id} failed ({}): {e}", e.subcategory());
            tracker.update(&job_id, |s| {
                s.state = JobState::Error;
                s.message = format!("Error: {e}");
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use url::Url;

    use crate::download::source::{FetchEvent, MediaInfo};

    struct ScriptedResolver {
        events: Vec<FetchEvent>,
        result: Result<(), String>,
    }

    #[async_trait]
    impl MediaResolver for ScriptedResolver {
        async fn resolve(&self, _url: &Url) -> AppResult<MediaInfo> {
            Ok(MediaInfo::default())
        }

        async fn fetch(
            &self,
            _request: &FetchRequest,
            progress_tx: mpsc::UnboundedSender<FetchEvent>,
        ) -> AppResult<()> {
            for event in &self.events {
                let _ = progress_tx.send(*event);
            }
            self.result.clone().map_err(AppError::Fetch)
        }
    }

    fn event(downloaded: u64, total: u64) -> FetchEvent {
        FetchEvent {
            downloaded_bytes: downloaded,
            total_bytes: Some(total),
            total_bytes_estimate: None,
        }
    }

    fn request() -> FetchRequest {
        FetchRequest {
            url: "https://example.com/v".to_string(),
            selector: "22".to_string(),
            dest_dir: "/tmp".to_string(),
            transcode_mp3: false,
        }
    }

    // ==================== Kind Resolution Tests ====================

    #[test]
    fn test_paired_selector_overrides_audio_hint() {
        assert_eq!(
            resolve_kind("137+140", DownloadKind::AudioOnly),
            DownloadKind::Enhanced
        );
    }

    #[test]
    fn test_plain_selector_keeps_hint() {
        assert_eq!(resolve_kind("140", DownloadKind::AudioOnly), DownloadKind::AudioOnly);
        assert_eq!(resolve_kind("22", DownloadKind::Combined), DownloadKind::Combined);
        assert_eq!(
            resolve_kind("137+140", DownloadKind::Enhanced),
            DownloadKind::Enhanced
        );
    }

    // ==================== Fetch Loop Tests ====================

    #[tokio::test]
    async fn test_run_fetch_reports_percentages() {
        let resolver = Arc::new(ScriptedResolver {
            events: vec![event(25, 100), event(100, 100)],
            result: Ok(()),
        });
        let mut seen = Vec::new();
        let cancel = CancellationToken::new();
        run_fetch(resolver, request(), &cancel, |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(seen, vec![25.0, 100.0]);
    }

    #[tokio::test]
    async fn test_run_fetch_clamps_overshoot() {
        let resolver = Arc::new(ScriptedResolver {
            events: vec![event(150, 100)],
            result: Ok(()),
        });
        let mut seen = Vec::new();
        let cancel = CancellationToken::new();
        run_fetch(resolver, request(), &cancel, |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(seen, vec![100.0]);
    }

    #[tokio::test]
    async fn test_run_fetch_propagates_backend_error() {
        let resolver = Arc::new(ScriptedResolver {
            events: vec![],
            result: Err("network unreachable".to_string()),
        });
        let cancel = CancellationToken::new();
        let err = run_fetch(resolver, request(), &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("network unreachable"));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_fetch() {
        let resolver = Arc::new(ScriptedResolver {
            events: vec![],
            result: Ok(()),
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_fetch(resolver, request(), &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    // ==================== Job Tests ====================

    #[tokio::test]
    async fn test_job_failure_is_terminal_error_status() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.create("job1", JobState::Starting, "Starting download...");
        let resolver = Arc::new(ScriptedResolver {
            events: vec![event(10, 100)],
            result: Err("403 Forbidden".to_string()),
        });
        run_download_job(
            Arc::clone(&tracker),
            resolver,
            "job1".to_string(),
            "https://example.com/v".to_string(),
            "22".to_string(),
            DownloadKind::Combined,
            std::env::temp_dir().display().to_string(),
            CancellationToken::new(),
        )
        .await;
        let status = tracker.get("job1").unwrap();
        assert_eq!(status.state, JobState::Error);
        assert!(status.message.contains("403 Forbidden"));
    }

    #[tokio::test]
    async fn test_job_success_completes_at_100() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.create("job1", JobState::Starting, "Starting download...");
        let resolver = Arc::new(ScriptedResolver {
            events: vec![event(50, 100)],
            result: Ok(()),
        });
        run_download_job(
            Arc::clone(&tracker),
            resolver,
            "job1".to_string(),
            "https://example.com/v".to_string(),
            "22".to_string(),
            DownloadKind::Combined,
            std::env::temp_dir().display().to_string(),
            CancellationToken::new(),
        )
        .await;
        let status = tracker.get("job1").unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.progress, 100.0);
        assert_eq!(status.message, "Download completed successfully!");
    }
}
