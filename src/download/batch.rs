//! Sequential batch (playlist) download execution.
//!
//! Items download strictly one at a time. Each item gets its own tracked
//! sub-entry under `{batchId}_video_{index}` while the batch entry carries
//! aggregate progress and counters. Item failures are absorbed into the
//! counters; only infrastructure faults end the batch in an error status.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::download::catalog::DownloadKind;
use crate::download::job::{ensure_dest_dir, resolve_kind, run_fetch};
use crate::download::progress::{JobState, ProgressTracker};
use crate::download::source::{FetchRequest, MediaResolver, PlaylistEntry};

/// Titles are truncated to this many characters in status messages.
const TITLE_LIMIT: usize = 50;

fn short_title(entry: &PlaylistEntry) -> String {
    entry
        .title
        .as_deref()
        .unwrap_or("Unknown")
        .chars()
        .take(TITLE_LIMIT)
        .collect()
}

/// Body of a detached batch download job.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_batch_job(
    tracker: Arc<ProgressTracker>,
    resolver: Arc<dyn MediaResolver>,
    batch_id: String,
    entries: Vec<PlaylistEntry>,
    selector: String,
    kind: DownloadKind,
    dest_dir: String,
    cancel: CancellationToken,
) {
    let total = entries.len();
    log::info!("Starting batch job {batch_id} with {total} items");
    tracker.update(&batch_id, |s| s.state = JobState::Downloading);

    if let Err(e) = ensure_dest_dir(&dest_dir).await {
        log::error!("Batch job {batch_id} failed creating {dest_dir}: {e}");
        tracker.update(&batch_id, |s| {
            s.state = JobState::Error;
            s.message = format!("Playlist download error: {e}");
        });
        return;
    }

    let kind = resolve_kind(&selector, kind);
    let mut completed = 0usize;
    let mut failed = 0usize;

    for (i, entry) in entries.iter().enumerate() {
        let title = short_title(entry);
        tracker.update(&batch_id, |s| {
            if let Some(batch) = s.batch.as_mut() {
                batch.current_item = i + 1;
            }
            s.message = format!("Downloading video {}/{total}: {title}...", i + 1);
        });

        let url = match entry.fetch_url() {
            Some(url) => url.to_string(),
            None => {
                log::warn!("Batch job {batch_id}: no URL for item {}", i + 1);
                failed += 1;
                update_counters(&tracker, &batch_id, completed, failed);
                continue;
            }
        };

        let item_id = format!("{batch_id}_video_{i}");
        tracker.create(&item_id, JobState::Downloading, format!("Downloading: {title}"));

        let request = FetchRequest {
            url,
            selector: selector.clone(),
            dest_dir: dest_dir.clone(),
            transcode_mp3: kind.transcodes_to_mp3(),
        };

        let result = run_fetch(Arc::clone(&resolver), request, &cancel, |percent| {
            tracker.update(&item_id, |s| s.progress = s.progress.max(percent));
            let overall = (((i * 100) as f64) + percent) / total as f64;
            tracker.update(&batch_id, |s| s.progress = s.progress.max(overall.min(100.0)));
        })
        .await;

        if cancel.is_cancelled() {
            log::info!("Batch job {batch_id} cancelled at item {}", i + 1);
            tracker.update(&item_id, |s| {
                s.state = JobState::Error;
                s.message = "Download cancelled".to_string();
            });
            tracker.update(&batch_id, |s| {
                s.state = JobState::Error;
                s.message = "Download cancelled".to_string();
            });
            return;
        }

        match result {
            Ok(()) => {
                completed += 1;
                log::info!("Batch job {batch_id}: item {} completed", i + 1);
                tracker.update(&item_id, |s| {
                    s.state = JobState::Completed;
                    s.progress = 100.0;
                    s.message = "Download completed successfully!".to_string();
                });
            }
            Err(e) => {
                failed += 1;
                log::error!("Batch job {batch_id}: item {} failed ({}): {e}", i + 1, e.subcategory());
                tracker.update(&item_id, |s| {
                    s.state = JobState::Error;
                    s.message = e.to_string();
                });
            }
        }
        update_counters(&tracker, &batch_id, completed, failed);

        // Brief pause between items to avoid hammering the extractor
        tokio::time::sleep(config::batch::inter_item_delay()).await;
    }

    tracker.update(&batch_id, |s| {
        s.progress = 100.0;
        if failed == 0 {
            s.state = JobState::Completed;
            s.message =
                format!("Playlist download completed! {completed} videos downloaded successfully.");
        } else {
            s.state = JobState::CompletedWithErrors;
            s.message = format!(
                "Playlist download completed with {failed} errors. {completed} videos downloaded successfully."
            );
        }
    });
    log::info!("Batch job {batch_id} finished: {completed} completed, {failed} failed");
}

fn update_counters(tracker: &ProgressTracker, batch_id: &str, completed: usize, failed: usize) {
    tracker.update(batch_id, |s| {
        if let Some(batch) = s.batch.as_mut() {
            batch.completed = completed;
            batch.failed = failed;
        }
    });
}
