//! Download orchestration facade.
//!
//! The [`DownloadManager`] owns the resolver backend and the progress
//! tracker, submits detached jobs, and answers status polls. Two managers
//! never share state; each owns its full job universe.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::core::{config, AppError, AppResult};
use crate::download::batch::run_batch_job;
use crate::download::catalog::{build_catalog, CatalogEntry, DownloadKind};
use crate::download::job::run_download_job;
use crate::download::progress::{BatchProgress, JobState, JobStatus, ProgressTracker};
use crate::download::reconcile::reconcile;
use crate::download::source::{MediaInfo, MediaResolver, PlaylistEntry};

/// Playlist entries kept for presentation when resolving a playlist URL.
const PLAYLIST_PREVIEW_LIMIT: usize = 50;

/// Handle returned on submission. Dropping it does not affect the job;
/// cancellation is explicit.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: String,
    cancel: CancellationToken,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Requests cancellation. The job lands in a terminal error status.
    pub fn cancel(&self) {
        log::info!("Cancellation requested for job {}", self.id);
        self.cancel.cancel();
    }
}

/// Orchestrates media resolution and download jobs.
pub struct DownloadManager {
    resolver: Arc<dyn MediaResolver>,
    tracker: Arc<ProgressTracker>,
}

impl DownloadManager {
    pub fn new(resolver: Arc<dyn MediaResolver>) -> Self {
        DownloadManager {
            resolver,
            tracker: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    /// Resolves metadata for a URL. Playlist entry lists are truncated for
    /// presentation; batches re-submit the entries they actually want.
    pub async fn resolve(&self, url: &str) -> AppResult<MediaInfo> {
        if url.trim().is_empty() {
            return Err(AppError::Validation("URL and format ID are required".to_string()));
        }
        let parsed = Url::parse(url)?;
        let mut info = self.resolver.resolve(&parsed).await?;
        if info.formats.is_empty() && info.entries.is_empty() {
            return Err(AppError::EmptyMedia(
                "Could not fetch video information".to_string(),
            ));
        }
        info.entries.truncate(PLAYLIST_PREVIEW_LIMIT);
        Ok(info)
    }

    /// Builds the downloadable format catalog for resolved media.
    pub fn catalog(&self, info: &MediaInfo) -> Vec<CatalogEntry> {
        build_catalog(&reconcile(info.formats.clone()))
    }

    /// Submits a single download. Returns immediately; the job runs
    /// detached and reports through the tracker.
    pub fn submit_download(
        &self,
        url: &str,
        selector: &str,
        kind: DownloadKind,
        dest_dir: Option<String>,
    ) -> AppResult<JobHandle> {
        if url.trim().is_empty() || selector.trim().is_empty() {
            return Err(AppError::Validation("URL and format ID are required".to_string()));
        }
        self.sweep();

        let job_id = format!("download_{}", Uuid::new_v4());
        self.tracker
            .create(&job_id, JobState::Starting, "Starting download...");

        let cancel = CancellationToken::new();
        tokio::spawn(run_download_job(
            Arc::clone(&self.tracker),
            Arc::clone(&self.resolver),
            job_id.clone(),
            url.to_string(),
            selector.to_string(),
            kind,
            dest_dir.unwrap_or_else(default_dest),
            cancel.clone(),
        ));
        Ok(JobHandle { id: job_id, cancel })
    }

    /// Submits a sequential batch download over playlist entries.
    ///
    /// `max_items` caps how many entries are processed; `None` uses the
    /// configured default.
    pub fn submit_batch(
        &self,
        mut entries: Vec<PlaylistEntry>,
        selector: &str,
        kind: DownloadKind,
        dest_dir: Option<String>,
        max_items: Option<usize>,
    ) -> AppResult<JobHandle> {
        if selector.trim().is_empty() {
            return Err(AppError::Validation("URL and format ID are required".to_string()));
        }
        if entries.is_empty() {
            return Err(AppError::EmptyMedia("Playlist is empty".to_string()));
        }
        entries.truncate(max_items.unwrap_or(config::batch::MAX_ITEMS));
        self.sweep();

        let total = entries.len();
        let job_id = format!("playlist_{}", Uuid::new_v4());
        self.tracker.create(
            &job_id,
            JobState::Starting,
            format!("Starting playlist download ({total} videos)..."),
        );
        self.tracker.update(&job_id, |s| {
            s.batch = Some(BatchProgress {
                total_items: total,
                current_item: 0,
                completed: 0,
                failed: 0,
            });
        });

        let cancel = CancellationToken::new();
        tokio::spawn(run_batch_job(
            Arc::clone(&self.tracker),
            Arc::clone(&self.resolver),
            job_id.clone(),
            entries,
            selector.to_string(),
            kind,
            dest_dir.unwrap_or_else(default_dest),
            cancel.clone(),
        ));
        Ok(JobHandle { id: job_id, cancel })
    }

    /// Returns the current status of a job by id.
    pub fn poll(&self, job_id: &str) -> AppResult<JobStatus> {
        self.tracker.get(job_id)
    }

    /// Opportunistic eviction of expired terminal entries, run on every
    /// submission instead of from a background task.
    fn sweep(&self) {
        self.tracker.evict_terminal(config::progress::terminal_ttl());
    }
}

fn default_dest() -> String {
    config::expand_path(&config::DOWNLOAD_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::download::source::{FetchEvent, FetchRequest};

    struct EmptyResolver;

    #[async_trait]
    impl MediaResolver for EmptyResolver {
        async fn resolve(&self, _url: &Url) -> AppResult<MediaInfo> {
            Ok(MediaInfo::default())
        }

        async fn fetch(
            &self,
            _request: &FetchRequest,
            _progress_tx: mpsc::UnboundedSender<FetchEvent>,
        ) -> AppResult<()> {
            Ok(())
        }
    }

    fn manager() -> DownloadManager {
        DownloadManager::new(Arc::new(EmptyResolver))
    }

    // ==================== Validation Tests ====================

    #[tokio::test]
    async fn test_resolve_rejects_empty_url() {
        let err = manager().resolve("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_resolve_rejects_malformed_url() {
        let err = manager().resolve("not a url").await.unwrap_err();
        assert!(matches!(err, AppError::Url(_)));
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_media() {
        let err = manager().resolve("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyMedia(_)));
    }

    #[tokio::test]
    async fn test_submit_download_requires_url_and_selector() {
        let m = manager();
        assert!(matches!(
            m.submit_download("", "22", DownloadKind::Combined, None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            m.submit_download("https://example.com/v", " ", DownloadKind::Combined, None),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_batch_rejects_empty_playlist() {
        let err = manager()
            .submit_batch(vec![], "22", DownloadKind::Combined, None, None)
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyMedia(_)));
    }

    // ==================== Submission Tests ====================

    #[tokio::test]
    async fn test_download_ids_are_prefixed_and_unique() {
        let m = manager();
        let dest = Some(std::env::temp_dir().display().to_string());
        let a = m
            .submit_download("https://example.com/v", "22", DownloadKind::Combined, dest.clone())
            .unwrap();
        let b = m
            .submit_download("https://example.com/v", "22", DownloadKind::Combined, dest)
            .unwrap();
        assert!(a.id().starts_with("download_"));
        assert!(b.id().starts_with("download_"));
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_batch_entry_initialized_with_counters() {
        let m = manager();
        let entries = vec![
            PlaylistEntry {
                url: Some("https://example.com/1".to_string()),
                ..Default::default()
            };
            3
        ];
        let handle = m
            .submit_batch(
                entries,
                "22",
                DownloadKind::Combined,
                Some(std::env::temp_dir().display().to_string()),
                None,
            )
            .unwrap();
        assert!(handle.id().starts_with("playlist_"));
        let status = m.poll(handle.id()).unwrap();
        assert_eq!(status.batch.unwrap().total_items, 3);
        assert_eq!(status.message, "Starting playlist download (3 videos)...");
    }

    #[tokio::test]
    async fn test_poll_unknown_id_is_not_found() {
        let err = manager().poll("download_missing").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
