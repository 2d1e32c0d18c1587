//! Shared test fixtures: a scripted resolver backend and polling helpers.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use tubesync::core::{AppError, AppResult};
use tubesync::download::source::{FetchEvent, FetchRequest, MediaInfo, MediaResolver};
use tubesync::download::{DownloadManager, JobStatus};

/// Resolver backend with scripted responses.
///
/// Every fetch replays the configured event sequence and succeeds unless
/// its URL was marked as failing. All fetch requests are recorded so tests
/// can assert on selectors and transcode flags.
#[derive(Default)]
pub struct MockResolver {
    media: HashMap<String, MediaInfo>,
    failing: HashSet<String>,
    events: Vec<FetchEvent>,
    hang: bool,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockResolver {
    pub fn new() -> Self {
        MockResolver::default()
    }

    pub fn with_media(mut self, url: &str, info: MediaInfo) -> Self {
        self.media.insert(url.to_string(), info);
        self
    }

    /// Fetches of this URL fail with a backend error.
    pub fn failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn with_events(mut self, events: Vec<FetchEvent>) -> Self {
        self.events = events;
        self
    }

    /// Fetches emit their events and then never return, for cancellation
    /// tests.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl MediaResolver for MockResolver {
    async fn resolve(&self, url: &Url) -> AppResult<MediaInfo> {
        self.media
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| AppError::Resolve(format!("no scripted media for {url}")))
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<FetchEvent>,
    ) -> AppResult<()> {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .push(request.clone());
        for event in &self.events {
            let _ = progress_tx.send(*event);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&request.url) {
            Err(AppError::Fetch("simulated backend failure".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn progress_event(downloaded: u64, total: u64) -> FetchEvent {
    FetchEvent {
        downloaded_bytes: downloaded,
        total_bytes: Some(total),
        total_bytes_estimate: None,
    }
}

pub fn temp_dest() -> Option<String> {
    Some(std::env::temp_dir().display().to_string())
}

/// Polls until the job reaches a terminal state. Relies on paused-time
/// runtimes auto-advancing through sleeps.
pub async fn wait_terminal(manager: &DownloadManager, job_id: &str) -> JobStatus {
    for _ in 0..10_000 {
        let status = manager.poll(job_id).expect("job should stay tracked");
        if status.state.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}
