//! Media resolver abstraction layer.
//!
//! Provides the `MediaResolver` trait separating the orchestrator from the
//! actual extraction backend. The built-in backend shells out to yt-dlp;
//! tests substitute a scripted mock.

pub mod ytdlp;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use crate::core::AppResult;
use crate::download::classify::RawFormat;

pub use ytdlp::YtDlpResolver;

/// One entry of a resolved playlist.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl PlaylistEntry {
    /// The URL a batch item should be fetched from. Prefers the canonical
    /// page URL over the extractor-internal one.
    pub fn fetch_url(&self) -> Option<&str> {
        self.webpage_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }
}

/// Metadata resolved for a URL, covering both single items and playlists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
}

impl MediaInfo {
    pub fn is_playlist(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Progress event emitted while a fetch runs. Raw byte counts; the job
/// layer turns these into percentages.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchEvent {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
}

impl FetchEvent {
    /// Percent complete, preferring the exact total over the estimate.
    /// Returns `None` when no total is known.
    pub fn percent(&self) -> Option<f64> {
        self.total_bytes
            .or(self.total_bytes_estimate)
            .filter(|&t| t > 0)
            .map(|t| self.downloaded_bytes as f64 / t as f64 * 100.0)
    }
}

/// Parameters for one fetch operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    /// Format selector passed to the backend unmodified
    pub selector: String,
    /// Directory the downloaded file lands in
    pub dest_dir: String,
    /// Transcode the result to MP3 after download
    pub transcode_mp3: bool,
}

/// Trait for media extraction backends.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves metadata and the raw format list for a URL without
    /// downloading anything.
    async fn resolve(&self, url: &Url) -> AppResult<MediaInfo>;

    /// Downloads the media described by `request`, streaming progress
    /// events into `progress_tx`. A closed receiver must not fail the
    /// fetch; events are best-effort.
    async fn fetch(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<FetchEvent>,
    ) -> AppResult<()>;
}
