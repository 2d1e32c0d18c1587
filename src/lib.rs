//! TubeSync - media download engine built on yt-dlp
//!
//! This library provides the core functionality for TubeSync: resolving
//! media URLs, reconciling raw extractor formats into downloadable
//! options, and orchestrating tracked download jobs.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, and logging
//! - `download`: Format reconciliation and download job orchestration

pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use crate::core::{config, init_logger, AppError, AppResult};
pub use crate::download::{
    build_catalog, reconcile, CatalogEntry, DownloadKind, DownloadManager, JobHandle, JobState,
    JobStatus, MediaInfo, MediaResolver, ProgressTracker, RawFormat, YtDlpResolver,
};
