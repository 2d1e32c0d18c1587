//! Media download pipeline: format reconciliation, job orchestration, and
//! progress tracking.

pub mod batch;
pub mod catalog;
pub mod classify;
pub mod job;
pub mod manager;
pub mod progress;
pub mod reconcile;
pub mod source;

pub use catalog::{build_catalog, CatalogEntry, DownloadKind};
pub use classify::RawFormat;
pub use manager::{DownloadManager, JobHandle};
pub use progress::{BatchProgress, JobState, JobStatus, ProgressTracker};
pub use reconcile::{reconcile, FormatKind, Reconciled, ReconciledFormat};
pub use source::{FetchEvent, FetchRequest, MediaInfo, MediaResolver, PlaylistEntry, YtDlpResolver};
