use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Cached yt-dlp binary path.
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp".
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Default download folder path.
/// Read from DOWNLOAD_FOLDER environment variable.
/// Supports tilde (~) expansion for home directory.
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/downloads".to_string()));

/// Log file path.
/// Read from LOG_FILE_PATH environment variable.
/// Default: tubesync.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tubesync.log".to_string()));

/// Expands a tilde-prefixed path to an absolute one.
pub fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}

/// Batch (playlist) download configuration
pub mod batch {
    use super::{env, Duration, Lazy};

    /// Hard cap on the number of items a single batch may contain.
    /// Callers can request fewer, never more.
    pub const MAX_ITEMS: usize = 10;

    /// Default pause between batch items (milliseconds). A courtesy delay
    /// so sequential fetches don't hammer the remote service.
    pub const INTER_ITEM_DELAY_MS: u64 = 1000;

    /// Pause between batch items, overridable via TUBESYNC_BATCH_DELAY_MS.
    pub static DELAY: Lazy<Duration> = Lazy::new(|| {
        let ms = env::var("TUBESYNC_BATCH_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(INTER_ITEM_DELAY_MS);
        Duration::from_millis(ms)
    });

    /// Inter-item delay duration
    pub fn inter_item_delay() -> Duration {
        *DELAY
    }
}

/// Progress-store configuration
pub mod progress {
    use super::{env, Duration, Lazy};

    /// How long a terminal (completed/error) status entry is kept before it
    /// becomes eligible for eviction (seconds). Running jobs are never evicted.
    pub const TERMINAL_TTL_SECS: u64 = 1800; // 30 minutes

    /// Terminal-entry TTL, overridable via TUBESYNC_STATUS_TTL_SECS.
    pub static TTL: Lazy<Duration> = Lazy::new(|| {
        let secs = env::var("TUBESYNC_STATUS_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(TERMINAL_TTL_SECS);
        Duration::from_secs(secs)
    });

    /// Terminal status time-to-live
    pub fn terminal_ttl() -> Duration {
        *TTL
    }
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for yt-dlp metadata extraction (in seconds).
    /// Fetches themselves are not bounded; large files legitimately take long.
    pub const YTDLP_TIMEOUT_SECS: u64 = 240;

    /// Target quality for mp3 extraction, passed to the resolver's
    /// postprocessing step. Fixed, not configurable per job.
    pub const AUDIO_MP3_QUALITY: &str = "192";

    /// yt-dlp metadata timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }
}
