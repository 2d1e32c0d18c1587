use thiserror::Error;

/// Centralized error types for the library.
///
/// Every failure the engine can report is converted to this enum for
/// consistent error handling. Uses `thiserror` for automatic conversions
/// and display formatting.
///
/// Job workers never return these to the submitter directly; a worker
/// fault is recorded as a terminal `error` status on the job's progress
/// entry instead. `AppError` values surface only from the synchronous
/// API calls (`resolve`, `submit_download`, `poll`, ...).
#[derive(Error, Debug)]
pub enum AppError {
    /// The resolver returned nothing or invalid data for a URL
    #[error("Resolve error: {0}")]
    Resolve(String),

    /// The URL resolved, but yielded no usable formats or an empty playlist
    #[error("No usable media: {0}")]
    EmptyMedia(String),

    /// Destination directory cannot be created or written
    #[error("Directory error: {0}")]
    Directory(String),

    /// The resolver reported a failed fetch, or the fetch itself raised
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A status poll referenced an unknown job identifier
    #[error("Unknown job: {0}")]
    NotFound(String),

    /// Bad input to a submission call (missing URL, empty selector, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Returns a stable subcategory label, attached to worker error log
    /// lines so failures can be grouped without parsing message text.
    pub fn subcategory(&self) -> &'static str {
        match self {
            AppError::Resolve(_) => "resolve",
            AppError::EmptyMedia(_) => "empty_media",
            AppError::Directory(_) => "directory",
            AppError::Fetch(_) => "fetch",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Io(_) => "io",
            AppError::Url(_) => "url",
        }
    }
}
