//! Error types for the e-paper studio.

/// Top-level error type for generation, storage, and display operations.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Caller supplied input that is rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(String),

    /// A generation or display run is already in progress.
    #[error("{0}")]
    Conflict(String),

    /// A requested image does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A requested path resolves outside the managed image directory.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Remote image generation failed.
    #[error("generator error: {0}")]
    Generator(String),

    /// Image or history persistence failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// E-paper device error (init, write, sleep).
    #[error("display error: {0}")]
    Display(String),

    /// Image adaptation rejected its input.
    #[error("adapt error: {0}")]
    Adapt(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error (bad time of day, unknown timezone).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for StudioError {
    fn from(e: image::ImageError) -> Self {
        Self::Storage(format!("image codec: {e}"))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, StudioError>;
