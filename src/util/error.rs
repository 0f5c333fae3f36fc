//! Error types for scene synchronization.

use thiserror::Error;

/// Main error type for scene-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Two different buffers produced the same content key
    #[error("Cache key collision: {key} maps to different content")]
    KeyCollision { key: String },

    /// Array key is not (or no longer) present in the cache
    #[error("Array not found in cache: {0}")]
    ArrayNotFound(String),

    /// Buffer length does not match dtype and shape
    #[error("Shape mismatch: expected {expected} bytes, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Volume data is not usable for subsampling
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    /// Walk was cancelled at an array boundary
    #[error("Scene walk interrupted")]
    Interrupted,

    /// Session was already torn down
    #[error("Sync session is closed")]
    SessionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid volume error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidVolume(msg.into())
    }

    /// True for failures the caller may retry (file system, archive container).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Archive(_))
    }
}

/// Result type alias for scene-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::KeyCollision { key: "abc".into() };
        assert!(e.to_string().contains("abc"));

        let e = Error::ShapeMismatch { expected: 12, actual: 8 };
        assert!(e.to_string().contains("12"));
        assert!(e.to_string().contains("8"));
    }

    #[test]
    fn test_error_from_io_is_retryable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_retryable());
        assert!(!Error::Interrupted.is_retryable());
        assert!(!Error::KeyCollision { key: String::new() }.is_retryable());
    }
}
