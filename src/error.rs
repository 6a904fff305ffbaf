//! Error types for the fridge host.
//!
//! Every fallible operation in the library returns [`FridgeError`]. The
//! variants follow the failure classes the host cares about: a missing
//! file is recoverable, corrupt data is surfaced, a sensor fault only
//! skips a tick, and the last two are rejected at the web boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fridge host operations.
pub type Result<T> = std::result::Result<T, FridgeError>;

#[derive(Debug, Error)]
pub enum FridgeError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("corrupt data in {}: {reason}", .path.display())]
    CorruptData { path: PathBuf, reason: String },

    #[error("sensor fault: {0}")]
    SensorFault(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FridgeError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map an io error on `path`, turning `ErrorKind::NotFound` into
    /// [`FridgeError::NotFound`].
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = FridgeError::from_io(
            "/nope.json",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: /nope.json");
    }

    #[test]
    fn other_io_errors_keep_their_source() {
        let err = FridgeError::from_io(
            "/etc/fridge.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, FridgeError::Io { .. }));
        assert!(!err.is_not_found());
    }
}
