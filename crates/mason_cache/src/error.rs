//! Error types for cache operations.

use std::path::PathBuf;

use mason_common::MasonError;

/// Errors that can occur while reading or writing the artifact cache.
///
/// Reads are fail-safe: an unreadable entry is a cache miss, not an error.
/// This enum covers the writes and the manifest bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A unit's class file lies outside the scope's classes directory.
    #[error("{path} is not under the classes directory")]
    OutsideClasses {
        /// The offending class file.
        path: PathBuf,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<CacheError> for MasonError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io { path, source } => MasonError::io(path, source),
            other => MasonError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mason_common::ErrorKind;

    #[test]
    fn io_error_display() {
        let err = CacheError::io(
            "/tmp/cache/manifest.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("manifest.json"));
    }

    #[test]
    fn io_error_keeps_its_kind() {
        let err: MasonError = CacheError::io(
            "/tmp/cache/View.class",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn other_errors_are_internal() {
        let err: MasonError = CacheError::OutsideClasses {
            path: PathBuf::from("/elsewhere/View.class"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("/elsewhere/View.class"));
    }
}
