//! Classified error taxonomy reported to the host build tool.

use std::fmt;
use std::path::PathBuf;

/// The standard result type for orchestration operations.
pub type MasonResult<T> = Result<T, MasonError>;

/// A markup input error with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDiagnostic {
    /// The markup file that failed to compile.
    pub source_file: PathBuf,
    /// One-based line number of the error.
    pub line: u32,
    /// The compiler's description of the problem.
    pub message: String,
}

impl MarkupDiagnostic {
    /// Creates a diagnostic for `source_file` at the given one-based line.
    pub fn new(source_file: impl Into<PathBuf>, line: u32, message: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for MarkupDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.source_file.display(),
            self.line,
            self.message
        )
    }
}

/// Errors that abort a build step.
///
/// Every variant is fatal to the step that raised it. The build layer rolls
/// back the step's outputs before handing the error to the host, so the host
/// never sees a half-finished step as up to date.
#[derive(Debug, thiserror::Error)]
pub enum MasonError {
    /// The external compiler or one of its runtime capabilities could not be
    /// resolved from the search path.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
        /// Names of the missing dependencies, if the problem is a missing
        /// capability.
        missing: Vec<String>,
    },

    /// An input markup file is invalid.
    #[error("{0}")]
    Markup(MarkupDiagnostic),

    /// The external compiler failed unexpectedly or local build state is
    /// inconsistent. A clean rebuild is required.
    #[error("internal compiler error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },

    /// A filesystem operation on generated files or the cache failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Discriminant of [`MasonError`] for callers that only need the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`MasonError::Configuration`].
    Configuration,
    /// See [`MasonError::Markup`].
    Markup,
    /// See [`MasonError::Internal`].
    Internal,
    /// See [`MasonError::Io`].
    Io,
}

impl MasonError {
    /// Creates a configuration error without a list of missing dependencies.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            missing: Vec::new(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Markup(_) => ErrorKind::Markup,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<MarkupDiagnostic> for MasonError {
    fn from(diagnostic: MarkupDiagnostic) -> Self {
        Self::Markup(diagnostic)
    }
}
