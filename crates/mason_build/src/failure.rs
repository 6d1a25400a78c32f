//! What a failed build step reports to the host.

use std::path::PathBuf;

use mason_common::{LogSink, MasonError};

/// Result type of every build step.
pub type StepResult<T> = Result<T, StepFailure>;

/// A deletion that failed while rolling back a step.
#[derive(Debug, thiserror::Error)]
#[error("could not delete {path}: {source}")]
pub struct SuppressedError {
    /// The output that could not be removed.
    pub path: PathBuf,
    /// The underlying I/O error.
    pub source: std::io::Error,
}

/// A failed build step: the classified error that caused it plus any
/// rollback failures, which never replace the original error.
///
/// `Display` gives the concise message meant for the build log. The full
/// detail goes to the log sink when the failure is reported.
#[derive(Debug, thiserror::Error)]
#[error("{}", self.summary())]
pub struct StepFailure {
    /// The error that failed the step.
    #[source]
    pub error: MasonError,
    /// Deletion failures from the rollback that followed.
    pub suppressed: Vec<SuppressedError>,
}

impl StepFailure {
    /// Wraps `error` with the failures of its rollback.
    pub fn new(error: MasonError, suppressed: Vec<SuppressedError>) -> Self {
        Self { error, suppressed }
    }

    /// The concise, user-facing message.
    pub fn summary(&self) -> String {
        match &self.error {
            MasonError::Markup(_) => {
                "compilation failed; see the compiler error output for details".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Writes the full detail to `log`: the error at error level, each
    /// suppressed deletion failure at warn level.
    pub fn report(&self, log: &dyn LogSink) {
        log.error(&self.error.to_string());
        for suppressed in &self.suppressed {
            log.warn(&suppressed.to_string());
        }
    }
}

impl From<MasonError> for StepFailure {
    fn from(error: MasonError) -> Self {
        Self::new(error, Vec::new())
    }
}

impl From<mason_config::ConfigError> for StepFailure {
    fn from(error: mason_config::ConfigError) -> Self {
        Self::from(MasonError::from(error))
    }
}
