//! Deleting a failed step's outputs.
//!
//! The host decides whether a step is up to date from its output files.
//! Removing them after a failure makes the next invocation run the step again.

use std::io::ErrorKind;
use std::path::Path;

use mason_common::{LogSink, MasonError};
use mason_session::{CompilationUnitCollection, Session};

use crate::failure::{StepFailure, SuppressedError};

/// Deletes every output of `units`: generated sources, class files and
/// code-behind class files. Files that are already gone are not failures.
///
/// Returns the deletions that failed.
pub fn rollback_outputs(units: &CompilationUnitCollection) -> Vec<SuppressedError> {
    let mut suppressed = Vec::new();
    let mut removed = 0usize;
    for path in units.all_outputs() {
        match remove(&path) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(source) => suppressed.push(SuppressedError { path, source }),
        }
    }
    tracing::debug!(removed, failed = suppressed.len(), "rolled back outputs");
    suppressed
}

fn remove(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Rolls back `session`'s outputs and builds the failure to report, logging
/// its full detail to `log`.
pub(crate) fn fail_step(session: &Session, error: MasonError, log: &dyn LogSink) -> StepFailure {
    tracing::warn!(scope = %session.key(), error = %error, "step failed; rolling back");
    let failure = StepFailure::new(error, rollback_outputs(&session.units()));
    failure.report(log);
    failure
}
