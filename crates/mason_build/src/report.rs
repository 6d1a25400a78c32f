//! Outcome of a finalize step.

use std::path::PathBuf;

use mason_common::ScopeKey;

/// How a finalize step reached its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeMode {
    /// The session from the generate step post-processed every unit.
    Direct,
    /// No session was live; units were classified and only stale ones
    /// restored or recompiled.
    Recovered,
}

/// What a finalize step did, per markup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    /// The finalized scope.
    pub scope: ScopeKey,
    /// Direct post-processing or recovery.
    pub mode: FinalizeMode,
    /// Units whose class files were already post-processed.
    pub trusted: Vec<PathBuf>,
    /// Units restored from the artifact cache.
    pub restored: Vec<PathBuf>,
    /// Units run through the compiler again.
    pub recompiled: Vec<PathBuf>,
}

impl FinalizeReport {
    pub(crate) fn new(scope: ScopeKey, mode: FinalizeMode) -> Self {
        Self {
            scope,
            mode,
            trusted: Vec::new(),
            restored: Vec::new(),
            recompiled: Vec::new(),
        }
    }

    /// Total number of units the step looked at.
    pub fn unit_count(&self) -> usize {
        self.trusted.len() + self.restored.len() + self.recompiled.len()
    }
}

impl std::fmt::Display for FinalizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            FinalizeMode::Direct => write!(
                f,
                "{}: post-processed {} markup class(es)",
                self.scope,
                self.recompiled.len()
            ),
            FinalizeMode::Recovered => write!(
                f,
                "{}: {} up to date, {} restored from cache, {} recompiled",
                self.scope,
                self.trusted.len(),
                self.restored.len(),
                self.recompiled.len()
            ),
        }
    }
}
