//! Finalizing a scope that has no live session.
//!
//! This happens when the host skipped the generate step as up to date but
//! still recompiled the generated sources, replacing post-processed class
//! files with plain ones. The marker attribute tells the two apart.

use std::path::PathBuf;

use mason_cache::ArtifactCache;
use mason_common::{MasonError, MasonResult};
use mason_config::ResolvedScope;
use mason_session::{CompilationUnit, CompilationUnitCollection, MarkupSources, Session};

use crate::context::BuildContext;
use crate::failure::{StepFailure, StepResult};
use crate::report::{FinalizeMode, FinalizeReport};
use crate::rollback::{fail_step, rollback_outputs};

/// The scope's units, partitioned by the state of their class files.
#[derive(Debug, Default)]
pub struct Survey {
    /// Every unit of the scope.
    pub units: CompilationUnitCollection,
    /// Class file present and marked.
    pub trusted: Vec<CompilationUnit>,
    /// Class file present but unmarked.
    pub stale: Vec<CompilationUnit>,
    /// Class file absent.
    pub missing: Vec<CompilationUnit>,
}

/// Partitions `session`'s units into trusted, stale and missing.
pub fn classify(session: &Session) -> Survey {
    let units = session.units();
    let mut survey = Survey::default();
    for unit in units.units() {
        let bucket = if !unit.class_file.is_file() {
            &mut survey.missing
        } else if session.is_compiled_file(&unit.class_file) {
            &mut survey.trusted
        } else {
            &mut survey.stale
        };
        bucket.push(unit.clone());
    }
    survey.units = units;
    survey
}

/// Recovers scope `scope` and reports what it did.
///
/// Stale units are restored from the artifact cache where possible; the
/// rest are processed and post-processed again in a session of their own.
/// A missing class file is fatal: the generated sources and the class files
/// no longer correspond, so a clean rebuild is required.
pub(crate) fn recover(ctx: &BuildContext, scope: &ResolvedScope) -> StepResult<FinalizeReport> {
    tracing::info!(scope = %scope.key, "no live session; recovering");
    let sources = ctx.discover(scope).map_err(|e| ctx.reported(e))?;

    let session = ctx.open_session(scope).map_err(|e| ctx.reported(e))?;
    let surveyed = survey(&session, &sources).map_err(|e| fail_step(&session, e, ctx.log()));
    ctx.end_session(&session);
    let survey = surveyed?;

    let mut report = FinalizeReport::new(scope.key.clone(), FinalizeMode::Recovered);
    report.trusted = markup_files(&survey.trusted);
    if survey.stale.is_empty() {
        return Ok(report);
    }

    let cache = ArtifactCache::new(&scope.cache_dir, &scope.classes_dir);
    let restored = match cache.restore(&survey.stale) {
        Ok(restored) => restored,
        Err(error) => {
            let failure = StepFailure::new(error, rollback_outputs(&survey.units));
            failure.report(ctx.log());
            return Err(failure);
        }
    };
    report.restored = markup_files(&restored.restored);
    if restored.unsatisfied.is_empty() {
        return Ok(report);
    }

    let session = ctx.open_session(scope).map_err(|e| ctx.reported(e))?;
    let outcome = match recompile(&session, &survey.units, &restored.unsatisfied, &cache) {
        Ok(()) => {
            report.recompiled = markup_files(&restored.unsatisfied);
            Ok(report)
        }
        Err(error) => Err(fail_step(&session, error, ctx.log())),
    };
    ctx.end_session(&session);
    outcome
}

fn survey(session: &Session, sources: &MarkupSources) -> MasonResult<Survey> {
    session.add_files(sources)?;
    let survey = classify(session);
    tracing::debug!(
        scope = %session.key(),
        trusted = survey.trusted.len(),
        stale = survey.stale.len(),
        missing = survey.missing.len(),
        "classified units"
    );

    if !survey.missing.is_empty() {
        let names: Vec<String> = survey
            .missing
            .iter()
            .map(|u| u.class_file.display().to_string())
            .collect();
        return Err(MasonError::internal(format!(
            "compiled classes are missing ({}); a clean rebuild is required",
            names.join(", ")
        )));
    }
    Ok(survey)
}

/// Runs the compiler on exactly `subset` and refreshes their cache entries.
fn recompile(
    session: &Session,
    all: &CompilationUnitCollection,
    subset: &[CompilationUnit],
    cache: &ArtifactCache,
) -> MasonResult<()> {
    for (dir, unit) in all.iter().filter(|(_, u)| subset.contains(*u)) {
        session.add_file(dir, &unit.markup_file)?;
    }
    session.process_files()?;
    session.compile_files()?;

    let units = session.units();
    cache.update(units.units())?;
    tracing::debug!(scope = %session.key(), units = units.len(), "recompiled stale units");
    Ok(())
}

fn markup_files(units: &[CompilationUnit]) -> Vec<PathBuf> {
    units.iter().map(|u| u.markup_file.clone()).collect()
}
