//! The per-build context and the generate/finalize steps.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mason_cache::ArtifactCache;
use mason_common::{LogSink, MasonError, MasonResult};
use mason_config::{load_config, resolve_all, ConfigError, ResolvedScope};
use mason_session::{
    discover_markup, MarkupSources, SearchPathSource, Session, SessionRegistry, SessionSpec,
    Toolchain,
};

use crate::failure::{StepFailure, StepResult};
use crate::recovery;
use crate::report::{FinalizeMode, FinalizeReport};
use crate::rollback::fail_step;

/// Everything one build invocation shares between its steps.
///
/// Created at build start and dropped at build end; dropping closes every
/// session still open. Steps for different scopes may run concurrently.
pub struct BuildContext {
    registry: SessionRegistry,
    toolchain: Toolchain,
    scopes: BTreeMap<String, ResolvedScope>,
    search_paths: HashMap<String, Arc<dyn SearchPathSource>>,
}

impl BuildContext {
    /// Creates a context for the given scopes.
    pub fn new(toolchain: Toolchain, scopes: impl IntoIterator<Item = ResolvedScope>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            toolchain,
            scopes: scopes.into_iter().map(|s| (s.name.clone(), s)).collect(),
            search_paths: HashMap::new(),
        }
    }

    /// Loads `mason.toml` from `project_dir` and resolves every scope in it.
    pub fn from_project(project_dir: &Path, toolchain: Toolchain) -> StepResult<Self> {
        let config = load_config(project_dir)?;
        Ok(Self::new(toolchain, resolve_all(&config, project_dir)))
    }

    /// Resolves `scope`'s search path through `source` instead of the
    /// configured list.
    pub fn with_search_path(mut self, scope: &str, source: Arc<dyn SearchPathSource>) -> Self {
        self.search_paths.insert(scope.to_string(), source);
        self
    }

    /// Looks up a configured scope by name.
    pub fn scope(&self, name: &str) -> MasonResult<&ResolvedScope> {
        self.scopes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownScope(name.to_string()).into())
    }

    /// Every configured scope, in name order.
    pub fn scopes(&self) -> impl Iterator<Item = &ResolvedScope> {
        self.scopes.values()
    }

    /// The session registry of this build.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The host-facing log sink.
    pub fn log(&self) -> &dyn LogSink {
        self.toolchain.log.as_ref()
    }

    /// Generates sources for every markup file of scope `name`.
    ///
    /// The session stays registered for [`finalize`](Self::finalize). Class
    /// files left over from an earlier build are deleted so that the host
    /// compiles the regenerated sources. Returns the generated source paths.
    pub fn generate(&self, name: &str) -> StepResult<Vec<PathBuf>> {
        let scope = self.scope(name).map_err(|e| self.reported(e))?;
        let sources = self.discover(scope).map_err(|e| self.reported(e))?;
        let session = self.open_session(scope).map_err(|e| self.reported(e))?;

        match generate_sources(&session, &sources) {
            Ok(generated) => {
                self.log().info(&format!(
                    "{}: generated {} source file(s)",
                    scope.key,
                    generated.len()
                ));
                Ok(generated)
            }
            Err(error) => {
                let failure = fail_step(&session, error, self.log());
                self.end_session(&session);
                Err(failure)
            }
        }
    }

    /// Post-processes the host-compiled classes of scope `name`.
    ///
    /// Uses the session from [`generate`](Self::generate) when one is live;
    /// otherwise recovers. Either way the scope has no session afterwards.
    pub fn finalize(&self, name: &str) -> StepResult<FinalizeReport> {
        let scope = self.scope(name).map_err(|e| self.reported(e))?;
        let report = match self.registry.get_session(&scope.key) {
            Some(session) => self.finalize_direct(scope, &session),
            None => recovery::recover(self, scope),
        }?;
        self.log().info(&report.to_string());
        Ok(report)
    }

    /// The generated sources scope `name` would produce, without generating
    /// anything. The registered session of the scope is left alone.
    pub fn planned_outputs(&self, name: &str) -> StepResult<Vec<PathBuf>> {
        let scope = self.scope(name).map_err(|e| self.reported(e))?;
        let sources = self.discover(scope).map_err(|e| self.reported(e))?;
        let search_path = self
            .search_path(scope)
            .resolve()
            .map_err(|e| self.reported(e))?;

        let session = Session::open(
            scope.key.clone(),
            search_path,
            SessionSpec::from_scope(scope),
            &self.toolchain,
        )
        .map_err(|e| self.reported(e))?;
        let planned = session.add_files(&sources).map(|_| session.units().generated_sources());
        session.close();
        planned.map_err(|e| self.reported(e))
    }

    /// Returns `true` if every planned output of scope `name` exists.
    pub fn outputs_up_to_date(&self, name: &str) -> StepResult<bool> {
        Ok(self.planned_outputs(name)?.iter().all(|p| p.exists()))
    }

    /// Closes every open session. Called on drop.
    pub fn finish(&self) {
        self.registry.close_all();
    }

    fn finalize_direct(
        &self,
        scope: &ResolvedScope,
        session: &Arc<Session>,
    ) -> StepResult<FinalizeReport> {
        let result = session.compile_files().and_then(|()| {
            let units = session.units();
            ArtifactCache::new(&scope.cache_dir, &scope.classes_dir).snapshot(units.units())?;
            Ok(units)
        });

        let outcome = match result {
            Ok(units) => {
                let mut report = FinalizeReport::new(scope.key.clone(), FinalizeMode::Direct);
                report.recompiled = units.units().map(|u| u.markup_file.clone()).collect();
                Ok(report)
            }
            Err(error) => Err(fail_step(session, error, self.log())),
        };
        self.end_session(session);
        outcome
    }

    pub(crate) fn discover(&self, scope: &ResolvedScope) -> MasonResult<MarkupSources> {
        discover_markup(&scope.source_dirs, &scope.generated_dir, &scope.extensions)
    }

    pub(crate) fn open_session(&self, scope: &ResolvedScope) -> MasonResult<Arc<Session>> {
        self.registry.new_session(
            &scope.key,
            self.search_path(scope),
            SessionSpec::from_scope(scope),
            &self.toolchain,
        )
    }

    pub(crate) fn end_session(&self, session: &Arc<Session>) {
        session.close();
        self.registry.release(session);
    }

    /// Wraps an error raised before any output was written.
    pub(crate) fn reported(&self, error: MasonError) -> StepFailure {
        let failure = StepFailure::from(error);
        failure.report(self.log());
        failure
    }

    fn search_path<'a>(&'a self, scope: &'a ResolvedScope) -> &'a dyn SearchPathSource {
        match self.search_paths.get(&scope.name) {
            Some(source) => source.as_ref(),
            None => &scope.search_path,
        }
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .field("registry", &self.registry)
            .finish()
    }
}

fn generate_sources(session: &Session, sources: &MarkupSources) -> MasonResult<Vec<PathBuf>> {
    session.add_files(sources)?;
    session.process_files()?;

    let units = session.units();
    let mut cleared = 0usize;
    for unit in units.units() {
        let stale = std::iter::once(unit.class_file.clone()).chain(unit.nested_class_files()?);
        for path in stale {
            match std::fs::remove_file(&path) {
                Ok(()) => cleared += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(MasonError::io(&path, e)),
            }
        }
    }
    tracing::debug!(scope = %session.key(), units = units.len(), cleared, "generated sources");
    Ok(units.generated_sources())
}
