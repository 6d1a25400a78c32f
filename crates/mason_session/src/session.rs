//! A stateful handle on one external compiler instance.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mason_common::{LogSink, MasonError, MasonResult, ScopeKey};
use mason_config::{RequiredCapability, ResolvedScope};
use mason_loader::{HostResolver, IsolationLoader};
use parking_lot::{Mutex, MutexGuard};

use crate::compiler::{CompilerContext, CompilerFactory, CompilerLog, MarkupCompiler};
use crate::scan::MarkupSources;
use crate::unit::{CompilationUnit, CompilationUnitCollection};

/// The collaborators every session is built from.
#[derive(Clone)]
pub struct Toolchain {
    /// Binds external compiler instances.
    pub factory: Arc<dyn CompilerFactory>,
    /// The host's own resolver, used as the loader's fallback tier.
    pub host: Arc<dyn HostResolver>,
    /// Destination for compiler and orchestration messages.
    pub log: Arc<dyn LogSink>,
}

/// Output locations and compiler requirements for a session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Root directory for generated sources.
    pub generated_dir: PathBuf,
    /// Root directory the host compiles into.
    pub classes_dir: PathBuf,
    /// Compiler entry point.
    pub entry_point: String,
    /// Capabilities that must resolve before the compiler is bound.
    pub required: Vec<RequiredCapability>,
}

impl SessionSpec {
    /// Takes the session-relevant parts of a resolved scope.
    pub fn from_scope(scope: &ResolvedScope) -> Self {
        Self {
            generated_dir: scope.generated_dir.clone(),
            classes_dir: scope.classes_dir.clone(),
            entry_point: scope.entry_point.clone(),
            required: scope.required.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Registering,
    Processed,
    Compiled,
}

struct SessionState {
    /// `None` once closed.
    compiler: Option<Box<dyn MarkupCompiler>>,
    units: CompilationUnitCollection,
    phase: Phase,
}

/// One external compiler bound to one search path.
///
/// All operations take `&self` and are serialized internally; callers still
/// drive them in order (`add_file`, `process_files`, `compile_files`).
/// [`close`](Self::close) may be called any number of times from any thread.
pub struct Session {
    key: ScopeKey,
    spec: SessionSpec,
    loader: Arc<IsolationLoader>,
    state: Mutex<SessionState>,
    closed: AtomicBool,
}

impl Session {
    /// Loads the compiler from `search_path` and binds a new instance.
    pub fn open(
        key: ScopeKey,
        search_path: Vec<PathBuf>,
        spec: SessionSpec,
        toolchain: &Toolchain,
    ) -> MasonResult<Self> {
        let loader = Arc::new(IsolationLoader::open(
            search_path,
            toolchain.host.clone(),
            &spec.entry_point,
            &spec.required,
        )?);
        let entry = loader.load_class(&spec.entry_point).ok_or_else(|| {
            MasonError::configuration(format!("compiler not found: {}", spec.entry_point))
        })?;

        let compiler = toolchain.factory.instantiate(CompilerContext {
            entry: &entry,
            loader: &loader,
            search_path: loader.search_path(),
            generated_dir: &spec.generated_dir,
            classes_dir: &spec.classes_dir,
            log: CompilerLog::new(toolchain.log.clone()),
        })?;

        tracing::debug!(scope = %key, entry = %entry.location.display(), "opened compiler session");
        Ok(Self {
            key,
            spec,
            loader,
            state: Mutex::new(SessionState {
                compiler: Some(compiler),
                units: CompilationUnitCollection::new(),
                phase: Phase::Registering,
            }),
            closed: AtomicBool::new(false),
        })
    }

    /// The scope this session belongs to.
    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    /// The session's output locations.
    pub fn spec(&self) -> &SessionSpec {
        &self.spec
    }

    /// Registers one markup file.
    ///
    /// Returns the generated source path, or `None` if the compiler declined
    /// the file, in which case no unit is recorded.
    pub fn add_file(&self, source_dir: &Path, source_file: &Path) -> MasonResult<Option<PathBuf>> {
        let mut state = self.open_state()?;
        if state.phase != Phase::Registering {
            return Err(MasonError::internal(format!(
                "cannot add {} after processing has started",
                source_file.display()
            )));
        }

        let Some(generated) = compiler(&mut state, &self.key)?.add_file(source_dir, source_file)?
        else {
            tracing::trace!(file = %source_file.display(), "compiler declined file");
            return Ok(None);
        };

        let unit = CompilationUnit::derive(
            source_file,
            &generated,
            &self.spec.generated_dir,
            &self.spec.classes_dir,
        )?;
        state.units.insert(source_dir, unit);
        Ok(Some(generated))
    }

    /// Registers every file in `sources`. Returns the number accepted.
    pub fn add_files(&self, sources: &MarkupSources) -> MasonResult<usize> {
        let mut accepted = 0;
        for (dir, files) in sources {
            for file in files {
                if self.add_file(dir, file)?.is_some() {
                    accepted += 1;
                }
            }
        }
        Ok(accepted)
    }

    /// Parses the registered files and writes their generated sources.
    ///
    /// May run once per session; a second call is an internal error.
    pub fn process_files(&self) -> MasonResult<()> {
        let mut state = self.open_state()?;
        if state.phase != Phase::Registering {
            return Err(MasonError::internal(format!(
                "session {} already processed its files",
                self.key
            )));
        }
        state.phase = Phase::Processed;
        compiler(&mut state, &self.key)?.process_files()
    }

    /// Post-processes the host-compiled class files of every unit.
    ///
    /// Fails with an internal error if processing has not run, or if any
    /// unit's class file is absent.
    pub fn compile_files(&self) -> MasonResult<()> {
        let mut state = self.open_state()?;
        match state.phase {
            Phase::Processed => {}
            Phase::Registering => {
                return Err(MasonError::internal(format!(
                    "session {} has not processed its files",
                    self.key
                )))
            }
            Phase::Compiled => {
                return Err(MasonError::internal(format!(
                    "session {} already compiled its files",
                    self.key
                )))
            }
        }

        let missing: Vec<String> = state
            .units
            .units()
            .filter(|u| !u.class_file.is_file())
            .map(|u| u.class_file.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MasonError::internal(format!(
                "expected class files are missing: {}",
                missing.join(", ")
            )));
        }

        state.phase = Phase::Compiled;
        compiler(&mut state, &self.key)?.compile_files()
    }

    /// Returns `true` if `class_file` carries the marker attribute.
    ///
    /// Never fails; answers `false` once the session is closed.
    pub fn is_compiled_file(&self, class_file: &Path) -> bool {
        self.state
            .lock()
            .compiler
            .as_ref()
            .is_some_and(|c| c.is_compiled_file(class_file))
    }

    /// A snapshot of the units registered so far.
    pub fn units(&self) -> CompilationUnitCollection {
        self.state.lock().units.clone()
    }

    /// Releases the compiler instance and the isolation loader.
    ///
    /// Idempotent. Registered units stay readable so a failed step can still
    /// roll back its outputs.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let compiler = self.state.lock().compiler.take();
        drop(compiler);
        self.loader.close();
        tracing::debug!(scope = %self.key, "closed compiler session");
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn open_state(&self) -> MasonResult<MutexGuard<'_, SessionState>> {
        let state = self.state.lock();
        if state.compiler.is_none() {
            return Err(MasonError::internal(format!(
                "session {} is closed",
                self.key
            )));
        }
        Ok(state)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn compiler<'a>(
    state: &'a mut SessionState,
    key: &ScopeKey,
) -> MasonResult<&'a mut Box<dyn MarkupCompiler>> {
    state
        .compiler
        .as_mut()
        .ok_or_else(|| MasonError::internal(format!("session {key} is closed")))
}
