//! The capability interface every external markup compiler is adapted to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mason_classfile::{has_attribute, MARKER_ATTRIBUTE};
use mason_common::{LogLevel, LogSink, MasonResult};
use mason_loader::{IsolationLoader, Resolved};

/// One instantiated external compiler.
///
/// Calls arrive in the order `add_file`*, `process_files`, then, after the
/// host has compiled the generated sources, `compile_files`. The session
/// serializes all calls.
pub trait MarkupCompiler: Send {
    /// Registers `source_file` found under `source_dir`.
    ///
    /// Returns the path of the source file that will be generated for it, or
    /// `None` if the compiler declines the file.
    fn add_file(&mut self, source_dir: &Path, source_file: &Path) -> MasonResult<Option<PathBuf>>;

    /// Parses every registered file and writes the generated sources.
    fn process_files(&mut self) -> MasonResult<()>;

    /// Rewrites the host-compiled class files of every registered file in
    /// place and embeds the marker attribute.
    fn compile_files(&mut self) -> MasonResult<()>;

    /// Returns `true` if `class_file` was produced by [`compile_files`](Self::compile_files).
    ///
    /// Never fails; missing or malformed files answer `false`.
    fn is_compiled_file(&self, class_file: &Path) -> bool {
        has_attribute(class_file, MARKER_ATTRIBUTE)
    }
}

/// Everything a factory gets to bind a new compiler instance.
pub struct CompilerContext<'a> {
    /// The resolved compiler entry point.
    pub entry: &'a Resolved,
    /// The loader the compiler's own lookups must go through.
    pub loader: &'a Arc<IsolationLoader>,
    /// Resolved search path shared by the compiler and the generated code.
    pub search_path: &'a [PathBuf],
    /// Root directory for generated sources.
    pub generated_dir: &'a Path,
    /// Root directory the host compiles into.
    pub classes_dir: &'a Path,
    /// Log channel for compiler messages.
    pub log: CompilerLog,
}

/// Creates compiler instances. Binding to the concrete compiler happens once,
/// in [`instantiate`](Self::instantiate); callers only see [`MarkupCompiler`].
pub trait CompilerFactory: Send + Sync {
    /// Binds a new compiler instance.
    fn instantiate(&self, cx: CompilerContext<'_>) -> MasonResult<Box<dyn MarkupCompiler>>;
}

/// Log channel handed to the external compiler.
///
/// Compiler messages use the compiler's own level names; they are mapped
/// onto the host sink's levels here.
#[derive(Clone)]
pub struct CompilerLog {
    sink: Arc<dyn LogSink>,
}

impl CompilerLog {
    /// Wraps `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Compiler `debug` messages.
    pub fn debug(&self, message: &str) {
        self.sink.log(LogLevel::Debug, message);
    }

    /// Compiler `fine` messages.
    pub fn fine(&self, message: &str) {
        self.sink.log(LogLevel::Debug, message);
    }

    /// Compiler `info` messages.
    pub fn info(&self, message: &str) {
        self.sink.log(LogLevel::Info, message);
    }

    /// Compiler `warning` messages.
    pub fn warning(&self, message: &str) {
        self.sink.log(LogLevel::Warn, message);
    }

    /// Compiler `error` messages.
    pub fn error(&self, message: &str) {
        self.sink.log(LogLevel::Error, message);
    }
}

impl std::fmt::Debug for CompilerLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompilerLog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mason_common::MemorySink;

    #[test]
    fn compiler_levels_map_to_sink_levels() {
        let sink = Arc::new(MemorySink::new());
        let log = CompilerLog::new(sink.clone());
        log.debug("a");
        log.fine("b");
        log.info("c");
        log.warning("d");
        log.error("e");

        let levels: Vec<LogLevel> = sink.records().into_iter().map(|(l, _)| l).collect();
        assert_eq!(
            levels,
            vec![
                LogLevel::Debug,
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Error
            ]
        );
    }

    struct Inert;

    impl MarkupCompiler for Inert {
        fn add_file(&mut self, _: &Path, _: &Path) -> MasonResult<Option<PathBuf>> {
            Ok(None)
        }
        fn process_files(&mut self) -> MasonResult<()> {
            Ok(())
        }
        fn compile_files(&mut self) -> MasonResult<()> {
            Ok(())
        }
    }

    #[test]
    fn default_is_compiled_file_reads_marker() {
        let dir = tempfile::tempdir().unwrap();
        let class = dir.path().join("View.class");
        std::fs::write(&class, mason_classfile::empty_class("View", "java/lang/Object")).unwrap();

        assert!(!Inert.is_compiled_file(&class));
        mason_classfile::stamp_file(&class).unwrap();
        assert!(Inert.is_compiled_file(&class));
        assert!(!Inert.is_compiled_file(&dir.path().join("Missing.class")));
    }
}
