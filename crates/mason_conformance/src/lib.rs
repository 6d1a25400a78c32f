//! Conformance test helpers for the mason build orchestration.
//!
//! Provides a fake external markup compiler, a host-compiler stand-in, and a
//! throwaway project on disk so integration tests can drive whole builds.
//!
//! The fake compiler understands a tiny markup convention:
//!
//! - a line containing `<error` fails `process_files` with a markup error at
//!   that line;
//! - a file whose first line is `<!-- skip -->` is declined by `add_file`;
//! - a file containing `code-behind` generates `<Name>Base.java`, so the
//!   unit gets a separate code-behind class.

#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mason_build::BuildContext;
use mason_classfile::{add_attribute, empty_class, MARKER_ATTRIBUTE};
use mason_common::{ContentHash, MarkupDiagnostic, MasonError, MasonResult, MemorySink};
use mason_config::{load_config, resolve_scope, ResolvedScope};
use mason_loader::EmptyResolver;
use mason_session::{CompilerContext, CompilerFactory, CompilerLog, MarkupCompiler, Toolchain};
use parking_lot::Mutex;

/// Entry point the fake compiler is published under.
pub const ENTRY_POINT: &str = "org.example.markup.Compiler";

/// Calls observed by every compiler a [`FakeFactory`] created.
#[derive(Debug, Default)]
pub struct FakeStats {
    instances: Mutex<usize>,
    processed: Mutex<Vec<PathBuf>>,
    compiled: Mutex<Vec<PathBuf>>,
}

impl FakeStats {
    /// Number of compiler instances created.
    pub fn instances(&self) -> usize {
        *self.instances.lock()
    }

    /// Markup files whose sources were generated, in call order.
    pub fn processed(&self) -> Vec<PathBuf> {
        self.processed.lock().clone()
    }

    /// Markup files whose class files were post-processed, in call order.
    pub fn compiled(&self) -> Vec<PathBuf> {
        self.compiled.lock().clone()
    }

    /// Forgets every recorded call.
    pub fn reset(&self) {
        self.processed.lock().clear();
        self.compiled.lock().clear();
    }
}

/// Creates [`FakeCompiler`]s that all report to one [`FakeStats`].
#[derive(Debug, Default)]
pub struct FakeFactory {
    stats: Arc<FakeStats>,
}

impl FakeFactory {
    /// Creates a factory with fresh statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared statistics.
    pub fn stats(&self) -> Arc<FakeStats> {
        self.stats.clone()
    }
}

impl CompilerFactory for FakeFactory {
    fn instantiate(&self, cx: CompilerContext<'_>) -> MasonResult<Box<dyn MarkupCompiler>> {
        *self.stats.instances.lock() += 1;
        cx.log.fine(&format!("fake compiler bound from {}", cx.entry.location.display()));
        Ok(Box::new(FakeCompiler {
            generated_dir: cx.generated_dir.to_path_buf(),
            classes_dir: cx.classes_dir.to_path_buf(),
            files: Vec::new(),
            log: cx.log,
            stats: self.stats.clone(),
        }))
    }
}

struct Registered {
    markup: PathBuf,
    generated: PathBuf,
}

/// A fake external markup compiler that writes deterministic sources and
/// stamps the marker attribute on post-processing.
pub struct FakeCompiler {
    generated_dir: PathBuf,
    classes_dir: PathBuf,
    files: Vec<Registered>,
    log: CompilerLog,
    stats: Arc<FakeStats>,
}

impl FakeCompiler {
    fn class_file(&self, generated: &Path) -> MasonResult<PathBuf> {
        let relative = generated
            .strip_prefix(&self.generated_dir)
            .map_err(|_| MasonError::internal("generated file outside generated dir"))?;
        Ok(self.classes_dir.join(relative).with_extension("class"))
    }
}

impl MarkupCompiler for FakeCompiler {
    fn add_file(&mut self, source_dir: &Path, source_file: &Path) -> MasonResult<Option<PathBuf>> {
        let content = read(source_file)?;
        if content.lines().next() == Some("<!-- skip -->") {
            return Ok(None);
        }

        let relative = source_file
            .strip_prefix(source_dir)
            .map_err(|_| MasonError::internal("markup file outside its source dir"))?;
        let stem = file_stem(source_file);
        let name = if content.contains("code-behind") {
            format!("{stem}Base.java")
        } else {
            format!("{stem}.java")
        };
        let generated = self.generated_dir.join(relative).with_file_name(name);

        self.files.push(Registered {
            markup: source_file.to_path_buf(),
            generated: generated.clone(),
        });
        Ok(Some(generated))
    }

    fn process_files(&mut self) -> MasonResult<()> {
        for file in &self.files {
            let content = read(&file.markup)?;
            let bad_line = content.lines().position(|l| l.contains("<error"));
            if let Some(index) = bad_line {
                let diagnostic =
                    MarkupDiagnostic::new(&file.markup, index as u32 + 1, "unexpected <error> element");
                self.log.error(&diagnostic.to_string());
                return Err(diagnostic.into());
            }

            let hash = ContentHash::from_bytes(content.as_bytes()).to_string();
            let source = format!(
                "// Generated from {}\npublic class {} {{\n    static final String MARKUP = \"{}\";\n}}\n",
                file_stem(&file.markup),
                file_stem(&file.generated),
                &hash[..8],
            );
            write(&file.generated, source.as_bytes())?;
            self.stats.processed.lock().push(file.markup.clone());
        }
        self.log.info(&format!("generated {} file(s)", self.files.len()));
        Ok(())
    }

    fn compile_files(&mut self) -> MasonResult<()> {
        for file in &self.files {
            let class_file = self.class_file(&file.generated)?;
            let bytes = std::fs::read(&class_file).map_err(|e| MasonError::io(&class_file, e))?;
            let stamped = add_attribute(&bytes, MARKER_ATTRIBUTE, &[])?;
            if stamped != bytes {
                write(&class_file, &stamped)?;
            }
            self.stats.compiled.lock().push(file.markup.clone());
        }
        self.log.debug(&format!("post-processed {} class file(s)", self.files.len()));
        Ok(())
    }
}

/// A throwaway project with two scopes, `main` and `test`.
///
/// Each scope reads markup from `src/<scope>` and compiles into
/// `build/classes/<scope>`. The fake compiler's entry point is published on
/// the `compiler/` search path entry.
pub struct Project {
    root: tempfile::TempDir,
    factory: Arc<FakeFactory>,
    sink: Arc<MemorySink>,
}

impl Project {
    /// Lays out the project on disk.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp project");
        std::fs::write(
            root.path().join(mason_config::CONFIG_FILE),
            r#"
[project]
name = "demo"

[compiler]
entry_point = "org.example.markup.Compiler"

[scopes.main]
source_dirs = ["src/main"]
search_path = ["compiler"]
classes_dir = "build/classes/main"

[scopes.test]
source_dirs = ["src/test"]
search_path = ["compiler"]
classes_dir = "build/classes/test"
"#,
        )
        .expect("write mason.toml");
        let project = Self {
            root,
            factory: Arc::new(FakeFactory::new()),
            sink: Arc::new(MemorySink::new()),
        };
        let entry = project.path("compiler/org/example/markup/Compiler.class");
        write(&entry, &empty_class("org/example/markup/Compiler", "java/lang/Object"))
            .expect("publish compiler entry point");
        project
    }

    /// Absolute path of `relative` inside the project.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    /// Moves the published compiler into a jar at `relative` and removes the
    /// `compiler/` directory, returning the jar's path.
    pub fn package_compiler_jar(&self, relative: &str) -> PathBuf {
        const CLASS: &str = "org/example/markup/Compiler.class";
        let dir = self.path("compiler");
        let class = std::fs::read(dir.join(CLASS)).expect("read compiler entry point");
        let jar = self.path(relative);
        write(&jar, &[]).expect("create compiler jar");

        let mut writer =
            zip::ZipWriter::new(std::fs::File::create(&jar).expect("open compiler jar"));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file(CLASS, options).expect("add jar entry");
        std::io::Write::write_all(&mut writer, &class).expect("write jar entry");
        writer.finish().expect("finish compiler jar");

        std::fs::remove_dir_all(dir).expect("remove compiler directory");
        jar
    }

    /// The resolved configuration of `scope`.
    pub fn scope(&self, scope: &str) -> ResolvedScope {
        let config = load_config(self.root.path()).expect("load mason.toml");
        resolve_scope(&config, self.root.path(), scope).expect("resolve scope")
    }

    /// Writes a markup file at `src/<scope>/<relative>`.
    pub fn markup(&self, scope: &str, relative: &str, content: &str) -> PathBuf {
        let path = self.path(&format!("src/{scope}/{relative}"));
        write(&path, content.as_bytes()).expect("write markup");
        path
    }

    /// Statistics of every fake compiler this project created.
    pub fn stats(&self) -> Arc<FakeStats> {
        self.factory.stats()
    }

    /// Messages the build logged to the host.
    pub fn log(&self) -> &MemorySink {
        &self.sink
    }

    /// The toolchain builds of this project use.
    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            factory: self.factory.clone(),
            host: Arc::new(EmptyResolver),
            log: self.sink.clone(),
        }
    }

    /// A fresh build context, as at the start of a build invocation.
    pub fn context(&self) -> BuildContext {
        BuildContext::from_project(self.root.path(), self.toolchain()).expect("build context")
    }

    /// Stands in for the host compiler: compiles every generated source of
    /// `scope` into a plain, unmarked class file. Returns the class files.
    pub fn host_compile(&self, scope: &str) -> Vec<PathBuf> {
        let resolved = self.scope(scope);
        let mut classes = Vec::new();
        for source in files_under(&resolved.generated_dir) {
            let relative = source
                .strip_prefix(&resolved.generated_dir)
                .expect("generated source under generated dir");
            let class_file = resolved.classes_dir.join(relative).with_extension("class");
            host_recompile(&class_file);
            classes.push(class_file);
        }
        classes
    }

    /// Compiles the hand-written class at `relative_class` under `scope`'s
    /// classes directory, as the host does for code-behind sources.
    pub fn compile_code_behind(&self, scope: &str, relative_class: &str) -> PathBuf {
        let class_file = self.scope(scope).classes_dir.join(relative_class);
        host_recompile(&class_file);
        class_file
    }

    /// Content hashes of every file under `dir`, keyed by path.
    pub fn checksums(&self, dir: &Path) -> BTreeMap<PathBuf, ContentHash> {
        checksums(dir)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// Overwrites `class_file` with a plain class, as the host compiler would.
pub fn host_recompile(class_file: &Path) {
    let name = file_stem(class_file);
    write(class_file, &empty_class(&name, "java/lang/Object")).expect("write class file");
}

/// Content hashes of every file under `dir`, keyed by path.
pub fn checksums(dir: &Path) -> BTreeMap<PathBuf, ContentHash> {
    files_under(dir)
        .into_iter()
        .map(|path| {
            let hash = ContentHash::from_file(&path).expect("hash file");
            (path, hash)
        })
        .collect()
}

/// Every regular file under `dir`, sorted. Empty if `dir` does not exist.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, &mut out);
    out.sort();
    out
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read(path: &Path) -> MasonResult<String> {
    std::fs::read_to_string(path).map_err(|e| MasonError::io(path, e))
}

fn write(path: &Path, data: &[u8]) -> MasonResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MasonError::io(parent, e))?;
    }
    std::fs::write(path, data).map_err(|e| MasonError::io(path, e))
}
