//! Environment problems surface as configuration errors before any output
//! is written.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mason_common::{ErrorKind, MasonError, MasonResult, ScopeKey};
use mason_config::RequiredCapability;
use mason_conformance::{files_under, Project, ENTRY_POINT};
use mason_session::{SearchPathSource, Session, SessionSpec};

#[test]
fn missing_compiler_fails_generation() {
    let project = Project::new();
    project.markup("main", "View.fxml", "<VBox/>\n");
    std::fs::remove_dir_all(project.path("compiler")).unwrap();

    let ctx = project.context();
    let failure = ctx.generate("main").unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::Configuration);
    assert_eq!(
        failure.to_string(),
        format!("configuration error: compiler not found: {ENTRY_POINT}")
    );
    assert!(files_under(&project.scope("main").generated_dir).is_empty());
    assert_eq!(project.stats().instances(), 0);
    assert!(ctx.registry().is_empty());
}

#[test]
fn missing_capabilities_are_named() {
    let project = Project::new();
    let spec = SessionSpec {
        generated_dir: project.path("gen"),
        classes_dir: project.path("classes"),
        entry_point: ENTRY_POINT.to_string(),
        required: vec![
            RequiredCapability {
                name: "javafx.beans.Observable".to_string(),
                provides: "javafx.base".to_string(),
            },
            RequiredCapability {
                name: "javafx.scene.Node".to_string(),
                provides: "javafx.graphics".to_string(),
            },
        ],
    };

    let err = Session::open(
        ScopeKey::new("demo:main"),
        vec![project.path("compiler")],
        spec,
        &project.toolchain(),
    )
    .unwrap_err();

    match err {
        MasonError::Configuration { message, missing } => {
            assert_eq!(message, "missing module dependencies: javafx.base, javafx.graphics");
            assert_eq!(missing, vec!["javafx.base", "javafx.graphics"]);
        }
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn unknown_scope_is_rejected() {
    let project = Project::new();
    let failure = project.context().finalize("integration").unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Configuration);
    assert!(failure.to_string().contains("integration"));
}

struct CountingPath {
    entries: Vec<PathBuf>,
    calls: AtomicUsize,
}

impl SearchPathSource for CountingPath {
    fn resolve(&self) -> MasonResult<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }
}

#[test]
fn search_path_source_is_resolved_per_session() {
    let project = Project::new();
    project.markup("main", "View.fxml", "<VBox/>\n");
    let source = Arc::new(CountingPath {
        entries: vec![project.path("compiler")],
        calls: AtomicUsize::new(0),
    });

    let ctx = project.context().with_search_path("main", source.clone());
    ctx.generate("main").unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    ctx.planned_outputs("main").unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

struct Unresolvable;

impl SearchPathSource for Unresolvable {
    fn resolve(&self) -> MasonResult<Vec<PathBuf>> {
        Err(MasonError::configuration("could not resolve org.example:markup-compiler:1.0"))
    }
}

#[test]
fn search_path_failure_fails_the_step() {
    let project = Project::new();
    project.markup("main", "View.fxml", "<VBox/>\n");

    let ctx = project.context().with_search_path("main", Arc::new(Unresolvable));
    let failure = ctx.generate("main").unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::Configuration);
    assert!(failure.to_string().contains("markup-compiler"));
}

#[test]
fn compiler_shipped_as_a_jar_builds() {
    let project = Project::new();
    project.markup("main", "com/app/View.fxml", "<VBox/>\n");
    let jar = project.package_compiler_jar("libs/markup-compiler.jar");

    let ctx = project.context().with_search_path("main", Arc::new(vec![jar]));
    let generated = ctx.generate("main").unwrap();
    assert_eq!(generated.len(), 1);
    assert!(generated[0].is_file());
    project.host_compile("main");
    ctx.finalize("main").unwrap();

    assert_eq!(project.stats().instances(), 1);
    assert!(ctx.registry().is_empty());
}

#[test]
fn corrupt_compiler_jar_is_a_configuration_error() {
    let project = Project::new();
    project.markup("main", "View.fxml", "<VBox/>\n");
    let jar = project.path("libs/markup-compiler.jar");
    std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
    std::fs::write(&jar, b"truncated").unwrap();

    let ctx = project.context().with_search_path("main", Arc::new(vec![jar]));
    let failure = ctx.generate("main").unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Configuration);
    assert!(failure.to_string().contains("markup-compiler.jar"));
}
