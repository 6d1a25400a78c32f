//! Scope resolution: turning a named scope into absolute build locations.

use crate::error::ConfigError;
use crate::types::{ProjectConfig, RequiredCapability, ScopeConfig};
use mason_common::ScopeKey;
use std::path::{Path, PathBuf};

/// A fully resolved compilation scope.
///
/// All paths are absolute (joined onto the project root when relative in the
/// configuration), and defaults for the generated and cache directories are
/// filled in.
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    /// Registry key for this scope.
    pub key: ScopeKey,
    /// The scope name as written in the configuration.
    pub name: String,
    /// Directories searched for markup files.
    pub source_dirs: Vec<PathBuf>,
    /// Search path for the external compiler and the generated code.
    pub search_path: Vec<PathBuf>,
    /// Where the host compiles generated sources to.
    pub classes_dir: PathBuf,
    /// Where generated sources are written.
    pub generated_dir: PathBuf,
    /// Per-scope artifact cache directory.
    pub cache_dir: PathBuf,
    /// Compiler entry point that must resolve on the search path.
    pub entry_point: String,
    /// Additional runtime capabilities that must resolve.
    pub required: Vec<RequiredCapability>,
    /// Lowercase markup extensions without a leading dot.
    pub extensions: Vec<String>,
}

/// Resolves the scope called `name`.
pub fn resolve_scope(
    config: &ProjectConfig,
    project_root: &Path,
    name: &str,
) -> Result<ResolvedScope, ConfigError> {
    let scope = config
        .scopes
        .get(name)
        .ok_or_else(|| ConfigError::UnknownScope(name.to_string()))?;
    Ok(resolve_one(config, project_root, name, scope))
}

/// Resolves every configured scope, in name order.
pub fn resolve_all(config: &ProjectConfig, project_root: &Path) -> Vec<ResolvedScope> {
    config
        .scopes
        .iter()
        .map(|(name, scope)| resolve_one(config, project_root, name, scope))
        .collect()
}

fn resolve_one(
    config: &ProjectConfig,
    project_root: &Path,
    name: &str,
    scope: &ScopeConfig,
) -> ResolvedScope {
    let key = ScopeKey::for_scope(&config.project.name, name);
    let build_dir = absolutize(project_root, &config.build.dir);

    let generated_dir = match &scope.generated_dir {
        Some(dir) => absolutize(project_root, dir),
        None => build_dir
            .join("generated")
            .join("sources")
            .join("markup")
            .join(name),
    };
    let cache_dir = absolutize(&build_dir, &config.build.cache_dir).join(key.dir_name());

    ResolvedScope {
        name: name.to_string(),
        source_dirs: scope
            .source_dirs
            .iter()
            .map(|d| absolutize(project_root, d))
            .collect(),
        search_path: scope
            .search_path
            .iter()
            .map(|d| absolutize(project_root, d))
            .collect(),
        classes_dir: absolutize(project_root, &scope.classes_dir),
        generated_dir,
        cache_dir,
        entry_point: config.compiler.entry_point.clone(),
        required: config.compiler.required.clone(),
        extensions: config
            .compiler
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect(),
        key,
    }
}

fn absolutize(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    const CONFIG: &str = r#"
[project]
name = "app"

[compiler]
entry_point = "org.example.markup.Compiler"
extensions = [".FXML", "fxmlx"]

[scopes.main]
source_dirs = ["src/main/java"]
search_path = ["libs/compiler", "/opt/sdk/lib"]
classes_dir = "build/classes/main"

[scopes.test]
source_dirs = ["src/test/java"]
classes_dir = "build/classes/test"
generated_dir = "/tmp/gen/test"
"#;

    #[test]
    fn resolves_relative_paths_against_root() {
        let config = load_config_from_str(CONFIG).unwrap();
        let scope = resolve_scope(&config, Path::new("/work/app"), "main").unwrap();
        assert_eq!(scope.source_dirs, vec![PathBuf::from("/work/app/src/main/java")]);
        assert_eq!(
            scope.search_path,
            vec![
                PathBuf::from("/work/app/libs/compiler"),
                PathBuf::from("/opt/sdk/lib")
            ]
        );
        assert_eq!(scope.classes_dir, PathBuf::from("/work/app/build/classes/main"));
    }

    #[test]
    fn default_generated_and_cache_dirs() {
        let config = load_config_from_str(CONFIG).unwrap();
        let scope = resolve_scope(&config, Path::new("/work/app"), "main").unwrap();
        assert_eq!(
            scope.generated_dir,
            PathBuf::from("/work/app/build/generated/sources/markup/main")
        );
        assert_eq!(
            scope.cache_dir.parent(),
            Some(Path::new("/work/app/build/.mason-cache"))
        );
        assert_eq!(
            scope.cache_dir.file_name().unwrap().to_string_lossy(),
            scope.key.dir_name()
        );
    }

    #[test]
    fn similar_scope_names_get_separate_caches() {
        let config = load_config_from_str(
            r#"
[project]
name = "app"

[compiler]
entry_point = "org.example.markup.Compiler"

[scopes."ui kit"]
source_dirs = ["src/ui kit"]
classes_dir = "build/classes/ui kit"

[scopes.ui_kit]
source_dirs = ["src/ui_kit"]
classes_dir = "build/classes/ui_kit"
"#,
        )
        .unwrap();
        let spaced = resolve_scope(&config, Path::new("/w"), "ui kit").unwrap();
        let underscored = resolve_scope(&config, Path::new("/w"), "ui_kit").unwrap();
        assert_ne!(spaced.key, underscored.key);
        assert_ne!(spaced.cache_dir, underscored.cache_dir);
    }

    #[test]
    fn explicit_generated_dir_wins() {
        let config = load_config_from_str(CONFIG).unwrap();
        let scope = resolve_scope(&config, Path::new("/work/app"), "test").unwrap();
        assert_eq!(scope.generated_dir, PathBuf::from("/tmp/gen/test"));
    }

    #[test]
    fn extensions_normalized() {
        let config = load_config_from_str(CONFIG).unwrap();
        let scope = resolve_scope(&config, Path::new("/w"), "main").unwrap();
        assert_eq!(scope.extensions, vec!["fxml", "fxmlx"]);
    }

    #[test]
    fn scope_keys_are_project_qualified() {
        let config = load_config_from_str(CONFIG).unwrap();
        let all = resolve_all(&config, Path::new("/w"));
        let keys: Vec<_> = all.iter().map(|s| s.key.to_string()).collect();
        assert_eq!(keys, vec!["app:main", "app:test"]);
    }

    #[test]
    fn unknown_scope_errors() {
        let config = load_config_from_str(CONFIG).unwrap();
        let err = resolve_scope(&config, Path::new("/w"), "bench").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScope(ref s) if s == "bench"));
    }
}
