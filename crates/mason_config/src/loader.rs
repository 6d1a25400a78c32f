//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "mason.toml";

/// Loads and validates a `mason.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `mason.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.compiler.entry_point.is_empty() {
        return Err(ConfigError::MissingField("compiler.entry_point".to_string()));
    }
    if config.compiler.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "compiler.extensions must name at least one extension".to_string(),
        ));
    }
    for (name, scope) in &config.scopes {
        if scope.source_dirs.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "scope '{name}' has no source_dirs"
            )));
        }
        if scope.classes_dir.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "scopes.{name}.classes_dir"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "app"
version = "1.2.0"

[compiler]
entry_point = "org.example.markup.Compiler"
required = [{ name = "javafx.beans.Observable", provides = "javafx.base" }]
extensions = ["fxml", "fxmlx"]

[build]
dir = "out"
cache_dir = "markup-cache"

[scopes.main]
source_dirs = ["src/main/java", "src/main/resources"]
search_path = ["libs/compiler", "out/classes/main"]
classes_dir = "out/classes/main"

[scopes.test]
source_dirs = ["src/test/java"]
classes_dir = "out/classes/test"
generated_dir = "out/gen/test"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.version, "1.2.0");
        assert_eq!(config.build.dir, "out");
        assert_eq!(config.scopes.len(), 2);
        assert_eq!(
            config.scopes["test"].generated_dir.as_deref(),
            Some("out/gen/test")
        );
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""

[compiler]
entry_point = "c.Main"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "project.name"));
    }

    #[test]
    fn missing_entry_point_errors() {
        let toml = r#"
[project]
name = "app"

[compiler]
entry_point = ""
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "compiler.entry_point"));
    }

    #[test]
    fn empty_extensions_error() {
        let toml = r#"
[project]
name = "app"

[compiler]
entry_point = "c.Main"
extensions = []
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn scope_without_sources_errors() {
        let toml = r#"
[project]
name = "app"

[compiler]
entry_point = "c.Main"

[scopes.main]
source_dirs = []
classes_dir = "build/classes"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("[project\nname = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"app\"\n\n[compiler]\nentry_point = \"c.Main\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "app");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
