//! Configuration types deserialized from `mason.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// The top-level project configuration parsed from `mason.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// How to locate and validate the external markup compiler.
    pub compiler: CompilerConfig,
    /// Build directory layout.
    #[serde(default)]
    pub build: BuildConfig,
    /// Named compilation scopes (e.g. "main", "test").
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeConfig>,
}

/// Core project metadata.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name. Scope keys are qualified with it.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
}

/// External compiler settings.
#[derive(Debug, Deserialize)]
pub struct CompilerConfig {
    /// Fully qualified name of the compiler entry point on the search path.
    pub entry_point: String,
    /// Runtime capabilities that must resolve before the compiler is used.
    #[serde(default)]
    pub required: Vec<RequiredCapability>,
    /// Markup file extensions, without the leading dot.
    ///
    /// Accepts a single string or a list. Matched case-insensitively.
    #[serde(
        default = "default_extensions",
        deserialize_with = "deserialize_string_or_vec"
    )]
    pub extensions: Vec<String>,
}

/// A named class or resource that must be resolvable through the isolation
/// loader, together with the dependency that normally provides it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequiredCapability {
    /// Fully qualified name to resolve (e.g. `javafx.beans.Observable`).
    pub name: String,
    /// Human-readable name of the dependency that provides it (e.g. `javafx.base`).
    pub provides: String,
}

/// Directory layout for build outputs.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Build output directory, relative to the project root.
    #[serde(default = "default_build_dir")]
    pub dir: String,
    /// Artifact cache directory, relative to the build directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dir: default_build_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// One compilation scope, typically a source set of the host build.
#[derive(Debug, Deserialize)]
pub struct ScopeConfig {
    /// Directories searched for markup files.
    pub source_dirs: Vec<String>,
    /// Locations that make up the compiler's search path.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub search_path: Vec<String>,
    /// Directory the host compiles generated sources into.
    pub classes_dir: String,
    /// Directory for generated sources. Defaults to
    /// `<build.dir>/generated/sources/markup/<scope>`.
    #[serde(default)]
    pub generated_dir: Option<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["fxml".to_string(), "fxmlx".to_string()]
}

fn default_build_dir() -> String {
    "build".to_string()
}

fn default_cache_dir() -> String {
    ".mason-cache".to_string()
}

/// Deserializes a field that can be either a single string or a list of strings.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[project]
name = "app"

[compiler]
entry_point = "org.example.markup.Compiler"
"#;

    #[test]
    fn defaults_applied() {
        let config: ProjectConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.compiler.extensions, vec!["fxml", "fxmlx"]);
        assert!(config.compiler.required.is_empty());
        assert_eq!(config.build.dir, "build");
        assert_eq!(config.build.cache_dir, ".mason-cache");
        assert!(config.scopes.is_empty());
    }

    #[test]
    fn extensions_accept_single_string() {
        let toml = r#"
[project]
name = "app"

[compiler]
entry_point = "c.Main"
extensions = "ui"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.compiler.extensions, vec!["ui"]);
    }

    #[test]
    fn required_capabilities_parse() {
        let toml = r#"
[project]
name = "app"

[compiler]
entry_point = "c.Main"
required = [
  { name = "javafx.beans.Observable", provides = "javafx.base" },
  { name = "javafx.geometry.Bounds", provides = "javafx.graphics" },
]
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.compiler.required.len(), 2);
        assert_eq!(config.compiler.required[1].provides, "javafx.graphics");
    }

    #[test]
    fn scope_search_path_single_string() {
        let toml = r#"
[project]
name = "app"

[compiler]
entry_point = "c.Main"

[scopes.main]
source_dirs = ["src/main/java"]
search_path = "libs/compiler"
classes_dir = "build/classes/main"
"#;
        let config: ProjectConfig = toml::from_str(toml).unwrap();
        let main = &config.scopes["main"];
        assert_eq!(main.search_path, vec!["libs/compiler"]);
        assert!(main.generated_dir.is_none());
    }
}
