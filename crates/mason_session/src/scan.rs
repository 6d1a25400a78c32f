//! Markup file discovery under a scope's source directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mason_common::{MasonError, MasonResult};

/// Markup files per source directory, each list sorted by path.
pub type MarkupSources = BTreeMap<PathBuf, Vec<PathBuf>>;

/// Returns `true` if `path`'s file name ends in `.<ext>` for one of
/// `extensions` (lowercase, without the dot), ignoring case.
pub fn is_markup_file(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| name.len() > ext.len() + 1 && name.ends_with(&format!(".{ext}")))
}

/// Recursively collects markup files from each of `source_dirs`.
///
/// Source directories that do not exist are reported with an empty list.
/// A source directory that is, or lies inside, `generated_dir` is skipped
/// entirely: generated sources are outputs, not inputs.
pub fn discover_markup(
    source_dirs: &[PathBuf],
    generated_dir: &Path,
    extensions: &[String],
) -> MasonResult<MarkupSources> {
    let mut result = MarkupSources::new();
    for dir in source_dirs {
        if dir.starts_with(generated_dir) {
            continue;
        }
        let mut files = Vec::new();
        if dir.is_dir() {
            walk_dir(dir, extensions, &mut files)?;
        }
        files.sort();
        result.insert(dir.clone(), files);
    }
    Ok(result)
}

fn walk_dir(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) -> MasonResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| MasonError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MasonError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| MasonError::io(&path, e))?;
        if file_type.is_dir() {
            walk_dir(&path, extensions, out)?;
        } else if is_markup_file(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["fxml".to_string(), "fxmlx".to_string()]
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"<VBox/>").unwrap();
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(is_markup_file(Path::new("a/View.FXML"), &exts()));
        assert!(is_markup_file(Path::new("a/View.fxmlx"), &exts()));
        assert!(!is_markup_file(Path::new("a/View.xml"), &exts()));
        assert!(!is_markup_file(Path::new("a/.fxml"), &exts()));
        assert!(!is_markup_file(Path::new("a/Viewfxml"), &exts()));
    }

    #[test]
    fn discovers_recursively_and_sorted() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        touch(&src.join("b/Second.fxml"));
        touch(&src.join("a/First.fxmlx"));
        touch(&src.join("a/Ignored.java"));

        let found = discover_markup(&[src.clone()], &root.path().join("gen"), &exts()).unwrap();
        assert_eq!(
            found[&src],
            vec![src.join("a/First.fxmlx"), src.join("b/Second.fxml")]
        );
    }

    #[test]
    fn generated_dir_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let gen = root.path().join("gen");
        touch(&gen.join("Leftover.fxml"));

        let found = discover_markup(&[gen.clone()], &gen, &exts()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn missing_dir_yields_empty_list() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let found = discover_markup(&[missing.clone()], &root.path().join("gen"), &exts()).unwrap();
        assert!(found[&missing].is_empty());
    }
}
