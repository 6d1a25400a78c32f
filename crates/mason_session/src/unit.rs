//! Compilation units: the mapping from a markup file to everything derived
//! from it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use mason_common::{MasonError, MasonResult};

/// One accepted markup file and the outputs derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilationUnit {
    /// The markup input.
    pub markup_file: PathBuf,
    /// The generated source file.
    pub generated_source: PathBuf,
    /// The class file the host compiles the generated source into.
    pub class_file: PathBuf,
    /// The class file of the code-behind class sharing the markup file's
    /// name, when that differs from [`class_file`](Self::class_file).
    pub code_behind_class: Option<PathBuf>,
}

impl CompilationUnit {
    /// Derives a unit from the generated source path the compiler reported.
    ///
    /// The class file mirrors the generated source's path relative to
    /// `generated_root` under `classes_root`, with the extension replaced by
    /// `.class`. The code-behind class sits next to it, named after the
    /// markup file.
    pub fn derive(
        markup_file: &Path,
        generated_source: &Path,
        generated_root: &Path,
        classes_root: &Path,
    ) -> MasonResult<Self> {
        let relative = generated_source.strip_prefix(generated_root).map_err(|_| {
            MasonError::internal(format!(
                "generated file {} is outside {}",
                generated_source.display(),
                generated_root.display()
            ))
        })?;

        let class_name = stem(generated_source)?;
        let class_file = classes_root
            .join(relative.parent().unwrap_or_else(|| Path::new("")))
            .join(format!("{class_name}.class"));

        let code_behind = class_file.with_file_name(format!("{}.class", stem(markup_file)?));
        let code_behind_class = (code_behind != class_file).then_some(code_behind);

        Ok(Self {
            markup_file: markup_file.to_path_buf(),
            generated_source: generated_source.to_path_buf(),
            class_file,
            code_behind_class,
        })
    }

    /// File name prefix shared by nested classes of [`class_file`](Self::class_file),
    /// e.g. `View$` for `View.class`.
    pub fn nested_prefix(&self) -> String {
        let base = self
            .class_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{base}$")
    }

    /// Class files of nested classes currently on disk next to
    /// [`class_file`](Self::class_file), sorted by path.
    pub fn nested_class_files(&self) -> MasonResult<Vec<PathBuf>> {
        let Some(dir) = self.class_file.parent() else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = self.nested_prefix();
        let entries = std::fs::read_dir(dir).map_err(|e| MasonError::io(dir, e))?;

        let mut nested = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MasonError::io(dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".class") {
                nested.push(entry.path());
            }
        }
        nested.sort();
        Ok(nested)
    }

    /// Every output this unit owns: generated source, class file, and
    /// code-behind class if any.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        [
            Some(self.generated_source.as_path()),
            Some(self.class_file.as_path()),
            self.code_behind_class.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

fn stem(path: &Path) -> MasonResult<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| MasonError::internal(format!("{} has no file name", path.display())))
}

/// All compilation units of one session, grouped by source directory.
///
/// Holds exactly one unit per markup file. Iteration order is by source
/// directory, then registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationUnitCollection {
    units: BTreeMap<PathBuf, Vec<CompilationUnit>>,
    /// Markup file to its source directory and position in that list.
    index: HashMap<PathBuf, (PathBuf, usize)>,
}

impl CompilationUnitCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `unit` under `source_dir`. Returns `false` (and keeps the
    /// existing unit) if its markup file is already registered.
    pub fn insert(&mut self, source_dir: &Path, unit: CompilationUnit) -> bool {
        if self.index.contains_key(&unit.markup_file) {
            return false;
        }
        let units = self.units.entry(source_dir.to_path_buf()).or_default();
        self.index.insert(
            unit.markup_file.clone(),
            (source_dir.to_path_buf(), units.len()),
        );
        units.push(unit);
        true
    }

    /// Looks up the unit for `markup_file`.
    pub fn get(&self, markup_file: &Path) -> Option<&CompilationUnit> {
        let (dir, position) = self.index.get(markup_file)?;
        self.units.get(dir)?.get(*position)
    }

    /// Iterates over `(source_dir, unit)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &CompilationUnit)> {
        self.units
            .iter()
            .flat_map(|(dir, units)| units.iter().map(move |u| (dir.as_path(), u)))
    }

    /// Iterates over the units only.
    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.values().flatten()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    /// Returns `true` if no unit is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generated source files of every unit.
    pub fn generated_sources(&self) -> Vec<PathBuf> {
        self.units().map(|u| u.generated_source.clone()).collect()
    }

    /// Expected class files of every unit.
    pub fn class_files(&self) -> Vec<PathBuf> {
        self.units().map(|u| u.class_file.clone()).collect()
    }

    /// Every output of every unit (see [`CompilationUnit::outputs`]).
    pub fn all_outputs(&self) -> Vec<PathBuf> {
        self.units()
            .flat_map(CompilationUnit::outputs)
            .map(Path::to_path_buf)
            .collect()
    }
}
