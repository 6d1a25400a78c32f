//! The per-scope artifact cache.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use mason_classfile::{has_attribute, MARKER_ATTRIBUTE};
use mason_common::{ContentHash, MasonResult};
use mason_session::CompilationUnit;

use crate::error::CacheError;
use crate::hasher::hash_files;
use crate::manifest::{CacheManifest, UnitEntry};

/// Subdirectory of the cache directory that mirrors the classes directory.
const CLASSES_SUBDIR: &str = "classes";

/// What a [`ArtifactCache::restore`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Units whose class files now match the cache.
    pub restored: Vec<CompilationUnit>,
    /// Units the cache could not satisfy. These must be recompiled.
    pub unsatisfied: Vec<CompilationUnit>,
    /// Number of target files rewritten.
    pub writes: usize,
}

/// Snapshot store for one scope's post-processed class files.
///
/// Every file write goes through a temporary file in the destination
/// directory followed by a rename, so readers never see a partial class file.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    cache_dir: PathBuf,
    classes_dir: PathBuf,
    version: String,
}

impl ArtifactCache {
    /// Creates a cache rooted at `cache_dir` for class files under
    /// `classes_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>, classes_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            classes_dir: classes_dir.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Overrides the version recorded in, and required of, the manifest.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Root directory of this cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The current manifest, or an empty one if none is usable.
    pub fn manifest(&self) -> CacheManifest {
        CacheManifest::load_compatible(&self.cache_dir, &self.version)
    }

    /// Location of the cached copy of `relative` (relative to the classes
    /// directory).
    pub fn entry_path(&self, relative: &Path) -> PathBuf {
        self.cache_dir.join(CLASSES_SUBDIR).join(relative)
    }

    /// Replaces the whole cache with the current class files of `units`.
    ///
    /// Returns the number of units cached.
    pub fn snapshot<'a, I>(&self, units: I) -> MasonResult<usize>
    where
        I: IntoIterator<Item = &'a CompilationUnit>,
    {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)
                .map_err(|e| CacheError::io(&self.cache_dir, e))?;
        }
        let mut manifest = CacheManifest::new(&self.version);
        let stored = self.store_units(&mut manifest, units.into_iter().collect())?;
        manifest.save(&self.cache_dir)?;
        tracing::debug!(cache = %self.cache_dir.display(), units = stored, "snapshot cache");
        Ok(stored)
    }

    /// Refreshes the entries of `units`, leaving every other entry intact.
    ///
    /// Returns the number of units cached.
    pub fn update<'a, I>(&self, units: I) -> MasonResult<usize>
    where
        I: IntoIterator<Item = &'a CompilationUnit>,
    {
        let mut manifest = self.manifest();
        let stored = self.store_units(&mut manifest, units.into_iter().collect())?;
        manifest.save(&self.cache_dir)?;
        tracing::debug!(cache = %self.cache_dir.display(), units = stored, "updated cache");
        Ok(stored)
    }

    /// Brings the class files of `units` back to their cached bytes.
    ///
    /// A target that already matches its cache entry is not written. A unit
    /// is unsatisfied when it has no entry, when its markup changed since the
    /// snapshot, or when any cached file is unreadable or unmarked.
    pub fn restore(&self, units: &[CompilationUnit]) -> MasonResult<RestoreOutcome> {
        let manifest = self.manifest();
        let hashes = hash_files(units.iter().map(|u| u.markup_file.as_path()));

        let mut outcome = RestoreOutcome::default();
        for unit in units {
            let Some(files) = self.cached_files(&manifest, &hashes, unit) else {
                outcome.unsatisfied.push(unit.clone());
                continue;
            };
            for (target, bytes) in files {
                let current = std::fs::read(&target).ok();
                if current.as_deref() != Some(bytes.as_slice()) {
                    write_atomic(&target, &bytes)?;
                    outcome.writes += 1;
                }
            }
            outcome.restored.push(unit.clone());
        }

        tracing::debug!(
            restored = outcome.restored.len(),
            unsatisfied = outcome.unsatisfied.len(),
            writes = outcome.writes,
            "restored from cache"
        );
        Ok(outcome)
    }

    fn store_units(
        &self,
        manifest: &mut CacheManifest,
        units: Vec<&CompilationUnit>,
    ) -> MasonResult<usize> {
        let hashes = hash_files(units.iter().map(|u| u.markup_file.as_path()));
        let mut stored = 0;

        for unit in units {
            let previous = manifest.units.remove(&unit.markup_file);
            let Some(markup_hash) = hashes.get(&unit.markup_file).copied() else {
                tracing::warn!(file = %unit.markup_file.display(), "markup vanished; not cached");
                continue;
            };

            let class_file = self.relative(&unit.class_file)?;
            let nested = unit
                .nested_class_files()?
                .iter()
                .map(|p| self.relative(p))
                .collect::<Result<Vec<_>, _>>()?;
            let entry = UnitEntry {
                class_file,
                nested,
                markup_hash,
            };

            if let Some(previous) = previous {
                for old in previous.files().filter(|f| !entry.files().any(|n| n == *f)) {
                    remove_entry(&self.entry_path(old));
                }
            }
            for relative in entry.files() {
                let source = self.classes_dir.join(relative);
                let bytes = std::fs::read(&source).map_err(|e| CacheError::io(&source, e))?;
                write_atomic(&self.entry_path(relative), &bytes)?;
            }

            manifest.units.insert(unit.markup_file.clone(), entry);
            stored += 1;
        }
        Ok(stored)
    }

    fn cached_files(
        &self,
        manifest: &CacheManifest,
        hashes: &HashMap<PathBuf, ContentHash>,
        unit: &CompilationUnit,
    ) -> Option<Vec<(PathBuf, Vec<u8>)>> {
        let entry = manifest.units.get(&unit.markup_file)?;
        if hashes.get(&unit.markup_file) != Some(&entry.markup_hash) {
            tracing::debug!(file = %unit.markup_file.display(), "markup changed since snapshot");
            return None;
        }
        if self.classes_dir.join(&entry.class_file) != unit.class_file {
            return None;
        }
        if !has_attribute(&self.entry_path(&entry.class_file), MARKER_ATTRIBUTE) {
            return None;
        }

        entry
            .files()
            .map(|relative| {
                let bytes = std::fs::read(self.entry_path(relative)).ok()?;
                Some((self.classes_dir.join(relative), bytes))
            })
            .collect()
    }

    fn relative(&self, class_file: &Path) -> Result<PathBuf, CacheError> {
        class_file
            .strip_prefix(&self.classes_dir)
            .map(Path::to_path_buf)
            .map_err(|_| CacheError::OutsideClasses {
                path: class_file.to_path_buf(),
            })
    }
}

/// Deletes a cache entry the manifest no longer lists. An entry that cannot
/// be deleted is logged and left behind; returns `false` in that case.
fn remove_entry(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not delete orphaned cache entry");
            false
        }
    }
}

/// Writes `data` to `path` through a sibling temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| CacheError::io(path, e))?;
    tmp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}
