//! Cache manifest recording which units the cache can satisfy.
//!
//! Stored as `manifest.json` in the scope's cache directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mason_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::store::write_atomic;

/// Name of the manifest file within the cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Top-level cache manifest for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Version of the tool that wrote this cache. Invalidate on change.
    pub mason_version: String,

    /// Cached units keyed by markup file path.
    pub units: BTreeMap<PathBuf, UnitEntry>,
}

/// Cached state for a single compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    /// Class file path relative to the classes directory.
    pub class_file: PathBuf,

    /// Nested class files, relative to the classes directory.
    pub nested: Vec<PathBuf>,

    /// Hash of the markup file when the snapshot was taken.
    pub markup_hash: ContentHash,
}

impl UnitEntry {
    /// The class file followed by its nested classes.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.class_file.as_path()).chain(self.nested.iter().map(PathBuf::as_path))
    }
}

impl CacheManifest {
    /// Creates an empty manifest for the given version.
    pub fn new(mason_version: &str) -> Self {
        Self {
            mason_version: mason_version.to_string(),
            units: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the cache directory.
    ///
    /// Returns `None` if the file is missing or can't be parsed; the caller
    /// treats that as an empty cache.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(cache_dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Loads the manifest if it was written by `mason_version`, otherwise
    /// starts a new one.
    pub fn load_compatible(cache_dir: &Path, mason_version: &str) -> Self {
        Self::load(cache_dir)
            .filter(|m| m.is_compatible(mason_version))
            .unwrap_or_else(|| Self::new(mason_version))
    }

    /// Saves the manifest atomically, creating the cache directory if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(&cache_dir.join(MANIFEST_FILE), json.as_bytes())
    }

    /// Returns `true` if this manifest was produced by a compatible version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.mason_version == current_version
    }
}
