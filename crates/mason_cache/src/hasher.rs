//! Markup file hashing.
//!
//! The manifest records each unit's markup hash at snapshot time; restoring
//! compares it with the markup currently on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mason_common::ContentHash;
use rayon::prelude::*;

/// Hashes every file in `paths` in parallel.
///
/// Files that cannot be read are left out of the result.
pub fn hash_files<'a, I>(paths: I) -> HashMap<PathBuf, ContentHash>
where
    I: IntoIterator<Item = &'a Path>,
{
    let paths: Vec<&Path> = paths.into_iter().collect();
    paths
        .par_iter()
        .filter_map(|path| {
            ContentHash::from_file(path)
                .ok()
                .map(|hash| (path.to_path_buf(), hash))
        })
        .collect()
}
