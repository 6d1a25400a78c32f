//! Jar and zip search path entries.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use mason_common::{MasonError, MasonResult};
use parking_lot::Mutex;
use zip::ZipArchive;

/// An archive on the search path, open for the lifetime of this value.
///
/// Entry names are indexed once at open time, so lookups never touch the
/// file. Reads go through the single held handle.
pub struct Archive {
    path: PathBuf,
    names: HashSet<String>,
    reader: Mutex<ZipArchive<File>>,
}

impl Archive {
    /// Opens the archive at `path` and indexes its file entries.
    ///
    /// A file that is not a readable zip archive is a configuration error.
    pub fn open(path: &Path) -> MasonResult<Self> {
        let file = File::open(path).map_err(|e| MasonError::io(path, e))?;
        let reader = ZipArchive::new(file).map_err(|e| {
            MasonError::configuration(format!(
                "search path entry {} is not a readable archive: {e}",
                path.display()
            ))
        })?;
        let names = reader
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            names,
            reader: Mutex::new(reader),
        })
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the archive has a file entry called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Reads the entry `name` fully.
    pub fn read(&self, name: &str) -> MasonResult<Vec<u8>> {
        let mut reader = self.reader.lock();
        let mut entry = reader
            .by_name(name)
            .map_err(|e| MasonError::io(&self.path, std::io::Error::from(e)))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| MasonError::io(&self.path, e))?;
        Ok(data)
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("entries", &self.names.len())
            .finish()
    }
}
