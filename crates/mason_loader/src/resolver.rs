//! Resolver tiers and the host fallback interface.

use std::path::{Path, PathBuf};

use mason_common::{MasonError, MasonResult};

use crate::archive::Archive;

/// Which tier produced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The compiler's own search path.
    SearchPath,
    /// The host's fallback resolver.
    Host,
}

/// A name bound to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The requested name (class name or resource path).
    pub name: String,
    /// Where the definition lives on disk: the file itself, or the archive
    /// holding it.
    pub location: PathBuf,
    /// The entry inside the archive at `location`, if it came from one.
    pub entry: Option<String>,
    /// The tier that supplied it.
    pub origin: Origin,
}

/// The host environment's own class and resource lookup.
pub trait HostResolver: Send + Sync {
    /// Locates the definition of the class `name` (dotted form).
    fn find_class(&self, name: &str) -> Option<PathBuf> {
        self.find_resource(&class_resource_name(name))
    }

    /// Locates the first resource at `path` (slash-separated).
    fn find_resource(&self, path: &str) -> Option<PathBuf>;

    /// Locates every resource at `path`.
    fn find_resources(&self, path: &str) -> Vec<PathBuf>;
}

/// Converts a dotted class name to its resource path, e.g.
/// `a.b.C` to `a/b/C.class`.
pub fn class_resource_name(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

/// Resolves names against an ordered list of directories.
///
/// A host-side resolver: entries that are not directories are skipped.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
    roots: Vec<PathBuf>,
}

impl DirectoryResolver {
    /// Creates a resolver over `roots`, searched in order.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    /// The configured roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates<'a>(&'a self, path: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        let name = normalize(path);
        self.roots
            .iter()
            .filter(|root| root.is_dir())
            .filter_map(move |root| name.map(|name| root.join(name)))
            .filter(|candidate| candidate.is_file())
    }
}

impl HostResolver for DirectoryResolver {
    fn find_resource(&self, path: &str) -> Option<PathBuf> {
        self.candidates(path).next()
    }

    fn find_resources(&self, path: &str) -> Vec<PathBuf> {
        self.candidates(path).collect()
    }
}

/// A search path hit: a file, or an entry of an archive.
pub(crate) type Hit = (PathBuf, Option<String>);

#[derive(Debug)]
enum Root {
    Directory(PathBuf),
    Archive(Archive),
}

/// The compiler's own search path: directories and archives, in order.
///
/// Entries that do not exist are skipped, as a classpath would. Archives
/// stay open until the resolver is dropped.
#[derive(Debug, Default)]
pub(crate) struct SearchPathResolver {
    roots: Vec<Root>,
}

impl SearchPathResolver {
    /// Opens every archive on `entries`.
    pub(crate) fn open(entries: &[PathBuf]) -> MasonResult<Self> {
        let mut roots = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_dir() {
                roots.push(Root::Directory(entry.clone()));
            } else if entry.is_file() {
                roots.push(Root::Archive(Archive::open(entry)?));
            } else {
                tracing::debug!(path = %entry.display(), "search path entry does not exist");
            }
        }
        Ok(Self { roots })
    }

    /// Number of open archives.
    pub(crate) fn archives(&self) -> usize {
        self.roots
            .iter()
            .filter(|root| matches!(root, Root::Archive(_)))
            .count()
    }

    pub(crate) fn find_resource(&self, path: &str) -> Option<Hit> {
        self.hits(path).next()
    }

    pub(crate) fn find_resources(&self, path: &str) -> Vec<Hit> {
        self.hits(path).collect()
    }

    /// Reads a hit produced by this resolver.
    pub(crate) fn read(&self, location: &Path, entry: Option<&str>) -> MasonResult<Vec<u8>> {
        let Some(name) = entry else {
            return std::fs::read(location).map_err(|e| MasonError::io(location, e));
        };
        let archive = self
            .roots
            .iter()
            .find_map(|root| match root {
                Root::Archive(archive) if archive.path() == location => Some(archive),
                _ => None,
            })
            .ok_or_else(|| {
                MasonError::internal(format!("{} is not on the search path", location.display()))
            })?;
        archive.read(name)
    }

    fn hits<'a>(&'a self, path: &'a str) -> impl Iterator<Item = Hit> + 'a {
        let name = normalize(path);
        self.roots.iter().filter_map(move |root| {
            let name = name?;
            match root {
                Root::Directory(dir) => {
                    let candidate = dir.join(name);
                    candidate.is_file().then_some((candidate, None))
                }
                Root::Archive(archive) => archive
                    .contains(name)
                    .then(|| (archive.path().to_path_buf(), Some(name.to_string()))),
            }
        })
    }
}

/// A host that provides nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl HostResolver for EmptyResolver {
    fn find_resource(&self, _path: &str) -> Option<PathBuf> {
        None
    }

    fn find_resources(&self, _path: &str) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Strips leading slashes from a resource path, refusing anything that
/// could step outside a root.
fn normalize(path: &str) -> Option<&str> {
    let trimmed = path.trim_start_matches('/');
    let valid = !trimmed.is_empty()
        && trimmed
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");
    valid.then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn class_names_map_to_resources() {
        assert_eq!(
            class_resource_name("org.example.markup.Compiler"),
            "org/example/markup/Compiler.class"
        );
    }

    #[test]
    fn first_root_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let in_a = touch(a.path(), "pkg/Thing.class");
        touch(b.path(), "pkg/Thing.class");

        let resolver = DirectoryResolver::new(vec![a.path().into(), b.path().into()]);
        assert_eq!(resolver.find_class("pkg.Thing"), Some(in_a));
        assert_eq!(resolver.find_resources("pkg/Thing.class").len(), 2);
    }

    #[test]
    fn non_directory_roots_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let jar = touch(dir.path(), "compiler.jar");
        let resolver = DirectoryResolver::new(vec![jar]);
        assert!(resolver.find_resource("compiler.jar").is_none());
    }

    #[test]
    fn parent_components_are_refused() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        touch(outer.path(), "secret.txt");

        let resolver = DirectoryResolver::new(vec![root]);
        assert!(resolver.find_resource("../secret.txt").is_none());
        assert!(resolver.find_resource("").is_none());
    }

    #[test]
    fn search_path_mixes_directories_and_archives_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        touch(&classes, "pkg/Local.class");
        let jar = crate::archive::tests::write_jar(
            &dir.path().join("lib.jar"),
            &["pkg/Local.class", "pkg/Packed.class"],
        );

        let resolver = SearchPathResolver::open(&[
            classes.clone(),
            dir.path().join("absent"),
            jar.clone(),
        ])
        .unwrap();
        assert_eq!(resolver.archives(), 1);
        assert_eq!(
            resolver.find_resource("pkg/Local.class"),
            Some((classes.join("pkg/Local.class"), None))
        );
        assert_eq!(
            resolver.find_resource("/pkg/Packed.class"),
            Some((jar.clone(), Some("pkg/Packed.class".to_string())))
        );
        assert_eq!(resolver.find_resources("pkg/Local.class").len(), 2);
        assert_eq!(
            resolver.read(&jar, Some("pkg/Packed.class")).unwrap(),
            b"pkg/Packed.class"
        );
    }

    #[test]
    fn archive_lookups_refuse_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let jar = crate::archive::tests::write_jar(&dir.path().join("lib.jar"), &["a/B.class"]);
        let resolver = SearchPathResolver::open(&[jar]).unwrap();
        assert!(resolver.find_resource("a/../a/B.class").is_none());
        assert!(resolver.find_resource("a/B.class").is_some());
    }

    #[test]
    fn empty_resolver_finds_nothing() {
        assert!(EmptyResolver.find_class("java.lang.Object").is_none());
        assert!(EmptyResolver.find_resources("a").is_empty());
    }
}
