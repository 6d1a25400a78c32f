//! The two-tier isolation loader.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use mason_common::{MasonError, MasonResult};
use mason_config::RequiredCapability;
use parking_lot::Mutex;

use crate::resolver::{class_resource_name, HostResolver, Origin, Resolved, SearchPathResolver};

/// Resolves the external compiler and its dependencies from a dedicated
/// search path, falling back to the host.
///
/// Class bindings are memoized per loader: once a class name resolves, every
/// later lookup returns the same location and origin, even if the other tier
/// could also provide it.
pub struct IsolationLoader {
    search_path: Vec<PathBuf>,
    fallback: Arc<dyn HostResolver>,
    state: Mutex<LoaderState>,
}

struct LoaderState {
    /// `None` once the loader is closed. Dropping it closes every archive.
    primary: Option<SearchPathResolver>,
    defined: HashMap<String, Resolved>,
}

impl IsolationLoader {
    /// Creates a loader over `search_path` and checks that `entry_point` and
    /// every `required` capability resolve.
    ///
    /// Fails with a configuration error when the entry point is missing, or
    /// when any required capability is missing; in the latter case the error
    /// lists every missing dependency.
    pub fn open(
        search_path: Vec<PathBuf>,
        fallback: Arc<dyn HostResolver>,
        entry_point: &str,
        required: &[RequiredCapability],
    ) -> MasonResult<Self> {
        let loader = Self::new(search_path, fallback)?;
        loader.check_dependencies(entry_point, required)?;
        Ok(loader)
    }

    /// Creates a loader and opens the archives on `search_path`, without
    /// checking any capability.
    ///
    /// Fails if an archive entry cannot be opened.
    pub fn new(search_path: Vec<PathBuf>, fallback: Arc<dyn HostResolver>) -> MasonResult<Self> {
        let primary = SearchPathResolver::open(&search_path)?;
        Ok(Self {
            search_path,
            fallback,
            state: Mutex::new(LoaderState {
                primary: Some(primary),
                defined: HashMap::new(),
            }),
        })
    }

    /// The search path this loader was created with.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Resolves the class `name` (dotted form).
    ///
    /// The search path is tried first, then the host. Returns `None` if
    /// neither tier has it or the loader is closed.
    pub fn load_class(&self, name: &str) -> Option<Resolved> {
        let mut state = self.state.lock();
        let primary = state.primary.as_ref()?;

        if let Some(existing) = state.defined.get(name) {
            return Some(existing.clone());
        }

        let resolved = match primary.find_resource(&class_resource_name(name)) {
            Some((location, entry)) => Resolved {
                name: name.to_string(),
                location,
                entry,
                origin: Origin::SearchPath,
            },
            None => Resolved {
                name: name.to_string(),
                location: self.fallback.find_class(name)?,
                entry: None,
                origin: Origin::Host,
            },
        };

        tracing::trace!(class = name, origin = ?resolved.origin, "bound class");
        state.defined.insert(name.to_string(), resolved.clone());
        Some(resolved)
    }

    /// Resolves the first resource at `path`, search path first.
    pub fn find_resource(&self, path: &str) -> Option<Resolved> {
        let state = self.state.lock();
        let primary = state.primary.as_ref()?;
        let ((location, entry), origin) = match primary.find_resource(path) {
            Some(hit) => (hit, Origin::SearchPath),
            None => ((self.fallback.find_resource(path)?, None), Origin::Host),
        };
        Some(Resolved {
            name: path.to_string(),
            location,
            entry,
            origin,
        })
    }

    /// Returns every resource at `path` from both tiers, search path entries
    /// first, without duplicates.
    pub fn find_resources(&self, path: &str) -> Vec<Resolved> {
        let state = self.state.lock();
        let Some(primary) = state.primary.as_ref() else {
            return Vec::new();
        };

        let host = self
            .fallback
            .find_resources(path)
            .into_iter()
            .map(|location| (location, None));
        let tiers = [
            (primary.find_resources(path), Origin::SearchPath),
            (host.collect(), Origin::Host),
        ];

        let mut out: Vec<Resolved> = Vec::new();
        for (hits, origin) in tiers {
            for (location, entry) in hits {
                if !out.iter().any(|r| r.location == location && r.entry == entry) {
                    out.push(Resolved {
                        name: path.to_string(),
                        location,
                        entry,
                        origin,
                    });
                }
            }
        }
        out
    }

    /// Reads the bytes of a class or resource this loader resolved.
    ///
    /// Search path definitions are read through the loader's own handles,
    /// so this fails once the loader is closed.
    pub fn read(&self, resolved: &Resolved) -> MasonResult<Vec<u8>> {
        match resolved.origin {
            Origin::Host => std::fs::read(&resolved.location)
                .map_err(|e| MasonError::io(&resolved.location, e)),
            Origin::SearchPath => {
                let state = self.state.lock();
                let primary = state
                    .primary
                    .as_ref()
                    .ok_or_else(|| MasonError::internal("isolation loader is closed"))?;
                primary.read(&resolved.location, resolved.entry.as_deref())
            }
        }
    }

    /// Releases the search path. Later lookups find nothing. Safe to call
    /// more than once.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let Some(primary) = state.primary.take() {
            state.defined.clear();
            tracing::debug!(
                entries = self.search_path.len(),
                archives = primary.archives(),
                "closed isolation loader"
            );
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().primary.is_none()
    }

    fn check_dependencies(
        &self,
        entry_point: &str,
        required: &[RequiredCapability],
    ) -> MasonResult<()> {
        if self.load_class(entry_point).is_none() {
            return Err(MasonError::Configuration {
                message: format!("compiler not found: {entry_point}"),
                missing: vec![entry_point.to_string()],
            });
        }

        let missing: Vec<String> = required
            .iter()
            .filter(|cap| self.load_class(&cap.name).is_none())
            .map(|cap| cap.provides.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MasonError::Configuration {
                message: format!("missing module dependencies: {}", missing.join(", ")),
                missing,
            })
        }
    }
}

impl Drop for IsolationLoader {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for IsolationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationLoader")
            .field("search_path", &self.search_path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_jar;
    use crate::resolver::{DirectoryResolver, EmptyResolver};
    use mason_common::ErrorKind;
    use std::path::Path;

    const ENTRY: &str = "org.example.markup.Compiler";

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, rel.as_bytes()).unwrap();
        path
    }

    fn caps() -> Vec<RequiredCapability> {
        vec![
            RequiredCapability {
                name: "javafx.beans.Observable".to_string(),
                provides: "javafx.base".to_string(),
            },
            RequiredCapability {
                name: "javafx.geometry.Bounds".to_string(),
                provides: "javafx.graphics".to_string(),
            },
        ]
    }

    #[test]
    fn opens_when_everything_resolves() {
        let compiler = tempfile::tempdir().unwrap();
        touch(compiler.path(), "org/example/markup/Compiler.class");
        touch(compiler.path(), "javafx/beans/Observable.class");

        let host = tempfile::tempdir().unwrap();
        touch(host.path(), "javafx/geometry/Bounds.class");
        let host = Arc::new(DirectoryResolver::new(vec![host.path().to_path_buf()]));

        let loader =
            IsolationLoader::open(vec![compiler.path().into()], host, ENTRY, &caps()).unwrap();
        assert_eq!(
            loader.load_class("javafx.geometry.Bounds").unwrap().origin,
            Origin::Host
        );
        assert_eq!(loader.load_class(ENTRY).unwrap().origin, Origin::SearchPath);
    }

    #[test]
    fn missing_entry_point_is_configuration_error() {
        let empty = tempfile::tempdir().unwrap();
        let err = IsolationLoader::open(
            vec![empty.path().into()],
            Arc::new(EmptyResolver),
            ENTRY,
            &caps(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("compiler not found"));
    }

    #[test]
    fn missing_capabilities_are_all_named() {
        let compiler = tempfile::tempdir().unwrap();
        touch(compiler.path(), "org/example/markup/Compiler.class");

        let err = IsolationLoader::open(
            vec![compiler.path().into()],
            Arc::new(EmptyResolver),
            ENTRY,
            &caps(),
        )
        .unwrap_err();
        match err {
            MasonError::Configuration { message, missing } => {
                assert_eq!(missing, vec!["javafx.base", "javafx.graphics"]);
                assert_eq!(
                    message,
                    "missing module dependencies: javafx.base, javafx.graphics"
                );
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn search_path_shadows_host_on_first_lookup() {
        let compiler = tempfile::tempdir().unwrap();
        let ours = touch(compiler.path(), "shared/Util.class");
        let host_dir = tempfile::tempdir().unwrap();
        touch(host_dir.path(), "shared/Util.class");

        let loader = IsolationLoader::new(
            vec![compiler.path().into()],
            Arc::new(DirectoryResolver::new(vec![host_dir.path().into()])),
        )
        .unwrap();
        let bound = loader.load_class("shared.Util").unwrap();
        assert_eq!(bound.location, ours);
        assert_eq!(bound.origin, Origin::SearchPath);
    }

    #[test]
    fn host_binding_is_not_replaced_by_search_path() {
        let compiler = tempfile::tempdir().unwrap();
        let host_dir = tempfile::tempdir().unwrap();
        let theirs = touch(host_dir.path(), "shared/Util.class");

        let loader = IsolationLoader::new(
            vec![compiler.path().into()],
            Arc::new(DirectoryResolver::new(vec![host_dir.path().into()])),
        )
        .unwrap();
        assert_eq!(loader.load_class("shared.Util").unwrap().origin, Origin::Host);

        // A same-named class appearing on the search path later does not
        // shadow the definition already bound from the host.
        touch(compiler.path(), "shared/Util.class");
        let again = loader.load_class("shared.Util").unwrap();
        assert_eq!(again.location, theirs);
        assert_eq!(again.origin, Origin::Host);
    }

    #[test]
    fn resources_merge_both_tiers() {
        let compiler = tempfile::tempdir().unwrap();
        let host_dir = tempfile::tempdir().unwrap();
        touch(compiler.path(), "META-INF/services/x");
        touch(host_dir.path(), "META-INF/services/x");

        let loader = IsolationLoader::new(
            vec![compiler.path().into()],
            Arc::new(DirectoryResolver::new(vec![host_dir.path().into()])),
        )
        .unwrap();
        let found = loader.find_resources("META-INF/services/x");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].origin, Origin::SearchPath);
        assert_eq!(found[1].origin, Origin::Host);
    }

    #[test]
    fn single_resource_falls_back_to_host() {
        let compiler = tempfile::tempdir().unwrap();
        let host_dir = tempfile::tempdir().unwrap();
        touch(host_dir.path(), "styles/app.css");

        let loader = IsolationLoader::new(
            vec![compiler.path().into()],
            Arc::new(DirectoryResolver::new(vec![host_dir.path().into()])),
        )
        .unwrap();
        assert_eq!(
            loader.find_resource("styles/app.css").unwrap().origin,
            Origin::Host
        );
        assert!(loader.find_resource("styles/missing.css").is_none());
    }

    #[test]
    fn compiler_resolves_from_a_jar() {
        let dir = tempfile::tempdir().unwrap();
        let jar = write_jar(
            &dir.path().join("libs/compiler.jar"),
            &["org/example/markup/Compiler.class", "javafx/beans/Observable.class"],
        );

        let loader =
            IsolationLoader::open(vec![jar.clone()], Arc::new(EmptyResolver), ENTRY, &caps()[..1])
                .unwrap();
        let entry = loader.load_class(ENTRY).unwrap();
        assert_eq!(entry.origin, Origin::SearchPath);
        assert_eq!(entry.location, jar);
        assert_eq!(entry.entry.as_deref(), Some("org/example/markup/Compiler.class"));
        assert_eq!(loader.read(&entry).unwrap(), b"org/example/markup/Compiler.class");
    }

    #[test]
    fn resources_merge_jar_and_host() {
        let dir = tempfile::tempdir().unwrap();
        let jar = write_jar(&dir.path().join("compiler.jar"), &["META-INF/services/x"]);
        let host_dir = tempfile::tempdir().unwrap();
        let theirs = touch(host_dir.path(), "META-INF/services/x");

        let loader = IsolationLoader::new(
            vec![jar.clone()],
            Arc::new(DirectoryResolver::new(vec![host_dir.path().into()])),
        )
        .unwrap();
        let found = loader.find_resources("META-INF/services/x");
        assert_eq!(found.len(), 2);
        assert_eq!((found[0].location.clone(), found[0].origin), (jar, Origin::SearchPath));
        assert_eq!((found[1].location.clone(), found[1].origin), (theirs, Origin::Host));
        assert_eq!(loader.read(&found[1]).unwrap(), b"META-INF/services/x");
    }

    #[test]
    fn unreadable_archive_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = touch(dir.path(), "libs/compiler.jar");
        let err = IsolationLoader::open(vec![bogus], Arc::new(EmptyResolver), ENTRY, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn close_releases_archives() {
        let dir = tempfile::tempdir().unwrap();
        let jar = write_jar(
            &dir.path().join("compiler.jar"),
            &["org/example/markup/Compiler.class"],
        );
        let loader = IsolationLoader::open(vec![jar], Arc::new(EmptyResolver), ENTRY, &[]).unwrap();
        let entry = loader.load_class(ENTRY).unwrap();

        loader.close();
        assert_eq!(loader.read(&entry).unwrap_err().kind(), ErrorKind::Internal);
        assert!(loader.find_resource("org/example/markup/Compiler.class").is_none());
    }

    #[test]
    fn close_is_idempotent_and_stops_lookups() {
        let compiler = tempfile::tempdir().unwrap();
        touch(compiler.path(), "org/example/markup/Compiler.class");
        let loader = IsolationLoader::open(
            vec![compiler.path().into()],
            Arc::new(EmptyResolver),
            ENTRY,
            &[],
        )
        .unwrap();

        loader.close();
        loader.close();
        assert!(loader.is_closed());
        assert!(loader.load_class(ENTRY).is_none());
        assert!(loader.find_resources("anything").is_empty());
    }
}
