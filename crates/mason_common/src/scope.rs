//! Stable identity keys for compilation scopes.

use std::fmt;
use std::sync::Arc;

use crate::hash::ContentHash;

/// Hex digits of the key digest appended by [`ScopeKey::dir_name`].
const DIGEST_CHARS: usize = 16;

/// Identity of one logical compilation scope (for example one source set of
/// one project).
///
/// Keys are minted by the caller from names that are unique per scope, never
/// from the scope's search path: two independent scopes whose search paths
/// happen to contain the same files must still map to different sessions.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey(Arc<str>);

impl ScopeKey {
    /// Creates a key from an already-qualified scope name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Creates the key for `scope` inside `project`, e.g. `app:main`.
    pub fn for_scope(project: &str, scope: &str) -> Self {
        Self::new(format!("{project}:{scope}"))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a name derived from the key that is safe to use as a single
    /// directory component.
    ///
    /// The readable part replaces unsafe characters, so distinct keys can
    /// share it; the digest suffix of the raw key keeps the names distinct.
    pub fn dir_name(&self) -> String {
        let readable: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let digest = ContentHash::from_bytes(self.0.as_bytes()).to_string();
        format!("{readable}-{}", &digest[..DIGEST_CHARS])
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKey({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equal_names_equal_keys() {
        assert_eq!(ScopeKey::new("app:main"), ScopeKey::for_scope("app", "main"));
    }

    #[test]
    fn distinct_scopes_distinct_keys() {
        let mut set = HashSet::new();
        set.insert(ScopeKey::for_scope("app", "main"));
        set.insert(ScopeKey::for_scope("app", "test"));
        set.insert(ScopeKey::for_scope("lib", "main"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn dir_name_replaces_separators() {
        let name = ScopeKey::for_scope("my app", "main").dir_name();
        assert!(name.starts_with("my_app_main-"), "{name}");
        assert!(!name.contains(['/', ':', ' ']));
    }

    #[test]
    fn dir_name_keeps_sanitized_twins_apart() {
        let spaced = ScopeKey::for_scope("app", "ui kit");
        let underscored = ScopeKey::for_scope("app", "ui_kit");
        assert_ne!(spaced.dir_name(), underscored.dir_name());
        assert_eq!(spaced.dir_name(), ScopeKey::new("app:ui kit").dir_name());
    }

    #[test]
    fn display_is_raw_name() {
        assert_eq!(ScopeKey::new("lib:test").to_string(), "lib:test");
    }
}
