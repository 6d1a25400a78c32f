//! Build-scoped registry of live sessions, one per scope.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use mason_common::{MasonResult, ScopeKey};
use parking_lot::Mutex;

use crate::session::{Session, SessionSpec, Toolchain};

/// Lazily produces a scope's compiler search path.
///
/// Resolution may be slow (dependency resolution in the host), so the
/// registry calls it before taking any lock.
pub trait SearchPathSource: Send + Sync {
    /// Returns the ordered search path entries.
    fn resolve(&self) -> MasonResult<Vec<PathBuf>>;
}

impl SearchPathSource for Vec<PathBuf> {
    fn resolve(&self) -> MasonResult<Vec<PathBuf>> {
        Ok(self.clone())
    }
}

impl SearchPathSource for [PathBuf] {
    fn resolve(&self) -> MasonResult<Vec<PathBuf>> {
        Ok(self.to_vec())
    }
}

type Slot = Arc<Mutex<Option<Arc<Session>>>>;

/// Maps each [`ScopeKey`] to at most one live [`Session`].
///
/// Distinct keys never block each other beyond a brief map access. Calls for
/// the same key are serialized on that key's slot.
#[derive(Default)]
pub struct SessionRegistry {
    slots: DashMap<ScopeKey, Slot>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new session for `key`, closing any session already registered
    /// under it.
    ///
    /// On failure the key is left without a session.
    pub fn new_session(
        &self,
        key: &ScopeKey,
        search_path: &dyn SearchPathSource,
        spec: SessionSpec,
        toolchain: &Toolchain,
    ) -> MasonResult<Arc<Session>> {
        let search_path = search_path.resolve()?;

        loop {
            let slot = self.slots.entry(key.clone()).or_default().value().clone();
            let mut current = slot.lock();
            // `release` may have unmapped the slot before we locked it.
            if !self.is_mapped(key, &slot) {
                continue;
            }

            if let Some(old) = current.take() {
                tracing::debug!(scope = %key, "replacing existing session");
                old.close();
            }
            let session = Arc::new(Session::open(key.clone(), search_path, spec, toolchain)?);
            *current = Some(session.clone());
            return Ok(session);
        }
    }

    /// Returns the live session for `key`, if any.
    pub fn get_session(&self, key: &ScopeKey) -> Option<Arc<Session>> {
        let slot = self.slots.get(key)?.value().clone();
        let current = slot.lock();
        current.as_ref().filter(|s| !s.is_closed()).cloned()
    }

    /// Unregisters `session` if it is still the one registered for its key.
    ///
    /// Does not close it. Returns `true` if an entry was removed.
    pub fn release(&self, session: &Arc<Session>) -> bool {
        let Some(slot) = self.slots.get(session.key()).map(|s| s.value().clone()) else {
            return false;
        };
        let removed = {
            let mut current = slot.lock();
            if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, session)) {
                *current = None;
                true
            } else {
                false
            }
        };
        if removed {
            self.slots.remove_if(session.key(), |_, s| {
                Arc::ptr_eq(s, &slot) && s.try_lock().is_some_and(|g| g.is_none())
            });
        }
        removed
    }

    /// Closes and unregisters every session. Used at build completion.
    pub fn close_all(&self) {
        let mut closed = 0usize;
        for slot in self.snapshot() {
            if let Some(session) = slot.lock().take() {
                session.close();
                closed += 1;
            }
        }
        self.slots
            .retain(|_, slot| slot.try_lock().map_or(true, |g| g.is_some()));
        if closed > 0 {
            tracing::debug!(count = closed, "closed all sessions");
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|slot| slot.lock().as_ref().is_some_and(|s| !s.is_closed()))
            .count()
    }

    /// Returns `true` if no live session is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map locks are never awaited while a slot is held elsewhere, so a
    /// caller holding a slot may consult the map.
    fn is_mapped(&self, key: &ScopeKey, slot: &Slot) -> bool {
        self.slots
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s.value(), slot))
    }

    fn snapshot(&self) -> Vec<Slot> {
        self.slots.iter().map(|e| e.value().clone()).collect()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("live", &self.len())
            .finish()
    }
}
