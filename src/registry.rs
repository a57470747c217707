use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use anyhow::bail;
use rand::RngCore;
use rustc_hash::FxHashMap;

use crate::zid::Zid;

/// Random id assignment gives up after this many consecutive collisions
/// rather than spinning on an exhausted or pathological id space.
pub const MAX_ALLOCATE_ATTEMPTS: usize = 10;

/// Concurrent map of all live connections, keyed by their assigned [Zid].
///
/// Lookups run concurrently with each other; allocation and release take the
/// map exclusively. An entry exists exactly as long as the connection's
/// worker is alive - the worker removes itself via [Registry::release] when
/// it exits.
pub struct Registry<V> {
    entries: RwLock<FxHashMap<Zid, Arc<V>>>,
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Registry::new()
    }
}

impl<V> Registry<V> {
    pub fn new() -> Registry<V> {
        Registry {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Picks a random unused id, builds the value under it and inserts it,
    /// all while holding the map exclusively - the id is never visible
    /// unassigned. `build` is only invoked once a free id has been found.
    pub fn allocate(&self, build: impl FnOnce(Zid) -> Arc<V>) -> anyhow::Result<Arc<V>> {
        self.allocate_with(|| rand::thread_rng().next_u32(), build)
    }

    fn allocate_with(
        &self,
        mut draw: impl FnMut() -> u32,
        build: impl FnOnce(Zid) -> Arc<V>,
    ) -> anyhow::Result<Arc<V>> {
        let mut entries = self.entries.write().unwrap();
        for _ in 0..MAX_ALLOCATE_ATTEMPTS {
            let id = Zid(draw());
            if let Entry::Vacant(vacant) = entries.entry(id) {
                let value = build(id);
                vacant.insert(value.clone());
                return Ok(value);
            }
        }
        bail!("unable to assign an id after {} attempts", MAX_ALLOCATE_ATTEMPTS)
    }

    pub fn lookup(&self, id: Zid) -> Option<Arc<V>> {
        self.entries.read().unwrap().get(&id).cloned()
    }

    /// Removes the mapping. Releasing an id that is not (or no longer)
    /// present is a no-op.
    pub fn release(&self, id: Zid) {
        self.entries.write().unwrap().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_assigns_unique_ids() {
        let registry: Registry<u32> = Registry::new();

        let mut ids = Vec::new();
        for _ in 0..64 {
            let entry = registry.allocate(|id| Arc::new(id.0)).unwrap();
            assert_eq!(registry.lookup(Zid(*entry)).as_deref(), Some(&*entry));
            ids.push(*entry);
        }

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 64);
        assert_eq!(registry.len(), 64);
    }

    #[test]
    fn test_allocate_retries_on_collision() {
        let registry: Registry<&str> = Registry::new();
        registry.allocate_with(|| 7, |_| Arc::new("first")).unwrap();

        let mut draws = [7u32, 7, 3].into_iter();
        registry
            .allocate_with(|| draws.next().unwrap(), |_| Arc::new("second"))
            .unwrap();

        assert_eq!(registry.lookup(Zid(3)).as_deref(), Some(&"second"));
    }

    #[test]
    fn test_allocate_fails_when_ids_exhausted() {
        let registry: Registry<&str> = Registry::new();
        registry.allocate_with(|| 7, |_| Arc::new("occupant")).unwrap();

        let result = registry.allocate_with(|| 7, |_| Arc::new("rejected"));

        assert!(result.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_and_release() {
        let registry: Registry<&str> = Registry::new();
        registry.allocate_with(|| 42, |_| Arc::new("x")).unwrap();

        assert_eq!(registry.lookup(Zid(42)).as_deref(), Some(&"x"));
        assert!(registry.lookup(Zid(43)).is_none());

        registry.release(Zid(42));
        assert!(registry.lookup(Zid(42)).is_none());
        assert!(registry.is_empty());

        // releasing an absent id is fine
        registry.release(Zid(42));
    }
}
