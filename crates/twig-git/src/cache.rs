use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use twig_types::ObjectId;

use crate::object::RawObject;
use crate::pack::PackFile;

/// Hit/miss counters for a [`ReaderCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Objects currently held.
    pub objects: usize,
    /// Pack files currently loaded, across all object directories.
    pub packs: usize,
}

/// Memoized objects and parsed packs for one loaded repository.
///
/// Objects are immutable once written, so a cached entry never goes stale
/// while the same upload is loaded. A new upload gets a fresh cache; the
/// cache itself never looks at the filesystem.
pub struct ReaderCache {
    objects: RwLock<HashMap<ObjectId, RawObject>>,
    /// Packs per `objects/` directory, loaded on first use.
    packs: RwLock<HashMap<String, Arc<Vec<PackFile>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReaderCache {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            packs: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up an object, counting the hit or miss.
    pub fn get(&self, id: &ObjectId) -> Option<RawObject> {
        let found = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, id: ObjectId, object: RawObject) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, object);
    }

    /// Packs previously loaded for `objects_dir`.
    pub fn packs(&self, objects_dir: &str) -> Option<Arc<Vec<PackFile>>> {
        self.packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(objects_dir)
            .cloned()
    }

    /// Remember the packs for `objects_dir`. A concurrent load that got
    /// there first wins, and its list is returned.
    pub fn store_packs(&self, objects_dir: &str, packs: Vec<PackFile>) -> Arc<Vec<PackFile>> {
        self.packs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(objects_dir.to_string())
            .or_insert_with(|| Arc::new(packs))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.objects.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.packs.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let packs = self
            .packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|list| list.len())
            .sum();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            objects: self.len(),
            packs,
        }
    }
}

impl Default for ReaderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReaderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("ReaderCache")
            .field("objects", &stats.objects)
            .field("packs", &stats.packs)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    #[test]
    fn counts_hits_and_misses() {
        let cache = ReaderCache::new();
        let object = RawObject::new(ObjectKind::Blob, b"x".to_vec());
        let id = object.id();

        assert!(cache.get(&id).is_none());
        cache.insert(id, object.clone());
        assert_eq!(cache.get(&id), Some(object));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.objects, 1);
    }

    #[test]
    fn first_pack_list_wins() {
        let cache = ReaderCache::new();
        assert!(cache.packs("/.git/objects").is_none());
        let first = cache.store_packs("/.git/objects", Vec::new());
        let again = cache.store_packs("/.git/objects", Vec::new());
        assert!(Arc::ptr_eq(&first, &again));
        assert!(cache.packs("/.git/objects").is_some());
        assert!(cache.packs("/other/objects").is_none());
    }

    #[test]
    fn clear_resets_everything() {
        let cache = ReaderCache::new();
        let object = RawObject::new(ObjectKind::Blob, b"y".to_vec());
        cache.insert(object.id(), object);
        cache.store_packs("/o", Vec::new());
        cache.get(&ObjectId::null());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(cache.packs("/o").is_none());
    }

    #[test]
    fn debug_shows_counts() {
        let cache = ReaderCache::new();
        let s = format!("{cache:?}");
        assert!(s.contains("ReaderCache"));
        assert!(s.contains("objects: 0"));
    }
}
