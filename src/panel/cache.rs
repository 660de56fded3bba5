//! Single-entry result memo fenced by document version.
//!
//! An entry is only ever served after the caller has re-read the document
//! version and passed it to [`VersionFencedCache::revalidate`]. A mismatch
//! drops the whole entry.

#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub fingerprint: K,
    pub document_version: u64,
    pub value: V,
}

#[derive(Debug)]
pub struct VersionFencedCache<K, V> {
    entry: Option<CacheEntry<K, V>>,
}

impl<K, V> Default for VersionFencedCache<K, V> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq, V> VersionFencedCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `fingerprint` if one is held, without checking its version.
    pub fn peek(&self, fingerprint: &K) -> Option<&CacheEntry<K, V>> {
        self.entry
            .as_ref()
            .filter(|entry| entry.fingerprint == *fingerprint)
    }

    pub fn peek_mut(&mut self, fingerprint: &K) -> Option<&mut CacheEntry<K, V>> {
        self.entry
            .as_mut()
            .filter(|entry| entry.fingerprint == *fingerprint)
    }

    /// Confirms the entry for `fingerprint` against a freshly read document
    /// version. Returns the entry on a hit; clears it on a version mismatch.
    pub fn revalidate(&mut self, fingerprint: &K, current_version: u64) -> Option<&CacheEntry<K, V>> {
        let stale = match self.peek(fingerprint) {
            Some(entry) => entry.document_version != current_version,
            None => return None,
        };

        if stale {
            self.entry = None;
            return None;
        }

        self.entry.as_ref()
    }

    pub fn store(&mut self, entry: CacheEntry<K, V>) {
        self.entry = Some(entry);
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fingerprint: &str, version: u64) -> CacheEntry<String, Vec<usize>> {
        CacheEntry {
            fingerprint: fingerprint.to_string(),
            document_version: version,
            value: vec![1, 2, 3],
        }
    }

    #[test]
    fn revalidate_should_hit_when_fingerprint_and_version_match() {
        let mut cache = VersionFencedCache::new();
        cache.store(entry("q", 4));

        let hit = cache.revalidate(&"q".to_string(), 4).expect("cache hit");
        assert_eq!(hit.value, vec![1, 2, 3]);
        assert!(!cache.is_empty());
    }

    #[test]
    fn revalidate_should_drop_entry_when_document_version_moved() {
        let mut cache = VersionFencedCache::new();
        cache.store(entry("q", 4));

        assert!(cache.revalidate(&"q".to_string(), 5).is_none());
        assert!(cache.is_empty());
        assert!(cache.peek(&"q".to_string()).is_none());
    }

    #[test]
    fn lookup_with_other_fingerprint_should_miss_without_clearing() {
        let mut cache = VersionFencedCache::new();
        cache.store(entry("q", 4));

        assert!(cache.revalidate(&"other".to_string(), 4).is_none());
        assert!(cache.peek(&"q".to_string()).is_some());
    }

    #[test]
    fn store_should_replace_previous_entry_wholesale() {
        let mut cache = VersionFencedCache::new();
        cache.store(entry("a", 1));
        cache.store(entry("b", 2));

        assert!(cache.peek(&"a".to_string()).is_none());
        assert_eq!(cache.peek(&"b".to_string()).map(|e| e.document_version), Some(2));
    }
}
