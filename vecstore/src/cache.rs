use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

use crate::vecstore::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    fingerprint: u64,
    threshold: u32,
    k: usize,
}

struct CacheEntry {
    query: Vec<f32>,
    results: Vec<SearchResult>,
}

/// Bounded cache of search results keyed by query fingerprint, threshold
/// and k.
///
/// Invalidation is coarse: any write to the index clears everything. When
/// the cache is full it is cleared before inserting. A capacity of 0
/// disables caching.
pub(crate) struct QueryCache {
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

fn fingerprint(query: &[f32]) -> u64 {
    let mut h = DefaultHasher::new();
    query.len().hash(&mut h);
    for x in query {
        x.to_bits().hash(&mut h);
    }
    h.finish()
}

fn same_bits(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

impl QueryCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(query: &[f32], k: usize, threshold: f32) -> CacheKey {
        CacheKey {
            fingerprint: fingerprint(query),
            threshold: threshold.to_bits(),
            k,
        }
    }

    pub(crate) fn get(&self, query: &[f32], k: usize, threshold: f32) -> Option<Vec<SearchResult>> {
        if self.capacity == 0 {
            return None;
        }
        let key = Self::key(query, k, threshold);
        let entries = self.entries.lock();
        entries
            .get(&key)
            // Fingerprints can collide; only a bit-identical query is a hit.
            .filter(|e| same_bits(&e.query, query))
            .map(|e| e.results.clone())
    }

    pub(crate) fn put(&self, query: &[f32], k: usize, threshold: f32, results: &[SearchResult]) {
        if self.capacity == 0 {
            return;
        }
        let key = Self::key(query, k, threshold);
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.clear();
        }
        entries.insert(
            key,
            CacheEntry {
                query: query.to_vec(),
                results: results.to_vec(),
            },
        );
    }

    pub(crate) fn invalidate(&self) {
        self.entries.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
