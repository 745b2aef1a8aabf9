use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::QueryCache;
use crate::error::VecError;
use crate::flat::FlatIndex;
#[cfg(feature = "ivf")]
use crate::ivf::{IvfConfig, IvfIndex};
use crate::vecstore::{Prototype, SearchResult, VecIndex};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// IndexConfig configures a [`PrototypeIndex`] and its backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Embedding dimension. Default: 512.
    pub dim: usize,
    /// Prototype count at which the approximate backend is chosen.
    /// Default: 10000.
    pub approx_threshold: usize,
    /// Approximate backend partition count. Default: 100.
    pub partitions: usize,
    /// Minimum approximate backend partitions scanned per query. Default: 16.
    pub nprobe: usize,
    /// k-means iterations when training partitions. Default: 10.
    pub train_iters: usize,
    /// Seed for partition training.
    pub seed: u64,
    /// Cached search results; 0 disables the cache. Default: 1024.
    pub cache_capacity: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dim: 512,
            approx_threshold: 10_000,
            partitions: 100,
            nprobe: 16,
            train_iters: 10,
            seed: 0,
            cache_capacity: 1024,
        }
    }
}

impl IndexConfig {
    /// Replaces zero-valued knobs with their defaults. `cache_capacity`
    /// keeps 0 because it means "disabled".
    pub fn with_defaults(mut self) -> Self {
        let d = Self::default();
        if self.dim == 0 {
            self.dim = d.dim;
        }
        if self.approx_threshold == 0 {
            self.approx_threshold = d.approx_threshold;
        }
        if self.partitions == 0 {
            self.partitions = d.partitions;
        }
        if self.nprobe == 0 {
            self.nprobe = d.nprobe;
        }
        if self.train_iters == 0 {
            self.train_iters = d.train_iters;
        }
        self
    }

    #[cfg(feature = "ivf")]
    fn ivf(&self) -> IvfConfig {
        IvfConfig {
            dim: self.dim,
            partitions: self.partitions,
            nprobe: self.nprobe,
            train_iters: self.train_iters,
            seed: self.seed,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Which backend a [`PrototypeIndex`] ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Exhaustive flat scan; exact cosine ranking.
    Exact,
    /// Partitioned inverted-file index.
    Approximate,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Approximate => write!(f, "approximate"),
        }
    }
}

/// Backend is the tagged variant behind a [`PrototypeIndex`].
pub enum Backend {
    Exact(FlatIndex),
    #[cfg(feature = "ivf")]
    Approximate(IvfIndex),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Exact(_) => BackendKind::Exact,
            #[cfg(feature = "ivf")]
            Self::Approximate(_) => BackendKind::Approximate,
        }
    }

    fn index(&self) -> &dyn VecIndex {
        match self {
            Self::Exact(b) => b,
            #[cfg(feature = "ivf")]
            Self::Approximate(b) => b,
        }
    }

    fn index_mut(&mut self) -> &mut dyn VecIndex {
        match self {
            Self::Exact(b) => b,
            #[cfg(feature = "ivf")]
            Self::Approximate(b) => b,
        }
    }
}

/// Returns true when the approximate backend is compiled in.
pub fn approximate_available() -> bool {
    cfg!(feature = "ivf")
}

#[cfg(feature = "ivf")]
fn approximate_backend(cfg: &IndexConfig) -> Backend {
    Backend::Approximate(IvfIndex::new(cfg.ivf()))
}

#[cfg(not(feature = "ivf"))]
fn approximate_backend(cfg: &IndexConfig) -> Backend {
    use std::sync::Once;
    use tracing::warn;

    static DOWNGRADE: Once = Once::new();
    DOWNGRADE.call_once(|| {
        warn!("vecstore: approximate backend not available, falling back to exact backend");
    });
    Backend::Exact(FlatIndex::new(cfg.dim))
}

/// Creates the backend for `kind`, downgrading to exact when the
/// approximate backend is not available.
pub fn make_backend(cfg: &IndexConfig, kind: BackendKind) -> Backend {
    match kind {
        BackendKind::Exact => Backend::Exact(FlatIndex::new(cfg.dim)),
        BackendKind::Approximate => approximate_backend(cfg),
    }
}

// ---------------------------------------------------------------------------
// PrototypeIndex
// ---------------------------------------------------------------------------

/// PrototypeIndex owns all prototypes of one deployment.
///
/// Searches run concurrently under a read lock; `add`, `remove`, `clear`
/// and `bulk_load` take the write lock, so they are serialized against each
/// other and against searches. Every write invalidates the query cache while
/// still holding the write lock.
pub struct PrototypeIndex {
    cfg: IndexConfig,
    backend: RwLock<Backend>,
    cache: QueryCache,
}

impl PrototypeIndex {
    /// Create an index sized for about `count_hint` prototypes.
    ///
    /// Below `cfg.approx_threshold` the exact backend is used, at or above
    /// it the approximate one. Panics if `cfg.dim` is 0.
    pub fn open(cfg: IndexConfig, count_hint: usize) -> Self {
        let kind = if count_hint >= cfg.approx_threshold.max(1) {
            BackendKind::Approximate
        } else {
            BackendKind::Exact
        };
        Self::with_backend(cfg, kind)
    }

    /// Create an index with an explicit backend kind.
    /// Panics if `cfg.dim` is 0.
    pub fn with_backend(cfg: IndexConfig, kind: BackendKind) -> Self {
        assert!(cfg.dim > 0, "vecstore: IndexConfig.dim must be positive");
        let backend = make_backend(&cfg, kind);
        info!(
            dim = cfg.dim,
            requested = %kind,
            backend = %backend.kind(),
            "vecstore: prototype index opened"
        );
        Self {
            cache: QueryCache::new(cfg.cache_capacity),
            backend: RwLock::new(backend),
            cfg,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    pub fn dim(&self) -> usize {
        self.cfg.dim
    }

    /// Backend actually in use (after any downgrade).
    pub fn kind(&self) -> BackendKind {
        self.backend.read().kind()
    }

    /// Insert or replace the prototype for `id`.
    pub fn add(&self, id: &str, embedding: &[f32], label: Option<&str>) -> Result<(), VecError> {
        let mut backend = self.backend.write();
        backend.index_mut().add(id, embedding, label)?;
        self.cache.invalidate();
        Ok(())
    }

    /// Remove the prototype for `id`; false if absent.
    ///
    /// O(n): the backend is rebuilt from the remaining prototypes.
    pub fn remove(&self, id: &str) -> Result<bool, VecError> {
        let mut backend = self.backend.write();
        let removed = backend.index_mut().remove(id)?;
        if removed {
            self.cache.invalidate();
        }
        Ok(removed)
    }

    /// Top-k search; see [`VecIndex::search`].
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>, VecError> {
        self.reader().search(query, k, threshold)
    }

    /// Normalized embedding stored for `id`.
    pub fn get(&self, id: &str) -> Option<Vec<f32>> {
        self.backend.read().index().get(id).map(<[f32]>::to_vec)
    }

    /// Label stored for `id`.
    pub fn label(&self, id: &str) -> Option<String> {
        self.backend.read().index().label(id).map(str::to_string)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backend.read().index().get(id).is_some()
    }

    pub fn count(&self) -> usize {
        self.backend.read().index().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn clear(&self) {
        let mut backend = self.backend.write();
        backend.index_mut().clear();
        self.cache.invalidate();
    }

    /// Replace all prototypes in one pass. Nothing is committed if any item
    /// is invalid.
    pub fn bulk_load(&self, prototypes: Vec<Prototype>) -> Result<(), VecError> {
        let n = prototypes.len();
        let mut backend = self.backend.write();
        backend.index_mut().bulk_load(prototypes)?;
        self.cache.invalidate();
        info!(
            prototypes = n,
            backend = %backend.kind(),
            "vecstore: bulk load complete"
        );
        Ok(())
    }

    /// All prototypes in insertion order.
    pub fn prototypes(&self) -> Vec<Prototype> {
        self.backend.read().index().prototypes()
    }

    /// Pins a read view of the index. Writers block until it is dropped.
    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader {
            backend: self.backend.read(),
            cache: &self.cache,
        }
    }
}

/// A consistent read view over a [`PrototypeIndex`].
///
/// Can be shared across threads for data-parallel searches.
pub struct IndexReader<'a> {
    backend: RwLockReadGuard<'a, Backend>,
    cache: &'a QueryCache,
}

impl IndexReader<'_> {
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>, VecError> {
        if let Some(hit) = self.cache.get(query, k, threshold) {
            return Ok(hit);
        }
        let results = self.backend.index().search(query, k, threshold)?;
        self.cache.put(query, k, threshold, &results);
        debug!(k, threshold, hits = results.len(), "vecstore: search");
        Ok(results)
    }

    pub fn count(&self) -> usize {
        self.backend.index().count()
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(dim: usize) -> IndexConfig {
        IndexConfig {
            dim,
            approx_threshold: 100,
            partitions: 4,
            nprobe: 4,
            ..IndexConfig::default()
        }
    }

    #[test]
    fn open_selects_by_count_hint() {
        assert_eq!(PrototypeIndex::open(small(4), 99).kind(), BackendKind::Exact);
        let big = PrototypeIndex::open(small(4), 100);
        if approximate_available() {
            assert_eq!(big.kind(), BackendKind::Approximate);
        } else {
            assert_eq!(big.kind(), BackendKind::Exact);
        }
    }

    #[test]
    fn with_defaults_fills_zeroes() {
        let cfg = IndexConfig {
            dim: 0,
            approx_threshold: 0,
            partitions: 0,
            nprobe: 0,
            train_iters: 0,
            seed: 0,
            cache_capacity: 0,
        }
        .with_defaults();
        assert_eq!(cfg.dim, 512);
        assert_eq!(cfg.approx_threshold, 10_000);
        assert_eq!(cfg.partitions, 100);
        assert_eq!(cfg.cache_capacity, 0);
    }

    #[test]
    fn writes_invalidate_cache() {
        let idx = PrototypeIndex::open(small(2), 0);
        idx.add("a", &[1.0, 0.0], None).unwrap();

        let q = [1.0, 0.1];
        assert_eq!(idx.search(&q, 5, 0.5).unwrap().len(), 1);
        assert_eq!(idx.cache.len(), 1);

        idx.add("b", &[1.0, 0.2], None).unwrap();
        assert_eq!(idx.cache.len(), 0);
        assert_eq!(idx.search(&q, 5, 0.5).unwrap().len(), 2);

        assert!(idx.remove("a").unwrap());
        let hits = idx.search(&q, 5, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].identity_id, "b");

        idx.clear();
        assert!(idx.search(&q, 5, 0.5).unwrap().is_empty());
    }

    #[test]
    fn failed_remove_keeps_cache() {
        let idx = PrototypeIndex::open(small(2), 0);
        idx.add("a", &[1.0, 0.0], None).unwrap();
        idx.search(&[1.0, 0.0], 1, 0.0).unwrap();
        assert!(!idx.remove("missing").unwrap());
        assert_eq!(idx.cache.len(), 1);
    }

    #[test]
    fn get_label_contains() {
        let idx = PrototypeIndex::open(small(2), 0);
        idx.add("a", &[3.0, 4.0], Some("alice")).unwrap();
        assert!(idx.contains("a"));
        assert!(!idx.contains("b"));
        let v = idx.get("a").unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        assert_eq!(idx.label("a").as_deref(), Some("alice"));
        assert!(idx.get("b").is_none());
    }

    #[test]
    fn reader_blocks_nothing_for_reads() {
        let idx = PrototypeIndex::open(small(2), 0);
        idx.add("a", &[1.0, 0.0], None).unwrap();
        let r1 = idx.reader();
        let r2 = idx.reader();
        assert_eq!(r1.count(), 1);
        assert_eq!(r2.search(&[1.0, 0.0], 1, 0.0).unwrap().len(), 1);
    }
}
