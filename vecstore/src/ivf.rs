use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::cosine::{dot, l2_normalize, validate};
use crate::error::VecError;
use crate::vecstore::{dedup_batch, top_k, try_reserve, Prototype, Scored, SearchResult, VecIndex};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// IvfConfig configures a new inverted-file index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfConfig {
    /// Vector dimension. Required; must be positive.
    pub dim: usize,
    /// Number of partitions trained by k-means on bulk load.
    /// Default: 100.
    pub partitions: usize,
    /// Minimum number of partitions scanned per query. Further partitions
    /// are scanned while their similarity bound can still beat the k-th hit.
    /// Default: 16.
    pub nprobe: usize,
    /// k-means iterations during training.
    /// Default: 10.
    pub train_iters: usize,
    /// Seed for centroid initialisation, so training is reproducible.
    pub seed: u64,
}

/// Training sample cap per partition.
const MAX_POINTS_PER_PARTITION: usize = 256;

/// Slack on partition bounds for f32 rounding in stored dot products.
const BOUND_SLACK: f64 = 1e-4;

impl IvfConfig {
    pub(crate) fn set_defaults(&mut self) {
        if self.partitions == 0 {
            self.partitions = 100;
        }
        if self.nprobe == 0 {
            self.nprobe = 16;
        }
        if self.train_iters == 0 {
            self.train_iters = 10;
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

struct Entry {
    id: String,
    vector: Vec<f32>,
    label: Option<String>,
    order: u64,
    /// Partition holding this entry; None while untrained.
    list: Option<usize>,
}

// ---------------------------------------------------------------------------
// IvfIndex
// ---------------------------------------------------------------------------

/// IvfIndex is the approximate backend: prototypes are bucketed under the
/// nearest of `partitions` k-means centroids.
///
/// Each partition keeps its angular radius, the lowest member·centroid
/// similarity seen. A query scans partitions by decreasing similarity bound
/// (query-to-centroid angle minus radius) and stops once the next bound
/// falls below the current k-th hit, after at least `nprobe` partitions.
/// Clustered data is answered from a few partitions; spread-out data falls
/// back towards a full scan, so results always match an exact search.
///
/// Centroids are trained once by [`VecIndex::bulk_load`]. Later adds are
/// routed to the nearest existing centroid without retraining. Until the
/// first bulk load every entry sits in an untrained list that is scanned
/// exhaustively. Every returned similarity is computed exactly against the
/// stored vector.
pub struct IvfIndex {
    cfg: IvfConfig,
    entries: Vec<Entry>,
    slots: HashMap<String, usize>,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<usize>>,
    /// Lowest member·centroid similarity per list. Only lowered, never
    /// raised on removal, so it stays a valid bound.
    radii: Vec<f32>,
    untrained: Vec<usize>,
    next_order: u64,
}

impl IvfIndex {
    /// Create an empty index with the given configuration.
    /// Panics if `cfg.dim` is not positive.
    pub fn new(mut cfg: IvfConfig) -> Self {
        assert!(cfg.dim > 0, "vecstore: IvfConfig.dim must be positive");
        cfg.set_defaults();
        Self {
            cfg,
            entries: Vec::new(),
            slots: HashMap::new(),
            centroids: Vec::new(),
            lists: Vec::new(),
            radii: Vec::new(),
            untrained: Vec::new(),
            next_order: 0,
        }
    }

    /// Number of trained partitions (0 before the first bulk load).
    pub fn partitions(&self) -> usize {
        self.centroids.len()
    }

    /// Adjust the number of partitions scanned per query.
    pub fn set_nprobe(&mut self, nprobe: usize) {
        self.cfg.nprobe = nprobe.max(1);
    }

    fn nearest_centroid(&self, v: &[f32]) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, c) in self.centroids.iter().enumerate() {
            let s = dot(v, c);
            if best.map_or(true, |(_, bs)| s > bs) {
                best = Some((i, s));
            }
        }
        best
    }

    /// Lists ordered by the best similarity any member could reach against
    /// `q`, highest first. Empty lists are skipped.
    fn probe_order(&self, q: &[f32]) -> Vec<(usize, f64)> {
        let mut order: Vec<(usize, f64)> = self
            .centroids
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.lists[*i].is_empty())
            .map(|(i, c)| (i, similarity_bound(dot(q, c), self.radii[i])))
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        order
    }

    /// Scores `slots` against `q`, keeping `best` as the sorted top-k
    /// similarities seen so far.
    fn score_slots(
        &self,
        q: &[f32],
        slots: &[usize],
        threshold: f32,
        k: usize,
        scored: &mut Vec<Scored>,
        best: &mut Vec<f32>,
    ) {
        for &slot in slots {
            let e = &self.entries[slot];
            let similarity = dot(q, &e.vector);
            if similarity < threshold {
                continue;
            }
            let at = best.partition_point(|&s| s >= similarity);
            if at < k {
                best.insert(at, similarity);
                best.truncate(k);
            }
            scored.push(Scored {
                row: slot,
                order: e.order,
                similarity,
            });
        }
    }

    fn detach(&mut self, slot: usize) {
        match self.entries[slot].list {
            Some(l) => self.lists[l].retain(|&s| s != slot),
            None => self.untrained.retain(|&s| s != slot),
        }
    }

    fn attach(&mut self, slot: usize) {
        match self.nearest_centroid(&self.entries[slot].vector) {
            Some((l, sim)) => {
                self.entries[slot].list = Some(l);
                self.lists[l].push(slot);
                self.radii[l] = self.radii[l].min(sim);
            }
            None => {
                self.entries[slot].list = None;
                self.untrained.push(slot);
            }
        }
    }

    /// Rebuilds entries and inverted lists from the kept entries, keeping
    /// their existing partition assignments.
    fn rebuild(&mut self, skip: usize) -> Result<(), VecError> {
        let old = std::mem::take(&mut self.entries);
        let mut entries = Vec::new();
        if let Err(e) = try_reserve(&mut entries, old.len().saturating_sub(1)) {
            self.entries = old;
            return Err(e);
        }

        let mut slots = HashMap::with_capacity(old.len());
        let mut lists = vec![Vec::new(); self.centroids.len()];
        let mut untrained = Vec::new();
        for (slot, e) in old.into_iter().enumerate() {
            if slot == skip {
                continue;
            }
            let new_slot = entries.len();
            slots.insert(e.id.clone(), new_slot);
            match e.list {
                Some(l) => lists[l].push(new_slot),
                None => untrained.push(new_slot),
            }
            entries.push(e);
        }

        self.entries = entries;
        self.slots = slots;
        self.lists = lists;
        self.untrained = untrained;
        Ok(())
    }
}

impl VecIndex for IvfIndex {
    fn dim(&self) -> usize {
        self.cfg.dim
    }

    fn add(&mut self, id: &str, embedding: &[f32], label: Option<&str>) -> Result<(), VecError> {
        if id.is_empty() {
            return Err(VecError::EmptyId);
        }
        validate(embedding, self.cfg.dim)?;

        let mut vector = embedding.to_vec();
        l2_normalize(&mut vector);

        if let Some(&slot) = self.slots.get(id) {
            self.detach(slot);
            self.entries[slot].vector = vector;
            self.entries[slot].label = label.map(str::to_string);
            self.attach(slot);
            return Ok(());
        }

        let slot = self.entries.len();
        self.entries.push(Entry {
            id: id.to_string(),
            vector,
            label: label.map(str::to_string),
            order: self.next_order,
            list: None,
        });
        self.next_order += 1;
        self.slots.insert(id.to_string(), slot);
        self.attach(slot);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<bool, VecError> {
        let Some(&slot) = self.slots.get(id) else {
            return Ok(false);
        };
        self.rebuild(slot)?;
        debug!(
            id,
            remaining = self.entries.len(),
            partitions = self.centroids.len(),
            "vecstore: ivf index rebuilt after remove"
        );
        Ok(true)
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>, VecError> {
        validate(query, self.cfg.dim)?;
        if self.entries.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored = Vec::new();
        let mut best = Vec::new();
        self.score_slots(&q, &self.untrained, threshold, k, &mut scored, &mut best);

        let mut probed = 0;
        for (rank, (l, bound)) in self.probe_order(&q).into_iter().enumerate() {
            let floor = if best.len() == k { best[k - 1] } else { threshold };
            if rank >= self.cfg.nprobe && bound < f64::from(floor) {
                break;
            }
            self.score_slots(&q, &self.lists[l], threshold, k, &mut scored, &mut best);
            probed += 1;
        }
        trace!(probed, partitions = self.centroids.len(), "vecstore: ivf search");

        Ok(top_k(scored, k)
            .into_iter()
            .map(|s| {
                let e = &self.entries[s.row];
                SearchResult {
                    identity_id: e.id.clone(),
                    similarity: s.similarity,
                    label: e.label.clone(),
                }
            })
            .collect())
    }

    fn get(&self, id: &str) -> Option<&[f32]> {
        self.slots
            .get(id)
            .map(|&s| self.entries[s].vector.as_slice())
    }

    fn label(&self, id: &str) -> Option<&str> {
        self.slots
            .get(id)
            .and_then(|&s| self.entries[s].label.as_deref())
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
        self.centroids.clear();
        self.lists.clear();
        self.radii.clear();
        self.untrained.clear();
    }

    fn bulk_load(&mut self, prototypes: Vec<Prototype>) -> Result<(), VecError> {
        let batch = dedup_batch(prototypes, self.cfg.dim)?;

        let mut entries = Vec::new();
        try_reserve(&mut entries, batch.len())?;
        for (i, p) in batch.into_iter().enumerate() {
            let mut vector = p.embedding;
            l2_normalize(&mut vector);
            entries.push(Entry {
                id: p.identity_id,
                vector,
                label: p.label,
                order: i as u64,
                list: None,
            });
        }

        let refs: Vec<&[f32]> = entries.iter().map(|e| e.vector.as_slice()).collect();
        let centroids = train_centroids(
            &refs,
            self.cfg.partitions,
            self.cfg.train_iters,
            self.cfg.seed,
        );
        drop(refs);

        self.clear();
        self.next_order = entries.len() as u64;
        self.centroids = centroids;
        self.lists = vec![Vec::new(); self.centroids.len()];
        self.radii = vec![1.0; self.centroids.len()];
        self.entries = entries;
        for slot in 0..self.entries.len() {
            self.slots.insert(self.entries[slot].id.clone(), slot);
            self.attach(slot);
        }

        info!(
            prototypes = self.entries.len(),
            partitions = self.centroids.len(),
            "vecstore: ivf index trained"
        );
        Ok(())
    }

    fn prototypes(&self) -> Vec<Prototype> {
        let mut out: Vec<&Entry> = self.entries.iter().collect();
        out.sort_by_key(|e| e.order);
        out.into_iter()
            .map(|e| Prototype {
                identity_id: e.id.clone(),
                embedding: e.vector.clone(),
                label: e.label.clone(),
            })
            .collect()
    }
}

/// Upper bound on `q·x` for any unit `x` within `radius` (a cosine) of a
/// centroid whose similarity to `q` is `centroid_sim`.
fn similarity_bound(centroid_sim: f32, radius: f32) -> f64 {
    let to_centroid = f64::from(centroid_sim).clamp(-1.0, 1.0).acos();
    let spread = f64::from(radius).clamp(-1.0, 1.0).acos();
    let gap = (to_centroid - spread).max(0.0);
    gap.cos() + BOUND_SLACK
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// Spherical k-means over normalized vectors.
///
/// Uses `min(k, n)` centroids, initialised from a seeded random sample.
/// Empty clusters are re-seeded from a random training point.
fn train_centroids(vectors: &[&[f32]], k: usize, iters: usize, seed: u64) -> Vec<Vec<f32>> {
    let n = vectors.len();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }
    let dim = vectors[0].len();
    let mut rng = StdRng::seed_from_u64(seed);

    let train: Vec<&[f32]> = if n > k * MAX_POINTS_PER_PARTITION {
        sample(&mut rng, n, k * MAX_POINTS_PER_PARTITION)
            .into_iter()
            .map(|i| vectors[i])
            .collect()
    } else {
        vectors.to_vec()
    };

    let mut centroids: Vec<Vec<f32>> = sample(&mut rng, train.len(), k)
        .into_iter()
        .map(|i| train[i].to_vec())
        .collect();

    let mut assign = vec![0usize; train.len()];
    for _ in 0..iters {
        let mut changed = false;
        for (i, v) in train.iter().enumerate() {
            let mut best = 0;
            let mut best_sim = f32::NEG_INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let s = dot(v, centroid);
                if s > best_sim {
                    best_sim = s;
                    best = c;
                }
            }
            if assign[i] != best {
                assign[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, v) in train.iter().enumerate() {
            let c = assign[i];
            counts[c] += 1;
            for (acc, x) in sums[c].iter_mut().zip(v.iter()) {
                *acc += *x;
            }
        }
        for (c, mut sum) in sums.into_iter().enumerate() {
            if counts[c] == 0 {
                sum = train[rng.gen_range(0..train.len())].to_vec();
            }
            l2_normalize(&mut sum);
            centroids[c] = sum;
        }

        if !changed {
            break;
        }
    }
    centroids
}
