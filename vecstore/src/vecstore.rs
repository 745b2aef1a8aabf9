use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::VecError;

/// Prototype is the single representative embedding of one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    /// Identity (person/cluster) the embedding represents.
    pub identity_id: String,

    /// Raw embedding. Normalized by the index on insert.
    pub embedding: Vec<f32>,

    /// Optional human-readable label (e.g. a person's name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Prototype {
    pub fn new(identity_id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            identity_id: identity_id.into(),
            embedding,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// SearchResult is a single hit from a prototype similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identity of the matched prototype.
    pub identity_id: String,

    /// Cosine similarity between the query and the prototype.
    /// Higher values indicate higher similarity.
    pub similarity: f32,

    /// Label stored with the prototype, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// VecIndex is the contract shared by the exact and approximate prototype
/// backends.
///
/// Backends hold no locks of their own; [`crate::PrototypeIndex`] provides
/// reader/writer exclusion around them.
pub trait VecIndex: Send + Sync {
    /// Vector dimension accepted by this index.
    fn dim(&self) -> usize;

    /// Normalize and insert the prototype for `id`, replacing any previous
    /// one. Never reprocesses other prototypes.
    fn add(&mut self, id: &str, embedding: &[f32], label: Option<&str>) -> Result<(), VecError>;

    /// Remove the prototype for `id`. Returns false if it was not present.
    ///
    /// This rebuilds the backend storage from the remaining prototypes and
    /// costs O(n). Keep it off hot paths.
    fn remove(&mut self, id: &str) -> Result<bool, VecError>;

    /// Return up to `k` prototypes with similarity >= `threshold`, ordered
    /// by descending similarity. An empty index yields an empty result.
    fn search(&self, query: &[f32], k: usize, threshold: f32)
        -> Result<Vec<SearchResult>, VecError>;

    /// Normalized stored embedding for `id`.
    fn get(&self, id: &str) -> Option<&[f32]>;

    /// Label stored for `id`.
    fn label(&self, id: &str) -> Option<&str>;

    /// Return the number of prototypes in the index.
    fn count(&self) -> usize;

    /// Return true if the index contains no prototypes.
    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Remove every prototype.
    fn clear(&mut self);

    /// Replace the entire contents in one pass. All items are validated
    /// before anything is committed; later duplicates of an id win.
    fn bulk_load(&mut self, prototypes: Vec<Prototype>) -> Result<(), VecError>;

    /// All prototypes in insertion order, with normalized embeddings.
    fn prototypes(&self) -> Vec<Prototype>;
}

/// A scored row awaiting top-k selection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scored {
    pub(crate) row: usize,
    pub(crate) order: u64,
    pub(crate) similarity: f32,
}

fn by_rank(a: &Scored, b: &Scored) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then(a.order.cmp(&b.order))
}

/// Keeps the best `k` rows sorted by descending similarity; ties fall back
/// to insertion order.
pub(crate) fn top_k(mut scored: Vec<Scored>, k: usize) -> Vec<Scored> {
    if k == 0 {
        return Vec::new();
    }
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_by(by_rank);
    scored
}

/// Reserves room for `n` more items or reports exhaustion.
pub(crate) fn try_reserve<T>(v: &mut Vec<T>, n: usize) -> Result<(), VecError> {
    v.try_reserve_exact(n)
        .map_err(|e| VecError::ResourceExhausted(format!("reserve {n} items: {e}")))
}

/// Validates a batch and collapses duplicate ids (last one wins, keeping
/// the position of the first occurrence).
pub(crate) fn dedup_batch(
    prototypes: Vec<Prototype>,
    dim: usize,
) -> Result<Vec<Prototype>, VecError> {
    let mut seen: std::collections::HashMap<String, usize> =
        std::collections::HashMap::with_capacity(prototypes.len());
    let mut out: Vec<Prototype> = Vec::new();
    try_reserve(&mut out, prototypes.len())?;
    for p in prototypes {
        if p.identity_id.is_empty() {
            return Err(VecError::EmptyId);
        }
        crate::cosine::validate(&p.embedding, dim)?;
        match seen.get(&p.identity_id) {
            Some(&pos) => out[pos] = p,
            None => {
                seen.insert(p.identity_id.clone(), out.len());
                out.push(p);
            }
        }
    }
    Ok(out)
}
