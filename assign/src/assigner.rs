use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use faceid_vecstore::{IndexReader, PrototypeIndex, SearchResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decision::{Action, Decision};
use crate::error::AssignError;

/// Controls the assignment thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignConfig {
    /// Minimum similarity for an automatic assignment.
    /// Default: 0.55.
    pub auto_assign_min: f32,

    /// Minimum similarity for a candidate to be considered at all; matches
    /// between this and `auto_assign_min` go to review.
    /// Default: 0.50.
    pub review_min: f32,

    /// Maximum number of candidates returned with a decision.
    /// Default: 5.
    pub top_k: usize,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            auto_assign_min: 0.55,
            review_min: 0.50,
            top_k: 5,
        }
    }
}

impl AssignConfig {
    /// Checks `0 <= review_min <= auto_assign_min <= 1` and `top_k > 0`.
    pub fn validate(&self) -> Result<(), AssignError> {
        let in_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(self.review_min) || !in_range(self.auto_assign_min) {
            return Err(AssignError::InvalidConfig(format!(
                "thresholds must be within [0, 1]: review_min={}, auto_assign_min={}",
                self.review_min, self.auto_assign_min
            )));
        }
        if self.review_min > self.auto_assign_min {
            return Err(AssignError::InvalidConfig(format!(
                "review_min {} exceeds auto_assign_min {}",
                self.review_min, self.auto_assign_min
            )));
        }
        if self.top_k == 0 {
            return Err(AssignError::InvalidConfig("top_k must be positive".into()));
        }
        Ok(())
    }
}

/// Maps candidates (best first, all at or above `review_min`) to a decision.
pub fn decide(cfg: &AssignConfig, candidates: Vec<SearchResult>) -> Decision {
    let Some(best) = candidates.first() else {
        return Decision::unknown(candidates);
    };
    let action = if best.similarity >= cfg.auto_assign_min {
        Action::AutoAssign
    } else if best.similarity >= cfg.review_min {
        Action::Review
    } else {
        return Decision::unknown(candidates);
    };
    Decision {
        action,
        identity_id: Some(best.identity_id.clone()),
        similarity: best.similarity,
        candidates,
    }
}

/// Resolves embeddings to identities through a shared [`PrototypeIndex`].
///
/// The thresholds form a narrow band: only clear matches are assigned
/// automatically, everything in the band is sent to review, and nothing
/// below it is ever attached to an identity.
pub struct PrototypeAssigner {
    index: Arc<PrototypeIndex>,
    cfg: AssignConfig,
}

impl PrototypeAssigner {
    /// Creates an assigner over `index`, rejecting inconsistent thresholds.
    pub fn new(index: Arc<PrototypeIndex>, cfg: AssignConfig) -> Result<Self, AssignError> {
        cfg.validate()?;
        Ok(Self { index, cfg })
    }

    pub fn index(&self) -> &Arc<PrototypeIndex> {
        &self.index
    }

    pub fn config(&self) -> &AssignConfig {
        &self.cfg
    }

    /// Adjusts thresholds at runtime. The old values stay on error.
    pub fn set_thresholds(
        &mut self,
        auto_assign_min: f32,
        review_min: f32,
    ) -> Result<(), AssignError> {
        let cfg = AssignConfig {
            auto_assign_min,
            review_min,
            top_k: self.cfg.top_k,
        };
        cfg.validate()?;
        self.cfg = cfg;
        Ok(())
    }

    /// Decides the identity of one embedding.
    pub fn assign(&self, embedding: &[f32]) -> Result<Decision, AssignError> {
        let reader = self.index.reader();
        self.assign_with(&reader, embedding)
    }

    /// Decides against an already pinned read view.
    pub fn assign_with(
        &self,
        reader: &IndexReader<'_>,
        embedding: &[f32],
    ) -> Result<Decision, AssignError> {
        let candidates = reader.search(embedding, self.cfg.top_k, self.cfg.review_min)?;
        let decision = decide(&self.cfg, candidates);
        debug!(
            action = %decision.action,
            identity = decision.identity_id.as_deref().unwrap_or(""),
            similarity = decision.similarity,
            "assign: decision"
        );
        Ok(decision)
    }

    /// Decides every item independently and in parallel.
    ///
    /// One read view is held for the whole batch, so no index write can
    /// interleave. A bad item only fails its own entry. When a key repeats,
    /// the last item wins.
    pub fn batch<K>(&self, items: &[(K, Vec<f32>)]) -> HashMap<K, Result<Decision, AssignError>>
    where
        K: Eq + Hash + Clone + Send + Sync,
    {
        let reader = self.index.reader();
        let results: Vec<(K, Result<Decision, AssignError>)> = items
            .par_iter()
            .map(|(key, emb)| (key.clone(), self.assign_with(&reader, emb)))
            .collect();
        results.into_iter().collect()
    }
}
