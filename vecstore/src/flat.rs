use std::collections::HashMap;

use tracing::debug;

use crate::cosine::{dot, l2_normalize, validate};
use crate::error::VecError;
use crate::vecstore::{dedup_batch, top_k, try_reserve, Prototype, Scored, SearchResult, VecIndex};

/// FlatIndex is the exact backend: one contiguous row-major matrix of
/// normalized prototypes, scanned in full on every search.
///
/// Adds are O(1) amortized (append a row, or overwrite one in place).
/// There is no native row deletion; [`VecIndex::remove`] rebuilds the
/// matrix from the remaining rows.
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
    ids: Vec<String>,
    labels: Vec<Option<String>>,
    rows: HashMap<String, usize>,
}

impl FlatIndex {
    /// Create an empty index. Panics if `dim` is not positive.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "vecstore: FlatIndex dim must be positive");
        Self {
            dim,
            data: Vec::new(),
            ids: Vec::new(),
            labels: Vec::new(),
            rows: HashMap::new(),
        }
    }

    fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.dim..(r + 1) * self.dim]
    }

    fn row_mut(&mut self, r: usize) -> &mut [f32] {
        let dim = self.dim;
        &mut self.data[r * dim..(r + 1) * dim]
    }

    /// Rebuilds storage from the given rows, keeping their relative order.
    fn rebuild(&mut self, keep: impl Iterator<Item = usize> + Clone) -> Result<(), VecError> {
        let n = keep.clone().count();
        let mut data = Vec::new();
        let mut ids = Vec::new();
        let mut labels = Vec::new();
        try_reserve(&mut data, n * self.dim)?;
        try_reserve(&mut ids, n)?;
        try_reserve(&mut labels, n)?;

        let mut rows = HashMap::with_capacity(n);
        for r in keep {
            data.extend_from_slice(self.row(r));
            rows.insert(self.ids[r].clone(), ids.len());
            ids.push(self.ids[r].clone());
            labels.push(self.labels[r].clone());
        }

        self.data = data;
        self.ids = ids;
        self.labels = labels;
        self.rows = rows;
        Ok(())
    }
}

impl VecIndex for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn add(&mut self, id: &str, embedding: &[f32], label: Option<&str>) -> Result<(), VecError> {
        if id.is_empty() {
            return Err(VecError::EmptyId);
        }
        validate(embedding, self.dim)?;

        if let Some(&r) = self.rows.get(id) {
            let row = self.row_mut(r);
            row.copy_from_slice(embedding);
            l2_normalize(row);
            self.labels[r] = label.map(str::to_string);
            return Ok(());
        }

        let start = self.data.len();
        self.data.extend_from_slice(embedding);
        l2_normalize(&mut self.data[start..]);
        self.rows.insert(id.to_string(), self.ids.len());
        self.ids.push(id.to_string());
        self.labels.push(label.map(str::to_string));
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<bool, VecError> {
        let Some(&gone) = self.rows.get(id) else {
            return Ok(false);
        };
        let total = self.ids.len();
        self.rebuild((0..total).filter(move |&r| r != gone))?;
        debug!(id, remaining = self.ids.len(), "vecstore: flat index rebuilt after remove");
        Ok(true)
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>, VecError> {
        validate(query, self.dim)?;
        if self.ids.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let scored: Vec<Scored> = (0..self.ids.len())
            .filter_map(|r| {
                let similarity = dot(&q, self.row(r));
                (similarity >= threshold).then_some(Scored {
                    row: r,
                    order: r as u64,
                    similarity,
                })
            })
            .collect();

        Ok(top_k(scored, k)
            .into_iter()
            .map(|s| SearchResult {
                identity_id: self.ids[s.row].clone(),
                similarity: s.similarity,
                label: self.labels[s.row].clone(),
            })
            .collect())
    }

    fn get(&self, id: &str) -> Option<&[f32]> {
        self.rows.get(id).map(|&r| self.row(r))
    }

    fn label(&self, id: &str) -> Option<&str> {
        self.rows.get(id).and_then(|&r| self.labels[r].as_deref())
    }

    fn count(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.data.clear();
        self.ids.clear();
        self.labels.clear();
        self.rows.clear();
    }

    fn bulk_load(&mut self, prototypes: Vec<Prototype>) -> Result<(), VecError> {
        let batch = dedup_batch(prototypes, self.dim)?;

        let mut data = Vec::new();
        try_reserve(&mut data, batch.len() * self.dim)?;
        let mut ids = Vec::with_capacity(batch.len());
        let mut labels = Vec::with_capacity(batch.len());
        let mut rows = HashMap::with_capacity(batch.len());

        for p in batch {
            let start = data.len();
            data.extend_from_slice(&p.embedding);
            l2_normalize(&mut data[start..]);
            rows.insert(p.identity_id.clone(), ids.len());
            ids.push(p.identity_id);
            labels.push(p.label);
        }

        self.data = data;
        self.ids = ids;
        self.labels = labels;
        self.rows = rows;
        Ok(())
    }

    fn prototypes(&self) -> Vec<Prototype> {
        (0..self.ids.len())
            .map(|r| Prototype {
                identity_id: self.ids[r].clone(),
                embedding: self.row(r).to_vec(),
                label: self.labels[r].clone(),
            })
            .collect()
    }
}
