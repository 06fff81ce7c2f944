//! In-memory exact nearest-neighbour index over fixed-width embeddings.
//!
//! Rows are append-only and kept in insertion order. Scores are raw inner
//! products; for unit-normalised vectors that is cosine similarity.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;

/// Exact inner-product index.
///
/// Stores one row per identifier, supporting:
/// - All-or-nothing batch appends
/// - Lookup of a row by identifier
/// - Brute-force top-k search
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    /// Identifiers in row order
    ids: Vec<String>,
    /// Identifier -> row
    id_to_row: HashMap<String, usize>,
    /// Row-major vector data, `ids.len() * dimension` floats
    data: Vec<f32>,
    /// Width of every row
    dimension: usize,
}

/// Search result from the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    /// Inner product with the query
    pub score: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Got {ids} ids for {vectors} vectors")]
    LengthMismatch { ids: usize, vectors: usize },

    #[error("Duplicate id '{0}'")]
    DuplicateId(String),

    #[error("Index dimension must be greater than zero")]
    InvalidDimension,
}

impl EmbeddingIndex {
    /// Create a new empty index for vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        Self::with_capacity(dimension, 0)
    }

    /// Create an index with room for `capacity` rows.
    pub fn with_capacity(dimension: usize, capacity: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidDimension);
        }

        Ok(Self {
            ids: Vec::with_capacity(capacity),
            id_to_row: HashMap::with_capacity(capacity),
            data: Vec::with_capacity(capacity * dimension),
            dimension,
        })
    }

    /// Rebuild an index from rows read back from storage.
    ///
    /// The caller guarantees `ids` are unique and `data` holds exactly
    /// `ids.len()` rows of `dimension` floats.
    pub(crate) fn from_rows(dimension: usize, ids: Vec<String>, data: Vec<f32>) -> Self {
        let id_to_row = ids
            .iter()
            .enumerate()
            .map(|(row, id)| (id.clone(), row))
            .collect();

        Self {
            ids,
            id_to_row,
            data,
            dimension,
        }
    }

    /// Width of every row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Row position of `id`.
    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.id_to_row.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_row.contains_key(id)
    }

    /// Stored vector for `id`.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.row_of(id).map(|row| self.row(row))
    }

    /// Raw row-major vector block.
    pub(crate) fn data(&self) -> &[f32] {
        &self.data
    }

    fn row(&self, row: usize) -> &[f32] {
        let start = row * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Append rows for `ids`.
    ///
    /// Every vector must match the index dimension and no id may already be
    /// present or repeat within the batch. Nothing is appended unless the
    /// whole batch is valid.
    pub fn add<S, V>(&mut self, ids: &[S], vectors: &[V]) -> Result<(), IndexError>
    where
        S: AsRef<str>,
        V: AsRef<[f32]>,
    {
        if ids.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }

        for vector in vectors {
            let got = vector.as_ref().len();
            if got != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    got,
                });
            }
        }

        let mut batch = HashSet::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if self.id_to_row.contains_key(id) || !batch.insert(id) {
                return Err(IndexError::DuplicateId(id.to_string()));
            }
        }

        self.data.reserve(vectors.len() * self.dimension);
        for (id, vector) in ids.iter().zip(vectors) {
            let id = id.as_ref().to_string();
            self.id_to_row.insert(id.clone(), self.ids.len());
            self.ids.push(id);
            self.data.extend_from_slice(vector.as_ref());
        }

        Ok(())
    }

    /// Append a single row.
    pub fn insert(&mut self, id: &str, vector: &[f32]) -> Result<(), IndexError> {
        self.add(&[id], &[vector])
    }

    /// Top-`k` rows by inner product with `query`, best first.
    ///
    /// Ties keep insertion order. Returns every row when `k` exceeds the
    /// row count, and nothing for an empty index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .par_chunks(self.dimension)
            .enumerate()
            .map(|(row, vector)| (row, dot(query, vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, score)| SearchResult {
                id: self.ids[row].clone(),
                score,
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
