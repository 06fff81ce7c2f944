//! Multi-modal feature fusion.
//!
//! An item's composite vector is its content embedding followed by its image
//! embedding. The result is not re-normalised.

use std::collections::HashSet;

use crate::vector::index::{EmbeddingIndex, IndexError};

/// Joins content and image embeddings looked up by item id.
pub struct FeatureFusion<'a> {
    content: &'a EmbeddingIndex,
    image: &'a EmbeddingIndex,
}

impl<'a> FeatureFusion<'a> {
    pub fn new(content: &'a EmbeddingIndex, image: &'a EmbeddingIndex) -> Self {
        Self { content, image }
    }

    /// Width of a fused vector.
    pub fn dimension(&self) -> usize {
        self.content.dimension() + self.image.dimension()
    }

    /// Composite vector for `id`, or `None` when either modality is missing.
    pub fn fuse(&self, id: &str) -> Option<Vec<f32>> {
        let (Some(content), Some(image)) = (self.content.get(id), self.image.get(id)) else {
            log::warn!(
                "skipping '{id}': missing {} embedding",
                if self.content.contains(id) { "image" } else { "content" }
            );
            return None;
        };

        let mut fused = Vec::with_capacity(self.dimension());
        fused.extend_from_slice(content);
        fused.extend_from_slice(image);
        Some(fused)
    }

    /// Build a transient index over the candidates that have both modalities.
    ///
    /// Candidates keep their given order; a repeated id is fused once.
    pub fn build_candidate_index<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<EmbeddingIndex, IndexError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut valid_ids = Vec::with_capacity(ids.len());
        let mut vectors = Vec::with_capacity(ids.len());

        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                continue;
            }
            if let Some(fused) = self.fuse(id) {
                valid_ids.push(id);
                vectors.push(fused);
            }
        }

        let mut index = EmbeddingIndex::with_capacity(self.dimension(), valid_ids.len())?;
        index.add(&valid_ids, &vectors)?;

        log::debug!("fused {} of {} candidates", index.len(), ids.len());

        Ok(index)
    }
}

/// Element-wise maximum over an item's per-image embeddings.
///
/// An item without images pools to the zero vector.
pub fn max_pool<V: AsRef<[f32]>>(embeddings: &[V], dimension: usize) -> Vec<f32> {
    let mut iter = embeddings.iter();
    let Some(first) = iter.next() else {
        return vec![0.0; dimension];
    };

    let mut pooled = first.as_ref().to_vec();
    pooled.resize(dimension, 0.0);
    for embedding in iter {
        for (acc, value) in pooled.iter_mut().zip(embedding.as_ref()) {
            *acc = acc.max(*value);
        }
    }
    pooled
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return;
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
}
