//! Ranking of candidate items against a user's profile.

use serde::{Deserialize, Serialize};

use crate::vector::fusion::FeatureFusion;
use crate::vector::index::IndexError;
use crate::vector::service::{IndexCatalog, ServiceError};

/// Which item catalog candidates come from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Places,
    Posts,
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogKind::Places => write!(f, "places"),
            CatalogKind::Posts => write!(f, "posts"),
        }
    }
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("No profile for user '{0}'")]
    UnknownUser(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Rank `candidate_ids` by inner product with `profile`.
///
/// Candidates missing a modality are skipped. An empty survivor set yields an
/// empty ranking whatever the profile width.
pub fn rank_candidates<S: AsRef<str>>(
    fusion: &FeatureFusion<'_>,
    profile: &[f32],
    k: usize,
    candidate_ids: &[S],
) -> Result<Vec<Recommendation>, IndexError> {
    let candidates = fusion.build_candidate_index(candidate_ids)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let results = candidates.search(profile, k)?;
    Ok(results
        .into_iter()
        .map(|r| Recommendation {
            id: r.id,
            score: r.score,
        })
        .collect())
}

/// Answers "which of these candidates suit this user best".
pub struct RecommendationEngine {
    catalog: IndexCatalog,
}

impl RecommendationEngine {
    pub fn new(catalog: IndexCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    /// Top `k` of `candidate_ids` for `user_id`, best first.
    pub fn recommend<S: AsRef<str>>(
        &self,
        kind: CatalogKind,
        k: usize,
        candidate_ids: &[S],
        user_id: &str,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let profile = self
            .catalog
            .users
            .get(user_id)?
            .ok_or_else(|| RecommendError::UnknownUser(user_id.to_string()))?;

        let (content, image) = self.catalog.modalities(kind);
        let content = content.read()?;
        let image = image.read()?;
        let fusion = FeatureFusion::new(&content, &image);

        let ranked = rank_candidates(&fusion, &profile, k, candidate_ids)?;

        log::debug!(
            "recommended {} of {} {kind} candidates for '{user_id}'",
            ranked.len(),
            candidate_ids.len()
        );

        Ok(ranked)
    }

    /// Same ranking as [`recommend`](Self::recommend) without the scores.
    pub fn recommend_ids<S: AsRef<str>>(
        &self,
        kind: CatalogKind,
        k: usize,
        candidate_ids: &[S],
        user_id: &str,
    ) -> Result<Vec<String>, RecommendError> {
        Ok(self
            .recommend(kind, k, candidate_ids, user_id)?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }
}
