//! Multi-modal embedding indexes and the recommender built on them.
//!
//! # Architecture
//!
//! - `index`: In-memory exact inner-product index keyed by item id
//! - `storage`: `.index`/`.meta` file pair persistence
//! - `fusion`: Content + image vector concatenation per item
//! - `profile`: User profile vectors from interaction history
//! - `recommend`: Candidate ranking against a profile
//! - `service`: Lock-gated shared indexes and the lazily opened catalog

mod fusion;
mod index;
mod profile;
mod recommend;
mod service;
mod storage;

pub use fusion::{max_pool, normalize, FeatureFusion};
pub use index::{EmbeddingIndex, IndexError, SearchResult};
pub use profile::{read_histories, ProfileBuilder};
pub use recommend::{CatalogKind, Recommendation, RecommendError, RecommendationEngine};
pub use service::{IndexCatalog, IndexStats, RecommendService, ServiceError, SharedIndex};
pub use storage::IndexStorage;

/// Default number of recommendations returned per request.
pub const DEFAULT_LIMIT: usize = 5;
