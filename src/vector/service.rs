//! Shared, lock-gated index handles and the lazily opened index catalog.
//!
//! - `SharedIndex` serialises writers behind an `RwLock`; searches share it
//! - `IndexCatalog` holds every index named in the config
//! - `RecommendService` opens the catalog on first use

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::config::IndexPaths;
use crate::vector::index::{EmbeddingIndex, IndexError, SearchResult};
use crate::vector::recommend::{CatalogKind, RecommendationEngine};
use crate::vector::storage::{IndexStorage, StorageError};

/// Errors that can occur while working with shared indexes.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index '{0}' has no backing files")]
    NotPersistent(String),

    #[error("Unknown index '{0}'")]
    UnknownIndex(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Size summary of one index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub name: String,
    pub dimension: usize,
    pub len: usize,
}

/// An index shared between request handlers.
///
/// Appends hold the write lock for their whole duration, so concurrent
/// callers never interleave rows. Reads share the lock.
#[derive(Clone)]
pub struct SharedIndex {
    name: String,
    inner: Arc<RwLock<EmbeddingIndex>>,
    storage: Option<IndexStorage>,
}

impl SharedIndex {
    /// Wrap an in-memory index with no backing files.
    pub fn new(name: impl Into<String>, index: EmbeddingIndex) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(RwLock::new(index)),
            storage: None,
        }
    }

    /// Wrap an index that saves to `storage`.
    pub fn with_storage(name: impl Into<String>, index: EmbeddingIndex, storage: IndexStorage) -> Self {
        Self {
            storage: Some(storage),
            ..Self::new(name, index)
        }
    }

    /// Load a persisted index.
    pub fn open(name: impl Into<String>, storage: IndexStorage) -> Result<Self, ServiceError> {
        let name = name.into();
        let index = storage.load()?;

        log::info!(
            "Loaded {} vectors of dimension {} into '{}'",
            index.len(),
            index.dimension(),
            name
        );

        Ok(Self::with_storage(name, index, storage))
    }

    /// Create an empty index that will save to `storage`.
    pub fn create(
        name: impl Into<String>,
        storage: IndexStorage,
        dimension: usize,
    ) -> Result<Self, ServiceError> {
        Ok(Self::with_storage(name, EmbeddingIndex::new(dimension)?, storage))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared read access to the underlying index.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, EmbeddingIndex>, ServiceError> {
        self.inner
            .read()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EmbeddingIndex>, ServiceError> {
        self.inner
            .write()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {}", e)))
    }

    /// Append rows under the exclusive lock.
    pub fn add<S, V>(&self, ids: &[S], vectors: &[V]) -> Result<(), ServiceError>
    where
        S: AsRef<str>,
        V: AsRef<[f32]>,
    {
        self.write()?.add(ids, vectors)?;
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, ServiceError> {
        Ok(self.read()?.search(query, k)?)
    }

    /// Copy of the stored vector for `id`.
    pub fn get(&self, id: &str) -> Result<Option<Vec<f32>>, ServiceError> {
        Ok(self.read()?.get(id).map(<[f32]>::to_vec))
    }

    pub fn len(&self) -> Result<usize, ServiceError> {
        Ok(self.read()?.len())
    }

    pub fn dimension(&self) -> Result<usize, ServiceError> {
        Ok(self.read()?.dimension())
    }

    pub fn stats(&self) -> Result<IndexStats, ServiceError> {
        let index = self.read()?;
        Ok(IndexStats {
            name: self.name.clone(),
            dimension: index.dimension(),
            len: index.len(),
        })
    }

    /// Persist the current rows to the backing files.
    pub fn save(&self) -> Result<(), ServiceError> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| ServiceError::NotPersistent(self.name.clone()))?;

        let index = self.read()?;
        storage.save(&index)?;

        log::info!("Saved {} vectors from '{}'", index.len(), self.name);
        Ok(())
    }
}

/// Every index the recommender reads.
#[derive(Clone)]
pub struct IndexCatalog {
    pub place_content: SharedIndex,
    pub place_image: SharedIndex,
    pub post_content: SharedIndex,
    pub post_image: SharedIndex,
    pub users: SharedIndex,
}

impl IndexCatalog {
    /// Open every configured index. Relative paths resolve against `base_path`.
    pub fn open(paths: &IndexPaths, base_path: &Path) -> Result<Self, ServiceError> {
        let open = |name: &str| -> Result<SharedIndex, ServiceError> {
            let path = paths
                .resolve(name, base_path)
                .ok_or_else(|| ServiceError::UnknownIndex(name.to_string()))?;
            SharedIndex::open(name, IndexStorage::new(path))
        };

        Ok(Self {
            place_content: open(IndexPaths::PLACE_CONTENT)?,
            place_image: open(IndexPaths::PLACE_IMAGE)?,
            post_content: open(IndexPaths::POST_CONTENT)?,
            post_image: open(IndexPaths::POST_IMAGE)?,
            users: open(IndexPaths::USERS)?,
        })
    }

    pub fn all(&self) -> [&SharedIndex; 5] {
        [
            &self.place_content,
            &self.place_image,
            &self.post_content,
            &self.post_image,
            &self.users,
        ]
    }

    /// Content and image indexes for `kind`.
    pub fn modalities(&self, kind: CatalogKind) -> (&SharedIndex, &SharedIndex) {
        match kind {
            CatalogKind::Places => (&self.place_content, &self.place_image),
            CatalogKind::Posts => (&self.post_content, &self.post_image),
        }
    }

    pub fn stats(&self) -> Result<Vec<IndexStats>, ServiceError> {
        self.all().into_iter().map(SharedIndex::stats).collect()
    }
}

/// Recommendation engine that opens its indexes on first use.
///
/// Route planning does not need any index, so the daemon starts without
/// them and only fails recommendation requests when they cannot be loaded.
pub struct RecommendService {
    paths: IndexPaths,
    base_path: PathBuf,
    /// Lazily-initialized engine. Uses Mutex<Option<_>> instead of OnceLock
    /// because get_or_try_init is unstable.
    state: Mutex<Option<Arc<RecommendationEngine>>>,
}

impl RecommendService {
    pub fn new(paths: IndexPaths, base_path: PathBuf) -> Self {
        Self {
            paths,
            base_path,
            state: Mutex::new(None),
        }
    }

    /// Start from an already opened engine.
    pub fn with_engine(engine: RecommendationEngine) -> Self {
        Self {
            paths: IndexPaths::default(),
            base_path: PathBuf::new(),
            state: Mutex::new(Some(Arc::new(engine))),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state
            .lock()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// The engine, opening the catalog if needed.
    pub fn engine(&self) -> Result<Arc<RecommendationEngine>, ServiceError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {}", e)))?;

        if let Some(engine) = guard.as_ref() {
            return Ok(engine.clone());
        }

        log::info!("Opening vector indexes under {}", self.base_path.display());
        let catalog = IndexCatalog::open(&self.paths, &self.base_path)?;
        let engine = Arc::new(RecommendationEngine::new(catalog));
        *guard = Some(engine.clone());

        Ok(engine)
    }
}
