//! On-disk persistence for an embedding index.
//!
//! An index at `<path>` is stored as a file pair:
//!
//! `<path>.index`: raw vector block, no header:
//! - rows in insertion order
//! - each row: `[f32; dimension]` (little-endian)
//!
//! `<path>.meta`: JSON sidecar:
//! - `ids`: identifiers in row order
//! - `id_to_row`: identifier -> row
//! - `dimension`: row width (needed to reopen an empty index)
//! - `checksum`: CRC32 of the vector block
//!
//! The dimension is inferred from the vector block size on load.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::vector::index::EmbeddingIndex;

const VECTORS_SUFFIX: &str = ".index";
const META_SUFFIX: &str = ".meta";
const TEMP_SUFFIX: &str = ".tmp";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Index is corrupt: {0}")]
    Corrupt(String),
}

/// Sidecar metadata file contents.
#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    ids: Vec<String>,
    id_to_row: HashMap<String, usize>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    checksum: Option<u32>,
}

/// Storage manager for one persisted index.
#[derive(Debug, Clone)]
pub struct IndexStorage {
    path: PathBuf,
}

impl IndexStorage {
    /// Create a storage manager for the index rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Base path of the file pair.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn vectors_path(&self) -> PathBuf {
        with_suffix(&self.path, VECTORS_SUFFIX)
    }

    pub fn meta_path(&self) -> PathBuf {
        with_suffix(&self.path, META_SUFFIX)
    }

    /// Check if both files of the pair exist.
    pub fn exists(&self) -> bool {
        self.vectors_path().exists() && self.meta_path().exists()
    }

    /// Load the index, inferring its dimension from the stored data.
    pub fn load(&self) -> Result<EmbeddingIndex, StorageError> {
        let meta: IndexMeta = serde_json::from_slice(&std::fs::read(self.meta_path())?)?;
        let bytes = std::fs::read(self.vectors_path())?;

        let dimension = Self::validate(&meta, &bytes)?;

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(EmbeddingIndex::from_rows(dimension, meta.ids, data))
    }

    /// Save the index, overwriting both files.
    ///
    /// Each file is written to a temp file, synced and renamed into place.
    /// The vector block goes first; a crash before the metadata lands leaves
    /// a checksum mismatch that `load` reports as corruption.
    pub fn save(&self, index: &EmbeddingIndex) -> Result<(), StorageError> {
        let mut bytes = Vec::with_capacity(index.data().len() * 4);
        for value in index.data() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let meta = IndexMeta {
            ids: index.ids().to_vec(),
            id_to_row: index
                .ids()
                .iter()
                .enumerate()
                .map(|(row, id)| (id.clone(), row))
                .collect(),
            dimension: Some(index.dimension()),
            checksum: Some(crc32fast::hash(&bytes)),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::write_atomic(&self.vectors_path(), &bytes)?;
        Self::write_atomic(&self.meta_path(), &serde_json::to_vec_pretty(&meta)?)?;

        log::debug!(
            "saved {} rows of dimension {} to {}",
            index.len(),
            index.dimension(),
            self.path.display()
        );

        Ok(())
    }

    /// Delete both files if they exist.
    pub fn delete(&self) -> Result<(), StorageError> {
        for path in [self.vectors_path(), self.meta_path()] {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Check the pair agrees with itself and return the row width.
    fn validate(meta: &IndexMeta, bytes: &[u8]) -> Result<usize, StorageError> {
        let rows = meta.ids.len();

        if bytes.len() % 4 != 0 {
            return Err(StorageError::Corrupt(format!(
                "vector block of {} bytes is not a whole number of floats",
                bytes.len()
            )));
        }
        let floats = bytes.len() / 4;

        if meta.id_to_row.len() != rows {
            return Err(StorageError::Corrupt(format!(
                "{} id mappings for {} ids",
                meta.id_to_row.len(),
                rows
            )));
        }
        for (row, id) in meta.ids.iter().enumerate() {
            if meta.id_to_row.get(id) != Some(&row) {
                return Err(StorageError::Corrupt(format!(
                    "id '{id}' is not mapped to row {row}"
                )));
            }
        }

        let dimension = if rows == 0 {
            if floats != 0 {
                return Err(StorageError::Corrupt(format!(
                    "{floats} floats stored for an index without ids"
                )));
            }
            meta.dimension.filter(|d| *d > 0).ok_or_else(|| {
                StorageError::Corrupt("empty index without a dimension".to_string())
            })?
        } else {
            if floats == 0 || floats % rows != 0 {
                return Err(StorageError::Corrupt(format!(
                    "{floats} floats do not divide into {rows} rows"
                )));
            }
            let inferred = floats / rows;
            if let Some(declared) = meta.dimension {
                if declared != inferred {
                    return Err(StorageError::Corrupt(format!(
                        "declared dimension {declared}, stored rows have {inferred}"
                    )));
                }
            }
            inferred
        };

        if let Some(expected) = meta.checksum {
            if crc32fast::hash(bytes) != expected {
                return Err(StorageError::Corrupt("vector block checksum mismatch".to_string()));
            }
        }

        Ok(dimension)
    }

    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let temp_path = with_suffix(path, TEMP_SUFFIX);

        let result = (|| -> Result<(), StorageError> {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(contents)?;
            writer.flush()?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(())
        })();

        let result =
            result.and_then(|()| std::fs::rename(&temp_path, path).map_err(StorageError::from));

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
