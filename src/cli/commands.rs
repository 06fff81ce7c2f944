use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::{Config, IndexPaths};
use crate::geo::{polyline, GeoPoint, LatLng, SampledPolyline};
use crate::lock::IndexLock;
use crate::route::{Corner, Optimization, RoutePlan};
use crate::vector::{
    max_pool, normalize, read_histories, CatalogKind, FeatureFusion, IndexStats, IndexStorage, ProfileBuilder,
    RecommendService, SharedIndex,
};

/// A row of `index add` input.
///
/// Items with several image embeddings pass them in `vectors`; they are
/// max-pooled into one row, and an empty list pools to zeros.
#[derive(Debug, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub vectors: Vec<Vec<f32>>,
}

impl VectorRecord {
    fn into_row(self, dimension: usize, unit: bool) -> Result<(String, Vec<f32>)> {
        let mut row = match self.vector {
            Some(vector) => vector,
            None => {
                if let Some(bad) = self.vectors.iter().find(|v| v.len() != dimension) {
                    bail!(
                        "'{}' has an embedding of dimension {}, expected {dimension}",
                        self.id,
                        bad.len()
                    );
                }
                max_pool(&self.vectors, dimension)
            }
        };

        if unit {
            normalize(&mut row);
        }
        Ok((self.id, row))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse JSON from `input`, or stdin when no path is given.
fn read_json<T: DeserializeOwned>(input: Option<&Path>) -> Result<T> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            text
        }
    };

    serde_json::from_str(&text).context("input is not valid JSON")
}

fn storage_for(config: &Config, name: &str) -> Result<IndexStorage> {
    let path = config.index_path(name).with_context(|| {
        format!("unknown index '{name}', expected one of {:?}", IndexPaths::NAMES)
    })?;
    Ok(IndexStorage::new(path))
}

fn take_lock(config: &Config) -> Result<IndexLock> {
    IndexLock::try_acquire(config.base_path()).context("failed to lock indexes")
}

/// Like `take_lock`, but waits for a running writer to finish.
fn wait_for_lock(config: &Config) -> Result<IndexLock> {
    match IndexLock::try_acquire(config.base_path()) {
        Ok(lock) => Ok(lock),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            log::info!("indexes are busy, waiting for the other writer");
            IndexLock::acquire_blocking(config.base_path()).context("failed to lock indexes")
        }
        Err(e) => Err(e).context("failed to lock indexes"),
    }
}

pub fn route(
    config: &Config,
    input: Option<PathBuf>,
    corner: Option<Corner>,
    optimization: Option<Optimization>,
) -> Result<()> {
    let points: Vec<GeoPoint> = read_json(input.as_deref())?;
    let plan = RoutePlan::new(
        &points,
        corner.unwrap_or(config.default_corner),
        optimization.unwrap_or(config.route_optimization),
    );
    print_json(&plan)
}

pub fn polyline_decode(encoded: &str) -> Result<()> {
    let points = polyline::decode(encoded)?;
    print_json(&points)
}

/// Reject points the polyline format cannot represent.
fn check_coordinates(points: &[LatLng]) -> Result<()> {
    for (i, point) in points.iter().enumerate() {
        if !(-90.0..=90.0).contains(&point.latitude) || !(-180.0..=180.0).contains(&point.longitude)
        {
            bail!(
                "point {i} ({}, {}) is outside latitude ±90 / longitude ±180",
                point.latitude,
                point.longitude
            );
        }
    }
    Ok(())
}

pub fn polyline_encode(input: Option<PathBuf>) -> Result<()> {
    let points: Vec<LatLng> = read_json(input.as_deref())?;
    check_coordinates(&points)?;
    println!("{}", polyline::encode(&points));
    Ok(())
}

pub fn polyline_sample(config: &Config, encoded: &str, interval: Option<f64>) -> Result<()> {
    let interval = interval.unwrap_or(config.sample_interval_meters);
    if !(interval.is_finite() && interval > 0.0) {
        bail!("interval must be a positive number of meters, got {interval}");
    }

    let sampled = SampledPolyline::from_encoded(encoded, interval)?;
    print_json(&sampled.samples)
}

pub fn index_create(config: &Config, name: &str, dimension: usize, force: bool) -> Result<()> {
    let storage = storage_for(config, name)?;
    let _lock = take_lock(config)?;

    if storage.exists() {
        if !force {
            bail!(
                "index '{name}' already exists at {}, pass --force to replace it",
                storage.path().display()
            );
        }
        storage.delete()?;
    }

    SharedIndex::create(name, storage, dimension)?.save()?;
    log::info!("created index '{name}' of dimension {dimension}");
    Ok(())
}

pub fn index_add(
    config: &Config,
    name: &str,
    input: Option<PathBuf>,
    unit: bool,
) -> Result<()> {
    let records: Vec<VectorRecord> = read_json(input.as_deref())?;
    let storage = storage_for(config, name)?;
    let _lock = take_lock(config)?;

    let index = SharedIndex::open(name, storage)?;
    let dimension = index.dimension()?;
    let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = records
        .into_iter()
        .map(|r| r.into_row(dimension, unit))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .unzip();

    index.add(&ids, &vectors)?;
    index.save()?;

    println!(
        "{} vectors added to '{name}', {} in total",
        ids.len(),
        index.len()?
    );
    Ok(())
}

pub fn index_search(config: &Config, name: &str, vector: &str, k: usize) -> Result<()> {
    let query: Vec<f32> = serde_json::from_str(vector).context("vector must be a JSON array")?;
    let index = SharedIndex::open(name, storage_for(config, name)?)?;

    print_json(&index.search(&query, k)?)
}

pub fn index_info(config: &Config, name: Option<&str>) -> Result<()> {
    let names: Vec<&str> = match name {
        Some(name) => vec![name],
        None => IndexPaths::NAMES.to_vec(),
    };

    let mut stats: Vec<IndexStats> = Vec::with_capacity(names.len());
    for name in names {
        let storage = storage_for(config, name)?;
        if !storage.exists() {
            log::warn!("index '{name}' not found at {}", storage.path().display());
            continue;
        }
        stats.push(SharedIndex::open(name, storage)?.stats()?);
    }

    print_json(&stats)
}

/// Rebuild the user index from `history`.
pub fn profile(config: &Config, history: &Path, kind: CatalogKind) -> Result<()> {
    let histories = read_histories(history)
        .with_context(|| format!("failed to read history {}", history.display()))?;

    let (content_name, image_name) = match kind {
        CatalogKind::Places => (IndexPaths::PLACE_CONTENT, IndexPaths::PLACE_IMAGE),
        CatalogKind::Posts => (IndexPaths::POST_CONTENT, IndexPaths::POST_IMAGE),
    };

    let _lock = wait_for_lock(config)?;

    let content = storage_for(config, content_name)?.load()?;
    let image = storage_for(config, image_name)?.load()?;
    let builder = ProfileBuilder::new(FeatureFusion::new(&content, &image));
    let users = builder.build_index(&histories)?;

    storage_for(config, IndexPaths::USERS)?.save(&users)?;

    println!(
        "{} user profiles of dimension {} written",
        users.len(),
        users.dimension()
    );
    Ok(())
}

pub fn recommend(
    config: &Config,
    kind: CatalogKind,
    user: &str,
    candidates: &[String],
    k: Option<usize>,
    ids_only: bool,
) -> Result<()> {
    let service = RecommendService::new(config.indexes.clone(), config.base_path().to_path_buf());
    let engine = service.engine()?;
    let k = k.unwrap_or(config.recommend_limit);

    if ids_only {
        print_json(&engine.recommend_ids(kind, k, candidates, user)?)
    } else {
        print_json(&engine.recommend(kind, k, candidates, user)?)
    }
}
