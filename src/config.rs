use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::route::{Corner, Optimization};
use crate::storage::{self, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
/// Spacing of resampled route points, in meters
const DEFAULT_SAMPLE_INTERVAL_METERS: f64 = 500.0;
/// Recommendations returned when a request does not ask for a count
const DEFAULT_RECOMMEND_LIMIT: usize = crate::vector::DEFAULT_LIMIT;

/// Locations of the persisted indexes.
///
/// Each path is the prefix of an `.index`/`.meta` pair. Relative paths are
/// resolved against the base directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexPaths {
    #[serde(default = "default_place_content")]
    pub place_content: String,
    #[serde(default = "default_place_image")]
    pub place_image: String,
    #[serde(default = "default_post_content")]
    pub post_content: String,
    #[serde(default = "default_post_image")]
    pub post_image: String,
    #[serde(default = "default_users")]
    pub users: String,
}

impl IndexPaths {
    pub const PLACE_CONTENT: &'static str = "place_content";
    pub const PLACE_IMAGE: &'static str = "place_image";
    pub const POST_CONTENT: &'static str = "post_content";
    pub const POST_IMAGE: &'static str = "post_image";
    pub const USERS: &'static str = "users";

    pub const NAMES: [&'static str; 5] = [
        Self::PLACE_CONTENT,
        Self::PLACE_IMAGE,
        Self::POST_CONTENT,
        Self::POST_IMAGE,
        Self::USERS,
    ];

    /// Configured path for the index called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let path = match name {
            Self::PLACE_CONTENT => &self.place_content,
            Self::PLACE_IMAGE => &self.place_image,
            Self::POST_CONTENT => &self.post_content,
            Self::POST_IMAGE => &self.post_image,
            Self::USERS => &self.users,
            _ => return None,
        };
        Some(path)
    }

    /// Path of the index called `name`, made absolute against `base_path`.
    pub fn resolve(&self, name: &str, base_path: &Path) -> Option<PathBuf> {
        let path = Path::new(self.get(name)?);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(base_path.join(path))
        }
    }
}

impl Default for IndexPaths {
    fn default() -> Self {
        Self {
            place_content: default_place_content(),
            place_image: default_place_image(),
            post_content: default_post_content(),
            post_image: default_post_image(),
            users: default_users(),
        }
    }
}

fn default_place_content() -> String {
    "indexes/place_content.db".to_string()
}

fn default_place_image() -> String {
    "indexes/place_image.db".to_string()
}

fn default_post_content() -> String {
    "indexes/post_content.db".to_string()
}

fn default_post_image() -> String {
    "indexes/post_image.db".to_string()
}

fn default_users() -> String {
    "indexes/users.db".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Address the daemon binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_sample_interval_meters")]
    pub sample_interval_meters: f64,

    /// Where planned routes start
    #[serde(default)]
    pub default_corner: Corner,

    #[serde(default)]
    pub route_optimization: Optimization,

    #[serde(default = "default_recommend_limit")]
    pub recommend_limit: usize,

    #[serde(default)]
    pub indexes: IndexPaths,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sample_interval_meters: DEFAULT_SAMPLE_INTERVAL_METERS,
            default_corner: Corner::default(),
            route_optimization: Optimization::default(),
            recommend_limit: DEFAULT_RECOMMEND_LIMIT,
            indexes: IndexPaths::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_sample_interval_meters() -> f64 {
    DEFAULT_SAMPLE_INTERVAL_METERS
}

fn default_recommend_limit() -> usize {
    DEFAULT_RECOMMEND_LIMIT
}

impl Config {
    fn validate(&self) -> Result<()> {
        if !(self.sample_interval_meters.is_finite() && self.sample_interval_meters > 0.0) {
            bail!(
                "sample_interval_meters must be a positive number, got {}",
                self.sample_interval_meters
            );
        }

        if self.recommend_limit == 0 {
            bail!("recommend_limit must be greater than 0");
        }

        for name in IndexPaths::NAMES {
            if self.indexes.get(name).is_some_and(|p| p.trim().is_empty()) {
                bail!("indexes.{name} must not be empty");
            }
        }

        self.listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("listen_addr '{}' is not a socket address", self.listen_addr))?;

        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Load `config.yaml` from `base_path`, writing defaults if it is missing.
    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        let store = storage::BackendLocal::new(base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store
                .write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())
                .context("failed to write default config")?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store
            .write(CONFIG_FILE, config_str.as_bytes())
            .context("failed to write config")?;

        Ok(())
    }

    /// Absolute prefix of the index called `name`.
    pub fn index_path(&self, name: &str) -> Option<PathBuf> {
        self.indexes.resolve(name, &self.base_path)
    }
}
