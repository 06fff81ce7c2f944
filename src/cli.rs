use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::route::{Corner, Optimization};
use crate::vector::CatalogKind;

pub mod commands;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP service.
    Daemon {
        /// Overrides listen_addr from config.yaml
        #[clap(long)]
        addr: Option<String>,
    },
    /// Order geo-points into a visiting route.
    Route {
        /// JSON array of {name, latitude, longitude}. Reads stdin when omitted.
        #[clap(short, long)]
        input: Option<PathBuf>,

        /// Corner the route starts from. Defaults to config.
        #[clap(short, long)]
        corner: Option<Corner>,

        /// Ordering heuristic. Defaults to config.
        #[clap(short, long)]
        optimization: Option<Optimization>,
    },
    /// Encode, decode and resample polylines.
    Polyline {
        #[clap(subcommand)]
        action: PolylineArgs,
    },
    /// Manage embedding indexes.
    Index {
        #[clap(subcommand)]
        action: IndexArgs,
    },
    /// Build the user profile index from an interaction history.
    Profile {
        /// CSV with a user_id,item_id,frequency header
        #[clap(long)]
        history: PathBuf,

        /// Catalog the history items belong to
        #[clap(short, long, default_value = "places")]
        kind: CatalogKind,
    },
    /// Rank candidate items for a user.
    Recommend {
        #[clap(short, long, default_value = "places")]
        kind: CatalogKind,

        /// User whose profile ranks the candidates
        #[clap(short, long)]
        user: String,

        /// Comma separated candidate ids
        #[clap(short = 'i', long, value_delimiter = ',', required = true)]
        candidates: Vec<String>,

        /// Number of results. Defaults to recommend_limit.
        #[clap(short)]
        k: Option<usize>,

        /// Print ids only
        #[clap(long, default_value = "false")]
        ids_only: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PolylineArgs {
    /// Print the points of an encoded polyline.
    Decode {
        #[clap(allow_hyphen_values = true)]
        encoded: String,
    },
    /// Encode a JSON array of {latitude, longitude}.
    Encode {
        /// Reads stdin when omitted.
        #[clap(short, long)]
        input: Option<PathBuf>,
    },
    /// Resample an encoded polyline by distance.
    Sample {
        #[clap(allow_hyphen_values = true)]
        encoded: String,

        /// Minimum spacing in meters. Defaults to config.
        #[clap(long)]
        interval: Option<f64>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum IndexArgs {
    /// Create an empty index.
    Create {
        /// Index name from config (e.g. place_content)
        name: String,

        #[clap(short, long)]
        dimension: usize,

        /// Replace an existing index
        #[clap(long, default_value = "false")]
        force: bool,
    },
    /// Append vectors from a JSON array of {id, vector} or {id, vectors}.
    Add {
        name: String,

        /// Reads stdin when omitted.
        #[clap(short, long)]
        input: Option<PathBuf>,

        /// Scale rows to unit length before adding
        #[clap(long, default_value = "false")]
        normalize: bool,
    },
    /// Nearest neighbours of a query vector.
    Search {
        name: String,

        /// JSON array of numbers
        #[clap(short, long, allow_hyphen_values = true)]
        vector: String,

        #[clap(short, default_value = "5")]
        k: usize,
    },
    /// Print name, dimension and size of indexes.
    Info {
        /// Only this index
        name: Option<String>,
    },
}
