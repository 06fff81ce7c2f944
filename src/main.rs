use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod errors;
mod geo;
mod lock;
mod route;
mod storage;
#[cfg(test)]
mod tests;
mod vector;
mod web;

use cli::{commands, Command, IndexArgs, PolylineArgs};
use config::Config;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `WANDER_BASE_PATH`, or `~/.local/share/wander`.
fn base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("WANDER_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;

    Ok(home.join(".local/share/wander"))
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    init_logging();

    let config = Config::load_with(base_path()?)?;

    match args.command {
        Command::Daemon { addr } => web::start_daemon(config, addr),

        Command::Route {
            input,
            corner,
            optimization,
        } => commands::route(&config, input, corner, optimization),

        Command::Polyline { action } => match action {
            PolylineArgs::Decode { encoded } => commands::polyline_decode(&encoded),
            PolylineArgs::Encode { input } => commands::polyline_encode(input),
            PolylineArgs::Sample { encoded, interval } => {
                commands::polyline_sample(&config, &encoded, interval)
            }
        },

        Command::Index { action } => match action {
            IndexArgs::Create {
                name,
                dimension,
                force,
            } => commands::index_create(&config, &name, dimension, force),
            IndexArgs::Add {
                name,
                input,
                normalize,
            } => commands::index_add(&config, &name, input, normalize),
            IndexArgs::Search { name, vector, k } => {
                commands::index_search(&config, &name, &vector, k)
            }
            IndexArgs::Info { name } => commands::index_info(&config, name.as_deref()),
        },

        Command::Profile { history, kind } => commands::profile(&config, &history, kind),

        Command::Recommend {
            kind,
            user,
            candidates,
            k,
            ids_only,
        } => commands::recommend(&config, kind, &user, &candidates, k, ids_only),
    }
}
