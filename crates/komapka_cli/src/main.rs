//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load a data directory through `komapka_core` and run one lookup.
//! - Print the outcome as JSON so runs can be diffed.

use clap::Parser;
use komapka_core::{
    default_log_level, init_logging, Bounds, EngineConfig, FilterSet, SearchOptions,
    SearchService,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "komapka", version, about = "Search the Komapka map datasets")]
struct Args {
    /// JSON engine config; flags below override its data roots.
    #[arg(long, env = "KOMAPKA_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "KOMAPKA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Tried when a file is missing from the data directory.
    #[arg(long)]
    fallback_dir: Option<PathBuf>,

    /// Free-text query.
    #[arg(long, short, default_value = "")]
    query: String,

    /// Map bounds as `west,south,east,north`.
    #[arg(long, value_parser = parse_bbox)]
    bbox: Option<Bounds>,

    /// List only the entities inside `--bbox`.
    #[arg(long, requires = "bbox")]
    bounds_only: bool,

    /// Category filter; repeatable.
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Filter set as JSON, e.g. `{"priceRange": "free"}`.
    #[arg(long, value_parser = parse_filters)]
    filters: Option<FilterSet>,

    /// Print autocomplete suggestions for `--query` instead of results.
    #[arg(long, conflicts_with = "list_categories")]
    suggest: bool,

    /// Print the activity categories present in the data.
    #[arg(long)]
    list_categories: bool,

    #[arg(long, env = "KOMAPKA_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, default_value = default_log_level())]
    log_level: String,
}

fn parse_bbox(value: &str) -> Result<Bounds, String> {
    Bounds::parse_bbox(value).ok_or_else(|| format!("expected `west,south,east,north`, got `{value}`"))
}

fn parse_filters(value: &str) -> Result<FilterSet, String> {
    serde_json::from_str(value).map_err(|err| err.to_string())
}

fn load_config(args: &Args) -> Result<EngineConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.fallback_dir {
        config.fallback_data_dir = Some(dir.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if let Some(log_dir) = &args.log_dir {
        let log_dir = if log_dir.is_absolute() {
            log_dir.clone()
        } else {
            std::env::current_dir()?.join(log_dir)
        };
        init_logging(&args.log_level, log_dir)?;
    }

    let config = load_config(&args)?;
    let service = SearchService::from_config(&config);
    service.initialize().await?;
    info!(
        "event=cli_run module=cli status=ok data_dir={} suggest={} categories={}",
        config.data_dir.display(),
        args.suggest,
        args.list_categories
    );

    let output = if args.list_categories {
        serde_json::to_string_pretty(&service.unique_categories().await?)?
    } else if args.suggest {
        serde_json::to_string_pretty(&service.suggestions(&args.query).await?)?
    } else {
        let mut filters = args.filters.clone().unwrap_or_default();
        filters.categories.extend(args.categories.iter().cloned());
        let options = SearchOptions {
            bounds: args.bbox,
            filters,
            bounds_only: args.bounds_only,
        };
        let result = service.search(&args.query, &options).await?;
        serde_json::to_string_pretty(&result)?
    };

    println!("{output}");
    Ok(())
}
