use std::env;
use std::fs::File;
use std::io;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_text_loader::{LoadOptions, OsmId, OsmStore, Result};

const DEFAULT_CONFIG: &str = "config/load.json";

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum IdWidth {
    U32,
    #[default]
    U64,
}

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_paths: Vec<String>,
    #[serde(default)]
    id_width: IdWidth,
    #[serde(default)]
    pub options: LoadOptions,
    /// Log a census of the store once everything is loaded.
    #[serde(default)]
    pub report: bool,
}

fn load_user_config(path: &str) -> Result<UserConfig> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run<I: OsmId>(config: &UserConfig) -> Result<()> {
    let mut store: OsmStore<I> = OsmStore::new(config.options.clone());
    for path in tqdm::tqdm(config.data_paths.iter()) {
        let stats = store.load(Path::new(path))?;
        if !stats.source_live {
            warn!(path = path.as_str(); "Input could not be opened, skipped");
            continue;
        }
        if !stats.is_clean() {
            warn!(
                path = path.as_str(),
                bad_way_node_refs = stats.bad_way_node_refs,
                bad_relation_refs = stats.bad_relation_refs;
                "Unresolved references"
            );
        }
        let bound = store.load_bound();
        if !bound.is_empty() {
            info!(
                path = path.as_str(),
                min_lat = bound.deg_min_lat(),
                max_lat = bound.deg_max_lat(),
                min_lon = bound.deg_min_lon(),
                max_lon = bound.deg_max_lon();
                "Loaded extent"
            );
        }
    }

    info!(
        nodes = store.nodes().len(),
        ways = store.ways().len(),
        relations = store.relations().len(),
        strings = store.interner().len();
        "Store ready"
    );
    if config.report {
        let census = serde_json::to_string(&store.census())?;
        info!(census = census.as_str(); "Census");
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let user_config = load_user_config(&config_path)?;
    match user_config.id_width {
        IdWidth::U32 => run::<u32>(&user_config),
        IdWidth::U64 => run::<u64>(&user_config),
    }
}
