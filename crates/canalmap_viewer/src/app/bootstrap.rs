use std::path::Path;

use canalmap::map::{save_map_file, JsonFileWaterNodeStore};
use canalmap::{
    load_map_file, resolve_app_paths, LoadedMap, LoopConfig, MapLoadError, MapSession,
    PathfindingMode, SessionConfig, SessionHooks, StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::demo_map::demo_map;
use super::walkers::WalkerHooks;

const PATHFINDING_MODE_ENV_VAR: &str = "CANALMAP_PATHFINDING_MODE";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Map(#[from] MapLoadError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: MapSession,
    pub(crate) hooks: Box<dyn SessionHooks>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Canal Map Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), map = %paths.map_file.display(), "paths_resolved");
    let map = load_or_generate_map(&paths.map_file)?;
    if !map.skipped.is_empty() {
        warn!(skipped = map.skipped.len(), "map_records_skipped");
    }

    let config = LoopConfig::default();
    let session_config = SessionConfig {
        pathfinding_mode: parse_pathfinding_mode_from_env(),
        canvas_width: config.window_width,
        canvas_height: config.window_height,
        ..SessionConfig::default()
    };
    let mut session = MapSession::new(map, session_config);
    let store = JsonFileWaterNodeStore::new(&paths.water_nodes_file);
    if let Err(err) = session.attach_store(Box::new(store)) {
        warn!(
            path = %paths.water_nodes_file.display(),
            error = %err,
            "water_node_store_unavailable"
        );
    }

    Ok(AppWiring {
        config,
        session,
        hooks: Box::new(WalkerHooks::new()),
    })
}

/// Loads `path`, writing the generated archipelago there first when the
/// file does not exist yet.
fn load_or_generate_map(path: &Path) -> Result<LoadedMap, MapLoadError> {
    if !path.exists() {
        info!(path = %path.display(), "map_file_missing_generating_demo");
        save_map_file(path, &demo_map())?;
    }
    load_map_file(path)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_pathfinding_mode_from_env() -> PathfindingMode {
    match std::env::var(PATHFINDING_MODE_ENV_VAR) {
        Ok(raw) => parse_pathfinding_mode(&raw),
        Err(_) => PathfindingMode::default(),
    }
}

fn parse_pathfinding_mode(raw: &str) -> PathfindingMode {
    raw.parse().unwrap_or_else(|err: String| {
        warn!(
            var = PATHFINDING_MODE_ENV_VAR,
            error = %err,
            "invalid_pathfinding_mode_using_default"
        );
        PathfindingMode::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathfinding_mode_parses_known_values_and_falls_back() {
        assert_eq!(parse_pathfinding_mode("all"), PathfindingMode::All);
        assert_eq!(parse_pathfinding_mode(" REAL "), PathfindingMode::Real);
        assert_eq!(parse_pathfinding_mode("boats"), PathfindingMode::Real);
    }

    #[test]
    fn missing_map_file_is_generated_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("map.json");

        let first = load_or_generate_map(&path).expect("generated");
        assert!(path.is_file());
        assert!(first.skipped.is_empty());

        std::fs::write(&path, r#"{"parcels":[],"entities":[],"waterNodes":[]}"#)
            .expect("overwrite");
        let second = load_or_generate_map(&path).expect("existing");
        assert!(second.data.parcels.is_empty());
    }
}
