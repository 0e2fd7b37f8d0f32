use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod animation;
pub mod app;
pub mod geo;
pub mod graph;
pub mod interaction;
pub mod map;
pub mod pathfinding;
pub mod route;
pub mod session;
pub mod spatial;

#[cfg(test)]
mod test_support;

pub use app::{
    run_app, run_app_with_metrics, AppError, HookCommand, InputSnapshot, LoopConfig,
    LoopMetricsSnapshot, MapRenderer, MetricsHandle, NoHooks, SessionHooks, Shortcut,
    SLOW_FRAME_ENV_VAR,
};
pub use geo::{GeoPoint, ScreenPoint, ViewTransform, WorldPoint};
pub use graph::{PathfindingMode, TransportMode};
pub use map::{load_map_file, LoadedMap, MapData, MapLoadError};
pub use pathfinding::{PathError, RoutePlanner};
pub use route::{RouteError, RouteRequest, RouteResponse};
pub use session::{MapSession, SessionConfig, SessionEvent};

pub const ROOT_ENV_VAR: &str = "CANALMAP_ROOT";
pub const MAP_FILE_ENV_VAR: &str = "CANALMAP_MAP_FILE";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub map_file: PathBuf,
    pub water_nodes_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("environment variable {var} is not valid unicode: {source}")]
    Env {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    ExecutablePath(#[source] std::io::Error),
    #[error("failed to create data directory at {path}: {source}")]
    CreateDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "CANALMAP_ROOT={} is not a canalmap checkout \
         (expected Cargo.toml next to crates/ or data/)",
        .path.display()
    )]
    InvalidRootOverride { path: PathBuf },
    #[error(
        "no canalmap checkout found above {}; set CANALMAP_ROOT to the directory holding \
Cargo.toml and crates/ or data/",
        .searched_from.display()
    )]
    RootNotFound { searched_from: PathBuf },
}

/// Resolves the project root and the data files under it, creating
/// `<root>/data` when missing. `CANALMAP_MAP_FILE` overrides the map path.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match read_env(ROOT_ENV_VAR)? {
        Some(value) => {
            let candidate = canonical_or_raw(Path::new(&value));
            if !looks_like_project_root(&candidate) {
                return Err(StartupError::InvalidRootOverride { path: candidate });
            }
            candidate
        }
        None => {
            let exe = env::current_exe().map_err(StartupError::ExecutablePath)?;
            let start = exe.parent().unwrap_or(&exe);
            find_project_root(start).ok_or_else(|| StartupError::RootNotFound {
                searched_from: canonical_or_raw(start),
            })?
        }
    };

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).map_err(|source| StartupError::CreateDataDir {
        path: data_dir.clone(),
        source,
    })?;
    let map_file = read_env(MAP_FILE_ENV_VAR)?
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("map.json"));
    let water_nodes_file = data_dir.join("water_nodes.json");
    Ok(AppPaths {
        root,
        data_dir,
        map_file,
        water_nodes_file,
    })
}

/// Unset and blank variables both read as `None`.
fn read_env(var: &'static str) -> Result<Option<String>, StartupError> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(StartupError::Env { var, source }),
    }
}

/// Nearest directory at or above `start` that looks like the project root.
fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| looks_like_project_root(dir))
        .map(canonical_or_raw)
}

fn looks_like_project_root(dir: &Path) -> bool {
    dir.join("Cargo.toml").is_file() && (dir.join("crates").is_dir() || dir.join("data").is_dir())
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_root_needs_a_manifest_and_a_known_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("Cargo.toml"), "[package]\n").expect("manifest");
        assert!(!looks_like_project_root(dir.path()));

        fs::create_dir(dir.path().join("data")).expect("data dir");
        assert!(looks_like_project_root(dir.path()));

        let bare = tempfile::tempdir().expect("tempdir");
        fs::create_dir(bare.path().join("crates")).expect("crates dir");
        assert!(!looks_like_project_root(bare.path()));
    }

    #[test]
    fn root_is_found_from_a_nested_build_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        fs::create_dir(dir.path().join("crates")).expect("crates dir");
        let nested = dir.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("nested dir");

        assert_eq!(
            find_project_root(&nested),
            Some(canonical_or_raw(dir.path()))
        );
    }
}
