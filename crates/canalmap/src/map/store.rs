use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::atomic_io::write_text_atomic;
use super::types::WaterNode;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read water nodes from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write water nodes to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("water node file {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode water nodes: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::Read { .. } | StoreError::Decode { .. } => {
                "Saved water routes could not be loaded."
            }
            StoreError::Write { .. } | StoreError::Encode(_) => {
                "The water route could not be saved."
            }
        }
    }
}

/// Storage collaborator for water nodes. Implementations only move records;
/// they never interpret them.
pub trait WaterNodeStore {
    fn load(&self) -> Result<Vec<WaterNode>, StoreError>;
    fn save(&self, nodes: &[WaterNode]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileWaterNodeStore {
    path: PathBuf,
}

impl JsonFileWaterNodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WaterNodeStore for JsonFileWaterNodeStore {
    fn load(&self) -> Result<Vec<WaterNode>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "water_node_store_empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, nodes: &[WaterNode]) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(nodes).map_err(StoreError::Encode)?;
        write_text_atomic(&self.path, &text).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            node_count = nodes.len(),
            "water_nodes_saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::map::{WaterConnection, WaterNodeId};

    fn sample_nodes() -> Vec<WaterNode> {
        vec![
            WaterNode {
                id: WaterNodeId::new("w1"),
                position: GeoPoint::new(45.43, 12.33),
                connections: vec![WaterConnection {
                    target_id: WaterNodeId::new("w2"),
                    intermediate_points: vec![GeoPoint::new(45.431, 12.331)],
                    distance: 140.5,
                    id: "w1-w2".to_string(),
                }],
            },
            WaterNode {
                id: WaterNodeId::new("w2"),
                position: GeoPoint::new(45.432, 12.332),
                connections: Vec::new(),
            },
        ]
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileWaterNodeStore::new(dir.path().join("water.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn saved_nodes_load_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileWaterNodeStore::new(dir.path().join("water.json"));
        store.save(&sample_nodes()).expect("save");
        assert_eq!(store.load().expect("load"), sample_nodes());
    }

    #[test]
    fn record_uses_camel_case_wire_names() {
        let json = serde_json::to_value(&sample_nodes()[0]).expect("encode");
        let connection = &json["connections"][0];
        assert_eq!(connection["targetId"], "w2");
        assert!(connection["intermediatePoints"].is_array());
        assert_eq!(json["position"]["lat"], 45.43);
    }

    #[test]
    fn corrupt_file_reports_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("water.json");
        fs::write(&path, "{not json").expect("write");
        let error = JsonFileWaterNodeStore::new(&path)
            .load()
            .expect_err("corrupt");
        assert!(matches!(error, StoreError::Decode { .. }));
        assert_eq!(error.user_message(), "Saved water routes could not be loaded.");
    }
}
