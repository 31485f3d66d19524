use crate::Result;
use kafka_fleet_core::Broker;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything the scheduler persists between events.
///
/// The snapshot is pretty-printed JSON so operators can diff successive
/// states of the fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterState {
    pub framework_id: Option<String>,
    pub brokers: Vec<Broker>,
}

/// Durable snapshot location with atomic replacement.
///
/// Writes go to a sibling `.tmp` file first and are renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn save(&self, state: &ClusterState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        let bytes = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Saved cluster snapshot to {:?}", self.path);
        Ok(())
    }

    /// Returns `None` when no snapshot has been written yet
    pub fn load(&self) -> Result<Option<ClusterState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        let state = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }
}
