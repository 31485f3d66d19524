mod cluster;
mod snapshot;

pub use cluster::Cluster;
pub use snapshot::{ClusterState, SnapshotStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] kafka_fleet_core::SchedulerError),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
