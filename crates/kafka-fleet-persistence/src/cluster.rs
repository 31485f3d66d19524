use crate::{ClusterState, Result, SnapshotStore};
use kafka_fleet_core::{Broker, SchedulerError};
use tracing::{info, warn};

/// The mutable set of declared brokers plus its durable snapshot.
///
/// Broker ids are unique; iteration order is insertion order and is the
/// stable traversal order the reconciler relies on.
pub struct Cluster {
    brokers: Vec<Broker>,
    framework_id: Option<String>,
    store: SnapshotStore,
}

impl Cluster {
    pub fn new(store: SnapshotStore) -> Self {
        Cluster {
            brokers: Vec::new(),
            framework_id: None,
            store,
        }
    }

    pub fn framework_id(&self) -> Option<&str> {
        self.framework_id.as_deref()
    }

    pub fn set_framework_id(&mut self, id: impl Into<String>) {
        self.framework_id = Some(id.into());
    }

    pub fn get_broker(&self, id: &str) -> Option<&Broker> {
        self.brokers.iter().find(|b| b.id == id)
    }

    pub fn get_broker_mut(&mut self, id: &str) -> Option<&mut Broker> {
        self.brokers.iter_mut().find(|b| b.id == id)
    }

    /// Brokers in stable insertion order
    pub fn brokers(&self) -> &[Broker] {
        &self.brokers
    }

    pub fn add_broker(&mut self, broker: Broker) -> Result<()> {
        if self.get_broker(&broker.id).is_some() {
            return Err(SchedulerError::DuplicateBroker(broker.id).into());
        }
        self.brokers.push(broker);
        Ok(())
    }

    pub fn remove_broker(&mut self, id: &str) -> Option<Broker> {
        let idx = self.brokers.iter().position(|b| b.id == id)?;
        Some(self.brokers.remove(idx))
    }

    /// Write the snapshot. Callers inside the reconciler log failures and
    /// carry on; the next event retries.
    pub fn save(&self) -> Result<()> {
        let state = ClusterState {
            framework_id: self.framework_id.clone(),
            brokers: self.brokers.clone(),
        };
        self.store.save(&state)
    }

    /// Read the snapshot back. `clear_tasks` discards in-flight task handles,
    /// which are stale across scheduler restarts. Returns false when no
    /// snapshot exists yet.
    pub fn load(&mut self, clear_tasks: bool) -> Result<bool> {
        let Some(state) = self.store.load()? else {
            info!("No cluster snapshot at {:?}, starting empty", self.store.path());
            return Ok(false);
        };

        self.framework_id = state.framework_id;
        self.brokers = state.brokers;

        if clear_tasks {
            for broker in &mut self.brokers {
                if let Some(task) = broker.task.take() {
                    warn!(
                        "Discarding stale task handle {} for broker {}",
                        task.id, broker.id
                    );
                }
            }
        }

        info!(
            "Loaded cluster snapshot: {} broker(s), framework id {:?}",
            self.brokers.len(),
            self.framework_id
        );
        Ok(true)
    }
}
