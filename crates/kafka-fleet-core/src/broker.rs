use crate::{ExecutorId, Failover, Offer, Result, SchedulerError, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Process-wide id nonce, seeded from the startup wall clock so task ids
/// stay unique across scheduler restarts.
fn next_nonce() -> u64 {
    static SEQ: OnceLock<AtomicU64> = OnceLock::new();
    let seq = SEQ.get_or_init(|| AtomicU64::new(Utc::now().timestamp_millis() as u64));
    seq.fetch_add(1, Ordering::Relaxed)
}

/// Reverse lookup for the `<broker-id>-<nonce>` task id format.
///
/// This is a boundary format: alternate executors that mint task ids must
/// keep the broker id as the prefix before the first dash.
pub fn broker_id_from_task_id(task_id: &str) -> &str {
    task_id.split('-').next().unwrap_or(task_id)
}

/// Runtime handle of a launched broker task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerTask {
    pub id: TaskId,
    pub hostname: String,
    pub port: u64,
    /// False between launch and the first TASK_RUNNING
    pub running: bool,
}

impl BrokerTask {
    pub fn new(id: TaskId, hostname: String, port: u64) -> Self {
        BrokerTask {
            id,
            hostname,
            port,
            running: false,
        }
    }
}

/// One declared broker: desired state, runtime task handle, failover counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    /// Opaque id, unique within the cluster, stable across restarts.
    /// Must not contain `-` (reserved by the task id format).
    pub id: String,

    /// True means "should be running"
    pub active: bool,

    /// Fractional CPUs demanded per task
    pub cpus: f64,

    /// Memory in MiB
    pub mem: u64,

    /// JVM heap in MiB, at most `mem`
    pub heap: u64,

    /// Seed for the broker's properties file
    pub options: BTreeMap<String, String>,

    /// Present iff a task has been launched and not yet stopped
    pub task: Option<BrokerTask>,

    pub failover: Failover,
}

impl Broker {
    pub fn new(id: impl Into<String>, cpus: f64, mem: u64, heap: u64) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains('-') {
            return Err(SchedulerError::InvalidBrokerId(id));
        }
        if cpus <= 0.0 || mem == 0 || heap == 0 || heap > mem {
            return Err(SchedulerError::InvalidResources(format!(
                "cpus={} mem={} heap={}",
                cpus, mem, heap
            )));
        }

        Ok(Broker {
            id,
            active: true,
            cpus,
            mem,
            heap,
            options: BTreeMap::new(),
            task: None,
            failover: Failover::new(10_000, 300_000, None),
        })
    }

    /// True iff the offer covers this broker's cpu and memory demand and
    /// carries at least one non-empty port range
    pub fn matches(&self, offer: &Offer) -> bool {
        offer.scalar("cpus") >= self.cpus
            && offer.scalar("mem") >= self.mem as f64
            && offer.ranges("ports").iter().any(|r| !r.is_empty())
    }

    /// Launch eligibility: declared up, no task attached, resources covered,
    /// and not inside a failover backoff window
    pub fn acceptable(&self, offer: &Offer, now: DateTime<Utc>) -> bool {
        self.active
            && self.task.is_none()
            && self.matches(offer)
            && !self.failover.is_waiting_delay(now)
    }

    pub fn next_task_id(&self) -> TaskId {
        format!("{}-{}", self.id, next_nonce())
    }

    pub fn next_executor_id(&self) -> ExecutorId {
        format!("{}-{}", self.id, next_nonce())
    }
}
