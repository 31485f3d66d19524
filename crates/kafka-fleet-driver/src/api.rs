use kafka_fleet_core::{ExecutorId, Offer, OfferId, Resource, SlaveId, StatusUpdate, TaskId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shell command the executor runs, plus artifact URIs fetched beforehand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub value: String,
    pub uris: Vec<String>,
}

/// The long-lived broker-host process launched per broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorDescriptor {
    pub id: ExecutorId,
    pub name: String,
    pub command: CommandDescriptor,
}

/// Everything the master needs to launch one broker task on a slave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub name: String,
    pub slave_id: SlaveId,
    pub executor: ExecutorDescriptor,
    pub resources: Vec<Resource>,
    /// Opaque payload handed to the executor; for brokers this is the
    /// line-oriented properties block
    pub data: Vec<u8>,
}

/// Terminal state of a driver run; the process exits 0 only for `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    Stopped,
    Aborted,
}

/// Upcalls the scheduler makes. All methods are non-blocking handoffs; the
/// implementation queues the call and returns immediately.
pub trait SchedulerDriver: Send + Sync {
    fn launch_tasks(&self, offer_ids: &[OfferId], tasks: &[TaskDescriptor]);
    fn kill_task(&self, task_id: &TaskId);
    fn decline_offer(&self, offer_id: &OfferId);
    fn stop(&self);
}

/// Downcalls the scheduler receives from the framework driver.
///
/// `registered`/`reregistered` hand over the driver handle; `disconnected`
/// invalidates it. Implementations must tolerate concurrent invocation.
pub trait SchedulerCallbacks: Send + Sync {
    fn registered(&self, driver: Arc<dyn SchedulerDriver>, framework_id: &str, master: &str);
    fn reregistered(&self, driver: Arc<dyn SchedulerDriver>, master: &str);
    fn resource_offers(&self, offers: Vec<Offer>);
    fn offer_rescinded(&self, offer_id: &str);
    fn status_update(&self, status: StatusUpdate);
    fn framework_message(&self, executor_id: &str, slave_id: &str, data: &[u8]);
    fn disconnected(&self);
    fn slave_lost(&self, slave_id: &str);
    fn executor_lost(&self, executor_id: &str, slave_id: &str, status: i32);
    fn error(&self, message: &str);
}
