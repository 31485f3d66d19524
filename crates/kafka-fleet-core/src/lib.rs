mod broker;
mod error;
mod failover;
mod offer;
mod status;

pub use broker::{broker_id_from_task_id, Broker, BrokerTask};
pub use error::{Result, SchedulerError};
pub use failover::Failover;
pub use offer::{ExecutorId, Offer, OfferId, PortRange, Resource, SlaveId, TaskId};
pub use status::{StatusUpdate, TaskState};
