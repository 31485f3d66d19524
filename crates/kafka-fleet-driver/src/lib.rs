mod api;
mod http;
mod recordio;
mod wire;

pub use api::{
    CommandDescriptor, DriverStatus, ExecutorDescriptor, SchedulerCallbacks, SchedulerDriver,
    TaskDescriptor,
};
pub use http::{DriverConfig, HttpSchedulerDriver};
pub use recordio::RecordIoCodec;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Framing error: {0}")]
    FramingError(String),

    #[error("Record too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error("Subscription rejected by master: HTTP {status}: {body}")]
    SubscriptionRejected { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Maximum RecordIO frame the driver accepts from the master
pub const MAX_RECORD_SIZE: usize = 4 * 1024 * 1024;
