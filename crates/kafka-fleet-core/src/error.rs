use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid broker id {0:?} (must be non-empty and contain no dash)")]
    InvalidBrokerId(String),

    #[error("Invalid broker resources: {0}")]
    InvalidResources(String),

    #[error("Offer {offer_id} has no usable port range")]
    MalformedOffer { offer_id: String },

    #[error("Duplicate broker id: {0}")]
    DuplicateBroker(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
