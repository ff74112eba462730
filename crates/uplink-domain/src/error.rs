use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No prior message for duplicate from device {0}: a delivery flagged duplicate must follow a primary message")]
    OrphanDuplicate(String),

    #[error("Payload decode error: {0}")]
    PayloadDecodeError(String),

    #[error("Sequence window too short: {0} entries, need at least 2")]
    InsufficientWindow(usize),

    #[error("Sequence anomaly: newest {newest} and oldest {oldest} span a non-positive expected count")]
    SequenceAnomaly { newest: u16, oldest: u16 },

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
