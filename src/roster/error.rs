use thiserror::Error;

use crate::roster::database::DatabaseError;
use crate::roster::store::StoreError;
use crate::transport::TransportError;
use crate::types::EventId;

pub type Result<T> = core::result::Result<T, RosterError>;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Event {0} not found")]
    EventNotFound(EventId),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound(event_id) => RosterError::EventNotFound(event_id),
            other => RosterError::Store(other),
        }
    }
}
