//! Error types shared by the stores and the gateway.
use thiserror::Error;

use crate::schema::ValidationError;

#[derive(Error, Debug)]
/// Failure of a backing store.
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("Foreign key violation: {0}")]
    ForeignKey(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Store error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
/// Failure of a gateway operation.
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Organization '{0}' does not exist")]
    Reference(String),

    #[error("Data record '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
