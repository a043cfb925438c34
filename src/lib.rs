//! Validated storage of organization scoped sensor readings.
//!
//! Candidates are checked by [`schema::validate`] and written through a
//! [`gateway::PersistenceGateway`] into either postgres ([`database::PostgresStore`]) or
//! memory ([`memory::MemoryStore`]).
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod record;
pub mod schema;
pub mod socket;
pub mod store;

pub use crate::error::{GatewayError, StoreError};
pub use crate::gateway::PersistenceGateway;
pub use crate::record::{CandidateRecord, DataQuery, DataRecord, ValidatedRecord};
pub use crate::schema::{validate, ValidationError};
