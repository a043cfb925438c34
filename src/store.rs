//! Traits the gateway uses to reach its backing store.
use crate::error::StoreError;
use crate::record::{DataQuery, DataRecord};

/// Persistence of data records.
///
/// Implementations write every call through to their storage. Each call is a single atomic
/// operation; there is no transaction spanning several calls.
pub trait DataStore {
    /// Stores a new record. Fails with `StoreError::ForeignKey` if the organization is unknown.
    fn insert(&mut self, record: &DataRecord) -> Result<(), StoreError>;

    /// Loads the record with the given id.
    fn fetch(&mut self, id: &str) -> Result<Option<DataRecord>, StoreError>;

    /// Replaces the stored record with the same id. Returns `false` if there was none.
    fn replace(&mut self, record: &DataRecord) -> Result<bool, StoreError>;

    /// Loads all records matching the query, ordered by `created_at` then `id`.
    fn select(&mut self, query: &DataQuery) -> Result<Vec<DataRecord>, StoreError>;

    /// Deletes the record with the given id. Returns `false` if there was none.
    fn remove(&mut self, id: &str) -> Result<bool, StoreError>;
}

/// Existence check for organizations.
pub trait OrganizationLookup {
    fn exists(&mut self, organization_id: &str) -> Result<bool, StoreError>;
}
