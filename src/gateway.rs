//! Gateway mediating every read and write of data records.
//!
//! Candidates are validated before any write, the organization reference is checked against
//! the backing store, and the server side fields `id`, `created_at` and `updated_at` are
//! assigned here and never taken from the caller.
use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::error::{GatewayError, Result, StoreError};
use crate::record::{CandidateRecord, DataQuery, DataRecord, ValidatedRecord};
use crate::schema;
use crate::store::{DataStore, OrganizationLookup};

pub struct PersistenceGateway<S>
{
    store: S,
}

impl<S> PersistenceGateway<S>
    where S: DataStore + OrganizationLookup
{
    pub fn new(store: S) -> PersistenceGateway<S> {
        PersistenceGateway { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Validates and stores a new record.
    ///
    /// # Errors
    ///
    /// * `GatewayError::Validation` - A field is missing or malformed.
    ///
    /// * `GatewayError::Reference` - The organization does not exist.
    ///
    /// * `GatewayError::Store` - The store failed; nothing was written.
    ///
    pub fn create(&mut self, candidate: &CandidateRecord) -> Result<DataRecord> {
        let fields = schema::validate(candidate)?;
        self.verify_organization(&fields)?;

        let now = current_timestamp();
        let record = DataRecord::from_validated(Uuid::new_v4().to_string(), fields, now, now);

        self.store.insert(&record).map_err(reference_violation(&record))?;
        log::info!(target: "sensorlog::gateway", "Created data record \'{}\' for organization \'{}\'", record.id, record.organization_id);
        Ok(record)
    }

    /// Loads a single record.
    pub fn get_by_id(&mut self, id: &str) -> Result<DataRecord> {
        match self.store.fetch(id)? {
            Some(record) => Ok(record),
            None => Err(GatewayError::NotFound(id.to_string())),
        }
    }

    /// Replaces the mutable fields of an existing record.
    ///
    /// `id` and `created_at` are kept; `updated_at` is set to the current time but never moves
    /// backwards. Unknown ids fail before the candidate is looked at.
    pub fn update_by_id(&mut self, id: &str, candidate: &CandidateRecord) -> Result<DataRecord> {
        let existing = self.get_by_id(id)?;
        let fields = schema::validate(candidate)?;
        self.verify_organization(&fields)?;

        let updated_at = std::cmp::max(current_timestamp(), existing.updated_at);
        let record = DataRecord::from_validated(existing.id, fields, existing.created_at, updated_at);

        let replaced = self.store.replace(&record).map_err(reference_violation(&record))?;
        if !replaced {
            // deleted between the lookup and the write
            return Err(GatewayError::NotFound(id.to_string()));
        }
        log::info!(target: "sensorlog::gateway", "Updated data record \'{}\'", record.id);
        Ok(record)
    }

    /// Lists the records matching the query.
    pub fn list(&mut self, query: &DataQuery) -> Result<Vec<DataRecord>> {
        let records = self.store.select(query)?;
        log::debug!(target: "sensorlog::gateway", "Listed {} data records", records.len());
        Ok(records)
    }

    /// Deletes a record and returns it as it was stored.
    pub fn delete_by_id(&mut self, id: &str) -> Result<DataRecord> {
        let existing = self.get_by_id(id)?;
        if !self.store.remove(id)? {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        log::info!(target: "sensorlog::gateway", "Deleted data record \'{}\'", id);
        Ok(existing)
    }

    fn verify_organization(&mut self, fields: &ValidatedRecord) -> Result<()> {
        if self.store.exists(&fields.organization_id)? {
            Ok(())
        } else {
            log::warn!(target: "sensorlog::gateway", "Rejected write for unknown organization \'{}\'", fields.organization_id);
            Err(GatewayError::Reference(fields.organization_id.clone()))
        }
    }
}

/// Current time at the precision a postgres timestamp keeps.
fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn reference_violation(record: &DataRecord) -> impl Fn(StoreError) -> GatewayError + '_ {
    move |err| match err {
        StoreError::ForeignKey(_) => GatewayError::Reference(record.organization_id.clone()),
        other => GatewayError::Store(other),
    }
}
