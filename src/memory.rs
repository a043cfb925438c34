//! In-process store keeping records and known organizations in memory.
//!
//! Enforces the same foreign key rule as the postgres schema.
use std::collections::{BTreeMap, HashSet};

use crate::error::StoreError;
use crate::record::{DataQuery, DataRecord};
use crate::store::{DataStore, OrganizationLookup};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore
{
    organizations: HashSet<String>,
    records: BTreeMap<String, DataRecord>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Creates a store that knows the given organizations.
    pub fn with_organizations<I, S>(organizations: I) -> MemoryStore
        where I: IntoIterator<Item=S>, S: Into<String>
    {
        let mut store = MemoryStore::new();
        for organization in organizations {
            store.add_organization(organization);
        }
        store
    }

    pub fn add_organization<S: Into<String>>(&mut self, organization_id: S) {
        self.organizations.insert(organization_id.into());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_organization(&self, record: &DataRecord) -> Result<(), StoreError> {
        if self.organizations.contains(&record.organization_id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKey(format!("organization '{}' is not present", record.organization_id)))
        }
    }
}

impl DataStore for MemoryStore {
    fn insert(&mut self, record: &DataRecord) -> Result<(), StoreError> {
        self.check_organization(record)?;
        if self.records.contains_key(&record.id) {
            return Err(StoreError::Backend(format!("duplicate data id '{}'", record.id)));
        }
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn fetch(&mut self, id: &str) -> Result<Option<DataRecord>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn replace(&mut self, record: &DataRecord) -> Result<bool, StoreError> {
        if !self.records.contains_key(&record.id) {
            return Ok(false);
        }
        self.check_organization(record)?;
        self.records.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    fn select(&mut self, query: &DataQuery) -> Result<Vec<DataRecord>, StoreError> {
        let mut matching: Vec<DataRecord> = self.records.values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }
}

impl OrganizationLookup for MemoryStore {
    fn exists(&mut self, organization_id: &str) -> Result<bool, StoreError> {
        Ok(self.organizations.contains(organization_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(id: &str, organization_id: &str, second: u32) -> DataRecord {
        let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap();
        DataRecord {
            id: id.to_string(),
            soil_moisture: 1,
            light_level: 2,
            relative_humidity: 3,
            temperature: 4,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            organization_id: organization_id.to_string(),
            created_at: stamp,
            updated_at: stamp,
        }
    }

    #[test]
    fn insert_requires_known_organization() {
        let mut store = MemoryStore::with_organizations(vec!["org-1"]);
        assert!(store.insert(&record("a", "org-1", 0)).is_ok());
        match store.insert(&record("b", "org-2", 0)) {
            Err(StoreError::ForeignKey(_)) => {}
            other => panic!("Expected ForeignKey, got {:?}", other),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = MemoryStore::with_organizations(vec!["org-1"]);
        store.insert(&record("a", "org-1", 0)).unwrap();
        assert!(store.insert(&record("a", "org-1", 1)).is_err());
    }

    #[test]
    fn replace_and_remove_report_missing_ids() {
        let mut store = MemoryStore::with_organizations(vec!["org-1"]);
        assert!(!store.replace(&record("a", "org-1", 0)).unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn select_orders_and_pages() {
        let mut store = MemoryStore::with_organizations(vec!["org-1", "org-2"]);
        store.insert(&record("c", "org-1", 2)).unwrap();
        store.insert(&record("a", "org-1", 5)).unwrap();
        store.insert(&record("b", "org-2", 1)).unwrap();
        store.insert(&record("d", "org-1", 2)).unwrap();

        let all = store.select(&DataQuery::default()).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d", "a"]);

        let page = store.select(&DataQuery {
            organization_id: Some(String::from("org-1")),
            offset: Some(1),
            limit: Some(1),
            ..Default::default()
        }).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "d");
    }
}
