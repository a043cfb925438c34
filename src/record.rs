//! Module that contains the record types handled by this application.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Struct representing a sensor reading of an organization as it is persisted.
pub struct DataRecord
{
    /// Identifier assigned on creation.
    pub id: String,
    /// Soil moisture reading.
    pub soil_moisture: i32,
    /// Light level reading.
    pub light_level: i32,
    /// Relative humidity reading.
    pub relative_humidity: i32,
    /// Temperature reading.
    pub temperature: i32,
    /// Day the reading was observed on.
    pub date: NaiveDate,
    /// The organization the reading belongs to.
    pub organization_id: String,
    /// Timestamp the record was stored.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last write to the record.
    pub updated_at: DateTime<Utc>,
}

impl DataRecord {
    /// Builds a stored record from validated fields and the server assigned values.
    pub fn from_validated(id: String, fields: ValidatedRecord, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> DataRecord {
        DataRecord {
            id,
            soil_moisture: fields.soil_moisture,
            light_level: fields.light_level,
            relative_humidity: fields.relative_humidity,
            temperature: fields.temperature,
            date: fields.date,
            organization_id: fields.organization_id,
            created_at,
            updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
/// Untyped input for a create or update.
///
/// Keys that are not listed here, such as `id`, `created_at` or `updated_at`, are ignored
/// when deserializing, so callers can never set them.
pub struct CandidateRecord
{
    #[serde(default)]
    pub soil_moisture: Option<Value>,
    #[serde(default)]
    pub light_level: Option<Value>,
    #[serde(default)]
    pub relative_humidity: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub organization_id: Option<Value>,
}

impl CandidateRecord {
    /// Overwrites the fields of `self` with every field that is set in `other`.
    pub fn overlay(mut self, other: CandidateRecord) -> CandidateRecord {
        if other.soil_moisture.is_some() {
            self.soil_moisture = other.soil_moisture;
        }
        if other.light_level.is_some() {
            self.light_level = other.light_level;
        }
        if other.relative_humidity.is_some() {
            self.relative_humidity = other.relative_humidity;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.date.is_some() {
            self.date = other.date;
        }
        if other.organization_id.is_some() {
            self.organization_id = other.organization_id;
        }
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// The mutable fields of a record after they passed validation.
pub struct ValidatedRecord
{
    pub soil_moisture: i32,
    pub light_level: i32,
    pub relative_humidity: i32,
    pub temperature: i32,
    pub date: NaiveDate,
    pub organization_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
/// Filter for listing records. Unset fields do not restrict the result.
pub struct DataQuery
{
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl DataQuery {
    /// Checks whether a record passes the `id` and `organization_id` filters.
    pub fn matches(&self, record: &DataRecord) -> bool {
        self.id.as_ref().map_or(true, |id| *id == record.id)
            && self.organization_id.as_ref().map_or(true, |org| *org == record.organization_id)
    }
}
