//! Validation of candidate records.
//!
//! Every field is checked on its own, so a single call reports all problems of a candidate.
use std::convert::TryFrom;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::record::{CandidateRecord, ValidatedRecord};

pub const SOIL_MOISTURE: &str = "soil_moisture";
pub const LIGHT_LEVEL: &str = "light_level";
pub const RELATIVE_HUMIDITY: &str = "relative_humidity";
pub const TEMPERATURE: &str = "temperature";
pub const DATE: &str = "date";
pub const ORGANIZATION_ID: &str = "organization_id";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Reason a single field was rejected.
pub enum FieldIssue {
    /// The field is absent, null or blank.
    Missing,
    /// The value has a JSON type the field can not hold.
    WrongType { expected: &'static str },
    /// A numeric value with a fractional part.
    NotAnInteger,
    /// An integer that does not fit into 32 bits.
    OutOfRange,
    /// A string that is not a calendar date.
    InvalidDate,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Missing => write!(f, "is a required field"),
            FieldIssue::WrongType { expected } => write!(f, "must be a {}", expected),
            FieldIssue::NotAnInteger => write!(f, "must be an integer"),
            FieldIssue::OutOfRange => write!(f, "is out of range"),
            FieldIssue::InvalidDate => write!(f, "must be a valid date"),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub issue: FieldIssue,
}

#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
#[error("Invalid record: {}", describe(.errors))]
/// All field errors found in one candidate, in field order.
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Names of the fields that failed.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(|error| error.field).collect()
    }

    /// Looks up the issue reported for `field`.
    pub fn issue(&self, field: &str) -> Option<FieldIssue> {
        self.errors.iter().find(|error| error.field == field).map(|error| error.issue)
    }
}

fn describe(errors: &[FieldError]) -> String {
    errors.iter()
        .map(|error| format!("{} {}", error.field, error.issue))
        .collect::<Vec<String>>()
        .join(", ")
}

/// Validates a candidate and converts it into typed fields.
///
/// # Arguments
///
/// * `candidate` - The untyped input from a form, a datagram or the command line.
///
/// # Returns
///
/// * `Ok(ValidatedRecord)` - If every field is present and well formed.
///
/// * `Err(ValidationError)` - Listing every rejected field.
///
pub fn validate(candidate: &CandidateRecord) -> Result<ValidatedRecord, ValidationError> {
    let mut errors = Vec::new();

    let soil_moisture = check(SOIL_MOISTURE, integer_field(candidate.soil_moisture.as_ref()), &mut errors);
    let light_level = check(LIGHT_LEVEL, integer_field(candidate.light_level.as_ref()), &mut errors);
    let relative_humidity = check(RELATIVE_HUMIDITY, integer_field(candidate.relative_humidity.as_ref()), &mut errors);
    let temperature = check(TEMPERATURE, integer_field(candidate.temperature.as_ref()), &mut errors);
    let date = check(DATE, date_field(candidate.date.as_ref()), &mut errors);
    let organization_id = check(ORGANIZATION_ID, string_field(candidate.organization_id.as_ref()), &mut errors);

    match (soil_moisture, light_level, relative_humidity, temperature, date, organization_id) {
        (Some(soil_moisture), Some(light_level), Some(relative_humidity), Some(temperature), Some(date), Some(organization_id))
        if errors.is_empty() => Ok(ValidatedRecord {
            soil_moisture,
            light_level,
            relative_humidity,
            temperature,
            date,
            organization_id,
        }),
        _ => Err(ValidationError { errors }),
    }
}

fn check<T>(field: &'static str, result: Result<T, FieldIssue>, errors: &mut Vec<FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(issue) => {
            errors.push(FieldError { field, issue });
            None
        }
    }
}

fn present(value: Option<&Value>) -> Result<&Value, FieldIssue> {
    match value {
        None | Some(Value::Null) => Err(FieldIssue::Missing),
        Some(Value::String(s)) if s.trim().is_empty() => Err(FieldIssue::Missing),
        Some(value) => Ok(value),
    }
}

fn integer_field(value: Option<&Value>) -> Result<i32, FieldIssue> {
    match present(value)? {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                i32::try_from(int).map_err(|_| FieldIssue::OutOfRange)
            } else if number.is_u64() {
                Err(FieldIssue::OutOfRange)
            } else {
                number.as_f64().map_or(Err(FieldIssue::NotAnInteger), float_to_i32)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(int) => i32::try_from(int).map_err(|_| FieldIssue::OutOfRange),
                Err(_) => match trimmed.parse::<f64>() {
                    Ok(float) if float.is_finite() => float_to_i32(float),
                    _ => Err(FieldIssue::WrongType { expected: "number" }),
                },
            }
        }
        _ => Err(FieldIssue::WrongType { expected: "number" }),
    }
}

fn float_to_i32(float: f64) -> Result<i32, FieldIssue> {
    if float.fract() != 0.0 {
        return Err(FieldIssue::NotAnInteger);
    }
    if float < f64::from(i32::MIN) || float > f64::from(i32::MAX) {
        return Err(FieldIssue::OutOfRange);
    }
    Ok(float as i32)
}

fn date_field(value: Option<&Value>) -> Result<NaiveDate, FieldIssue> {
    match present(value)? {
        Value::String(s) => parse_date(s.trim()).ok_or(FieldIssue::InvalidDate),
        _ => Err(FieldIssue::WrongType { expected: "date" }),
    }
}

/// Parses either a plain `YYYY-MM-DD` date or an RFC 3339 timestamp.
///
/// For timestamps the date is taken as written, without converting the offset.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(input).ok().map(|timestamp| timestamp.date_naive())
}

fn string_field(value: Option<&Value>) -> Result<String, FieldIssue> {
    match present(value)? {
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(FieldIssue::WrongType { expected: "string" }),
    }
}
