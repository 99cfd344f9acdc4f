//! Raw openFDA record → [`Device`] mapping

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::decision::normalize;
use super::types::{Category, Device, DeviceKind, RawRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing submission number")]
    MissingSubmissionNumber,
    #[error("field `{field}` has unexpected type")]
    UnexpectedType { field: &'static str },
    #[error("invalid decision_date `{0}`")]
    InvalidDate(String),
}

/// Transform a batch of raw records, dropping the ones that cannot be mapped.
///
/// Output keeps input order. Duplicates are left for the store to resolve.
pub fn transform(records: &[RawRecord], category: Category) -> Vec<Device> {
    let mut devices = Vec::with_capacity(records.len());

    for (index, raw) in records.iter().enumerate() {
        match transform_record(raw, category) {
            Ok(device) => devices.push(device),
            Err(TransformError::MissingSubmissionNumber) => {
                debug!("{}: skipping record {} without submission number", category, index);
            }
            Err(e) => {
                warn!("{}: failed to parse record {}: {}", category, index, e);
            }
        }
    }

    if devices.len() < records.len() {
        debug!(
            "{}: transformed {} of {} records",
            category,
            devices.len(),
            records.len()
        );
    }
    devices
}

/// Map one raw record of the given category.
pub fn transform_record(raw: &RawRecord, category: Category) -> Result<Device, TransformError> {
    let fields = raw.as_object().ok_or(TransformError::NotAnObject)?;

    let (number_field, kind) = match category {
        Category::Pma => ("pma_number", DeviceKind::Pma),
        Category::K510 => (
            "k_number",
            DeviceKind::K510 {
                regulation_number: regulation_number(fields)?,
            },
        ),
    };

    let submission_number = text(fields, number_field)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(TransformError::MissingSubmissionNumber)?;

    let device_name = match category {
        Category::Pma => match text(fields, "trade_name")? {
            Some(name) => Some(name),
            None => text(fields, "generic_name")?,
        },
        Category::K510 => text(fields, "device_name")?,
    };

    let decision_code = text(fields, "decision_code")?;
    let decision_date = match text(fields, "decision_date")? {
        Some(raw_date) => Some(parse_date(&raw_date)?),
        None => None,
    };

    Ok(Device {
        submission_number,
        device_name,
        decision: normalize(decision_code.as_deref()).to_string(),
        decision_date,
        applicant: text(fields, "applicant")?,
        product_code: text(fields, "product_code")?,
        kind,
    })
}

/// Read an optional string field. Null, missing and blank values are `None`.
fn text(fields: &Map<String, Value>, field: &'static str) -> Result<Option<String>, TransformError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(TransformError::UnexpectedType { field }),
    }
}

/// `openfda.regulation_number` is a string on some records and an array on others.
fn regulation_number(fields: &Map<String, Value>) -> Result<Option<String>, TransformError> {
    const FIELD: &str = "openfda.regulation_number";

    let openfda = match fields.get("openfda") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(TransformError::UnexpectedType { field: "openfda" }),
    };

    let value = match openfda.get("regulation_number") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
    };

    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        _ => Err(TransformError::UnexpectedType { field: FIELD }),
    }
}

/// openFDA serves `YYYY-MM-DD`; older dumps use `YYYYMMDD`.
fn parse_date(raw: &str) -> Result<NaiveDate, TransformError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| TransformError::InvalidDate(raw.to_string()))
}
