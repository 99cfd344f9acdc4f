//! Filtered reads over the `devices` table

use rusqlite::types::Type;
use rusqlite::{params, Row};
use tracing::debug;

use super::{sqlite, DeviceStore, StoreError};
use crate::module::openfda::{Category, Device, DeviceKind};

const SELECT_DEVICES: &str = "SELECT
        submissionNumber,
        deviceName,
        submissionType,
        decision,
        decisionDate,
        applicant,
        productCode,
        regulationNumber
    FROM devices
    WHERE (?1 IS NULL OR decision = ?1)
    ORDER BY rowid";

/// Query filters; every filter that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Exact, case-sensitive decision status
    pub decision: Option<String>,
    /// Case-insensitive substring of the applicant
    pub applicant: Option<String>,
}

impl DeviceFilter {
    pub fn decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn applicant(mut self, applicant: impl Into<String>) -> Self {
        self.applicant = Some(applicant.into());
        self
    }
}

impl DeviceStore {
    /// Devices matching `filter`, in insertion order.
    ///
    /// The decision is matched in SQL. SQLite's `lower()` only folds ASCII,
    /// so the applicant match runs here with full Unicode lowercasing.
    pub fn find(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(SELECT_DEVICES)
            .map_err(sqlite("prepare device query"))?;

        let mut devices = stmt
            .query_map(params![filter.decision], device_from_row)
            .map_err(sqlite("query devices"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite("read device row"))?;

        if let Some(applicant) = &filter.applicant {
            let needle = applicant.to_lowercase();
            devices.retain(|device| {
                device
                    .applicant
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            });
        }

        debug!("Query {:?} matched {} devices", filter, devices.len());
        Ok(devices)
    }

    /// Every stored device
    pub fn all(&self) -> Result<Vec<Device>, StoreError> {
        self.find(&DeviceFilter::default())
    }
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    let submission_type: String = row.get(2)?;
    let kind = match Category::from_name(&submission_type) {
        Some(Category::Pma) => DeviceKind::Pma,
        Some(Category::K510) => DeviceKind::K510 {
            regulation_number: row.get(7)?,
        },
        None => {
            return Err(rusqlite::Error::InvalidColumnType(
                2,
                "submissionType".to_string(),
                Type::Text,
            ));
        }
    };

    Ok(Device {
        submission_number: row.get(0)?,
        device_name: row.get(1)?,
        decision: row.get(3)?,
        decision_date: row.get(4)?,
        applicant: row.get(5)?,
        product_code: row.get(6)?,
        kind,
    })
}
