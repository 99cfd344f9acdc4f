//! openFDA device decision data types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One untyped record from the `results` array of an openFDA response
pub type RawRecord = serde_json::Value;

/// Submission category, one per openFDA device endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Premarket approval
    Pma,
    /// 510(k) premarket notification (clearance)
    K510,
}

impl Category {
    /// Endpoint path relative to the API base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            Category::Pma => "/device/pma.json",
            Category::K510 => "/device/510k.json",
        }
    }

    /// Value of the `submissionType` column
    pub fn submission_type(&self) -> &'static str {
        match self {
            Category::Pma => "PMA",
            Category::K510 => "510k",
        }
    }

    /// Parse a category name, case-insensitively ("pma" / "510k")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pma" => Some(Category::Pma),
            "510k" => Some(Category::K510),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.submission_type())
    }
}

/// Category-specific part of a device record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Pma,
    K510 {
        regulation_number: Option<String>,
    },
}

impl DeviceKind {
    pub fn category(&self) -> Category {
        match self {
            DeviceKind::Pma => Category::Pma,
            DeviceKind::K510 { .. } => Category::K510,
        }
    }
}

/// A normalized device decision record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// PMA number or 510(k) number, unique across the store
    pub submission_number: String,
    pub device_name: Option<String>,
    /// Normalized decision status, e.g. "Cleared" or "Unknown"
    pub decision: String,
    pub decision_date: Option<NaiveDate>,
    pub applicant: Option<String>,
    pub product_code: Option<String>,
    pub kind: DeviceKind,
}

impl Device {
    pub fn submission_type(&self) -> &'static str {
        self.kind.category().submission_type()
    }

    pub fn regulation_number(&self) -> Option<&str> {
        match &self.kind {
            DeviceKind::Pma => None,
            DeviceKind::K510 { regulation_number } => regulation_number.as_deref(),
        }
    }
}

/// Flat row layout shared by the `devices` table and the CSV export.
/// Field names double as column names and header cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRow {
    pub submission_number: String,
    pub device_name: Option<String>,
    pub submission_type: String,
    pub decision: String,
    pub decision_date: Option<NaiveDate>,
    pub applicant: Option<String>,
    pub product_code: Option<String>,
    pub regulation_number: Option<String>,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            submission_number: device.submission_number.clone(),
            device_name: device.device_name.clone(),
            submission_type: device.submission_type().to_string(),
            decision: device.decision.clone(),
            decision_date: device.decision_date,
            applicant: device.applicant.clone(),
            product_code: device.product_code.clone(),
            regulation_number: device.regulation_number().map(str::to_string),
        }
    }
}
