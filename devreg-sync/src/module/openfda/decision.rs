//! Decision code normalization
//!
//! openFDA reports terse decision codes ("SE", "APPR", ...). They are mapped
//! onto a small set of readable statuses before storage.

use serde::{Deserialize, Serialize};

/// Readable decision status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionStatus {
    Cleared,
    Rejected,
    Approved,
    Denied,
    Withdrawn,
    ConditionalApproval,
    Unknown,
}

impl DecisionStatus {
    /// Map a decision code. Exact, case-sensitive match; anything else is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "SE" | "SGC" => DecisionStatus::Cleared,
            "NSE" => DecisionStatus::Rejected,
            "AP" | "APPR" => DecisionStatus::Approved,
            "DE" => DecisionStatus::Denied,
            "WD" => DecisionStatus::Withdrawn,
            "CD" => DecisionStatus::ConditionalApproval,
            _ => DecisionStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Cleared => "Cleared",
            DecisionStatus::Rejected => "Rejected",
            DecisionStatus::Approved => "Approved",
            DecisionStatus::Denied => "Denied",
            DecisionStatus::Withdrawn => "Withdrawn",
            DecisionStatus::ConditionalApproval => "Conditional Approval",
            DecisionStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize an optional decision code to its status string.
pub fn normalize(code: Option<&str>) -> &'static str {
    code.map(DecisionStatus::from_code)
        .unwrap_or(DecisionStatus::Unknown)
        .as_str()
}
