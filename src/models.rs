use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Closed set of roles a caller may act under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Physician,
    Patient,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Physician => "physician",
            Role::Patient => "patient",
            Role::Admin => "admin",
        }
    }

    /// Whether this role must carry an identity.
    pub fn requires_identity(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /prescriptions`.
///
/// Every field defaults when absent so that a missing field is reported by
/// validation under its own name instead of as a decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionRequest {
    #[serde(default)]
    pub patient_id: i32,
    #[serde(default)]
    pub physician_id: i32,
    #[serde(default)]
    pub drug_id: i32,
    #[serde(default)]
    pub quantity: i32,
    #[serde(rename = "sig", alias = "instructions", default)]
    pub instructions: String,
}

/// A stored prescription. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i32,
    pub patient_id: i32,
    pub physician_id: i32,
    pub drug_id: i32,
    pub quantity: i32,
    #[serde(rename = "sig")]
    pub instructions: String,
    pub prescribed_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the top drugs report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TopDrugRow {
    pub drug_id: i32,
    pub drug_name: String,
    pub generic_name: String,
    pub total_quantity: i64,
    pub prescription_count: i64,
}

/// Raw query string of `GET /analytics/top-drugs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopDrugsParams {
    /// Start of the range (YYYY-MM-DD), inclusive
    pub from: Option<String>,
    /// End of the range (YYYY-MM-DD), inclusive
    pub to: Option<String>,
    /// Maximum number of rows (1..=100, default 10)
    pub limit: Option<String>,
}

/// JSON body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
