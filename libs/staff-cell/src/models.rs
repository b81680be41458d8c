use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared_database::DatabaseError;

// ==============================================================================
// STAFF ROSTER
// ==============================================================================

/// Roster entry as supplied by the external staff source. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub display_name: String,
    pub role: StaffRole,
    pub specialization: String,
    #[serde(rename = "is_available")]
    pub available: bool,
    /// `None` means the clinic-wide default applies.
    #[serde(default)]
    pub daily_capacity_minutes: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Doctor,
    Nurse,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Doctor => write!(f, "doctor"),
            StaffRole::Nurse => write!(f, "nurse"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StaffListQuery {
    pub role: StaffRole,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapacityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityResponse {
    pub staff_id: String,
    pub date: NaiveDate,
    pub capacity_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    pub symptom_tags: Vec<String>,
    pub role: Option<StaffRole>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedStaff {
    pub staff: Staff,
    pub recommended: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StaffError {
    #[error("Staff member not found: {0}")]
    NotFound(String),

    #[error("Staff directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Staff record is malformed: {0}")]
    DataIntegrity(String),
}

impl From<DatabaseError> for StaffError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Decode(msg) => StaffError::DataIntegrity(msg),
            DatabaseError::NotFound(msg) => StaffError::NotFound(msg),
            other => StaffError::DirectoryUnavailable(other.to_string()),
        }
    }
}
