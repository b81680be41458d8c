// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use staff_cell::models::StaffError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Opaque reference owned by the patient directory.
    pub patient_id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub reason: String,
    pub urgency: Urgency,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment holds its slot.
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Code stored in `appointments.status_code`.
    pub fn code(self) -> i16 {
        match self {
            AppointmentStatus::Pending => 1,
            AppointmentStatus::Confirmed => 2,
            AppointmentStatus::CheckedIn => 3,
            AppointmentStatus::InProgress => 4,
            AppointmentStatus::Completed => 5,
            AppointmentStatus::Cancelled => 6,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn occupies_slot(self) -> bool {
        self != AppointmentStatus::Cancelled
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

// ==============================================================================
// PERSISTENCE BOUNDARY
// ==============================================================================

/// Row shape of the `appointments` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub patient_id: String,
    pub staff_id: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration: i32,
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub status_code: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = AppointmentError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::from_code(row.status_code).ok_or_else(|| {
            AppointmentError::DataIntegrity(format!(
                "appointment {} has unknown status_code {}",
                row.id, row.status_code
            ))
        })?;
        let duration_minutes = u32::try_from(row.duration).map_err(|_| {
            AppointmentError::DataIntegrity(format!(
                "appointment {} has negative duration {}",
                row.id, row.duration
            ))
        })?;

        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            staff_id: row.staff_id,
            date: row.appointment_date,
            start_time: row.appointment_time,
            duration_minutes,
            reason: row.reason,
            urgency: row.urgency,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Appointment> for AppointmentRow {
    fn from(appointment: &Appointment) -> Self {
        AppointmentRow {
            id: appointment.id,
            patient_id: appointment.patient_id.clone(),
            staff_id: appointment.staff_id.clone(),
            appointment_date: appointment.date,
            appointment_time: appointment.start_time,
            duration: appointment.duration_minutes as i32,
            reason: appointment.reason.clone(),
            urgency: appointment.urgency,
            status_code: appointment.status.code(),
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

/// A validated booking ready to be committed to the ledger.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub reason: String,
    pub urgency: Urgency,
    pub created_at: DateTime<Utc>,
}

impl NewAppointment {
    pub fn into_appointment(self, id: Uuid) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            staff_id: self.staff_id,
            date: self.date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            reason: self.reason,
            urgency: self.urgency,
            status: AppointmentStatus::Pending,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub start_time: NaiveTime,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    #[serde(with = "slot_time")]
    pub new_start_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target_status: AppointmentStatus,
    /// Status the caller last observed; defaults to the stored one.
    pub expected_status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub staff_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitingQuery {
    pub date: NaiveDate,
    pub threshold_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub staff_id: String,
    pub date: NaiveDate,
    pub slot_duration_minutes: u32,
    pub available_slots: Vec<String>,
}

// ==============================================================================
// READ-SIDE AGGREGATES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub staff_id: String,
    pub date: NaiveDate,
    pub booked_minutes: u32,
    pub capacity_minutes: u32,
    pub utilization_percent: f64,
    /// Set when the ledger or directory could not be read and the figures are
    /// partial.
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOverview {
    pub date: NaiveDate,
    pub staff: Vec<UtilizationReport>,
    /// Set when some data could not be fetched and the overview is partial.
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingPatient {
    pub appointment: Appointment,
    pub waited_minutes: i64,
}

/// Flat export record; formatting is left to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentExportRecord {
    pub patient_name: String,
    pub staff_name: String,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub start_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: String,
}

// ==============================================================================
// NOTIFICATION INTENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WaitingPatient,
}

/// Request for an external collaborator to notify staff. Never delivered here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    pub appointment_id: Uuid,
    pub staff_id: String,
    pub patient_id: String,
    pub waited_minutes: i64,
    pub emitted_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot {date} {start_time} for staff {staff_id} is no longer available")]
    SlotConflict {
        staff_id: String,
        date: NaiveDate,
        start_time: NaiveTime,
    },

    #[error("Appointment {appointment_id} changed concurrently; it is no longer {expected}")]
    ConcurrentModification {
        appointment_id: Uuid,
        expected: AppointmentStatus,
    },

    #[error("Invalid status change from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

impl AppointmentError {
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AppointmentError::SlotConflict { .. } | AppointmentError::ConcurrentModification { .. }
        )
    }

    pub fn appointment_not_found(id: Uuid) -> Self {
        AppointmentError::NotFound(format!("Appointment {}", id))
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Decode(msg) => AppointmentError::DataIntegrity(msg),
            other => AppointmentError::Dependency(other.to_string()),
        }
    }
}

impl From<StaffError> for AppointmentError {
    fn from(e: StaffError) -> Self {
        match e {
            StaffError::NotFound(id) => AppointmentError::NotFound(format!("Staff member {}", id)),
            StaffError::DirectoryUnavailable(msg) => AppointmentError::Dependency(msg),
            StaffError::DataIntegrity(msg) => AppointmentError::DataIntegrity(msg),
        }
    }
}

/// `HH:MM` on the wire; `HH:MM:SS` is accepted on input.
pub mod slot_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip_and_reject_unknown() {
        for status in AppointmentStatus::ALL {
            assert_eq!(AppointmentStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(AppointmentStatus::from_code(0), None);
        assert_eq!(AppointmentStatus::from_code(7), None);
    }

    #[test]
    fn unknown_status_code_is_data_integrity_error() {
        let row = AppointmentRow {
            id: Uuid::new_v4(),
            patient_id: "p".into(),
            staff_id: "s".into(),
            appointment_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration: 30,
            reason: String::new(),
            urgency: Urgency::Routine,
            status_code: 42,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            Appointment::try_from(row),
            Err(AppointmentError::DataIntegrity(_))
        ));
    }

    #[test]
    fn slot_time_accepts_both_formats() {
        assert_eq!(slot_time::parse("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(slot_time::parse("09:30:00"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(slot_time::parse("9.30"), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::CheckedIn).unwrap(),
            "\"checked_in\""
        );
    }
}
