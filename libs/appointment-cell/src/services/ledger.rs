// libs/appointment-cell/src/services/ledger.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};

/// Occupied position of an appointment on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPosition {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

/// Persisted set of appointments and the only source of truth for occupancy.
///
/// Implementations must reject a second non-cancelled appointment on the same
/// `(staff_id, date, start_time)` with [`AppointmentError::SlotConflict`], and
/// apply the `compare_and_*` operations as one conditional write.
#[async_trait]
pub trait AppointmentLedger: Send + Sync {
    /// Commits a new pending appointment.
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Every appointment of the staff member on `date`, any status.
    async fn list_for_staff_on(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Every appointment on `date`, ordered by start time.
    async fn list_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError>;

    /// Appointments in the inclusive range, ordered by date then start time.
    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Sets `target` when the stored status is still `expected`. `None` means
    /// the guard did not match (or the id is unknown). Rows in a terminal
    /// status are never rewritten.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Moves the appointment from `from` to `to` when both its status and its
    /// slot are unchanged. `None` means the guard did not match.
    async fn compare_and_move(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        from: SlotPosition,
        to: SlotPosition,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError>;
}

pub(crate) fn sort_by_slot(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.staff_id.cmp(&b.staff_id))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
