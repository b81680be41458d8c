// libs/appointment-cell/src/services/memory.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};
use crate::services::ledger::{sort_by_slot, AppointmentLedger, SlotPosition};

/// Process-local ledger. The active-slot uniqueness check and the write happen
/// under one lock, mirroring the partial unique index of the SQL schema.
#[derive(Default)]
pub struct InMemoryAppointmentLedger {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
    offline: AtomicBool,
}

impl InMemoryAppointmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unreachable store: every call fails with `Dependency`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Seeds a record as-is, bypassing validation.
    pub async fn seed(&self, appointment: Appointment) {
        self.appointments
            .lock()
            .await
            .insert(appointment.id, appointment);
    }

    fn ensure_online(&self) -> Result<(), AppointmentError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppointmentError::Dependency(
                "in-memory ledger is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn slot_taken(
        appointments: &HashMap<Uuid, Appointment>,
        staff_id: &str,
        position: SlotPosition,
        ignore: Option<Uuid>,
    ) -> bool {
        appointments.values().any(|a| {
            Some(a.id) != ignore
                && a.occupies_slot()
                && a.staff_id == staff_id
                && a.date == position.date
                && a.start_time == position.start_time
        })
    }

    async fn collect<F>(&self, filter: F) -> Result<Vec<Appointment>, AppointmentError>
    where
        F: Fn(&Appointment) -> bool + Send,
    {
        self.ensure_online()?;
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .await
            .values()
            .filter(|a| filter(*a))
            .cloned()
            .collect();
        sort_by_slot(&mut found);
        Ok(found)
    }
}

#[async_trait]
impl AppointmentLedger for InMemoryAppointmentLedger {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        self.ensure_online()?;
        let mut appointments = self.appointments.lock().await;

        let position = SlotPosition {
            date: appointment.date,
            start_time: appointment.start_time,
        };
        if Self::slot_taken(&appointments, &appointment.staff_id, position, None) {
            return Err(AppointmentError::SlotConflict {
                staff_id: appointment.staff_id,
                date: appointment.date,
                start_time: appointment.start_time,
            });
        }

        let stored = appointment.into_appointment(Uuid::new_v4());
        debug!("Stored appointment {} in memory", stored.id);
        appointments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.ensure_online()?;
        Ok(self.appointments.lock().await.get(&id).cloned())
    }

    async fn list_for_staff_on(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let staff_id = staff_id.to_string();
        self.collect(move |a| a.staff_id == staff_id && a.date == date)
            .await
    }

    async fn list_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.collect(move |a| a.date == date).await
    }

    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.collect(move |a| a.date >= from && a.date <= to).await
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.ensure_online()?;
        let mut appointments = self.appointments.lock().await;

        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };
        if appointment.status != expected || expected.is_terminal() {
            return Ok(None);
        }

        appointment.status = target;
        appointment.updated_at = now;
        Ok(Some(appointment.clone()))
    }

    async fn compare_and_move(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        from: SlotPosition,
        to: SlotPosition,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.ensure_online()?;
        let mut appointments = self.appointments.lock().await;

        let Some(current) = appointments.get(&id) else {
            return Ok(None);
        };
        if current.status != expected
            || current.date != from.date
            || current.start_time != from.start_time
        {
            return Ok(None);
        }

        if Self::slot_taken(&appointments, &current.staff_id, to, Some(id)) {
            return Err(AppointmentError::SlotConflict {
                staff_id: current.staff_id.clone(),
                date: to.date,
                start_time: to.start_time,
            });
        }

        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };
        appointment.date = to.date;
        appointment.start_time = to.start_time;
        appointment.updated_at = now;
        Ok(Some(appointment.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    use crate::models::Urgency;

    fn new_appointment(staff_id: &str, h: u32) -> NewAppointment {
        NewAppointment {
            patient_id: "patient-1".to_string(),
            staff_id: staff_id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
            duration_minutes: 30,
            reason: "Check-up".to_string(),
            urgency: Urgency::Routine,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_active_booking_on_same_slot_is_rejected() {
        let ledger = InMemoryAppointmentLedger::new();
        ledger.insert(new_appointment("doc-1", 9)).await.unwrap();

        let err = ledger.insert(new_appointment("doc-1", 9)).await.unwrap_err();
        assert!(matches!(err, AppointmentError::SlotConflict { .. }));

        // Different staff member, same time.
        ledger.insert(new_appointment("doc-2", 9)).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_booking_releases_slot() {
        let ledger = InMemoryAppointmentLedger::new();
        let first = ledger.insert(new_appointment("doc-1", 9)).await.unwrap();

        let cancelled = ledger
            .compare_and_set_status(
                first.id,
                AppointmentStatus::Pending,
                AppointmentStatus::Cancelled,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(cancelled.is_some());

        ledger.insert(new_appointment("doc-1", 9)).await.unwrap();
    }

    #[tokio::test]
    async fn stale_expected_status_does_not_write() {
        let ledger = InMemoryAppointmentLedger::new();
        let stored = ledger.insert(new_appointment("doc-1", 9)).await.unwrap();

        let result = ledger
            .compare_and_set_status(
                stored.id,
                AppointmentStatus::Confirmed,
                AppointmentStatus::CheckedIn,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(result.is_none());

        let unchanged = ledger.get(stored.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_rows_are_never_rewritten() {
        let ledger = InMemoryAppointmentLedger::new();
        let stored = ledger.insert(new_appointment("doc-1", 9)).await.unwrap();
        ledger
            .compare_and_set_status(
                stored.id,
                AppointmentStatus::Pending,
                AppointmentStatus::Cancelled,
                Utc::now(),
            )
            .await
            .unwrap();

        let revived = ledger
            .compare_and_set_status(
                stored.id,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Pending,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(revived.is_none());

        let unchanged = ledger.get(stored.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn offline_ledger_reports_dependency_error() {
        let ledger = InMemoryAppointmentLedger::new();
        ledger.set_offline(true);
        let err = ledger.insert(new_appointment("doc-1", 9)).await.unwrap_err();
        assert!(matches!(err, AppointmentError::Dependency(_)));
    }
}
