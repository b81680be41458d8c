// libs/appointment-cell/src/services/reporting.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use staff_cell::services::StaffDirectory;

use crate::models::{
    Appointment, AppointmentError, AppointmentExportRecord, AppointmentStatus, NotificationIntent,
    NotificationKind, WaitingPatient,
};
use crate::services::ledger::AppointmentLedger;
use crate::services::notification::NotificationSink;
use crate::services::patients::PatientDirectory;

/// Statuses for which a patient can still be waiting on staff.
const NOTIFIABLE: [AppointmentStatus; 3] = [
    AppointmentStatus::Pending,
    AppointmentStatus::Confirmed,
    AppointmentStatus::CheckedIn,
];

/// Read contracts consumed by dashboards and exports, plus the waiting-patient
/// notification intent.
pub struct ReportingService {
    ledger: Arc<dyn AppointmentLedger>,
    staff: Arc<dyn StaffDirectory>,
    patients: Arc<dyn PatientDirectory>,
    notifications: Arc<dyn NotificationSink>,
}

impl ReportingService {
    pub fn new(
        ledger: Arc<dyn AppointmentLedger>,
        staff: Arc<dyn StaffDirectory>,
        patients: Arc<dyn PatientDirectory>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            staff,
            patients,
            notifications,
        }
    }

    pub async fn list_today_appointments(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.ledger.list_on(date).await
    }

    /// Pending appointments on `date` created more than `threshold_minutes`
    /// before `now`, longest wait first.
    pub async fn list_waiting_patients(
        &self,
        date: NaiveDate,
        threshold_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitingPatient>, AppointmentError> {
        if threshold_minutes < 0 {
            return Err(AppointmentError::Validation(
                "threshold_minutes must not be negative".to_string(),
            ));
        }

        let threshold = Duration::minutes(threshold_minutes);
        let mut waiting: Vec<WaitingPatient> = self
            .ledger
            .list_on(date)
            .await?
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Pending && now - a.created_at > threshold)
            .map(|appointment| WaitingPatient {
                waited_minutes: (now - appointment.created_at).num_minutes(),
                appointment,
            })
            .collect();

        waiting.sort_by(|a, b| {
            b.waited_minutes
                .cmp(&a.waited_minutes)
                .then_with(|| a.appointment.start_time.cmp(&b.appointment.start_time))
        });
        debug!("{} patients waiting longer than {} minutes on {}", waiting.len(), threshold_minutes, date);
        Ok(waiting)
    }

    /// Flat records for the inclusive range, ordered by date then start time.
    /// Unresolvable names fall back to the stored ids.
    pub async fn export_appointments(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AppointmentExportRecord>, AppointmentError> {
        if from > to {
            return Err(AppointmentError::Validation(format!(
                "Export range start {} is after end {}",
                from, to
            )));
        }

        let appointments = self.ledger.list_between(from, to).await?;

        let staff_ids = unique(appointments.iter().map(|a| a.staff_id.as_str()));
        let patient_ids = unique(appointments.iter().map(|a| a.patient_id.as_str()));

        let staff_names: HashMap<String, String> = match self.staff.get_many(&staff_ids).await {
            Ok(staff) => staff.into_iter().map(|s| (s.id, s.display_name)).collect(),
            Err(e) => {
                warn!("Export falling back to staff ids: {}", e);
                HashMap::new()
            }
        };
        let patient_names = self
            .patients
            .display_names(&patient_ids)
            .await
            .unwrap_or_else(|e| {
                warn!("Export falling back to patient ids: {}", e);
                HashMap::new()
            });

        Ok(appointments
            .into_iter()
            .map(|a| AppointmentExportRecord {
                patient_name: patient_names
                    .get(&a.patient_id)
                    .cloned()
                    .unwrap_or_else(|| a.patient_id.clone()),
                staff_name: staff_names
                    .get(&a.staff_id)
                    .cloned()
                    .unwrap_or_else(|| a.staff_id.clone()),
                date: a.date,
                start_time: a.start_time,
                status: a.status,
                reason: a.reason,
            })
            .collect())
    }

    /// Emits a "patient is waiting" intent for the appointment's staff member.
    pub async fn notify_staff_about_waiting_patient(
        &self,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<NotificationIntent, AppointmentError> {
        let appointment = self
            .ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::appointment_not_found(appointment_id))?;

        if !NOTIFIABLE.contains(&appointment.status) {
            return Err(AppointmentError::Validation(format!(
                "Appointment {} is {}; no patient is waiting",
                appointment_id, appointment.status
            )));
        }

        let intent = NotificationIntent {
            kind: NotificationKind::WaitingPatient,
            appointment_id,
            staff_id: appointment.staff_id,
            patient_id: appointment.patient_id,
            waited_minutes: (now - appointment.created_at).num_minutes().max(0),
            emitted_at: now,
        };

        self.notifications.publish(intent.clone()).await?;
        info!("Staff {} asked to see waiting patient {}", intent.staff_id, intent.patient_id);
        Ok(intent)
    }
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}
