// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use staff_cell::services::StaffDirectory;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, NewAppointment,
};
use crate::services::conflict::ConflictResolver;
use crate::services::ledger::{AppointmentLedger, SlotPosition};

/// Statuses from which an appointment may still be moved.
const RESCHEDULABLE: [AppointmentStatus; 2] =
    [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

pub struct BookingEngine {
    resolver: Arc<ConflictResolver>,
    ledger: Arc<dyn AppointmentLedger>,
    staff: Arc<dyn StaffDirectory>,
}

impl BookingEngine {
    pub fn new(
        resolver: Arc<ConflictResolver>,
        ledger: Arc<dyn AppointmentLedger>,
        staff: Arc<dyn StaffDirectory>,
    ) -> Self {
        Self {
            resolver,
            ledger,
            staff,
        }
    }

    /// Commits a pending appointment. The ledger's uniqueness guarantee is the
    /// final arbiter; the availability check only shortens the losing path.
    #[instrument(skip(self, request), fields(staff_id = %request.staff_id, date = %request.date, start = %request.start_time))]
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = request.patient_id.trim();
        let staff_id = request.staff_id.trim();
        if patient_id.is_empty() {
            return Err(AppointmentError::Validation("patient_id is required".to_string()));
        }
        if staff_id.is_empty() {
            return Err(AppointmentError::Validation("staff_id is required".to_string()));
        }

        let grid = self.resolver.grid();
        if !grid.contains(request.date, request.start_time) {
            return Err(AppointmentError::Validation(format!(
                "{} is not a bookable slot on {}",
                request.start_time.format("%H:%M"),
                request.date
            )));
        }

        let staff = self.staff.get_staff(staff_id).await?;
        if !staff.available {
            return Err(AppointmentError::Validation(format!(
                "Staff member {} is not available for booking",
                staff_id
            )));
        }

        self.ensure_slot_free(staff_id, request.date, request.start_time, None)
            .await?;

        let appointment = self
            .ledger
            .insert(NewAppointment {
                patient_id: patient_id.to_string(),
                staff_id: staff_id.to_string(),
                date: request.date,
                start_time: request.start_time,
                duration_minutes: grid.slot_duration_minutes(),
                reason: request.reason.trim().to_string(),
                urgency: request.urgency,
                created_at: Utc::now(),
            })
            .await
            .inspect_err(|e| {
                if e.is_conflict() {
                    warn!("Lost booking race for staff {} at {}", staff_id, request.start_time);
                }
            })?;

        info!(
            "Booked appointment {} for patient {} with staff {}",
            appointment.id, appointment.patient_id, appointment.staff_id
        );
        Ok(appointment)
    }

    /// Moves a pending or confirmed appointment to another slot with one
    /// guarded write. A lost race leaves the original booking untouched.
    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        new_start_time: NaiveTime,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id).await?;

        if !RESCHEDULABLE.contains(&current.status) {
            return Err(AppointmentError::Validation(format!(
                "Appointment {} is {} and can no longer be rescheduled",
                appointment_id, current.status
            )));
        }
        if !self.resolver.grid().contains(new_date, new_start_time) {
            return Err(AppointmentError::Validation(format!(
                "{} is not a bookable slot on {}",
                new_start_time.format("%H:%M"),
                new_date
            )));
        }
        if current.date == new_date && current.start_time == new_start_time {
            debug!("Reschedule of {} targets its current slot, nothing to do", appointment_id);
            return Ok(current);
        }

        self.ensure_slot_free(&current.staff_id, new_date, new_start_time, Some(appointment_id))
            .await?;

        let from = SlotPosition {
            date: current.date,
            start_time: current.start_time,
        };
        let to = SlotPosition {
            date: new_date,
            start_time: new_start_time,
        };

        match self
            .ledger
            .compare_and_move(appointment_id, current.status, from, to, Utc::now())
            .await?
        {
            Some(moved) => {
                info!(
                    "Rescheduled appointment {} from {} {} to {} {}",
                    appointment_id, from.date, from.start_time, to.date, to.start_time
                );
                Ok(moved)
            }
            None => {
                warn!("Appointment {} changed while rescheduling", appointment_id);
                match self.ledger.get(appointment_id).await? {
                    Some(_) => Err(AppointmentError::ConcurrentModification {
                        appointment_id,
                        expected: current.status,
                    }),
                    None => Err(AppointmentError::appointment_not_found(appointment_id)),
                }
            }
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::appointment_not_found(appointment_id))
    }

    async fn ensure_slot_free(
        &self,
        staff_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        excluding: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let available = match excluding {
            Some(id) => {
                self.resolver
                    .compute_available_slots_excluding(staff_id, date, id)
                    .await?
            }
            None => self.resolver.compute_available_slots(staff_id, date).await?,
        };

        if available.contains(&start_time) {
            Ok(())
        } else {
            Err(AppointmentError::SlotConflict {
                staff_id: staff_id.to_string(),
                date,
                start_time,
            })
        }
    }
}
