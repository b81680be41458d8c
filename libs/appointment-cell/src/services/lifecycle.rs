// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::ledger::AppointmentLedger;

/// Legal next states of `current`. Terminal states have none.
pub fn allowed_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    use crate::models::AppointmentStatus::*;

    match current {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[CheckedIn, Cancelled],
        CheckedIn => &[InProgress, Cancelled],
        InProgress => &[Completed],
        Completed | Cancelled => &[],
    }
}

pub fn validate_status_transition(
    current: AppointmentStatus,
    target: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if allowed_transitions(current).contains(&target) {
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {} -> {}", current, target);
        Err(AppointmentError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

/// Applies status changes as compare-and-swap writes on the ledger.
pub struct StatusWorkflowEngine {
    ledger: Arc<dyn AppointmentLedger>,
}

impl StatusWorkflowEngine {
    pub fn new(ledger: Arc<dyn AppointmentLedger>) -> Self {
        Self { ledger }
    }

    /// Moves the appointment to `target` if the edge is legal from the status
    /// the caller observed (`expected`, or the stored status when absent) and
    /// the stored status still equals it at write time.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
        expected: Option<AppointmentStatus>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self
            .ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::appointment_not_found(appointment_id))?;

        let observed = expected.unwrap_or(current.status);
        validate_status_transition(observed, target)?;

        if observed != current.status {
            debug!(
                "Caller observed {} but appointment {} is {}",
                observed, appointment_id, current.status
            );
            return Err(AppointmentError::ConcurrentModification {
                appointment_id,
                expected: observed,
            });
        }

        match self
            .ledger
            .compare_and_set_status(appointment_id, observed, target, Utc::now())
            .await?
        {
            Some(updated) => {
                info!("Appointment {} moved {} -> {}", appointment_id, observed, target);
                Ok(updated)
            }
            None => match self.ledger.get(appointment_id).await? {
                Some(_) => {
                    warn!("Lost status race on appointment {} ({} -> {})", appointment_id, observed, target);
                    Err(AppointmentError::ConcurrentModification {
                        appointment_id,
                        expected: observed,
                    })
                }
                None => Err(AppointmentError::appointment_not_found(appointment_id)),
            },
        }
    }

    pub async fn next_states(
        &self,
        appointment_id: Uuid,
    ) -> Result<(AppointmentStatus, Vec<AppointmentStatus>), AppointmentError> {
        let appointment = self
            .ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::appointment_not_found(appointment_id))?;
        Ok((
            appointment.status,
            allowed_transitions(appointment.status).to_vec(),
        ))
    }
}
