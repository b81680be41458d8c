// libs/appointment-cell/src/services/expiry.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};

use shared_config::SchedulingConfig;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::ledger::AppointmentLedger;
use crate::services::lifecycle::StatusWorkflowEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingExpiryPolicy {
    Disabled,
    /// Cancel pending appointments older than this many minutes.
    CancelAfter(u32),
}

impl PendingExpiryPolicy {
    pub fn from_config(config: &SchedulingConfig) -> Self {
        match config.pending_expiry_minutes {
            Some(minutes) if minutes > 0 => PendingExpiryPolicy::CancelAfter(minutes),
            _ => PendingExpiryPolicy::Disabled,
        }
    }
}

pub struct PendingExpiryService {
    policy: PendingExpiryPolicy,
    ledger: Arc<dyn AppointmentLedger>,
    workflow: Arc<StatusWorkflowEngine>,
}

impl PendingExpiryService {
    pub fn new(
        policy: PendingExpiryPolicy,
        ledger: Arc<dyn AppointmentLedger>,
        workflow: Arc<StatusWorkflowEngine>,
    ) -> Self {
        Self {
            policy,
            ledger,
            workflow,
        }
    }

    pub fn policy(&self) -> PendingExpiryPolicy {
        self.policy
    }

    /// Cancels stale pending appointments on `date` through the regular
    /// transition path. Appointments that change underneath are skipped.
    pub async fn expire_stale_pending(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let PendingExpiryPolicy::CancelAfter(minutes) = self.policy else {
            debug!("Pending expiry disabled, nothing to do for {}", date);
            return Ok(Vec::new());
        };
        let max_age = Duration::minutes(i64::from(minutes));

        let stale: Vec<Appointment> = self
            .ledger
            .list_on(date)
            .await?
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Pending && now - a.created_at > max_age)
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for appointment in stale {
            match self
                .workflow
                .transition(
                    appointment.id,
                    AppointmentStatus::Cancelled,
                    Some(AppointmentStatus::Pending),
                )
                .await
            {
                Ok(cancelled) => expired.push(cancelled),
                Err(
                    e @ (AppointmentError::ConcurrentModification { .. }
                    | AppointmentError::InvalidTransition { .. }
                    | AppointmentError::NotFound(_)),
                ) => {
                    debug!("Skipping expiry of {}: {}", appointment.id, e);
                }
                Err(e) => return Err(e),
            }
        }

        if !expired.is_empty() {
            info!("Expired {} pending appointments on {}", expired.len(), date);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_is_disabled_unless_configured() {
        assert_eq!(
            PendingExpiryPolicy::from_config(&SchedulingConfig::default()),
            PendingExpiryPolicy::Disabled
        );

        let config = SchedulingConfig {
            pending_expiry_minutes: Some(45),
            ..SchedulingConfig::default()
        };
        assert_eq!(
            PendingExpiryPolicy::from_config(&config),
            PendingExpiryPolicy::CancelAfter(45)
        );
    }
}
