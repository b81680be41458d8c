// libs/appointment-cell/src/services/utilization.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use staff_cell::models::{Staff, StaffError, StaffRole};
use staff_cell::services::StaffDirectory;

use crate::models::{Appointment, AppointmentError, LoadOverview, UtilizationReport};
use crate::services::ledger::AppointmentLedger;

/// `min(100, 100 * booked / capacity)`; zero capacity reads as idle.
pub fn compute_utilization_percent(booked_minutes: u32, capacity_minutes: u32) -> f64 {
    if capacity_minutes == 0 {
        return 0.0;
    }
    (100.0 * f64::from(booked_minutes) / f64::from(capacity_minutes)).min(100.0)
}

fn booked_minutes<'a>(appointments: impl IntoIterator<Item = &'a Appointment>) -> u32 {
    appointments
        .into_iter()
        .filter(|a| a.occupies_slot())
        .map(|a| a.duration_minutes)
        .sum()
}

pub struct UtilizationService {
    ledger: Arc<dyn AppointmentLedger>,
    staff: Arc<dyn StaffDirectory>,
}

impl UtilizationService {
    pub fn new(ledger: Arc<dyn AppointmentLedger>, staff: Arc<dyn StaffDirectory>) -> Self {
        Self { ledger, staff }
    }

    /// Utilization of one staff member. An unreachable directory falls back to
    /// the default capacity and an unreachable ledger counts nothing booked;
    /// both set `degraded`. Unknown staff is still `NotFound`.
    pub async fn compute_utilization(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<UtilizationReport, AppointmentError> {
        let mut degraded = false;

        let capacity_minutes = match self.staff.get_capacity(staff_id, date).await {
            Ok(capacity) => capacity,
            Err(StaffError::DirectoryUnavailable(msg)) => {
                warn!("Capacity of {} unavailable, using default: {}", staff_id, msg);
                degraded = true;
                self.staff.default_capacity_minutes()
            }
            Err(e) => return Err(e.into()),
        };

        let booked = match self.ledger.list_for_staff_on(staff_id, date).await {
            Ok(appointments) => booked_minutes(appointments.iter().filter(|a| a.staff_id == staff_id)),
            Err(AppointmentError::Dependency(msg)) => {
                warn!("Utilization of {} on {} has no ledger data: {}", staff_id, date, msg);
                degraded = true;
                0
            }
            Err(e) => return Err(e),
        };

        Ok(UtilizationReport {
            staff_id: staff_id.to_string(),
            date,
            booked_minutes: booked,
            capacity_minutes,
            utilization_percent: compute_utilization_percent(booked, capacity_minutes),
            degraded,
        })
    }

    /// Load of every available staff member on `date`. Read failures shrink
    /// the overview and set `degraded` instead of failing the call.
    pub async fn staff_load_overview(&self, date: NaiveDate, role: Option<StaffRole>) -> LoadOverview {
        let roles = match role {
            Some(role) => vec![role],
            None => vec![StaffRole::Doctor, StaffRole::Nurse],
        };

        let mut degraded = false;
        let mut roster: Vec<Staff> = Vec::new();
        for role in roles {
            match self.staff.list_available(role, date).await {
                Ok(mut staff) => roster.append(&mut staff),
                Err(e) => {
                    warn!("Load overview missing {} staff: {}", role, e);
                    degraded = true;
                }
            }
        }

        let by_staff: HashMap<String, Vec<Appointment>> = match self.ledger.list_on(date).await {
            Ok(appointments) => appointments.into_iter().fold(HashMap::new(), |mut acc, a| {
                acc.entry(a.staff_id.clone()).or_insert_with(Vec::new).push(a);
                acc
            }),
            Err(e) => {
                warn!("Load overview has no ledger data for {}: {}", date, e);
                return LoadOverview {
                    date,
                    staff: Vec::new(),
                    degraded: true,
                };
            }
        };

        let default_capacity = self.staff.default_capacity_minutes();
        let staff = roster
            .into_iter()
            .map(|member| {
                let capacity_minutes = member.daily_capacity_minutes.unwrap_or(default_capacity);
                let booked = by_staff
                    .get(&member.id)
                    .map(|list| booked_minutes(list.iter()))
                    .unwrap_or(0);
                UtilizationReport {
                    staff_id: member.id,
                    date,
                    booked_minutes: booked,
                    capacity_minutes,
                    utilization_percent: compute_utilization_percent(booked, capacity_minutes),
                    degraded: false,
                }
            })
            .collect::<Vec<_>>();

        debug!("Load overview for {}: {} staff, degraded={}", date, staff.len(), degraded);
        LoadOverview {
            date,
            staff,
            degraded,
        }
    }
}
