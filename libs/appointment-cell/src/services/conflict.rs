// libs/appointment-cell/src/services/conflict.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use crate::models::AppointmentError;
use crate::services::ledger::AppointmentLedger;
use crate::services::slot_grid::SlotGrid;

/// Derives free slots by subtracting active occupants from the grid. The
/// single place where occupancy is interpreted.
pub struct ConflictResolver {
    grid: SlotGrid,
    ledger: Arc<dyn AppointmentLedger>,
}

impl ConflictResolver {
    pub fn new(grid: SlotGrid, ledger: Arc<dyn AppointmentLedger>) -> Self {
        Self { grid, ledger }
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    pub async fn compute_available_slots(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        self.available_slots(staff_id, date, None).await
    }

    /// Same as [`Self::compute_available_slots`] but ignores the occupancy of
    /// `excluded`, so an appointment can be moved within its own day.
    pub async fn compute_available_slots_excluding(
        &self,
        staff_id: &str,
        date: NaiveDate,
        excluded: Uuid,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        self.available_slots(staff_id, date, Some(excluded)).await
    }

    /// Start times held by active appointments of the staff member on `date`.
    pub async fn occupied_slots(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let mut occupied: Vec<NaiveTime> = self
            .ledger
            .list_for_staff_on(staff_id, date)
            .await?
            .into_iter()
            .filter(|a| a.occupies_slot())
            .map(|a| a.start_time)
            .collect();
        occupied.sort();
        occupied.dedup();
        Ok(occupied)
    }

    async fn available_slots(
        &self,
        staff_id: &str,
        date: NaiveDate,
        excluded: Option<Uuid>,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let occupied: HashSet<NaiveTime> = self
            .ledger
            .list_for_staff_on(staff_id, date)
            .await?
            .into_iter()
            .filter(|a| a.occupies_slot() && Some(a.id) != excluded)
            .map(|a| a.start_time)
            .collect();

        let available: Vec<NaiveTime> = self
            .grid
            .generate_slots(date)
            .into_iter()
            .filter(|slot| !occupied.contains(slot))
            .collect();

        debug!(
            "Staff {} on {}: {} free, {} occupied",
            staff_id,
            date,
            available.len(),
            occupied.len()
        );
        Ok(available)
    }
}
