// libs/appointment-cell/src/services/slot_grid.rs
use chrono::{Duration, NaiveDate, NaiveTime};

use shared_config::{BusinessWindow, SchedulingConfig};

/// Bookable start times for a day. Identical for every staff member.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    slot_duration_minutes: u32,
    windows: Vec<BusinessWindow>,
}

impl SlotGrid {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            slot_duration_minutes: config.slot_duration_minutes.max(1),
            windows: config.business_hours.clone(),
        }
    }

    pub fn slot_duration_minutes(&self) -> u32 {
        self.slot_duration_minutes
    }

    /// Ordered start times for `date`. Every business day shares one grid.
    pub fn generate_slots(&self, _date: NaiveDate) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(self.slot_duration_minutes));
        let mut slots = Vec::new();

        for window in &self.windows {
            let mut current = window.start;
            while current <= window.end {
                slots.push(current);
                let (next, wrapped) = current.overflowing_add_signed(step);
                if wrapped != 0 || next <= current {
                    break;
                }
                current = next;
            }
        }

        // Adjacent windows share their boundary.
        slots.sort();
        slots.dedup();
        slots
    }

    pub fn contains(&self, date: NaiveDate, start_time: NaiveTime) -> bool {
        self.generate_slots(date).contains(&start_time)
    }
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::new(&SchedulingConfig::default())
    }
}
