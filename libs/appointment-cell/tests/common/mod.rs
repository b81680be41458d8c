// libs/appointment-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use appointment_cell::models::{BookAppointmentRequest, Urgency};
use appointment_cell::services::{
    InMemoryAppointmentLedger, InMemoryPatientDirectory, NotificationSink, SchedulingService,
    TracingNotificationSink,
};
use shared_config::SchedulingConfig;
use staff_cell::models::{Staff, StaffRole};
use staff_cell::services::InMemoryStaffDirectory;

pub struct Harness {
    pub ledger: Arc<InMemoryAppointmentLedger>,
    pub staff: Arc<InMemoryStaffDirectory>,
    pub patients: Arc<InMemoryPatientDirectory>,
    pub service: Arc<SchedulingService>,
}

pub fn june_10() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn staff(id: &str, name: &str, role: StaffRole, specialization: &str) -> Staff {
    Staff {
        id: id.to_string(),
        display_name: name.to_string(),
        role,
        specialization: specialization.to_string(),
        available: true,
        daily_capacity_minutes: None,
    }
}

pub fn default_roster() -> Vec<Staff> {
    vec![
        staff("doc-1", "Dr. Adams", StaffRole::Doctor, "Internal Medicine"),
        staff("doc-2", "Dr. Brown", StaffRole::Doctor, "Dermatology"),
        staff("nurse-1", "Nurse Kim", StaffRole::Nurse, "General"),
    ]
}

pub fn booking(patient_id: &str, staff_id: &str, date: NaiveDate, start: NaiveTime) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_id: patient_id.to_string(),
        staff_id: staff_id.to_string(),
        date,
        start_time: start,
        reason: "Check-up".to_string(),
        urgency: Urgency::Routine,
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(SchedulingConfig::default(), default_roster(), Arc::new(TracingNotificationSink))
    }

    pub fn with(
        scheduling: SchedulingConfig,
        roster: Vec<Staff>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let ledger = Arc::new(InMemoryAppointmentLedger::new());
        let staff = Arc::new(InMemoryStaffDirectory::with_staff(
            scheduling.default_daily_capacity_minutes,
            roster,
        ));
        let patients = Arc::new(InMemoryPatientDirectory::new());
        let service = Arc::new(SchedulingService::new(
            &scheduling,
            ledger.clone(),
            staff.clone(),
            patients.clone(),
            notifications,
        ));

        Self {
            ledger,
            staff,
            patients,
            service,
        }
    }
}
