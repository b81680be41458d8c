// libs/appointment-cell/src/services/scheduler.rs
use std::sync::Arc;

use shared_config::{AppConfig, SchedulingConfig};
use staff_cell::services::StaffDirectory;

use crate::services::{
    booking::BookingEngine,
    conflict::ConflictResolver,
    expiry::{PendingExpiryPolicy, PendingExpiryService},
    ledger::AppointmentLedger,
    lifecycle::StatusWorkflowEngine,
    notification::{NotificationSink, TracingNotificationSink},
    patients::{PatientDirectory, SupabasePatientDirectory},
    reporting::ReportingService,
    slot_grid::SlotGrid,
    supabase_ledger::SupabaseAppointmentLedger,
    utilization::UtilizationService,
};

/// The one scheduling authority: every component shares the same ledger and
/// directory handles.
pub struct SchedulingService {
    pub ledger: Arc<dyn AppointmentLedger>,
    pub staff: Arc<dyn StaffDirectory>,
    pub resolver: Arc<ConflictResolver>,
    pub booking: BookingEngine,
    pub workflow: Arc<StatusWorkflowEngine>,
    pub utilization: UtilizationService,
    pub reporting: ReportingService,
    pub expiry: PendingExpiryService,
}

impl SchedulingService {
    pub fn new(
        scheduling: &SchedulingConfig,
        ledger: Arc<dyn AppointmentLedger>,
        staff: Arc<dyn StaffDirectory>,
        patients: Arc<dyn PatientDirectory>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let resolver = Arc::new(ConflictResolver::new(SlotGrid::new(scheduling), Arc::clone(&ledger)));
        let workflow = Arc::new(StatusWorkflowEngine::new(Arc::clone(&ledger)));

        Self {
            booking: BookingEngine::new(Arc::clone(&resolver), Arc::clone(&ledger), Arc::clone(&staff)),
            utilization: UtilizationService::new(Arc::clone(&ledger), Arc::clone(&staff)),
            reporting: ReportingService::new(
                Arc::clone(&ledger),
                Arc::clone(&staff),
                patients,
                notifications,
            ),
            expiry: PendingExpiryService::new(
                PendingExpiryPolicy::from_config(scheduling),
                Arc::clone(&ledger),
                Arc::clone(&workflow),
            ),
            resolver,
            workflow,
            ledger,
            staff,
        }
    }

    /// Supabase-backed wiring that shares the given staff directory.
    pub fn with_supabase(config: &AppConfig, staff: Arc<dyn StaffDirectory>) -> Self {
        Self::new(
            &config.scheduling,
            Arc::new(SupabaseAppointmentLedger::new(config)),
            staff,
            Arc::new(SupabasePatientDirectory::new(config)),
            Arc::new(TracingNotificationSink),
        )
    }
}
