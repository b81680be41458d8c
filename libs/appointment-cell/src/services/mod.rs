pub mod booking;
pub mod conflict;
pub mod expiry;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod notification;
pub mod patients;
pub mod reporting;
pub mod scheduler;
pub mod slot_grid;
pub mod supabase_ledger;
pub mod utilization;

pub use booking::BookingEngine;
pub use conflict::ConflictResolver;
pub use expiry::{PendingExpiryPolicy, PendingExpiryService};
pub use ledger::{AppointmentLedger, SlotPosition};
pub use lifecycle::{allowed_transitions, validate_status_transition, StatusWorkflowEngine};
pub use memory::InMemoryAppointmentLedger;
pub use notification::{ChannelNotificationSink, NotificationSink, TracingNotificationSink};
pub use patients::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
pub use reporting::ReportingService;
pub use scheduler::SchedulingService;
pub use slot_grid::SlotGrid;
pub use supabase_ledger::SupabaseAppointmentLedger;
pub use utilization::{compute_utilization_percent, UtilizationService};
