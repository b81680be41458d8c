use std::fs;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use tracing::{info, warn};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::{
    InMemoryAppointmentLedger, InMemoryPatientDirectory, SchedulingService, TracingNotificationSink,
};
use shared_config::AppConfig;
use staff_cell::handlers::StaffState;
use staff_cell::models::Staff;
use staff_cell::router::staff_routes;
use staff_cell::services::{InMemoryStaffDirectory, StaffDirectory, SupabaseStaffDirectory};

pub fn create_router(config: Arc<AppConfig>) -> anyhow::Result<Router> {
    let (directory, scheduling) = build_backends(&config)?;

    let staff_state = Arc::new(StaffState::new(config.clone(), directory));
    let appointment_state = Arc::new(AppointmentState::new(config.clone(), Arc::new(scheduling)));

    Ok(Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/staff", staff_routes(staff_state))
        .nest("/appointments", appointment_routes(appointment_state)))
}

/// Supabase when configured, otherwise process-local stores seeded from
/// `STAFF_SEED_FILE`.
fn build_backends(config: &AppConfig) -> anyhow::Result<(Arc<dyn StaffDirectory>, SchedulingService)> {
    if config.supabase_url.is_empty() {
        warn!("SUPABASE_URL not set, scheduling data lives in memory and is lost on restart");
        let roster = match &config.staff_seed_file {
            Some(path) => load_roster(path)?,
            None => {
                warn!("STAFF_SEED_FILE not set, the in-memory roster is empty and every booking will fail");
                Vec::new()
            }
        };

        let directory: Arc<dyn StaffDirectory> = Arc::new(InMemoryStaffDirectory::with_staff(
            config.scheduling.default_daily_capacity_minutes,
            roster,
        ));
        let scheduling = SchedulingService::new(
            &config.scheduling,
            Arc::new(InMemoryAppointmentLedger::new()),
            directory.clone(),
            Arc::new(InMemoryPatientDirectory::new()),
            Arc::new(TracingNotificationSink),
        );
        return Ok((directory, scheduling));
    }

    let directory: Arc<dyn StaffDirectory> = Arc::new(SupabaseStaffDirectory::new(config));
    let scheduling = SchedulingService::with_supabase(config, directory.clone());
    Ok((directory, scheduling))
}

fn load_roster(path: &str) -> anyhow::Result<Vec<Staff>> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read staff roster {}", path))?;
    let roster: Vec<Staff> =
        serde_json::from_str(&raw).with_context(|| format!("malformed staff roster {}", path))?;
    info!("Seeded {} staff members from {}", roster.len(), path);
    Ok(roster)
}
