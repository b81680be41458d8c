// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, require_clinic_staff};

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    Router::new()
        // Booking
        .route("/", post(handlers::book_appointment))
        .route("/slots", get(handlers::get_available_slots))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        // Status workflow
        .route("/{appointment_id}/transition", post(handlers::transition_appointment))
        .route("/{appointment_id}/transitions", get(handlers::get_allowed_transitions))
        .route("/{appointment_id}/notify-staff", post(handlers::notify_staff))
        // Read side
        .route("/utilization", get(handlers::get_utilization))
        .route("/utilization/overview", get(handlers::get_load_overview))
        .route("/today", get(handlers::list_today_appointments))
        .route("/waiting", get(handlers::list_waiting_patients))
        .route("/export", get(handlers::export_appointments))
        .route("/expire-pending", post(handlers::expire_pending))
        .layer(middleware::from_fn(require_clinic_staff))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
