// libs/staff-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, require_clinic_staff};

use crate::handlers::{self, StaffState};

pub fn staff_routes(state: Arc<StaffState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_available_staff))
        .route("/{staff_id}/capacity", get(handlers::get_staff_capacity))
        .route("/recommendations", post(handlers::recommend_staff))
        .layer(middleware::from_fn(require_clinic_staff))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
