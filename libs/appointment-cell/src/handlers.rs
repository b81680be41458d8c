// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use staff_cell::models::StaffRole;

use crate::models::{
    Appointment, AppointmentError, AvailableSlotsResponse, BookAppointmentRequest, DateQuery,
    ExportQuery, LoadOverview, NotificationIntent, RescheduleAppointmentRequest, SlotQuery,
    TransitionRequest, UtilizationReport, WaitingQuery,
};
use crate::services::SchedulingService;

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub scheduling: Arc<SchedulingService>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, scheduling: Arc<SchedulingService>) -> Self {
        Self { config, scheduling }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        let message = e.to_string();
        match e {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::SlotConflict { .. } | AppointmentError::ConcurrentModification { .. } => {
                AppError::Conflict(message)
            }
            AppointmentError::InvalidTransition { .. } => AppError::InvalidTransition(message),
            AppointmentError::NotFound(_) => AppError::NotFound(message),
            AppointmentError::Dependency(msg) => AppError::Dependency(msg),
            AppointmentError::DataIntegrity(msg) => AppError::Internal(msg),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct UtilizationQuery {
    pub staff_id: String,
    pub date: chrono::NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub date: chrono::NaiveDate,
    pub role: Option<StaffRole>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpireRequest {
    pub date: Option<chrono::NaiveDate>,
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let resolver = &state.scheduling.resolver;
    let slots = resolver.compute_available_slots(&query.staff_id, query.date).await?;

    Ok(Json(AvailableSlotsResponse {
        staff_id: query.staff_id,
        date: query.date,
        slot_duration_minutes: resolver.grid().slot_duration_minutes(),
        available_slots: slots.iter().map(|t| t.format("%H:%M").to_string()).collect(),
    }))
}

pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    debug!("User {} booking {} for staff {}", user.id, request.start_time, request.staff_id);
    let appointment = state.scheduling.booking.book_appointment(request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.scheduling.booking.get_appointment(appointment_id).await?;
    Ok(Json(appointment))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    debug!("User {} rescheduling appointment {}", user.id, appointment_id);
    let appointment = state
        .scheduling
        .booking
        .reschedule_appointment(appointment_id, request.new_date, request.new_start_time)
        .await?;
    Ok(Json(appointment))
}

// ==============================================================================
// STATUS WORKFLOW HANDLERS
// ==============================================================================

pub async fn transition_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Appointment>, AppError> {
    debug!(
        "User {} moving appointment {} to {}",
        user.id, appointment_id, request.target_status
    );
    let appointment = state
        .scheduling
        .workflow
        .transition(appointment_id, request.target_status, request.expected_status)
        .await?;
    Ok(Json(appointment))
}

pub async fn get_allowed_transitions(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (status, next) = state.scheduling.workflow.next_states(appointment_id).await?;
    Ok(Json(json!({
        "appointment_id": appointment_id,
        "status": status,
        "allowed_transitions": next,
    })))
}

// ==============================================================================
// READ-SIDE HANDLERS
// ==============================================================================

pub async fn get_utilization(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<UtilizationQuery>,
) -> Result<Json<UtilizationReport>, AppError> {
    let report = state
        .scheduling
        .utilization
        .compute_utilization(&query.staff_id, query.date)
        .await?;
    Ok(Json(report))
}

pub async fn get_load_overview(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<OverviewQuery>,
) -> Json<LoadOverview> {
    Json(
        state
            .scheduling
            .utilization
            .staff_load_overview(query.date, query.role)
            .await,
    )
}

pub async fn list_today_appointments(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .scheduling
        .reporting
        .list_today_appointments(query.date)
        .await?;
    Ok(Json(json!({
        "date": query.date,
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

pub async fn list_waiting_patients(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<WaitingQuery>,
) -> Result<Json<Value>, AppError> {
    let waiting = state
        .scheduling
        .reporting
        .list_waiting_patients(query.date, query.threshold_minutes, Utc::now())
        .await?;
    Ok(Json(json!({
        "date": query.date,
        "threshold_minutes": query.threshold_minutes,
        "waiting": waiting,
    })))
}

pub async fn export_appointments(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<Value>, AppError> {
    let records = state
        .scheduling
        .reporting
        .export_appointments(query.from, query.to)
        .await?;
    Ok(Json(json!({
        "from": query.from,
        "to": query.to,
        "records": records,
    })))
}

// ==============================================================================
// INTENTS AND MAINTENANCE
// ==============================================================================

pub async fn notify_staff(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<(StatusCode, Json<NotificationIntent>), AppError> {
    let intent = state
        .scheduling
        .reporting
        .notify_staff_about_waiting_patient(appointment_id, Utc::now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(intent)))
}

pub async fn expire_pending(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    request: Option<Json<ExpireRequest>>,
) -> Result<Json<Value>, AppError> {
    let now = Utc::now();
    let date = request
        .and_then(|Json(body)| body.date)
        .unwrap_or_else(|| now.date_naive());

    debug!("User {} running pending expiry for {}", user.id, date);
    let expiry = &state.scheduling.expiry;
    let expired = expiry.expire_stale_pending(date, now).await?;

    Ok(Json(json!({
        "date": date,
        "policy": format!("{:?}", expiry.policy()),
        "expired": expired,
    })))
}
