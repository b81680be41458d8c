// libs/staff-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    CapacityQuery, CapacityResponse, RecommendationRequest, StaffError, StaffListQuery,
};
use crate::services::{RecommendationService, StaffDirectory};

pub struct StaffState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn StaffDirectory>,
    pub recommendations: RecommendationService,
}

impl StaffState {
    pub fn new(config: Arc<AppConfig>, directory: Arc<dyn StaffDirectory>) -> Self {
        Self {
            config,
            recommendations: RecommendationService::new(Arc::clone(&directory)),
            directory,
        }
    }
}

impl From<StaffError> for AppError {
    fn from(e: StaffError) -> Self {
        match e {
            StaffError::NotFound(id) => AppError::NotFound(format!("Staff member {} not found", id)),
            StaffError::DirectoryUnavailable(msg) => AppError::Dependency(msg),
            StaffError::DataIntegrity(msg) => AppError::Internal(msg),
        }
    }
}

pub async fn list_available_staff(
    State(state): State<Arc<StaffState>>,
    Query(query): Query<StaffListQuery>,
) -> Result<Json<Value>, AppError> {
    let staff = state.directory.list_available(query.role, query.date).await?;

    Ok(Json(json!({
        "date": query.date,
        "role": query.role,
        "staff": staff,
    })))
}

pub async fn get_staff_capacity(
    State(state): State<Arc<StaffState>>,
    Path(staff_id): Path<String>,
    Query(query): Query<CapacityQuery>,
) -> Result<Json<CapacityResponse>, AppError> {
    let capacity_minutes = state.directory.get_capacity(&staff_id, query.date).await?;

    Ok(Json(CapacityResponse {
        staff_id,
        date: query.date,
        capacity_minutes,
    }))
}

/// Always answers 200; an unreachable directory shows up as an empty list.
pub async fn recommend_staff(
    State(state): State<Arc<StaffState>>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<Value>, AppError> {
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
    let ranked = state
        .recommendations
        .recommend(&request.symptom_tags, request.role, date)
        .await;

    Ok(Json(json!({
        "symptom_tags": request.symptom_tags,
        "staff": ranked,
    })))
}
