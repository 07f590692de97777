use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};

use crate::analytics::{self, AnalyticsService};
use crate::context::Actor;
use crate::error::ApiError;
use crate::models::{Prescription, PrescriptionRequest, TopDrugRow, TopDrugsParams};
use crate::prescriptions::{self, PrescriptionService};
use crate::AppState;

/// POST /prescriptions
/// Create a prescription on behalf of the calling physician or admin
pub async fn create_prescription(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<PrescriptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    // Patients are turned away before the body is even looked at
    prescriptions::ensure_may_prescribe(&actor)?;

    let Json(request) = payload
        .map_err(|e| ApiError::invalid_argument(format!("invalid JSON: {}", e.body_text())))?;

    let service = PrescriptionService::new(state.store.clone());
    let prescription = service.create(&actor, request).await?;

    Ok((StatusCode::CREATED, Json(prescription)))
}

/// GET /analytics/top-drugs?from=&to=&limit=
/// Most prescribed drugs by total quantity, scoped to the caller
pub async fn top_drugs(
    State(state): State<AppState>,
    actor: Actor,
    params: Result<Query<TopDrugsParams>, QueryRejection>,
) -> Result<Json<Vec<TopDrugRow>>, ApiError> {
    let Query(params) = params
        .map_err(|e| ApiError::invalid_argument(format!("invalid query: {}", e.body_text())))?;

    let service = AnalyticsService::new(state.store.clone());
    let rows = service.top_drugs(&actor, &params, analytics::today()).await?;

    Ok(Json(rows))
}

/// OPTIONS on the API paths. CORS preflights carrying an `Origin` are
/// answered by the CORS layer before reaching this.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
