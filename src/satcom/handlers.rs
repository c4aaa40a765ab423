use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::handlers::json_body,
    error::{ApiError, ApiResponse},
    satcom::{
        dto::{Satcom, SatcomInput},
        repo::SatcomStore,
    },
    state::AppState,
};

const NOT_FOUND: &str = "Satcom data";

pub fn satcom_routes() -> Router<AppState> {
    Router::new()
        .route("/satcom", get(list).post(create))
        .route("/satcom/:id", get(fetch).put(update).delete(remove))
}

fn record_id(id: Result<Path<i32>, PathRejection>) -> Result<i32, ApiError> {
    id.map(|Path(id)| id).map_err(|e| {
        warn!(error = %e, "invalid satcom id");
        ApiError::Validation("Invalid satcom id".into())
    })
}

#[instrument(skip(store, payload))]
pub async fn create(
    State(store): State<Arc<dyn SatcomStore>>,
    payload: Result<Json<SatcomInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Satcom>>), ApiError> {
    let input = json_body(payload)?.validated()?;
    let row = store.create(input).await?;
    info!(id = row.id, "satcom record created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Satcom data created successfully", row)),
    ))
}

#[instrument(skip(store))]
pub async fn list(
    State(store): State<Arc<dyn SatcomStore>>,
) -> Result<Json<ApiResponse<Vec<Satcom>>>, ApiError> {
    let rows = store.list().await?;
    Ok(Json(ApiResponse::ok("Satcom data retrieved successfully", rows)))
}

#[instrument(skip(store, id))]
pub async fn fetch(
    State(store): State<Arc<dyn SatcomStore>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ApiResponse<Satcom>>, ApiError> {
    let id = record_id(id)?;
    let row = store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))?;
    Ok(Json(ApiResponse::ok("Satcom data retrieved successfully", row)))
}

#[instrument(skip(store, id, payload))]
pub async fn update(
    State(store): State<Arc<dyn SatcomStore>>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<SatcomInput>, JsonRejection>,
) -> Result<Json<ApiResponse<Satcom>>, ApiError> {
    let id = record_id(id)?;
    let input = json_body(payload)?.validated()?;
    let row = store
        .update(id, input)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))?;
    info!(id, "satcom record updated");
    Ok(Json(ApiResponse::ok("Satcom data updated successfully", row)))
}

#[instrument(skip(store, id))]
pub async fn remove(
    State(store): State<Arc<dyn SatcomStore>>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = record_id(id)?;
    if !store.delete(id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.into()));
    }
    info!(id, "satcom record deleted");
    Ok(Json(ApiResponse::message(true, "Satcom data deleted successfully")))
}
