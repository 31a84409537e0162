//! SRS documents

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use vv_common::NewSrs;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/srs", get(list_srs_handler).post(create_srs_handler))
        .route("/srs/:id", get(get_srs_handler).delete(delete_srs_handler))
}

async fn create_srs_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewSrs>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new) = payload?;
    let srs = state.db.create_srs(&new)?;
    info!("Created SRS {} ({})", srs.id, srs.title);
    Ok((StatusCode::CREATED, Json(srs)))
}

async fn list_srs_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.list_srs()?))
}

async fn get_srs_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    match state.db.get_srs(id)? {
        Some(srs) => Ok(Json(srs)),
        None => Err(ApiError::not_found("Not found")),
    }
}

/// Removes the SRS together with its test cases, scripts and results
async fn delete_srs_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.db.delete_srs(id)? {
        info!("Deleted SRS {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Not found"))
    }
}
