//! Reporting

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use vv_common::{RunStatus, RunSummary};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/reports/latest", get(latest_report_handler))
}

#[derive(Debug, Serialize)]
struct LatestReport {
    run_id: i64,
    status: RunStatus,
    #[serde(flatten)]
    summary: RunSummary,
}

/// Outcome counts of the most recently created run
async fn latest_report_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<LatestReport>> {
    let run = state
        .db
        .latest_run()?
        .ok_or_else(|| ApiError::not_found("No runs"))?;
    let summary = state.db.summarize_run(run.id)?;
    Ok(Json(LatestReport {
        run_id: run.id,
        status: run.status,
        summary,
    }))
}
