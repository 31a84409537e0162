//! Test case generation

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/testcases", get(list_test_cases_handler))
        .route(
            "/testcases/generate",
            post(generate_test_cases_handler).get(list_test_cases_handler),
        )
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    /// SRS id
    #[serde(alias = "srs_id")]
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TestCaseFilter {
    srs_id: Option<i64>,
}

/// Ask the LLM for cases and upsert them under the SRS
async fn generate_test_cases_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let srs = state
        .db
        .get_srs(req.id)?
        .ok_or_else(|| ApiError::not_found("SRS not found"))?;

    let drafts = state
        .llm
        .generate_test_cases(&srs.title, srs.content.as_deref().unwrap_or(""))
        .await?;

    let mut cases = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        cases.push(state.db.upsert_test_case(srs.id, draft)?);
    }

    info!(
        "Generated {} test case(s) for SRS {} via {}",
        cases.len(),
        srs.id,
        state.llm.provider_name()
    );
    Ok(Json(cases))
}

async fn list_test_cases_handler(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<TestCaseFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = filter?;
    Ok(Json(state.db.list_test_cases(filter.srs_id)?))
}
