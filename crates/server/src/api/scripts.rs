//! Script generation

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use vv_common::{NewScript, TestCaseDraft};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scripts", get(list_scripts_handler))
        .route(
            "/scripts/generate",
            post(generate_script_handler).get(list_scripts_handler),
        )
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    test_case_id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptFilter {
    test_case_id: Option<i64>,
}

/// Generate a pytest/Playwright script, write it under `scripts/tc_<id>/`
/// and record it
async fn generate_script_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let test_case = state
        .db
        .get_test_case(req.test_case_id)?
        .ok_or_else(|| ApiError::not_found("TestCase not found"))?;

    let content = state
        .llm
        .generate_script(&TestCaseDraft::from(&test_case))
        .await?;
    let (path, _file_name) = state
        .scripts
        .write_script_for_test_case(test_case.id, &test_case.name, &content)
        .await?;

    let script = state.db.create_script(&NewScript::pytest_playwright(
        test_case.id,
        content,
        path.to_string_lossy().to_string(),
    ))?;

    info!(
        "Generated script {} for test case {} at {}",
        script.id,
        test_case.id,
        path.display()
    );
    Ok((StatusCode::CREATED, Json(script)))
}

async fn list_scripts_handler(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<ScriptFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = filter?;
    Ok(Json(state.db.list_scripts(filter.test_case_id)?))
}
