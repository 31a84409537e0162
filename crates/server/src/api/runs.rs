//! Test runs

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use vv_common::storage::RUN_LOG;
use vv_common::{Database, NewTestResult, Outcome, Run, RunStatus, Script};

use crate::error::{ApiError, ApiResult};
use crate::execution::ExecutionOutcome;
use crate::server::AppState;

/// Lines returned by the log tail endpoint
const LOG_TAIL_LINES: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runs", get(list_runs_handler).post(create_run_handler))
        .route("/runs/:id", get(get_run_handler))
        .route("/runs/:id/results", get(run_results_handler))
        .route("/runs/:id/logs", get(run_logs_handler))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunRequest {
    #[serde(default)]
    pub label: Option<String>,
    pub script_ids: Vec<i64>,
    #[serde(default = "default_triggered_by")]
    pub triggered_by: String,
}

fn default_triggered_by() -> String {
    "api".to_string()
}

#[derive(Debug, Serialize)]
struct RunLogs {
    log_path: String,
    tail: String,
}

/// Script ids in request order with duplicates removed
fn distinct_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Script files passed to pytest, each once
fn distinct_paths(scripts: &[Script]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    scripts
        .iter()
        .filter_map(|s| s.file_path.as_deref())
        .filter(|p| seen.insert(p.to_string()))
        .map(PathBuf::from)
        .collect()
}

/// Result row for one script after pytest finished
fn result_for_script(run_id: i64, script: &Script, outcome: &ExecutionOutcome) -> NewTestResult {
    let junit_note = format!("See junit: {}", outcome.junit_path.display());
    let verdict = match (&outcome.report, script.file_path.as_deref()) {
        (Some(report), Some(path)) => report.verdict_for_script(std::path::Path::new(path)),
        _ => None,
    };

    let (result, duration_ms, message) = match verdict {
        Some(v) => (
            v.outcome,
            v.duration_ms,
            match v.message {
                Some(m) => format!("{}\n{}", m, junit_note),
                None => junit_note,
            },
        ),
        None if outcome.timed_out => (
            Outcome::Failed,
            None,
            format!("Run timed out after {}ms\n{}", outcome.duration_ms, junit_note),
        ),
        None if outcome.succeeded() => (Outcome::Passed, None, junit_note),
        None => (Outcome::Failed, None, junit_note),
    };

    NewTestResult {
        run_id,
        script_id: script.id,
        outcome: result,
        duration_ms,
        message: Some(message),
        artifacts_path: Some(outcome.log_path.to_string_lossy().to_string()),
    }
}

/// Execute the requested scripts through pytest and record one result per
/// script. Responds with the finished run.
async fn create_run_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRunRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    if req.script_ids.is_empty() {
        return Err(ApiError::bad_request("script_ids must not be empty"));
    }

    let ids = distinct_ids(&req.script_ids);
    let scripts: Vec<Script> = state
        .db
        .scripts_by_ids(&ids)?
        .into_iter()
        .filter(|s| s.file_path.is_some())
        .collect();
    if scripts.len() < ids.len() {
        warn!(
            "Skipping {} script id(s) that are unknown or have no file",
            ids.len() - scripts.len()
        );
    }
    if scripts.is_empty() {
        return Err(ApiError::not_found("No scripts found"));
    }

    let run = state
        .db
        .create_run(req.label.as_deref(), Some(req.triggered_by.as_str()))?;
    let paths = distinct_paths(&scripts);

    let (results, status): (Vec<NewTestResult>, _) =
        match state.executor.run_scripts(run.id, &paths).await {
            Ok(outcome) => {
                let status = if outcome.succeeded() {
                    RunStatus::Completed
                } else {
                    RunStatus::Failed
                };
                let results = scripts
                    .iter()
                    .map(|script| result_for_script(run.id, script, &outcome))
                    .collect();
                (results, status)
            }
            Err(e) => {
                error!("Run {} could not execute: {}", run.id, e);
                let log_path = state.storage.run_artifact(run.id, RUN_LOG);
                let results = scripts
                    .iter()
                    .map(|script| NewTestResult {
                        run_id: run.id,
                        script_id: script.id,
                        outcome: Outcome::Error,
                        duration_ms: None,
                        message: Some(e.to_string()),
                        artifacts_path: Some(log_path.to_string_lossy().to_string()),
                    })
                    .collect();
                (results, RunStatus::Failed)
            }
        };
    let finished = record_results(&state.db, run.id, &results, status)?;

    info!(
        "Run {} finished with status {} ({} script(s))",
        finished.id,
        finished.status,
        scripts.len()
    );
    Ok((StatusCode::CREATED, Json(finished)))
}

/// Store the results and close the run. A run whose results cannot be
/// stored is still closed as failed so it never stays `running`.
fn record_results(
    db: &Database,
    run_id: i64,
    results: &[NewTestResult],
    status: RunStatus,
) -> vv_common::Result<Run> {
    for result in results {
        if let Err(e) = db.insert_result(result) {
            error!("Run {}: failed to record result for script {}: {}", run_id, result.script_id, e);
            if let Err(finish_err) = db.finish_run(run_id, RunStatus::Failed) {
                warn!("Run {}: could not mark as failed: {}", run_id, finish_err);
            }
            return Err(e);
        }
    }
    db.finish_run(run_id, status)
}

async fn list_runs_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Run>>> {
    Ok(Json(state.db.list_runs()?))
}

async fn get_run_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Run>> {
    state
        .db
        .get_run(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Run not found"))
}

/// Results of a run; unknown runs simply have none
async fn run_results_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.db.results_for_run(id)?))
}

/// Path of `run.log` and its last lines
async fn run_logs_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RunLogs>> {
    let log_path = state.storage.run_artifact(id, RUN_LOG);
    let bytes = match tokio::fs::read(&log_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Log not found"));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(RunLogs {
        log_path: log_path.to_string_lossy().to_string(),
        tail: tail_lines(&String::from_utf8_lossy(&bytes), LOG_TAIL_LINES),
    }))
}

/// Last `n` lines, keeping their line endings
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    lines[lines.len().saturating_sub(n)..].concat()
}
