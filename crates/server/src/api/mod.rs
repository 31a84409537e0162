//! REST API
//!
//! JSON endpoints under `/api`, plus the health check at `/` and the
//! OpenAPI docs under `/docs`.

use axum::Router;
use std::sync::Arc;

use crate::server::AppState;

mod docs;
mod reports;
mod runs;
mod scripts;
mod srs;
mod testcases;
mod upload;

/// All routes with state applied
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(srs::routes())
        .merge(upload::routes())
        .merge(testcases::routes())
        .merge(scripts::routes())
        .merge(runs::routes())
        .merge(reports::routes());

    Router::new()
        .route("/", axum::routing::get(health_handler))
        .nest("/api", api)
        .merge(docs::routes())
        .fallback(not_found_handler)
        .with_state(state)
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "message": "Healthy" }))
}

async fn not_found_handler() -> crate::error::ApiError {
    crate::error::ApiError::not_found("Not found")
}
