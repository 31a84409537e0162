//! SRS file upload

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{debug, info};

use vv_common::NewSrs;

use crate::error::{ApiError, ApiResult};
use crate::normalize;
use crate::server::AppState;

/// Upper bound for an uploaded SRS document
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/srs/upload",
        post(upload_srs_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
    )
}

struct UploadForm {
    file_name: Option<String>,
    data: Vec<u8>,
    title: Option<String>,
    description: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm {
        file_name: None,
        data: Vec::new(),
        title: None,
        description: None,
    };
    let mut saw_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" if !saw_file => {
                saw_file = true;
                form.file_name = field.file_name().map(str::to_string);
                form.data = field.bytes().await?.to_vec();
            }
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    if !saw_file {
        return Err(ApiError::bad_request("No file part"));
    }
    Ok(form)
}

/// Store the original upload and create an SRS from its normalized text
async fn upload_srs_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let multipart = multipart.map_err(|_| ApiError::bad_request("No file part"))?;
    let form = read_form(multipart).await?;

    let original = form.file_name.unwrap_or_default();
    if original.trim().is_empty() {
        return Err(ApiError::bad_request("No selected file"));
    }

    let file_name = normalize::sanitize_filename(&original);
    let ext = normalize::extension_of(&file_name);
    if !normalize::is_allowed(&ext) {
        return Err(ApiError::bad_request(format!("Unsupported file type: {}", ext)));
    }

    let save_path = state.storage.path_for_upload(&file_name);
    tokio::fs::write(&save_path, &form.data).await?;
    debug!("Saved upload to {}", save_path.display());

    let data = form.data;
    let content = tokio::task::spawn_blocking(move || normalize::normalize(&ext, &data))
        .await
        .map_err(|e| vv_common::Error::Internal(format!("normalization task failed: {}", e)))?;

    let title = form
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_name.clone());
    let srs = state.db.create_srs(&NewSrs {
        title,
        description: form.description,
        content: Some(content),
    })?;

    info!("Uploaded {} as SRS {}", file_name, srs.id);
    Ok((StatusCode::CREATED, Json(srs)))
}
