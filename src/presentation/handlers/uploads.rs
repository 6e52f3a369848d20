use std::io;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;

use crate::presentation::state::AppState;

use super::error::ApiError;

#[derive(Serialize)]
pub struct UploadResponse {
    pub object_key: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
}

/// Streams the first multipart file field into the blob store.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let filename = field.file_name().unwrap_or("unnamed").to_string();
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    tracing::debug!(filename = %filename, mime_type = %mime_type, "Receiving upload");

    let body = field
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        .boxed();
    let uploaded = state.job_service.upload(&filename, &mime_type, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            object_key: uploaded.object_key.to_string(),
            filename,
            mime_type,
            size_bytes: uploaded.size_bytes,
            media_type: uploaded.media_type.map(|m| m.as_str().to_string()),
        }),
    ))
}
