use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use super::AppState;
use crate::error::AppResult;

/// Serves stored bytes as a download, typed by the artifact's extension.
pub fn artifact_response(name: &str, body: Bytes) -> Response {
    let content_type = if name.ends_with(".json") {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// `GET /api/v1/artifacts/:name`
pub async fn artifact_handler(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Response> {
    let body = state.service.fetch(&name).await?;
    tracing::info!(artifact = %name, bytes = body.len(), "Artifact served");
    Ok(artifact_response(&name, body))
}
