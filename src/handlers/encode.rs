use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::HeaderMap,
    response::Json,
};
use tracing::{debug, info, warn};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{BinaryUploadQuery, ProcessedFile, SubmissionData, SubmissionResponse};
use crate::services::SubmissionResult;

const DEFAULT_BINARY_NAME: &str = "uploaded.pdf";

fn short_request_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

pub fn download_url(artifact_name: &str) -> String {
    format!("/download/{}", urlencoding::encode(artifact_name))
}

fn to_response(result: SubmissionResult) -> SubmissionResponse {
    SubmissionResponse::new(
        SubmissionData {
            download_url: download_url(&result.artifact_name),
            artifact_name: result.artifact_name,
            manifest_name: result.manifest_name,
            bit_length: result.bit_length,
            images: result.images,
            texts: result.texts,
            pages: result.pages,
        },
        result.processing_time_ms,
    )
}

/// Reads the first multipart field called `field_name` as an uploaded document.
pub async fn read_multipart_file(multipart: &mut Multipart, field_name: &str) -> AppResult<ProcessedFile> {
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::InvalidFile {
        message: format!("Failed to read multipart field: {}", e),
    })? {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .ok_or(AppError::MissingFile)?
            .to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());

        let data = field.bytes().await.map_err(|e| AppError::InvalidFile {
            message: format!("Failed to read file data: {}", e),
        })?;

        let mut file = ProcessedFile::new(file_name, data.to_vec());
        if let Some(mime_type) = content_type {
            file = file.with_mime_type(mime_type);
        }

        debug!(
            "Extracted file: {} ({} bytes, type: {:?})",
            file.name,
            file.size(),
            file.mime_type
        );
        return Ok(file);
    }

    Err(AppError::MissingFile)
}

/// `POST /api/v1/encode` with a multipart `file` field.
pub async fn encode_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<SubmissionResponse>> {
    let request_id = short_request_id();
    info!(request_id = %request_id, "Starting multipart encode request");

    let file = read_multipart_file(&mut multipart, "file").await?;
    info!(
        request_id = %request_id,
        file_name = %file.name,
        file_size = file.size(),
        "File extracted from multipart form"
    );

    let result = state.service.submit(file).await?;
    info!(
        request_id = %request_id,
        artifact = %result.artifact_name,
        bit_length = result.bit_length,
        "Encode request completed"
    );

    Ok(Json(to_response(result)))
}

/// `POST /api/v1/encode/binary` with the PDF as the raw request body.
pub async fn encode_binary_handler(
    State(state): State<AppState>,
    Query(query): Query<BinaryUploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<SubmissionResponse>> {
    let request_id = short_request_id();
    info!(request_id = %request_id, "Starting binary encode request");

    let content_type = headers
        .get("content-type")
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or("");
    if !content_type.contains("application/pdf") {
        warn!(
            request_id = %request_id,
            content_type = content_type,
            "Invalid content type for binary upload"
        );
        return Err(AppError::InvalidContentType);
    }
    if body.is_empty() {
        return Err(AppError::MissingFile);
    }

    let name = query
        .filename
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BINARY_NAME.to_string());
    let file = ProcessedFile::new(name, body.to_vec()).with_mime_type("application/pdf");

    let result = state.service.submit(file).await?;
    info!(
        request_id = %request_id,
        artifact = %result.artifact_name,
        bit_length = result.bit_length,
        "Binary encode request completed"
    );

    Ok(Json(to_response(result)))
}
