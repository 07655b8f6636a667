use axum::{
    extract::{Multipart, Path, State},
    response::{Html, Redirect, Response},
};
use tracing::info;

use super::{artifact_response, download_url, read_multipart_file, AppState};
use crate::error::AppResult;

const UPLOAD_FORM: &str = r#"<!doctype html>
<title>PDF Encoder</title>
<h1>Upload a PDF file</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
  <input type="file" name="pdf_file" accept="application/pdf">
  <input type="submit" value="Upload">
</form>
"#;

/// `GET /`
pub async fn index_handler() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// `POST /upload` from the HTML form; redirects to the artifact download.
pub async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Redirect> {
    let file = read_multipart_file(&mut multipart, "pdf_file").await?;
    let result = state.service.submit(file).await?;
    info!(artifact = %result.artifact_name, "Form upload encoded, redirecting to download");
    Ok(Redirect::to(&download_url(&result.artifact_name)))
}

/// `GET /download/:filename`
pub async fn download_handler(State(state): State<AppState>, Path(filename): Path<String>) -> AppResult<Response> {
    let body = state.service.fetch(&filename).await?;
    Ok(artifact_response(&filename, body))
}
