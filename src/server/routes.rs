//! Route handlers.

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, Response};
use axum::{Extension, Json};
use cafconvert_av::ToolInfo;
use cafconvert_core::{Error, RequestId};
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use super::error::AppError;
use super::AppContext;
use crate::batch::{ConversionRequest, Deliverable, ResultBundle, Upload};

/// Multipart field carrying the uploaded files.
pub const FILES_FIELD: &str = "files[]";

/// Message returned when the form has no file field at all.
pub const NO_FILES_UPLOADED: &str = "No files uploaded";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>CAF to MP3</title>
</head>
<body>
  <h1>Convert CAF to MP3</h1>
  <p>Select one file to get an MP3 back, or several to get a zip archive.</p>
  <form action="/convert" method="post" enctype="multipart/form-data">
    <input type="file" name="files[]" accept=".caf" multiple>
    <button type="submit">Convert</button>
  </form>
</body>
</html>
"#;

/// GET / -- upload form.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// GET /api/tools -- converter availability.
pub async fn tools(State(ctx): State<AppContext>) -> Result<Json<Vec<ToolInfo>>, AppError> {
    let registry = ctx.tools.clone();
    // `check_all` runs `ffmpeg -version` synchronously.
    let infos = tokio::task::spawn_blocking(move || registry.check_all())
        .await
        .map_err(|e| Error::Internal(format!("tool check failed: {e}")))?;
    Ok(Json(infos))
}

/// POST /convert -- convert every `files[]` part of the form.
pub async fn convert(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let fail = |e: Error| AppError::new(e).with_request_id(request_id);

    let mut uploads = Vec::new();
    let mut saw_field = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| fail(multipart_error(e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        saw_field = true;

        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| fail(multipart_error(e)))?;
        uploads.push(Upload { name, bytes });
    }

    if !saw_field {
        return Err(fail(Error::EmptySubmission(NO_FILES_UPLOADED.into())));
    }

    let bundle = ctx
        .converter
        .convert(ConversionRequest::with_id(request_id, uploads))
        .await
        .map_err(fail)?;

    match bundle {
        ResultBundle::Single(deliverable) => deliver_file(deliverable).await.map_err(fail),
        ResultBundle::Archive { name, bytes, .. } => {
            attachment(&name, "application/zip", bytes.len() as u64, Body::from(bytes))
                .map_err(fail)
        }
    }
}

/// Body-limit overruns keep their 413; any other multipart fault is a
/// malformed request.
fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(e.body_text())
    } else {
        Error::Validation(e.body_text())
    }
}

/// Stream a converted file to the caller. The file is removed once the body
/// has been sent or the connection drops.
async fn deliver_file(deliverable: Deliverable) -> cafconvert_core::Result<Response> {
    let (download_name, removal) = deliverable.into_parts();

    let file = tokio::fs::File::open(removal.path()).await?;
    let len = file.metadata().await?.len();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _owned = &removal;
        chunk
    });

    attachment(&download_name, "audio/mpeg", len, Body::from_stream(stream))
}

fn attachment(
    download_name: &str,
    content_type: &str,
    len: u64,
    body: Body,
) -> cafconvert_core::Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{download_name}\""),
        )
        .body(body)
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}
