// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request handlers.  Each one parses its inputs, calls `AppServices`, and
// shapes the reply; no document logic lives here.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use scriptorium_core::config::Settings;
use scriptorium_core::error::ScriptoriumError;
use scriptorium_core::types::{DocumentId, ExportFormat, UploadOptions};
use scriptorium_pipeline::{Artifact, DocumentSummary, IngestionRequest, RepresentationSet};

use super::error::ApiResult;
use crate::services::app_services::AppServices;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

/// Reply to an accepted upload or processing request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub success: bool,
    pub document_id: DocumentId,
}

impl Accepted {
    fn reply(document_id: DocumentId) -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(Self {
                success: true,
                document_id,
            }),
        )
    }
}

fn parse_id(raw: &str) -> Result<DocumentId, ScriptoriumError> {
    raw.parse()
}

/// GET /health
pub async fn health(State(services): State<AppServices>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "recognizer": services.recognizer_name(),
    }))
}

/// GET /documents[?q=]
pub async fn list_documents(
    State(services): State<AppServices>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<DocumentSummary>>> {
    let summaries = services.list_documents(params.q.as_deref()).await?;
    Ok(Json(summaries))
}

/// GET /documents/:id
pub async fn get_document(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let document = services.document(parse_id(&id)?).await?;
    Ok(Json(document.record()).into_response())
}

/// GET /documents/:id/views
pub async fn get_views(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> ApiResult<Json<RepresentationSet>> {
    Ok(Json(services.views(parse_id(&id)?).await?))
}

/// GET /documents/:id/image and /documents/:id/thumbnail
pub async fn get_original(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let (bytes, mime) = services.original(parse_id(&id)?).await?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// GET /documents/:id/export?format=
///
/// A missing or blank `format` falls back to the default export format.
pub async fn export_document(
    State(services): State<AppServices>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let format = params
        .format
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(str::parse::<ExportFormat>)
        .transpose()?;

    let artifact = services.export(id, format).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}

/// POST /documents/:id/process
pub async fn process_document(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    let id = parse_id(&id)?;
    services.request_processing(id).await?;
    info!(document_id = %id, "processing requested");
    Ok(Accepted::reply(id))
}

/// POST /ocr (multipart)
///
/// Every part carrying a filename (or named `file`) is an artifact; the
/// option parts are `"true"`/`"false"` strings.  Unknown parts are ignored.
pub async fn upload(
    State(services): State<AppServices>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Accepted>)> {
    let mut request = IngestionRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_owned);

        if name == "file" || filename.is_some() {
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field.bytes().await?;
            request.artifacts.push(Artifact {
                filename: filename.unwrap_or_default(),
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await?;
        if !apply_option(&mut request.options, &name, &value)? {
            debug!(field = %name, "ignoring unknown upload field");
        }
    }

    let id = services.ingest(request).await?;
    Ok(Accepted::reply(id))
}

/// Set the upload option named `name`; `false` if no such option exists.
fn apply_option(options: &mut UploadOptions, name: &str, value: &str) -> Result<bool, ScriptoriumError> {
    let slot = match name {
        "detectTables" => &mut options.detect_tables,
        "detectHandwriting" => &mut options.detect_handwriting,
        "multiLanguage" => &mut options.multi_language,
        "preserveFormatting" => &mut options.preserve_formatting,
        "detectDiagrams" => &mut options.detect_diagrams,
        _ => return Ok(false),
    };
    *slot = Some(parse_flag(name, value)?);
    Ok(true)
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ScriptoriumError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ScriptoriumError::InvalidRequest(format!(
            "{name} must be \"true\" or \"false\", got {value:?}"
        ))),
    }
}

/// GET /settings
pub async fn get_settings(State(services): State<AppServices>) -> Json<Settings> {
    Json(Settings::clone(&services.settings()))
}

/// PUT /settings (replaces the whole object)
pub async fn put_settings(
    State(services): State<AppServices>,
    body: Bytes,
) -> ApiResult<Json<Settings>> {
    let settings: Settings = serde_json::from_slice(&body)
        .map_err(|e| ScriptoriumError::InvalidRequest(format!("settings body: {e}")))?;
    let stored = services.replace_settings(settings).await?;
    Ok(Json(Settings::clone(&stored)))
}
