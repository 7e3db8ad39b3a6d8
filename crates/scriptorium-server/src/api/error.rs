// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// API error responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use scriptorium_core::error::{ErrorKind, ScriptoriumError};

/// Structured error body: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] ScriptoriumError),

    /// The multipart body could not be read (malformed, or over the body
    /// limit).
    #[error("upload could not be read: {}", .0.body_text())]
    Multipart(#[from] MultipartError),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::AlreadyInProgress | ErrorKind::NotReady => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ProcessingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Domain(e) => (status_for(e.kind()), e.kind().code()),
            ApiError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorKind::PayloadTooLarge.code(),
            ),
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidRequest.code()),
        };

        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_core::types::{DocumentId, DocumentState};

    #[test]
    fn every_kind_maps_to_documented_status() {
        let cases = [
            (ErrorKind::InvalidRequest, 400),
            (ErrorKind::UnsupportedMediaType, 415),
            (ErrorKind::PayloadTooLarge, 413),
            (ErrorKind::AlreadyInProgress, 409),
            (ErrorKind::NotFound, 404),
            (ErrorKind::NotReady, 409),
            (ErrorKind::ProcessingFailed, 500),
            (ErrorKind::StorageUnavailable, 503),
        ];
        for (kind, status) in cases {
            assert_eq!(status_for(kind).as_u16(), status, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn body_carries_code_and_message() {
        let err = ApiError::from(ScriptoriumError::NotReady {
            id: DocumentId::new(),
            state: DocumentState::Processing,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "NOT_READY");
        assert!(json["error"]["message"].as_str().unwrap().contains("Processing"));
    }
}
