// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scriptorium.

use serde::Serialize;
use thiserror::Error;

use crate::types::{DocumentId, DocumentState};

/// Top-level error type for all Scriptorium operations.
#[derive(Debug, Error)]
pub enum ScriptoriumError {
    // -- Request validation --
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    // -- Lifecycle --
    #[error("document {0} is already being processed")]
    AlreadyInProgress(DocumentId),

    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("document {id} is not ready (state: {state})")]
    NotReady { id: DocumentId, state: DocumentState },

    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    // -- Rendering --
    #[error("export failed: {0}")]
    Export(String),

    // -- Storage / persistence --
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable, caller-visible classification of a [`ScriptoriumError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedMediaType,
    PayloadTooLarge,
    AlreadyInProgress,
    NotFound,
    NotReady,
    ProcessingFailed,
    StorageUnavailable,
}

impl ErrorKind {
    /// Wire code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::AlreadyInProgress => "ALREADY_IN_PROGRESS",
            Self::NotFound => "NOT_FOUND",
            Self::NotReady => "NOT_READY",
            Self::ProcessingFailed => "PROCESSING_FAILED",
            Self::StorageUnavailable => "STORAGE_UNAVAILABLE",
        }
    }
}

impl ScriptoriumError {
    /// Classify this error into the public taxonomy.
    ///
    /// I/O and serialization failures surface as storage failures because
    /// they only arise while reading or writing persisted state.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::AlreadyInProgress(_) => ErrorKind::AlreadyInProgress,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::ProcessingFailed(_) | Self::Export(_) => ErrorKind::ProcessingFailed,
            Self::StorageUnavailable(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::StorageUnavailable
            }
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScriptoriumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_as_storage() {
        let err: ScriptoriumError =
            std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(err.kind().code(), "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn not_ready_message_names_state() {
        let err = ScriptoriumError::NotReady {
            id: DocumentId::new(),
            state: DocumentState::Processing,
        };
        assert!(err.to_string().contains("Processing"));
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }
}
