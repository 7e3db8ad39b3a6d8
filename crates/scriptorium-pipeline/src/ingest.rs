// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ingestion gate — the only way a document comes into existence.

use std::sync::Arc;

use tracing::{info, instrument};

use scriptorium_core::config::{ConfigStore, Settings};
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{ArtifactKind, Document, DocumentId, UploadOptions};
use scriptorium_store::{ArtifactStore, DocumentStore};

use crate::blocking::run_blocking;
use crate::coordinator::{ProcessingCoordinator, RunHandle};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    /// MIME type as declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// An upload: the artifacts as received plus per-request options.
#[derive(Debug, Clone, Default)]
pub struct IngestionRequest {
    pub artifacts: Vec<Artifact>,
    pub options: UploadOptions,
}

impl IngestionRequest {
    pub fn single(artifact: Artifact, options: UploadOptions) -> Self {
        Self {
            artifacts: vec![artifact],
            options,
        }
    }
}

pub struct IngestionGate {
    config: Arc<ConfigStore>,
    documents: Arc<dyn DocumentStore>,
    artifacts: Arc<ArtifactStore>,
    coordinator: ProcessingCoordinator,
}

impl IngestionGate {
    pub fn new(
        config: Arc<ConfigStore>,
        documents: Arc<dyn DocumentStore>,
        artifacts: Arc<ArtifactStore>,
        coordinator: ProcessingCoordinator,
    ) -> Self {
        Self {
            config,
            documents,
            artifacts,
            coordinator,
        }
    }

    /// Validate an upload, store it as a `Received` document and queue it
    /// for processing.  Returns as soon as the document is durable; it does
    /// not wait for recognition.
    pub async fn ingest(&self, request: IngestionRequest) -> Result<DocumentId> {
        self.admit(request).await.map(|(id, _)| id)
    }

    /// [`ingest`](Self::ingest), also handing back the queued run so the
    /// caller can wait for it.
    #[instrument(skip_all, fields(artifacts = request.artifacts.len()))]
    pub async fn admit(&self, request: IngestionRequest) -> Result<(DocumentId, RunHandle)> {
        let settings = self.config.snapshot();
        let (artifact, kind) = validate(request.artifacts, &settings)?;
        let Artifact { filename, bytes, .. } = artifact;
        let size = bytes.len();

        let artifacts = Arc::clone(&self.artifacts);
        let hash = run_blocking(move || artifacts.put(&bytes)).await?;

        let document = Document::new(filename, kind, hash, request.options.resolve(&settings));
        let id = document.id;
        let documents = Arc::clone(&self.documents);
        let filename = document.filename.clone();
        run_blocking(move || documents.insert(&document)).await?;
        info!(
            document_id = %id,
            %filename,
            media_type = kind.mime_type(),
            bytes = size,
            "document received"
        );

        let run = self.coordinator.submit(id).await?;
        Ok((id, run))
    }
}

/// Check an upload against the ingestion rules, using one settings snapshot.
pub fn validate(artifacts: Vec<Artifact>, settings: &Settings) -> Result<(Artifact, ArtifactKind)> {
    let count = artifacts.len();
    let mut artifacts = artifacts.into_iter();
    let artifact = match (artifacts.next(), count) {
        (Some(artifact), 1) => artifact,
        (None, _) => return Err(ScriptoriumError::InvalidRequest("no file uploaded".into())),
        _ => {
            return Err(ScriptoriumError::InvalidRequest(format!(
                "exactly one file per upload, got {count}"
            )));
        }
    };

    if artifact.filename.trim().is_empty() {
        return Err(ScriptoriumError::InvalidRequest("file has no name".into()));
    }
    if artifact.bytes.is_empty() {
        return Err(ScriptoriumError::InvalidRequest(format!(
            "{} is empty",
            artifact.filename
        )));
    }

    let kind = ArtifactKind::resolve(artifact.content_type.as_deref(), &artifact.filename)
        .ok_or_else(|| {
            ScriptoriumError::UnsupportedMediaType(format!(
                "{} ({}); expected an image (PNG, JPEG, TIFF, BMP, GIF, WebP) or a PDF",
                artifact.filename,
                artifact.content_type.as_deref().unwrap_or("no declared type"),
            ))
        })?;

    let size = artifact.bytes.len() as u64;
    let limit = settings.max_file_size_bytes();
    if size > limit {
        return Err(ScriptoriumError::PayloadTooLarge { size, limit });
    }

    Ok((artifact, kind))
}
