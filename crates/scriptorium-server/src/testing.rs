// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: fully wired services on a temporary data directory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use scriptorium_core::config::{ConfigStore, ServiceConfig, Settings};
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{
    Document, DocumentId, RecognitionMetadata, ResolvedOptions, Table, UploadOptions,
};
use scriptorium_document::{Detection, Recognition, RecognitionInput, Recognizer};
use scriptorium_pipeline::{Artifact, IngestionRequest};
use scriptorium_store::SqliteDocumentStore;

use crate::services::app_services::AppServices;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

/// Always recognizes the same one-table invoice.
pub struct InvoiceRecognizer;

#[async_trait]
impl Recognizer for InvoiceRecognizer {
    fn name(&self) -> &str {
        "invoice"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        Ok(Recognition {
            text: "Invoice #42".into(),
            tables: Detection::Found(vec![Table {
                html: "<table><tr><th>Item</th><th>Total</th></tr><tr><td>Widget</td><td>42</td></tr></table>".into(),
            }]),
            diagrams: Detection::Found(Vec::new()),
            metadata: RecognitionMetadata {
                page_count: 1,
                languages: vec!["eng".into()],
                confidence: 92.0,
            },
        })
    }
}

/// Never finishes within a test.
pub struct StalledRecognizer;

#[async_trait]
impl Recognizer for StalledRecognizer {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ScriptoriumError::ProcessingFailed("unreachable".into()))
    }
}

pub struct TestServices {
    pub services: AppServices,
    pub dir: tempfile::TempDir,
}

impl TestServices {
    pub fn new() -> Self {
        Self::with_recognizer(Arc::new(InvoiceRecognizer))
    }

    pub fn with_recognizer(recognizer: Arc<dyn Recognizer>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().display().to_string();
        let config = ServiceConfig::from_lookup(|key| match key {
            "SCRIPTORIUM_DATA_DIR" => Some(root.clone()),
            "SCRIPTORIUM_PROCESSING_TIMEOUT_SECS" => Some("5".into()),
            _ => None,
        })
        .expect("service config");
        let documents = Arc::new(SqliteDocumentStore::open_in_memory().expect("open store"));
        let services = AppServices::assemble(
            &config,
            ConfigStore::in_memory(Settings::default()),
            documents,
            recognizer,
        )
        .expect("assemble services");
        Self { services, dir }
    }

    pub async fn upload_png(&self) -> DocumentId {
        let artifact = Artifact {
            filename: "invoice.png".into(),
            content_type: Some("image/png".into()),
            bytes: PNG_BYTES.to_vec(),
        };
        self.services
            .ingest(IngestionRequest::single(artifact, UploadOptions::default()))
            .await
            .expect("ingest")
    }

    /// Poll until `id` is `Ready` or `Failed`; panics after 10s.
    pub async fn wait_terminal(&self, id: DocumentId) -> Document {
        let poll = async {
            loop {
                let document = self.services.document(id).await.expect("document");
                if document.state.is_terminal() {
                    return document;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), poll)
            .await
            .expect("document reached a terminal state")
    }

    pub async fn ready_document(&self) -> Document {
        let id = self.upload_png().await;
        self.wait_terminal(id).await
    }
}
