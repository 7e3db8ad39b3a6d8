// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: scripted recognizers and a fully wired pipeline on a
// temporary data directory.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use scriptorium_core::config::{ConfigStore, Settings};
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{
    ArtifactKind, Document, DocumentId, DocumentState, ProcessingResult, RecognitionMetadata,
    ResolvedOptions, Table, UploadOptions,
};
use scriptorium_document::recognize::{Detection, Recognition, RecognitionInput, Recognizer};
use scriptorium_store::{ArtifactStore, DocumentStore, SqliteDocumentStore, hash_bytes};

use crate::coordinator::ProcessingCoordinator;
use crate::ingest::{Artifact, IngestionGate, IngestionRequest};

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

pub fn invoice_recognition() -> Recognition {
    Recognition {
        text: "Invoice #42".into(),
        tables: Detection::Found(vec![Table {
            html: "<table><tr><th>Item</th><th>Total</th></tr><tr><td>Widget</td><td>42</td></tr></table>"
                .into(),
        }]),
        diagrams: Detection::Found(Vec::new()),
        metadata: RecognitionMetadata {
            page_count: 1,
            languages: vec!["eng".into()],
            confidence: 92.0,
        },
    }
}

pub struct FixedRecognizer(pub Recognition);

#[async_trait]
impl Recognizer for FixedRecognizer {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        Ok(self.0.clone())
    }
}

pub struct SlowRecognizer(pub Duration);

#[async_trait]
impl Recognizer for SlowRecognizer {
    fn name(&self) -> &str {
        "slow"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        tokio::time::sleep(self.0).await;
        Ok(invoice_recognition())
    }
}

pub struct FailingRecognizer;

#[async_trait]
impl Recognizer for FailingRecognizer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        Err(ScriptoriumError::ProcessingFailed("engine unreachable".into()))
    }
}

pub struct PanickingRecognizer;

#[async_trait]
impl Recognizer for PanickingRecognizer {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        panic!("recognizer exploded");
    }
}

/// Blocks every run until [`GatedRecognizer::release`] is called.
#[derive(Default)]
pub struct GatedRecognizer {
    gate: Notify,
}

impl GatedRecognizer {
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Recognizer for GatedRecognizer {
    fn name(&self) -> &str {
        "gated"
    }

    async fn recognize(&self, _: &RecognitionInput, _: &ResolvedOptions) -> Result<Recognition> {
        self.gate.notified().await;
        Ok(invoice_recognition())
    }
}

/// SQLite store that can be told to refuse state transitions with a
/// storage error.
pub struct FlakyStore {
    inner: SqliteDocumentStore,
    refuse_begin: AtomicBool,
    refuse_complete: AtomicBool,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self {
            inner: SqliteDocumentStore::open_in_memory().expect("open store"),
            refuse_begin: AtomicBool::new(false),
            refuse_complete: AtomicBool::new(false),
        }
    }
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_begin(&self, refuse: bool) {
        self.refuse_begin.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_complete(&self, refuse: bool) {
        self.refuse_complete.store(refuse, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(ScriptoriumError::StorageUnavailable("disk full".into()));
        }
        Ok(())
    }
}

impl DocumentStore for FlakyStore {
    fn insert(&self, document: &Document) -> Result<()> {
        self.inner.insert(document)
    }

    fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<Document>> {
        self.inner.list()
    }

    fn list_in_state(&self, state: DocumentState) -> Result<Vec<Document>> {
        self.inner.list_in_state(state)
    }

    fn begin_processing(&self, id: &DocumentId) -> Result<()> {
        Self::check(&self.refuse_begin)?;
        self.inner.begin_processing(id)
    }

    fn complete(&self, id: &DocumentId, result: &ProcessingResult) -> Result<()> {
        Self::check(&self.refuse_complete)?;
        self.inner.complete(id, result)
    }

    fn fail(&self, id: &DocumentId, error: &str) -> Result<()> {
        self.inner.fail(id, error)
    }
}

pub struct Harness {
    pub config: Arc<ConfigStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub coordinator: ProcessingCoordinator,
    pub gate: IngestionGate,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(recognizer: Arc<dyn Recognizer>) -> Self {
        Self::with_limits(recognizer, 4, Duration::from_secs(5))
    }

    pub fn with_timeout(recognizer: Arc<dyn Recognizer>, timeout: Duration) -> Self {
        Self::with_limits(recognizer, 4, timeout)
    }

    pub fn with_limits(recognizer: Arc<dyn Recognizer>, max_concurrent: usize, timeout: Duration) -> Self {
        let documents = Arc::new(SqliteDocumentStore::open_in_memory().expect("open store"));
        Self::build(recognizer, documents, max_concurrent, timeout)
    }

    pub fn with_store(recognizer: Arc<dyn Recognizer>, documents: Arc<dyn DocumentStore>) -> Self {
        Self::build(recognizer, documents, 4, Duration::from_secs(5))
    }

    fn build(
        recognizer: Arc<dyn Recognizer>,
        documents: Arc<dyn DocumentStore>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Arc::new(ConfigStore::in_memory(Settings::default()));
        let artifacts = Arc::new(ArtifactStore::open(dir.path().join("artifacts")).expect("artifacts"));
        let coordinator = ProcessingCoordinator::new(
            documents.clone(),
            artifacts.clone(),
            recognizer,
            max_concurrent,
            timeout,
        );
        let gate = IngestionGate::new(
            config.clone(),
            documents.clone(),
            artifacts.clone(),
            coordinator.clone(),
        );
        Self {
            config,
            documents,
            artifacts,
            coordinator,
            gate,
            _dir: dir,
        }
    }

    pub async fn ingest_png(&self) -> DocumentId {
        self.ingest_with(|_| {}).await
    }

    pub async fn ingest_with(&self, customize: impl FnOnce(&mut UploadOptions)) -> DocumentId {
        let mut options = UploadOptions::default();
        customize(&mut options);
        let artifact = Artifact {
            filename: "invoice.png".into(),
            content_type: Some("image/png".into()),
            bytes: PNG_BYTES.to_vec(),
        };
        self.gate
            .ingest(IngestionRequest::single(artifact, options))
            .await
            .expect("ingest")
    }

    /// Poll the store until `id` is `Ready` or `Failed`; panics after 10s.
    pub async fn await_terminal(&self, id: DocumentId) -> Document {
        let poll = async {
            loop {
                let document = self.documents.get(&id).expect("get").expect("document");
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

    /// A `Received` document with its artifact stored, not yet submitted.
    pub fn stored_document(&self) -> Document {
        let hash = self.artifacts.put(PNG_BYTES).expect("put artifact");
        let document = Document::new(
            "stored.png",
            ArtifactKind::Png,
            hash,
            UploadOptions::default().resolve(&Settings::default()),
        );
        self.documents.insert(&document).expect("insert");
        document
    }

    /// A `Received` document whose artifact was never stored.
    pub fn received_document_without_artifact(&self) -> Document {
        let document = Document::new(
            "lost.png",
            ArtifactKind::Png,
            hash_bytes(b"never stored"),
            UploadOptions::default().resolve(&Settings::default()),
        );
        self.documents.insert(&document).expect("insert");
        document
    }
}
