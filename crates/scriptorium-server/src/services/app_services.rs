// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — initialises all backend subsystems and exposes the
// document operations the HTTP API and the CLI share.
//
// All fields are `Arc`-wrapped or `Copy`, so the struct is cheap to clone
// into axum state and spawned tasks.  Store and artifact I/O runs on the
// blocking pool via `run_blocking`.

use std::path::Path;
use std::sync::Arc;

use scriptorium_core::config::{ConfigStore, ServiceConfig, Settings};
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{Document, DocumentId, ExportFormat, UploadOptions};
use scriptorium_document::{ExportArtifact, ExportTransformer, HttpRecognizer, Recognizer};
use scriptorium_pipeline::{
    Artifact, DocumentSummary, IngestionGate, IngestionRequest, ProcessingCoordinator,
    RecoveryReport, RepresentationSet, ViewComposer, run_blocking,
};
use scriptorium_store::{ArtifactStore, DocumentStore, SqliteDocumentStore};
use tracing::{info, instrument};

use super::data_dir;

/// Environment variable selecting the recognizer (`http` or `local`).
#[cfg(feature = "ocr")]
const RECOGNIZER_ENV: &str = "SCRIPTORIUM_RECOGNIZER";

#[derive(Clone)]
pub struct AppServices {
    config: Arc<ConfigStore>,
    documents: Arc<dyn DocumentStore>,
    artifacts: Arc<ArtifactStore>,
    coordinator: ProcessingCoordinator,
    gate: Arc<IngestionGate>,
    views: Arc<ViewComposer>,
    exporter: ExportTransformer,
    recognizer: Arc<str>,
}

impl AppServices {
    /// Initialise all services from process configuration.  Call once at
    /// startup.
    ///
    /// Creates the data directory, opens the SQLite database and the
    /// artifact store, loads persisted settings and builds the recognizer.
    pub fn init(config: &ServiceConfig) -> Result<Self> {
        let dir = data_dir::prepare(config)?;
        info!(path = %dir.display(), "initialising app services");

        let settings = ConfigStore::load(config.settings_path());
        let documents = Arc::new(SqliteDocumentStore::open(config.database_path())?);
        let recognizer = build_recognizer(config)?;

        let services = Self::assemble(config, settings, documents, recognizer)?;
        info!(recognizer = %services.recognizer, "app services initialised");
        Ok(services)
    }

    /// Wire the pipeline around already-opened stores.
    pub fn assemble(
        config: &ServiceConfig,
        settings: ConfigStore,
        documents: Arc<dyn DocumentStore>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Result<Self> {
        let config_store = Arc::new(settings);
        let artifacts = Arc::new(ArtifactStore::open(config.artifacts_dir())?);
        let name: Arc<str> = Arc::from(recognizer.name());

        let coordinator = ProcessingCoordinator::new(
            Arc::clone(&documents),
            Arc::clone(&artifacts),
            recognizer,
            config.max_concurrent_processing,
            config.processing_timeout,
        );
        let gate = IngestionGate::new(
            Arc::clone(&config_store),
            Arc::clone(&documents),
            Arc::clone(&artifacts),
            coordinator.clone(),
        );

        Ok(Self {
            config: config_store,
            documents,
            artifacts: Arc::clone(&artifacts),
            coordinator,
            gate: Arc::new(gate),
            views: Arc::new(ViewComposer::new(artifacts)),
            exporter: ExportTransformer::new(),
            recognizer: name,
        })
    }

    /// Reconcile documents a previous server process left unfinished.
    ///
    /// Only the long-running server should call this: it assumes no other
    /// process is working on the same data directory.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        self.coordinator.recover().await
    }

    pub fn recognizer_name(&self) -> &str {
        &self.recognizer
    }

    // -- Documents -----------------------------------------------------------

    /// Accept an upload.  Returns once the document is stored; processing
    /// continues in the background.
    pub async fn ingest(&self, request: IngestionRequest) -> Result<DocumentId> {
        self.gate.ingest(request).await
    }

    /// Ingest a file from disk with default options and wait for its run to
    /// finish.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> Result<Document> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let artifact = Artifact {
            filename,
            content_type: None,
            bytes,
        };
        let (id, run) = self
            .gate
            .admit(IngestionRequest::single(artifact, UploadOptions::default()))
            .await?;
        self.coordinator.join(id, run).await
    }

    /// Ask for a `Received` document to be processed.
    pub async fn request_processing(&self, id: DocumentId) -> Result<()> {
        self.coordinator.submit(id).await.map(drop)
    }

    /// Summaries, newest first, optionally filtered by a search query.
    pub async fn list_documents(&self, query: Option<&str>) -> Result<Vec<DocumentSummary>> {
        let documents = Arc::clone(&self.documents);
        let query = query.map(str::to_owned);
        run_blocking(move || {
            let documents = documents.list()?;
            let documents = match query {
                Some(query) => ViewComposer::filter(documents, &query),
                None => documents,
            };
            Ok(documents.iter().map(ViewComposer::summary).collect())
        })
        .await
    }

    pub async fn document(&self, id: DocumentId) -> Result<Document> {
        let documents = Arc::clone(&self.documents);
        run_blocking(move || documents.get(&id)?.ok_or(ScriptoriumError::NotFound(id))).await
    }

    pub async fn views(&self, id: DocumentId) -> Result<RepresentationSet> {
        let document = self.document(id).await?;
        let views = Arc::clone(&self.views);
        run_blocking(move || Ok(views.views(&document))).await
    }

    /// Render a document; `None` uses the default export format from the
    /// current settings.
    pub async fn export(
        &self,
        id: DocumentId,
        format: Option<ExportFormat>,
    ) -> Result<ExportArtifact> {
        let format = format.unwrap_or_else(|| self.config.snapshot().default_export_format);
        let document = self.document(id).await?;
        let exporter = self.exporter;
        run_blocking(move || exporter.export(&document, format)).await
    }

    /// The original artifact bytes and their MIME type.
    pub async fn original(&self, id: DocumentId) -> Result<(Vec<u8>, &'static str)> {
        let document = self.document(id).await?;
        let mime = document.media_type.mime_type();
        let views = Arc::clone(&self.views);
        let artifacts = Arc::clone(&self.artifacts);
        let bytes = run_blocking(move || {
            if !views.views(&document).original_available {
                return Err(ScriptoriumError::NotFound(id));
            }
            artifacts.get(&document.artifact_hash)
        })
        .await?;
        Ok((bytes, mime))
    }

    // -- Settings ------------------------------------------------------------

    pub fn settings(&self) -> Arc<Settings> {
        self.config.snapshot()
    }

    /// Validate, persist and publish new settings.
    pub async fn replace_settings(&self, settings: Settings) -> Result<Arc<Settings>> {
        let config = Arc::clone(&self.config);
        run_blocking(move || config.replace(settings)).await
    }
}

#[cfg(not(feature = "ocr"))]
fn build_recognizer(config: &ServiceConfig) -> Result<Arc<dyn Recognizer>> {
    http_recognizer(config)
}

#[cfg(feature = "ocr")]
fn build_recognizer(config: &ServiceConfig) -> Result<Arc<dyn Recognizer>> {
    use scriptorium_document::LocalRecognizer;

    match std::env::var(RECOGNIZER_ENV).as_deref() {
        Ok("local") => Ok(Arc::new(LocalRecognizer::with_default_models()?)),
        Ok("http") | Err(_) => http_recognizer(config),
        Ok(other) => Err(ScriptoriumError::InvalidRequest(format!(
            "{RECOGNIZER_ENV}={other:?}; expected \"http\" or \"local\""
        ))),
    }
}

fn http_recognizer(config: &ServiceConfig) -> Result<Arc<dyn Recognizer>> {
    let recognizer = HttpRecognizer::new(&config.engine_url, config.processing_timeout)?;
    info!(endpoint = recognizer.endpoint(), "using HTTP recognition engine");
    Ok(Arc::new(recognizer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PNG_BYTES, TestServices};
    use scriptorium_core::types::DocumentState;

    #[tokio::test]
    async fn process_file_reaches_ready() {
        let test = TestServices::new();
        let path = test.dir.path().join("invoice.png");
        std::fs::write(&path, PNG_BYTES).unwrap();

        let document = test.services.process_file(&path).await.unwrap();
        assert_eq!(document.state, DocumentState::Ready);
        assert_eq!(document.filename, "invoice.png");
        assert!(document.has_table());
    }

    #[tokio::test]
    async fn process_file_refuses_unsupported_extension() {
        let test = TestServices::new();
        let path = test.dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text").unwrap();

        let err = test.services.process_file(&path).await.unwrap_err();
        assert!(matches!(err, ScriptoriumError::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn export_uses_default_format_from_settings() {
        let test = TestServices::new();
        let document = test.ready_document().await;

        let artifact = test.services.export(document.id, None).await.unwrap();
        assert_eq!(artifact.content_type, "application/pdf");

        test.services
            .replace_settings(Settings {
                default_export_format: ExportFormat::Txt,
                ..Settings::default()
            })
            .await
            .unwrap();
        let artifact = test.services.export(document.id, None).await.unwrap();
        assert_eq!(artifact.bytes, b"Invoice #42");
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let test = TestServices::new();
        let id = DocumentId::new();
        assert!(matches!(
            test.services.document(id).await,
            Err(ScriptoriumError::NotFound(_))
        ));
        assert!(matches!(
            test.services.original(id).await,
            Err(ScriptoriumError::NotFound(_))
        ));
        assert!(matches!(
            test.services.request_processing(id).await,
            Err(ScriptoriumError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn original_returns_uploaded_bytes() {
        let test = TestServices::new();
        let document = test.ready_document().await;
        let (bytes, mime) = test.services.original(document.id).await.unwrap();
        assert_eq!(bytes, PNG_BYTES);
        assert_eq!(mime, "image/png");
    }
}
