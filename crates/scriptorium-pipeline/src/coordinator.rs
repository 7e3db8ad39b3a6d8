// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processing coordinator — runs recognition for one document at a time per
// id, many documents at once overall.
//
// Every run is a tokio task.  A semaphore bounds how many runs talk to the
// recognizer concurrently; an in-flight set keyed by document id stops a
// second submission while the first is still queued or running.  The store
// remains the source of truth for state: transitions are compare-and-set,
// so even a stale in-flight set cannot move a document twice.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{Document, DocumentId, DocumentState, ProcessingResult};
use scriptorium_document::recognize::{Detection, Recognition, RecognitionInput, Recognizer};
use scriptorium_store::{ArtifactStore, DocumentStore};

use crate::blocking::run_blocking;

/// Error recorded on documents a previous process left mid-run.
pub const INTERRUPTED: &str = "processing interrupted";

/// A queued or running recognition task.  Resolves to an error only when
/// the run could not record any outcome in the store.
pub type RunHandle = JoinHandle<Result<()>>;

#[derive(Clone)]
pub struct ProcessingCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    documents: Arc<dyn DocumentStore>,
    artifacts: Arc<ArtifactStore>,
    recognizer: Arc<dyn Recognizer>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashSet<DocumentId>>,
    timeout: Duration,
}

/// What [`ProcessingCoordinator::recover`] did at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Documents found `Processing` and marked `Failed`.
    pub interrupted: usize,
    /// Documents found `Received` and submitted again.
    pub resubmitted: usize,
}

/// Holds a document id in the in-flight set; removes it on drop.
struct InFlight {
    inner: Arc<Inner>,
    id: DocumentId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl ProcessingCoordinator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        artifacts: Arc<ArtifactStore>,
        recognizer: Arc<dyn Recognizer>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        info!(
            recognizer = recognizer.name(),
            max_concurrent,
            timeout_secs = timeout.as_secs_f64(),
            "processing coordinator ready"
        );
        Self {
            inner: Arc::new(Inner {
                documents,
                artifacts,
                recognizer,
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
                in_flight: Mutex::new(HashSet::new()),
                timeout,
            }),
        }
    }

    /// Whether a run for `id` is queued or executing in this process.
    pub fn is_in_flight(&self, id: &DocumentId) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn claim(&self, id: DocumentId) -> Result<InFlight> {
        let mut set = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id) {
            return Err(ScriptoriumError::AlreadyInProgress(id));
        }
        Ok(InFlight {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    /// Run a document-store call on the blocking pool.
    async fn store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&dyn DocumentStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let documents = Arc::clone(&self.inner.documents);
        run_blocking(move || op(documents.as_ref())).await
    }

    /// Start processing a `Received` document in the background.
    ///
    /// # Errors
    ///
    /// - [`ScriptoriumError::AlreadyInProgress`] if a run is queued or active.
    /// - [`ScriptoriumError::NotFound`] for an unknown id.
    /// - [`ScriptoriumError::InvalidRequest`] if the document is already
    ///   `Ready` or `Failed`.
    #[instrument(skip(self), fields(document_id = %id))]
    pub async fn submit(&self, id: DocumentId) -> Result<RunHandle> {
        let guard = self.claim(id)?;

        let document = self
            .store(move |documents| documents.get(&id))
            .await?
            .ok_or(ScriptoriumError::NotFound(id))?;

        match document.state {
            DocumentState::Received => {}
            DocumentState::Processing => return Err(ScriptoriumError::AlreadyInProgress(id)),
            state => {
                return Err(ScriptoriumError::InvalidRequest(format!(
                    "document {id} is already {state}; upload it again to reprocess"
                )));
            }
        }

        debug!("processing queued");
        let this = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.run(document).await
        }))
    }

    /// Wait for a run returned by [`submit`](Self::submit) and return the
    /// document as the run left it.
    pub async fn join(&self, id: DocumentId, run: RunHandle) -> Result<Document> {
        run.await
            .map_err(|e| ScriptoriumError::ProcessingFailed(format!("processing task: {e}")))??;
        self.store(move |documents| documents.get(&id))
            .await?
            .ok_or(ScriptoriumError::NotFound(id))
    }

    /// Reconcile state left behind by a previous process.
    ///
    /// `Processing` documents cannot still be running (their task died with
    /// the old process), so they fail; `Received` ones never started and are
    /// submitted again.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        let interrupted = self
            .store(|documents| documents.list_in_state(DocumentState::Processing))
            .await?;
        for document in interrupted {
            if self.is_in_flight(&document.id) {
                continue;
            }
            let id = document.id;
            self.store(move |documents| documents.fail(&id, INTERRUPTED))
                .await?;
            warn!(document_id = %id, "interrupted run marked failed");
            report.interrupted += 1;
        }

        let waiting = self
            .store(|documents| documents.list_in_state(DocumentState::Received))
            .await?;
        for document in waiting {
            match self.submit(document.id).await {
                Ok(_) => report.resubmitted += 1,
                Err(ScriptoriumError::AlreadyInProgress(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!(
            interrupted = report.interrupted,
            resubmitted = report.resubmitted,
            "recovery complete"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(document_id = %document.id))]
    async fn run(&self, document: Document) -> Result<()> {
        let id = document.id;
        let _permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| ScriptoriumError::ProcessingFailed("processing semaphore closed".into()))?;

        match self.store(move |documents| documents.begin_processing(&id)).await {
            Ok(()) => {}
            // Another writer moved the document first.
            Err(
                e @ (ScriptoriumError::AlreadyInProgress(_)
                | ScriptoriumError::InvalidRequest(_)
                | ScriptoriumError::NotFound(_)),
            ) => {
                warn!(error = %e, "document no longer Received; skipping run");
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "could not start processing");
                return Err(e);
            }
        }
        info!(filename = %document.filename, "processing started");

        let failure = match self.recognize(&document).await {
            Ok(result) => match self.store(move |documents| documents.complete(&id, &result)).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "could not store recognition result");
                    format!("could not store result: {e}")
                }
            },
            Err(e) => {
                let detail = failure_detail(&e);
                error!(error = %detail, "processing failed");
                detail
            }
        };

        self.store(move |documents| documents.fail(&id, &failure))
            .await
            .inspect_err(|e| error!(error = %e, "could not record processing failure"))
    }

    async fn recognize(&self, document: &Document) -> Result<ProcessingResult> {
        let artifacts = Arc::clone(&self.inner.artifacts);
        let hash = document.artifact_hash.clone();
        let bytes = run_blocking(move || artifacts.get(&hash))
            .await
            .map_err(|e| ScriptoriumError::ProcessingFailed(format!("artifact unavailable: {e}")))?;

        let input = RecognitionInput {
            filename: document.filename.clone(),
            media_type: document.media_type,
            bytes,
        };
        let options = document.options.clone();
        let recognizer = Arc::clone(&self.inner.recognizer);

        // Separate task so a panicking recognizer surfaces as a JoinError.
        let mut task = tokio::spawn(async move { recognizer.recognize(&input, &options).await });

        let recognition = match tokio::time::timeout(self.inner.timeout, &mut task).await {
            Err(_) => {
                task.abort();
                return Err(ScriptoriumError::ProcessingFailed(format!(
                    "processing timed out after {:.1}s",
                    self.inner.timeout.as_secs_f64()
                )));
            }
            Ok(Err(join)) if join.is_panic() => {
                return Err(ScriptoriumError::ProcessingFailed("recognizer panicked".into()));
            }
            Ok(Err(join)) => {
                return Err(ScriptoriumError::ProcessingFailed(format!(
                    "recognizer task ended: {join}"
                )));
            }
            Ok(Ok(result)) => result?,
        };

        Ok(merge(recognition, document))
    }
}

/// Keep only the sequences the document asked for; a failed detection
/// leaves its sequence empty.
fn merge(recognition: Recognition, document: &Document) -> ProcessingResult {
    let Recognition {
        text,
        tables,
        diagrams,
        metadata,
    } = recognition;

    ProcessingResult {
        text,
        tables: settle(tables, document.options.detect_tables, "table"),
        diagrams: settle(diagrams, document.options.detect_diagrams, "diagram"),
        metadata,
    }
}

fn settle<T>(detection: Detection<T>, requested: bool, what: &str) -> Vec<T> {
    if !requested {
        return Vec::new();
    }
    match detection {
        Detection::Failed(reason) => {
            warn!(%reason, "{what} detection failed; continuing without it");
            Vec::new()
        }
        other => other.found().unwrap_or_default(),
    }
}

fn failure_detail(e: &ScriptoriumError) -> String {
    match e {
        ScriptoriumError::ProcessingFailed(detail) => detail.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::{
        FailingRecognizer, FixedRecognizer, FlakyStore, GatedRecognizer, Harness,
        PanickingRecognizer, SlowRecognizer, invoice_recognition,
    };
    use scriptorium_core::types::{Diagram, Table};

    #[tokio::test]
    async fn invoice_becomes_ready() {
        let harness = Harness::new(Arc::new(FixedRecognizer(invoice_recognition())));
        let id = harness.ingest_png().await;

        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Ready);
        assert_eq!(doc.text.as_deref(), Some("Invoice #42"));
        assert!(doc.has_table());
        assert!(!doc.has_diagram());
        assert!(doc.error.is_none());
    }

    #[tokio::test]
    async fn slow_recognizer_times_out() {
        let harness = Harness::with_timeout(
            Arc::new(SlowRecognizer(Duration::from_secs(30))),
            Duration::from_millis(100),
        );
        let id = harness.ingest_png().await;

        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Failed);
        assert!(doc.error.as_deref().unwrap_or_default().contains("timed out"));
        assert!(doc.text.is_none());
    }

    #[tokio::test]
    async fn recognizer_error_fails_document() {
        let harness = Harness::new(Arc::new(FailingRecognizer));
        let id = harness.ingest_png().await;

        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Failed);
        assert_eq!(doc.error.as_deref(), Some("engine unreachable"));
    }

    #[tokio::test]
    async fn panicking_recognizer_fails_document() {
        let harness = Harness::new(Arc::new(PanickingRecognizer));
        let id = harness.ingest_png().await;

        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Failed);
        assert_eq!(doc.error.as_deref(), Some("recognizer panicked"));
    }

    #[tokio::test]
    async fn partial_detection_failure_still_ready() {
        let mut recognition = invoice_recognition();
        recognition.tables = Detection::Failed("table model crashed".into());
        recognition.diagrams = Detection::Found(vec![Diagram {
            kind: "flowchart".into(),
            mermaid_code: "flowchart TD\n".into(),
        }]);
        let harness = Harness::new(Arc::new(FixedRecognizer(recognition)));
        let id = harness.ingest_png().await;

        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Ready);
        assert!(doc.tables.is_empty());
        assert!(doc.has_diagram());
    }

    #[tokio::test]
    async fn disabled_options_drop_sequences() {
        let harness = Harness::new(Arc::new(FixedRecognizer(invoice_recognition())));
        let id = harness
            .ingest_with(|options| options.detect_tables = Some(false))
            .await;

        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Ready);
        assert!(!doc.has_table());
    }

    #[tokio::test]
    async fn duplicate_submit_is_rejected() {
        let gated = Arc::new(GatedRecognizer::default());
        let harness = Harness::new(gated.clone());
        let id = harness.ingest_png().await;

        let err = harness.coordinator.submit(id).await.unwrap_err();
        assert!(matches!(err, ScriptoriumError::AlreadyInProgress(got) if got == id));

        gated.release();
        let doc = harness.await_terminal(id).await;
        assert_eq!(doc.state, DocumentState::Ready);
    }

    #[tokio::test]
    async fn terminal_and_unknown_documents_are_rejected() {
        let harness = Harness::new(Arc::new(FixedRecognizer(invoice_recognition())));
        let stored = harness.stored_document();
        let run = harness.coordinator.submit(stored.id).await.unwrap();
        harness.coordinator.join(stored.id, run).await.unwrap();
        assert!(!harness.coordinator.is_in_flight(&stored.id));

        assert!(matches!(
            harness.coordinator.submit(stored.id).await,
            Err(ScriptoriumError::InvalidRequest(_))
        ));
        assert!(matches!(
            harness.coordinator.submit(DocumentId::new()).await,
            Err(ScriptoriumError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_artifact_fails_document() {
        let harness = Harness::new(Arc::new(FixedRecognizer(invoice_recognition())));
        let doc = harness.received_document_without_artifact();

        let run = harness.coordinator.submit(doc.id).await.unwrap();
        let done = harness.coordinator.join(doc.id, run).await.unwrap();
        assert_eq!(done.state, DocumentState::Failed);
        assert!(done.error.unwrap().contains("artifact unavailable"));
    }

    #[tokio::test]
    async fn unstorable_result_fails_document() {
        let store = Arc::new(FlakyStore::new());
        store.refuse_complete(true);
        let harness = Harness::with_store(
            Arc::new(FixedRecognizer(invoice_recognition())),
            store.clone(),
        );
        let stored = harness.stored_document();

        let run = harness.coordinator.submit(stored.id).await.unwrap();
        let doc = harness.coordinator.join(stored.id, run).await.unwrap();
        assert_eq!(doc.state, DocumentState::Failed);
        assert!(doc.error.as_deref().unwrap_or_default().contains("disk full"));
        assert!(!harness.coordinator.is_in_flight(&stored.id));

        // A terminal document is refused, not reported as still running.
        assert!(matches!(
            harness.coordinator.submit(stored.id).await,
            Err(ScriptoriumError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn storage_outage_before_start_is_reported() {
        let store = Arc::new(FlakyStore::new());
        store.refuse_begin(true);
        let harness = Harness::with_store(
            Arc::new(FixedRecognizer(invoice_recognition())),
            store.clone(),
        );
        let stored = harness.stored_document();

        let run = harness.coordinator.submit(stored.id).await.unwrap();
        let err = harness.coordinator.join(stored.id, run).await.unwrap_err();
        assert!(matches!(err, ScriptoriumError::StorageUnavailable(_)));
        assert!(!harness.coordinator.is_in_flight(&stored.id));

        // The document is still Received and runs once storage is back.
        store.refuse_begin(false);
        let run = harness.coordinator.submit(stored.id).await.unwrap();
        let doc = harness.coordinator.join(stored.id, run).await.unwrap();
        assert_eq!(doc.state, DocumentState::Ready);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        struct Counting {
            active: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl Recognizer for Counting {
            fn name(&self) -> &str {
                "counting"
            }

            async fn recognize(
                &self,
                _input: &RecognitionInput,
                _options: &scriptorium_core::types::ResolvedOptions,
            ) -> Result<Recognition> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(invoice_recognition())
            }
        }

        let counting = Arc::new(Counting {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let harness = Harness::with_limits(counting.clone(), 2, Duration::from_secs(5));
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(harness.ingest_png().await);
        }
        for id in ids {
            let doc = harness.await_terminal(id).await;
            assert_eq!(doc.state, DocumentState::Ready);
        }
        assert!(counting.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn recover_fails_interrupted_and_resubmits_received() {
        let harness = Harness::new(Arc::new(FixedRecognizer(invoice_recognition())));
        let interrupted = harness.stored_document();
        harness.documents.begin_processing(&interrupted.id).unwrap();
        let waiting = harness.stored_document();

        let report = harness.coordinator.recover().await.unwrap();
        assert_eq!(report, RecoveryReport { interrupted: 1, resubmitted: 1 });

        let failed = harness.documents.get(&interrupted.id).unwrap().unwrap();
        assert_eq!(failed.state, DocumentState::Failed);
        assert_eq!(failed.error.as_deref(), Some(INTERRUPTED));

        let ready = harness.await_terminal(waiting.id).await;
        assert_eq!(ready.state, DocumentState::Ready);
    }

    #[test]
    fn settle_ignores_unrequested_results() {
        let found = Detection::Found(vec![Table { html: "<table/>".into() }]);
        assert!(settle(found.clone(), false, "table").is_empty());
        assert_eq!(settle(found, true, "table").len(), 1);
        assert!(settle(Detection::<Table>::Failed("x".into()), true, "table").is_empty());
    }
}
