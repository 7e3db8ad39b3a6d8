// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptorium Store — the representation store.  Document rows (state,
// text, tables, diagrams) live behind the narrow `DocumentStore` trait with a
// SQLite implementation; original artifact bytes live in a content-addressed
// directory keyed by their SHA-256 digest.

pub mod artifacts;
pub mod integrity;
pub mod sqlite;

use scriptorium_core::error::Result;
use scriptorium_core::types::{Document, DocumentId, DocumentState, ProcessingResult};

pub use artifacts::ArtifactStore;
pub use integrity::{hash_bytes, verify_hash};
pub use sqlite::SqliteDocumentStore;

/// Durable keyed storage for documents and their derived representations.
///
/// The store is the only writer of state transitions.  Each transition
/// method is a compare-and-set on the current state, so two writers can
/// never both move the same document forward.
pub trait DocumentStore: Send + Sync {
    /// Insert a freshly created document (must be `Received`).
    fn insert(&self, document: &Document) -> Result<()>;

    /// Fetch one document, or `None` if the id is unknown.
    fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// All documents, newest first.
    fn list(&self) -> Result<Vec<Document>>;

    /// Documents currently in `state`, oldest first.
    fn list_in_state(&self, state: DocumentState) -> Result<Vec<Document>>;

    /// `Received -> Processing`.
    fn begin_processing(&self, id: &DocumentId) -> Result<()>;

    /// `Processing -> Ready`, writing every representation in one step.
    fn complete(&self, id: &DocumentId, result: &ProcessingResult) -> Result<()>;

    /// `Processing -> Failed`, recording the failure detail.
    fn fail(&self, id: &DocumentId, error: &str) -> Result<()>;
}
