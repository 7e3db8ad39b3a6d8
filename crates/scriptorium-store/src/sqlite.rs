// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document store backed by SQLite.
//
// One row per document.  Scalar fields are plain columns; the structured
// representations (tables, diagrams, options, metadata) are JSON text
// columns.  Artifact bytes are NOT stored here, only their SHA-256 key.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{
    ArtifactKind, Diagram, Document, DocumentId, DocumentState, ProcessingResult,
    RecognitionMetadata, ResolvedOptions, Table,
};

use crate::DocumentStore;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        state TEXT NOT NULL,
        media_type TEXT NOT NULL,
        artifact_hash TEXT NOT NULL,
        text TEXT,
        image_url TEXT,
        thumbnail_url TEXT,
        tables TEXT NOT NULL DEFAULT '[]',
        diagrams TEXT NOT NULL DEFAULT '[]',
        options TEXT NOT NULL,
        metadata TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS documents_state ON documents (state, created_at);
"#;

const SELECT_COLUMNS: &str = "SELECT id, filename, state, media_type, artifact_hash, text,
        image_url, thumbnail_url, tables, diagrams, options, metadata, error,
        created_at, updated_at
     FROM documents";

/// SQLite-backed [`DocumentStore`].
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex.  All methods block; in an async context, wrap calls in
/// `tokio::task::spawn_blocking`.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) the document database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("create table: {e}")))?;

        info!("document database opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("create table: {e}")))?;

        debug!("in-memory document database opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScriptoriumError::StorageUnavailable("connection lock poisoned".into()))
    }

    fn select(&self, clause: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let sql = format!("{SELECT_COLUMNS} {clause}");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("prepare: {e}")))?;
        stmt.query_map(args, row_to_document)
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("query: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("collect rows: {e}")))
    }

    /// Explain why a compare-and-set update touched no rows.
    fn transition_error(
        conn: &Connection,
        id: &DocumentId,
        expected: DocumentState,
        next: DocumentState,
    ) -> ScriptoriumError {
        let current: Option<String> = match conn
            .query_row(
                "SELECT state FROM documents WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
        {
            Ok(state) => state,
            Err(e) => return ScriptoriumError::StorageUnavailable(format!("read state: {e}")),
        };

        match current.as_deref().map(str::parse::<DocumentState>) {
            None => ScriptoriumError::NotFound(*id),
            Some(Ok(DocumentState::Processing)) if expected != DocumentState::Processing => {
                ScriptoriumError::AlreadyInProgress(*id)
            }
            Some(Ok(state)) => ScriptoriumError::InvalidRequest(format!(
                "document {id} is {state}; cannot move {expected} -> {next}"
            )),
            Some(Err(e)) => e,
        }
    }
}

impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    fn insert(&self, document: &Document) -> Result<()> {
        let tables_json = serde_json::to_string(&document.tables)?;
        let diagrams_json = serde_json::to_string(&document.diagrams)?;
        let options_json = serde_json::to_string(&document.options)?;
        let metadata_json = serde_json::to_string(&document.metadata)?;
        let media_json = serde_json::to_string(&document.media_type)?;

        self.conn()?
            .execute(
                "INSERT INTO documents (id, filename, state, media_type, artifact_hash, text,
                 image_url, thumbnail_url, tables, diagrams, options, metadata, error,
                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    document.id.to_string(),
                    document.filename,
                    document.state.as_str(),
                    media_json,
                    document.artifact_hash,
                    document.text,
                    document.image_url,
                    document.thumbnail_url,
                    tables_json,
                    diagrams_json,
                    options_json,
                    metadata_json,
                    document.error,
                    timestamp(&document.created_at),
                    timestamp(&document.updated_at),
                ],
            )
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("insert document: {e}")))?;

        info!(document_id = %document.id, "document stored");
        Ok(())
    }

    #[instrument(skip(self), fields(document_id = %id))]
    fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let id_str = id.to_string();
        Ok(self.select("WHERE id = ?1", &[&id_str])?.into_iter().next())
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<Document>> {
        let documents = self.select("ORDER BY created_at DESC, rowid DESC", &[])?;
        debug!(count = documents.len(), "listed documents");
        Ok(documents)
    }

    #[instrument(skip(self))]
    fn list_in_state(&self, state: DocumentState) -> Result<Vec<Document>> {
        let state_str = state.as_str();
        self.select("WHERE state = ?1 ORDER BY created_at ASC, rowid ASC", &[&state_str])
    }

    #[instrument(skip(self), fields(document_id = %id))]
    fn begin_processing(&self, id: &DocumentId) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE documents SET state = ?1, updated_at = ?2, error = NULL
                 WHERE id = ?3 AND state = ?4",
                params![
                    DocumentState::Processing.as_str(),
                    now(),
                    id.to_string(),
                    DocumentState::Received.as_str(),
                ],
            )
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("begin processing: {e}")))?;

        if rows == 0 {
            return Err(Self::transition_error(
                &conn,
                id,
                DocumentState::Received,
                DocumentState::Processing,
            ));
        }
        debug!(document_id = %id, "document processing");
        Ok(())
    }

    #[instrument(skip(self, result), fields(document_id = %id))]
    fn complete(&self, id: &DocumentId, result: &ProcessingResult) -> Result<()> {
        let tables_json = serde_json::to_string(&result.tables)?;
        let diagrams_json = serde_json::to_string(&result.diagrams)?;
        let metadata_json = serde_json::to_string(&result.metadata)?;

        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE documents SET state = ?1, updated_at = ?2, text = ?3, tables = ?4,
                 diagrams = ?5, metadata = ?6, error = NULL
                 WHERE id = ?7 AND state = ?8",
                params![
                    DocumentState::Ready.as_str(),
                    now(),
                    result.text,
                    tables_json,
                    diagrams_json,
                    metadata_json,
                    id.to_string(),
                    DocumentState::Processing.as_str(),
                ],
            )
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("complete: {e}")))?;

        if rows == 0 {
            return Err(Self::transition_error(
                &conn,
                id,
                DocumentState::Processing,
                DocumentState::Ready,
            ));
        }
        info!(
            document_id = %id,
            tables = result.tables.len(),
            diagrams = result.diagrams.len(),
            "document ready"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(document_id = %id))]
    fn fail(&self, id: &DocumentId, error: &str) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE documents SET state = ?1, updated_at = ?2, error = ?3
                 WHERE id = ?4 AND state = ?5",
                params![
                    DocumentState::Failed.as_str(),
                    now(),
                    error,
                    id.to_string(),
                    DocumentState::Processing.as_str(),
                ],
            )
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("fail: {e}")))?;

        if rows == 0 {
            return Err(Self::transition_error(
                &conn,
                id,
                DocumentState::Processing,
                DocumentState::Failed,
            ));
        }
        info!(document_id = %id, %error, "document failed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now() -> String {
    timestamp(&Utc::now().trunc_subsecs(6))
}

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    column: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(column, e))
}

fn time_column(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

/// Map a SQLite row to a `Document`.
///
/// Column indices must match `SELECT_COLUMNS`.
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id_str: String = row.get(0)?;
    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?;

    let state_str: String = row.get(2)?;
    let state: DocumentState = state_str.parse().map_err(|e| conversion_error(2, e))?;

    let media_type: ArtifactKind = json_column(row, 3)?;
    let tables: Vec<Table> = json_column(row, 8)?;
    let diagrams: Vec<Diagram> = json_column(row, 9)?;
    let options: ResolvedOptions = json_column(row, 10)?;
    let metadata: RecognitionMetadata = json_column(row, 11)?;

    Ok(Document {
        id: DocumentId(id),
        filename: row.get(1)?,
        created_at: time_column(row, 13)?,
        updated_at: time_column(row, 14)?,
        state,
        media_type,
        artifact_hash: row.get(4)?,
        text: row.get(5)?,
        image_url: row.get(6)?,
        thumbnail_url: row.get(7)?,
        tables,
        diagrams,
        options,
        metadata,
        error: row.get(12)?,
    })
}
