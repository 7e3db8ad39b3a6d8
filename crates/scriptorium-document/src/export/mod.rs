// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export module — render a Ready document in one of the supported formats.

pub mod docx;
pub mod layout;
pub mod pdf;

use std::path::Path;

use tracing::{info, instrument};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{Document, DocumentState, ExportFormat};

/// The rendered bytes plus what an HTTP response or file write needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Suggested download name: `<original stem>.<format extension>`.
    pub filename: String,
}

/// Stateless renderer from documents to export formats.
///
/// Rendering is a pure function of the document: it never mutates it and
/// the same document always yields the same bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportTransformer;

impl ExportTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Render `document` as `format`.
    ///
    /// # Errors
    ///
    /// [`ScriptoriumError::NotReady`] unless the document is `Ready`;
    /// [`ScriptoriumError::Export`] if a renderer fails.
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    pub fn export(&self, document: &Document, format: ExportFormat) -> Result<ExportArtifact> {
        if document.state != DocumentState::Ready {
            return Err(ScriptoriumError::NotReady {
                id: document.id,
                state: document.state,
            });
        }

        let bytes = match format {
            ExportFormat::Txt => document.text.clone().unwrap_or_default().into_bytes(),
            ExportFormat::Json => serde_json::to_vec_pretty(&document.record())?,
            ExportFormat::Pdf => pdf::render(document)?,
            ExportFormat::Docx => docx::render(document)?,
        };

        info!(bytes = bytes.len(), "document exported");
        Ok(ExportArtifact {
            bytes,
            content_type: format.content_type(),
            filename: export_filename(&document.filename, format),
        })
    }

    /// Rebuild a document from its JSON export.
    pub fn import_json(&self, bytes: &[u8]) -> Result<Document> {
        serde_json::from_slice(bytes).map_err(|e| {
            ScriptoriumError::InvalidRequest(format!("not a document JSON export: {e}"))
        })
    }
}

/// `<stem>.<ext>`, with the stem reduced to characters that are safe in a
/// `Content-Disposition` header and on every filesystem.
pub fn export_filename(original: &str, format: ExportFormat) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let safe: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let safe = safe.trim_matches(|c| c == '.' || c == '_');
    let stem = if safe.is_empty() { "document" } else { safe };
    format!("{stem}.{}", format.extension())
}
