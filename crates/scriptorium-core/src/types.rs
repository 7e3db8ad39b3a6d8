// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scriptorium document pipeline.

use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ScriptoriumError;

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = ScriptoriumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ScriptoriumError::InvalidRequest(format!("invalid document id {s:?}: {e}")))
    }
}

/// Lifecycle states of a document.
///
/// `Received -> Processing -> Ready | Failed`.  `Ready` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentState {
    /// Stored and waiting for a processing run.
    Received,
    /// A recognition run is in flight.
    Processing,
    /// Recognition succeeded; the document can be exported.
    Ready,
    /// Recognition failed; the reason is in `error`.
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Processing => "Processing",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Processing)
                | (Self::Processing, Self::Ready)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentState {
    type Err = ScriptoriumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Received" => Ok(Self::Received),
            "Processing" => Ok(Self::Processing),
            "Ready" => Ok(Self::Ready),
            "Failed" => Ok(Self::Failed),
            other => Err(ScriptoriumError::InvalidRequest(format!(
                "unknown document state {other:?}"
            ))),
        }
    }
}

/// Accepted artifact formats (the ingestion allow-list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Png,
    Jpeg,
    Tiff,
    Bmp,
    Gif,
    Webp,
    Pdf,
}

impl ArtifactKind {
    /// Canonical MIME type, used when serving the original back.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    /// Infer the artifact kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Infer the artifact kind from a MIME type (parameters are ignored).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" | "image/x-png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/tiff" | "image/tif" => Some(Self::Tiff),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Resolve the kind of an uploaded artifact.
    ///
    /// A specific declared MIME type wins; a missing or generic
    /// (`application/octet-stream`) declaration falls back to the filename
    /// extension.
    pub fn resolve(declared_mime: Option<&str>, filename: &str) -> Option<Self> {
        match declared_mime.map(str::trim) {
            Some(mime) if !mime.is_empty() && !is_generic_mime(mime) => Self::from_mime(mime),
            _ => std::path::Path::new(filename)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(Self::from_extension),
        }
    }
}

fn is_generic_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case("application/octet-stream")
}

/// A detected table, as self-contained structural markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub html: String,
}

/// A detected diagram, described as Mermaid source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    /// Category label, e.g. `flowchart`, `sequence`, `classDiagram`.
    #[serde(rename = "type")]
    pub kind: String,
    pub mermaid_code: String,
}

/// Per-request recognition options.  Omitted fields are filled from
/// [`Settings`] at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    pub detect_tables: Option<bool>,
    pub detect_handwriting: Option<bool>,
    pub multi_language: Option<bool>,
    pub preserve_formatting: Option<bool>,
    pub detect_diagrams: Option<bool>,
}

impl UploadOptions {
    /// Fill every omitted field from the given settings snapshot.
    pub fn resolve(&self, settings: &Settings) -> ResolvedOptions {
        ResolvedOptions {
            detect_tables: self.detect_tables.unwrap_or(settings.enable_table_detection),
            detect_handwriting: self.detect_handwriting.unwrap_or(settings.enable_handwriting),
            multi_language: self.multi_language.unwrap_or(false),
            preserve_formatting: self.preserve_formatting.unwrap_or(settings.preserve_formatting),
            detect_diagrams: self.detect_diagrams.unwrap_or(settings.enable_diagram_detection),
            language: settings.default_language.clone(),
        }
    }
}

/// Fully resolved options a document was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub detect_tables: bool,
    pub detect_handwriting: bool,
    pub multi_language: bool,
    pub preserve_formatting: bool,
    pub detect_diagrams: bool,
    /// Primary recognition language (Tesseract-style code, e.g. `eng`).
    pub language: String,
}

/// Recognition statistics reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionMetadata {
    pub page_count: u32,
    pub languages: Vec<String>,
    /// Engine confidence, 0–100.
    pub confidence: f64,
}

impl Default for RecognitionMetadata {
    fn default() -> Self {
        Self {
            page_count: 1,
            languages: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Representations produced by a successful processing run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingResult {
    pub text: String,
    pub tables: Vec<Table>,
    pub diagrams: Vec<Diagram>,
    pub metadata: RecognitionMetadata,
}

/// A complete document: one ingested artifact plus its representations.
///
/// `hasTable`/`hasDiagram` are not fields; they are derived from `tables`
/// and `diagrams` on every read (see [`Document::record`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: DocumentState,
    pub media_type: ArtifactKind,
    /// SHA-256 of the stored original artifact.
    pub artifact_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub diagrams: Vec<Diagram>,
    pub options: ResolvedOptions,
    #[serde(default)]
    pub metadata: RecognitionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Document {
    /// Create a document in the `Received` state.
    ///
    /// Timestamps are truncated to microseconds so they survive a round trip
    /// through RFC 3339 storage unchanged.
    pub fn new(
        filename: impl Into<String>,
        media_type: ArtifactKind,
        artifact_hash: impl Into<String>,
        options: ResolvedOptions,
    ) -> Self {
        let id = DocumentId::new();
        let now = Utc::now().trunc_subsecs(6);
        Self {
            id,
            filename: filename.into(),
            created_at: now,
            updated_at: now,
            state: DocumentState::Received,
            media_type,
            artifact_hash: artifact_hash.into(),
            text: None,
            image_url: Some(format!("/documents/{id}/image")),
            thumbnail_url: Some(format!("/documents/{id}/thumbnail")),
            tables: Vec::new(),
            diagrams: Vec::new(),
            options,
            metadata: RecognitionMetadata::default(),
            error: None,
        }
    }

    pub fn has_table(&self) -> bool {
        !self.tables.is_empty()
    }

    pub fn has_diagram(&self) -> bool {
        !self.diagrams.is_empty()
    }

    /// Serializable view carrying the derived `hasTable`/`hasDiagram` flags.
    pub fn record(&self) -> DocumentRecord<'_> {
        DocumentRecord {
            document: self,
            has_table: self.has_table(),
            has_diagram: self.has_diagram(),
        }
    }
}

/// Wire form of a [`Document`]: every field plus the derived flags.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord<'a> {
    #[serde(flatten)]
    pub document: &'a Document,
    pub has_table: bool,
    pub has_diagram: bool,
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExportFormat {
    Pdf,
    Docx,
    Txt,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Pdf, Self::Docx, Self::Txt, Self::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Txt => "TXT",
            Self::Json => "JSON",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Txt => "text/plain; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ScriptoriumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PDF" => Ok(Self::Pdf),
            "DOCX" => Ok(Self::Docx),
            "TXT" => Ok(Self::Txt),
            "JSON" => Ok(Self::Json),
            _ => Err(ScriptoriumError::InvalidRequest(format!(
                "unknown export format {s:?} (expected PDF, DOCX, TXT or JSON)"
            ))),
        }
    }
}

impl TryFrom<String> for ExportFormat {
    type Error = ScriptoriumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExportFormat> for String {
    fn from(format: ExportFormat) -> Self {
        format.as_str().to_owned()
    }
}
