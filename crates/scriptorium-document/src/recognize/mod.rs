// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition boundary — raw artifact bytes in, text/tables/diagrams out.
//
// The pipeline only ever talks to the `Recognizer` trait.  The default
// implementation calls an HTTP OCR engine; with the `ocr` feature a local
// `ocrs`-based recognizer is available as well.

pub mod diagrams;
pub mod http;
#[cfg(feature = "ocr")]
pub mod local;

use async_trait::async_trait;

use scriptorium_core::error::Result;
use scriptorium_core::types::{ArtifactKind, Diagram, RecognitionMetadata, ResolvedOptions, Table};

/// One stored artifact, handed to a recognizer.
#[derive(Debug, Clone)]
pub struct RecognitionInput {
    pub filename: String,
    pub media_type: ArtifactKind,
    pub bytes: Vec<u8>,
}

/// Outcome of an optional detection pass.
///
/// Table and diagram detection can fail independently of text recognition;
/// a failure here degrades the document instead of failing it.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection<T> {
    /// The option was off; nothing was attempted.
    NotRequested,
    Found(Vec<T>),
    Failed(String),
}

impl<T> Detection<T> {
    /// The detected items, or `None` if detection failed.
    pub fn found(self) -> Option<Vec<T>> {
        match self {
            Self::NotRequested => Some(Vec::new()),
            Self::Found(items) => Some(items),
            Self::Failed(_) => None,
        }
    }
}

/// What a recognizer produced for one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub tables: Detection<Table>,
    pub diagrams: Detection<Diagram>,
    pub metadata: RecognitionMetadata,
}

/// A recognition engine.
///
/// Implementations must be cheap to share: the coordinator holds one behind
/// an `Arc` and calls it from many tasks at once.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Recognize one artifact.  An `Err` (or a malformed response) fails
    /// the document; detection problems are reported through [`Detection`].
    async fn recognize(
        &self,
        input: &RecognitionInput,
        options: &ResolvedOptions,
    ) -> Result<Recognition>;
}
