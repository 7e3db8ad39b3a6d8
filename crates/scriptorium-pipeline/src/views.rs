// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// View composition — which representations a document offers, list
// summaries, and search.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use scriptorium_core::types::{Document, DocumentId, DocumentState};
use scriptorium_store::ArtifactStore;

/// Excerpt length in the document list, in characters.
pub const EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationKind {
    Text,
    Original,
    Tables,
    Diagrams,
}

/// The representations a client may render for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepresentationSet {
    pub views: Vec<RepresentationKind>,
    /// Whether the original artifact can actually be served.
    pub original_available: bool,
}

impl RepresentationSet {
    pub fn contains(&self, kind: RepresentationKind) -> bool {
        self.views.contains(&kind)
    }
}

/// One row of the document list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub state: DocumentState,
    pub excerpt: String,
    pub thumbnail_url: Option<String>,
    pub has_table: bool,
    pub has_diagram: bool,
}

pub struct ViewComposer {
    artifacts: Arc<ArtifactStore>,
}

impl ViewComposer {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self { artifacts }
    }

    /// `Text` and `Original` always; `Tables`/`Diagrams` only when the
    /// document has any.
    pub fn views(&self, document: &Document) -> RepresentationSet {
        let mut views = vec![RepresentationKind::Text, RepresentationKind::Original];
        if document.has_table() {
            views.push(RepresentationKind::Tables);
        }
        if document.has_diagram() {
            views.push(RepresentationKind::Diagrams);
        }
        RepresentationSet {
            views,
            original_available: document.image_url.is_some()
                && self.artifacts.contains(&document.artifact_hash),
        }
    }

    /// Keep documents whose filename or text contains `query`, ignoring
    /// case.  A blank query keeps everything.  Order is preserved.
    pub fn filter(documents: Vec<Document>, query: &str) -> Vec<Document> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return documents;
        }
        documents
            .into_iter()
            .filter(|doc| {
                doc.filename.to_lowercase().contains(&needle)
                    || doc
                        .text
                        .as_deref()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn summary(document: &Document) -> DocumentSummary {
        DocumentSummary {
            id: document.id,
            filename: document.filename.clone(),
            created_at: document.created_at,
            state: document.state,
            excerpt: excerpt(document.text.as_deref().unwrap_or_default()),
            thumbnail_url: document.thumbnail_url.clone(),
            has_table: document.has_table(),
            has_diagram: document.has_diagram(),
        }
    }
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
