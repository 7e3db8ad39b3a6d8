// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scriptorium-pipeline — the document lifecycle.
//
// `IngestionGate` validates uploads and creates documents;
// `ProcessingCoordinator` drives each document through recognition on
// background tasks; `ViewComposer` decides what a client can show for a
// document and builds list summaries.

pub mod blocking;
pub mod coordinator;
pub mod ingest;
pub mod views;

pub use blocking::run_blocking;
pub use coordinator::{ProcessingCoordinator, RecoveryReport, RunHandle};
pub use ingest::{Artifact, IngestionGate, IngestionRequest};
pub use views::{DocumentSummary, RepresentationKind, RepresentationSet, ViewComposer};

#[cfg(test)]
pub(crate) mod testing;
