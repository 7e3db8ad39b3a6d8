// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scriptorium-document — Everything that turns bytes into text and text back
// into files.
//
// `recognize` is the boundary to the recognition engine (HTTP by default,
// local `ocrs` behind the `ocr` feature).  `export` renders a Ready document
// as PDF, DOCX, TXT or JSON, byte-for-byte deterministic.

pub mod export;
pub mod recognize;
pub mod table;

pub use export::{ExportArtifact, ExportTransformer};
pub use recognize::http::HttpRecognizer;
pub use recognize::{Detection, Recognition, RecognitionInput, Recognizer};

#[cfg(feature = "ocr")]
pub use recognize::local::LocalRecognizer;
