// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local recognizer built on the pure-Rust `ocrs` engine.
//
// Only available with the `ocr` feature.  Needs the two `.rten` models
// (`text-detection.rten`, `text-recognition.rten`), by default from
// `$XDG_CACHE_HOME/ocrs` as populated by `ocrs-cli`.  Recognition is CPU
// bound, so it runs on the blocking pool.  Images only: PDF artifacts need
// the HTTP engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{RecognitionMetadata, ResolvedOptions};

use super::diagrams::{detect_diagrams, estimate_confidence};
use super::{Detection, Recognition, RecognitionInput, Recognizer};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, else `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

pub struct LocalRecognizer {
    engine: Arc<OcrEngine>,
}

impl LocalRecognizer {
    /// Load both models from `dir`.  Model loading is the slow part; build
    /// one recognizer and share it.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let detection_model = load_model(&dir.join(DETECTION_MODEL_FILENAME))?;
        let recognition_model = load_model(&dir.join(RECOGNITION_MODEL_FILENAME))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| ScriptoriumError::ProcessingFailed(format!("initialise OCR engine: {e}")))?;

        info!("local OCR engine ready");
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    pub fn with_default_models() -> Result<Self> {
        Self::from_model_dir(default_model_dir())
    }
}

fn load_model(path: &Path) -> Result<Model> {
    if !path.exists() {
        return Err(ScriptoriumError::ProcessingFailed(format!(
            "OCR model not found at {}; run `ocrs-cli` once to download it",
            path.display()
        )));
    }
    Model::load_file(path).map_err(|e| {
        ScriptoriumError::ProcessingFailed(format!("load OCR model {}: {e}", path.display()))
    })
}

fn recognize_image(engine: &OcrEngine, bytes: &[u8]) -> Result<String> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ScriptoriumError::ProcessingFailed(format!("decode image: {e}")))?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|e| {
        ScriptoriumError::ProcessingFailed(format!("image source ({width}x{height}): {e}"))
    })?;
    let input = engine
        .prepare_input(source)
        .map_err(|e| ScriptoriumError::ProcessingFailed(format!("OCR preprocessing: {e}")))?;
    engine
        .get_text(&input)
        .map_err(|e| ScriptoriumError::ProcessingFailed(format!("OCR recognition: {e}")))
}

#[async_trait]
impl Recognizer for LocalRecognizer {
    fn name(&self) -> &str {
        "ocrs"
    }

    #[instrument(skip_all, fields(filename = %input.filename))]
    async fn recognize(
        &self,
        input: &RecognitionInput,
        options: &ResolvedOptions,
    ) -> Result<Recognition> {
        if !input.media_type.is_image() {
            return Err(ScriptoriumError::ProcessingFailed(format!(
                "local OCR cannot read {} artifacts",
                input.media_type.mime_type()
            )));
        }

        let engine = Arc::clone(&self.engine);
        let bytes = input.bytes.clone();
        let text = tokio::task::spawn_blocking(move || recognize_image(&engine, &bytes))
            .await
            .map_err(|e| ScriptoriumError::ProcessingFailed(format!("OCR task: {e}")))??;

        debug!(chars = text.len(), "local OCR complete");
        let diagrams = if options.detect_diagrams {
            Detection::Found(detect_diagrams(&text))
        } else {
            Detection::NotRequested
        };
        let tables = if options.detect_tables {
            Detection::Found(Vec::new())
        } else {
            Detection::NotRequested
        };

        Ok(Recognition {
            metadata: RecognitionMetadata {
                page_count: 1,
                languages: vec![options.language.clone()],
                confidence: estimate_confidence(&text),
            },
            text,
            tables,
            diagrams,
        })
    }
}
