// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP recognizer — posts the artifact to an OCR engine's `/process` route.
//
// Request: multipart form with a `file` part plus one text field per option
// (`"true"`/`"false"`) and `language`.
// Response: `{text, tables:[{html}], diagrams:[{type, mermaidCode}],
// pageCount, languages, confidence}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{Diagram, RecognitionMetadata, ResolvedOptions, Table};

use super::diagrams::detect_diagrams;
use super::{Detection, Recognition, RecognitionInput, Recognizer};

pub struct HttpRecognizer {
    client: Client,
    endpoint: String,
}

impl HttpRecognizer {
    /// Build a recognizer for the engine at `base_url`.
    ///
    /// `timeout` bounds each request; the coordinator applies its own
    /// processing timeout on top.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScriptoriumError::ProcessingFailed(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/process", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(filename = %input.filename, endpoint = %self.endpoint))]
    async fn recognize(
        &self,
        input: &RecognitionInput,
        options: &ResolvedOptions,
    ) -> Result<Recognition> {
        let file = Part::bytes(input.bytes.clone())
            .file_name(input.filename.clone())
            .mime_str(input.media_type.mime_type())
            .map_err(|e| ScriptoriumError::ProcessingFailed(format!("build upload part: {e}")))?;

        let form = Form::new()
            .part("file", file)
            .text("detectTables", flag(options.detect_tables))
            .text("detectHandwriting", flag(options.detect_handwriting))
            .text("multiLanguage", flag(options.multi_language))
            .text("preserveFormatting", flag(options.preserve_formatting))
            .text("detectDiagrams", flag(options.detect_diagrams))
            .text("language", options.language.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScriptoriumError::ProcessingFailed(format!("engine request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScriptoriumError::ProcessingFailed(format!(
                "engine returned {status}: {}",
                engine_error_message(&body)
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ScriptoriumError::ProcessingFailed(format!("engine response is not JSON: {e}"))
        })?;

        debug!("engine responded");
        parse_response(body, options)
    }
}

/// Prefer the engine's own `{"error": "..."}` message over the raw body.
fn engine_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Turn an engine response into a [`Recognition`].
///
/// A missing or non-string `text` is malformed output and fails the run.
/// A malformed `tables`/`diagrams` value only fails that detection.  When
/// diagram detection was requested but the engine left `diagrams` out,
/// keyword heuristics run over the text instead.
pub fn parse_response(body: Value, options: &ResolvedOptions) -> Result<Recognition> {
    let Some(text) = body.get("text").and_then(Value::as_str) else {
        let detail = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("missing `text` field");
        return Err(ScriptoriumError::ProcessingFailed(format!(
            "malformed engine output: {detail}"
        )));
    };
    let text = text.to_owned();

    let tables = if !options.detect_tables {
        Detection::NotRequested
    } else {
        match body.get("tables") {
            None | Some(Value::Null) => Detection::Found(Vec::new()),
            Some(value) => sequence::<Table>(value, "tables"),
        }
    };

    let diagrams = if !options.detect_diagrams {
        Detection::NotRequested
    } else {
        match body.get("diagrams") {
            None | Some(Value::Null) => Detection::Found(detect_diagrams(&text)),
            Some(value) => sequence::<Diagram>(value, "diagrams"),
        }
    };

    let metadata = RecognitionMetadata {
        page_count: body
            .get("pageCount")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(1),
        languages: body
            .get("languages")
            .and_then(Value::as_array)
            .map(|langs| langs.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_else(|| vec![options.language.clone()]),
        confidence: body
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 100.0))
            .unwrap_or(0.0),
    };

    Ok(Recognition {
        text,
        tables,
        diagrams,
        metadata,
    })
}

fn sequence<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Detection<T> {
    match serde_json::from_value::<Vec<T>>(value.clone()) {
        Ok(items) => Detection::Found(items),
        Err(e) => {
            warn!(field, error = %e, "engine returned malformed detection output");
            Detection::Failed(format!("malformed `{field}`: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use scriptorium_core::config::Settings;
    use scriptorium_core::types::UploadOptions;

    fn options() -> ResolvedOptions {
        UploadOptions::default().resolve(&Settings::default())
    }

    #[test]
    fn full_response_parses() {
        let body = json!({
            "text": "Invoice #42",
            "tables": [{"html": "<table><tr><td>1</td></tr></table>"}],
            "diagrams": [{"type": "flowchart", "mermaidCode": "flowchart TD\n"}],
            "pageCount": 2,
            "languages": ["eng"],
            "confidence": 93.5
        });
        let recognition = parse_response(body, &options()).unwrap();
        assert_eq!(recognition.text, "Invoice #42");
        assert!(matches!(recognition.tables, Detection::Found(ref t) if t.len() == 1));
        assert!(matches!(recognition.diagrams, Detection::Found(ref d) if d[0].kind == "flowchart"));
        assert_eq!(recognition.metadata.page_count, 2);
        assert_eq!(recognition.metadata.confidence, 93.5);
    }

    #[test]
    fn missing_text_is_fatal() {
        let err = parse_response(json!({"tables": []}), &options()).unwrap_err();
        assert!(matches!(err, ScriptoriumError::ProcessingFailed(_)));
        let err = parse_response(json!({"text": 42}), &options()).unwrap_err();
        assert!(matches!(err, ScriptoriumError::ProcessingFailed(_)));
    }

    #[test]
    fn malformed_tables_only_fail_detection() {
        let body = json!({"text": "ok", "tables": "not a list", "diagrams": []});
        let recognition = parse_response(body, &options()).unwrap();
        assert!(matches!(recognition.tables, Detection::Failed(_)));
        assert_eq!(recognition.diagrams, Detection::Found(Vec::new()));
    }

    #[test]
    fn disabled_detections_are_not_requested() {
        let mut opts = options();
        opts.detect_tables = false;
        opts.detect_diagrams = false;
        let body = json!({"text": "ok", "tables": [{"html": "<table/>"}]});
        let recognition = parse_response(body, &opts).unwrap();
        assert_eq!(recognition.tables, Detection::NotRequested);
        assert_eq!(recognition.diagrams, Detection::NotRequested);
    }

    #[test]
    fn omitted_diagrams_fall_back_to_heuristics() {
        let body = json!({"text": "sequence diagram with Client and Server"});
        let recognition = parse_response(body, &options()).unwrap();
        let Detection::Found(diagrams) = recognition.diagrams else {
            panic!("expected heuristic diagrams");
        };
        assert_eq!(diagrams[0].kind, "sequence");
        assert_eq!(recognition.metadata.languages, vec!["eng".to_string()]);
        assert_eq!(recognition.metadata.page_count, 1);
    }

    #[test]
    fn endpoint_joins_base_url() {
        let recognizer = HttpRecognizer::new("http://ocr-engine:6000/", Duration::from_secs(5)).unwrap();
        assert_eq!(recognizer.endpoint(), "http://ocr-engine:6000/process");
    }

    #[test]
    fn engine_errors_are_unwrapped() {
        assert_eq!(engine_error_message(r#"{"error": "No file part"}"#), "No file part");
        assert_eq!(engine_error_message("Bad Gateway"), "Bad Gateway");
    }
}
