// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface.  Results are printed as JSON on stdout; logs go to
// stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use serde::Serialize;
use serde_json::json;

use scriptorium_core::config::ServiceConfig;
use scriptorium_core::error::{Result, ScriptoriumError};
use scriptorium_core::types::{DocumentId, DocumentState, ExportFormat};

use crate::api;
use crate::services::app_services::AppServices;

#[derive(Debug, Parser)]
#[command(
    name = "scriptorium",
    version,
    about = "Document recognition, storage and export",
    after_help = "Examples:\n  scriptorium --process-image ./sample.jpg\n  scriptorium --list-documents\n  scriptorium --export <ID> --format DOCX --output report.docx"
)]
#[command(group(ArgGroup::new("action").multiple(false)))]
pub struct Cli {
    /// Process an image or PDF and print the resulting document
    #[arg(long, value_name = "PATH", group = "action")]
    pub process_image: Option<PathBuf>,

    /// List all documents, newest first
    #[arg(long, group = "action")]
    pub list_documents: bool,

    /// Only list documents whose name or text contains QUERY
    #[arg(long, value_name = "QUERY", requires = "list_documents")]
    pub query: Option<String>,

    /// Print one document by id
    #[arg(long, value_name = "ID", group = "action")]
    pub get_document: Option<DocumentId>,

    /// Print the current settings
    #[arg(long, group = "action")]
    pub settings: bool,

    /// Run the HTTP API
    #[arg(long, group = "action")]
    pub serve: bool,

    /// Export a document by id
    #[arg(long, value_name = "ID", group = "action")]
    pub export: Option<DocumentId>,

    /// Export format: PDF, DOCX, TXT or JSON (default from settings)
    #[arg(long, value_name = "FORMAT", requires = "export")]
    pub format: Option<ExportFormat>,

    /// Where to write the export (default: <name>.<ext> in the current directory)
    #[arg(long, value_name = "PATH", requires = "export")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ProcessImage(PathBuf),
    ListDocuments { query: Option<String> },
    GetDocument(DocumentId),
    Settings,
    Serve,
    Export {
        id: DocumentId,
        format: Option<ExportFormat>,
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// The requested action; `None` when no action flag was given.
    pub fn into_action(self) -> Option<Action> {
        if let Some(path) = self.process_image {
            Some(Action::ProcessImage(path))
        } else if self.list_documents {
            Some(Action::ListDocuments { query: self.query })
        } else if let Some(id) = self.get_document {
            Some(Action::GetDocument(id))
        } else if self.settings {
            Some(Action::Settings)
        } else if self.serve {
            Some(Action::Serve)
        } else {
            self.export.map(|id| Action::Export {
                id,
                format: self.format,
                output: self.output,
            })
        }
    }
}

pub async fn run(action: Action, services: AppServices, config: &ServiceConfig) -> Result<ExitCode> {
    match action {
        Action::ProcessImage(path) => {
            if !path.is_file() {
                return Err(ScriptoriumError::InvalidRequest(format!(
                    "file not found at {}",
                    path.display()
                )));
            }
            let document = services.process_file(&path).await?;
            print_json(&document.record())?;
            Ok(if document.state == DocumentState::Ready {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Action::ListDocuments { query } => {
            print_json(&services.list_documents(query.as_deref()).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Action::GetDocument(id) => {
            print_json(&services.document(id).await?.record())?;
            Ok(ExitCode::SUCCESS)
        }
        Action::Settings => {
            print_json(&*services.settings())?;
            Ok(ExitCode::SUCCESS)
        }
        Action::Serve => {
            services.recover().await?;
            api::serve(services, &config.bind).await?;
            Ok(ExitCode::SUCCESS)
        }
        Action::Export { id, format, output } => {
            let artifact = services.export(id, format).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&artifact.filename));
            tokio::fs::write(&path, &artifact.bytes).await?;
            print_json(&json!({
                "documentId": id,
                "path": path.display().to_string(),
                "contentType": artifact.content_type,
                "bytes": artifact.bytes.len(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PNG_BYTES, TestServices};

    fn parse(args: &[&str]) -> std::result::Result<Option<Action>, clap::Error> {
        let argv = std::iter::once("scriptorium").chain(args.iter().copied());
        Cli::try_parse_from(argv).map(Cli::into_action)
    }

    fn config(test: &TestServices) -> ServiceConfig {
        let root = test.dir.path().display().to_string();
        ServiceConfig::from_lookup(|key| (key == "SCRIPTORIUM_DATA_DIR").then(|| root.clone()))
            .unwrap()
    }

    #[test]
    fn no_arguments_means_no_action() {
        assert_eq!(parse(&[]).unwrap(), None);
    }

    #[test]
    fn flags_map_to_actions() {
        assert_eq!(
            parse(&["--process-image", "scan.png"]).unwrap(),
            Some(Action::ProcessImage(PathBuf::from("scan.png")))
        );
        assert_eq!(
            parse(&["--list-documents", "--query", "invoice"]).unwrap(),
            Some(Action::ListDocuments {
                query: Some("invoice".into())
            })
        );
        assert_eq!(parse(&["--settings"]).unwrap(), Some(Action::Settings));

        let id = DocumentId::new();
        assert_eq!(
            parse(&["--export", &id.to_string(), "--format", "docx"]).unwrap(),
            Some(Action::Export {
                id,
                format: Some(ExportFormat::Docx),
                output: None,
            })
        );
    }

    #[test]
    fn unknown_flag_and_bad_values_are_usage_errors() {
        assert!(parse(&["--frobnicate"]).is_err());
        assert!(parse(&["--get-document", "not-a-uuid"]).is_err());
        assert!(parse(&["--export", &DocumentId::new().to_string(), "--format", "odt"]).is_err());
    }

    #[test]
    fn actions_are_mutually_exclusive() {
        assert!(parse(&["--settings", "--list-documents"]).is_err());
        assert!(parse(&["--format", "PDF"]).is_err());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let test = TestServices::new();
        let missing = test.dir.path().join("absent.png");
        let result = run(Action::ProcessImage(missing), test.services.clone(), &config(&test)).await;
        assert!(matches!(result, Err(ScriptoriumError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn process_image_succeeds_for_ready_document() {
        let test = TestServices::new();
        let path = test.dir.path().join("page.png");
        std::fs::write(&path, PNG_BYTES).unwrap();

        let code = run(Action::ProcessImage(path), test.services.clone(), &config(&test))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(test.services.list_documents(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_writes_requested_output() {
        let test = TestServices::new();
        let document = test.ready_document().await;
        let output = test.dir.path().join("out.txt");

        run(
            Action::Export {
                id: document.id,
                format: Some(ExportFormat::Txt),
                output: Some(output.clone()),
            },
            test.services.clone(),
            &config(&test),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"Invoice #42");
    }

    #[tokio::test]
    async fn get_unknown_document_is_not_found() {
        let test = TestServices::new();
        let result = run(
            Action::GetDocument(DocumentId::new()),
            test.services.clone(),
            &config(&test),
        )
        .await;
        assert!(matches!(result, Err(ScriptoriumError::NotFound(_))));
    }
}
