// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptorium — document recognition, storage and export.
//
// Entry point. Initialises logging and backend services, then either runs
// the HTTP API or a one-shot CLI command.

mod api;
mod cli;
mod services;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use scriptorium_core::config::ServiceConfig;

use cli::Cli;
use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(action) = cli.into_action() else {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Scriptorium starting");

    let result = async {
        let config = ServiceConfig::from_env()?;
        let services = AppServices::init(&config)?;
        cli::run(action, services, &config).await
    }
    .await;

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
