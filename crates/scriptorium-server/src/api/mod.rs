// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP API (axum).

pub mod error;
pub mod handlers;
pub mod router;

use scriptorium_core::error::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::services::app_services::AppServices;

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(services: AppServices, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    axum::serve(listener, router::router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
