// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP router.
//
// Every route is served twice: at the root and under `/api`, which is where
// the browser client mounts them.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use scriptorium_core::config::{BYTES_PER_MB, MAX_FILE_SIZE_CEILING_MB};

use super::handlers;
use crate::services::app_services::AppServices;

/// Transport-level body cap: the largest configurable upload plus 1 MB of
/// multipart overhead.  The per-request limit comes from the settings.
pub const UPLOAD_BODY_LIMIT: usize = ((MAX_FILE_SIZE_CEILING_MB + 1) * BYTES_PER_MB) as usize;

pub fn router(services: AppServices) -> Router {
    let routes = routes();
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

// NOTE: Path params use `:param` syntax (axum 0.7).
fn routes() -> Router<AppServices> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ocr", post(handlers::upload))
        .route("/documents", get(handlers::list_documents))
        .route("/documents/:id", get(handlers::get_document))
        .route("/documents/:id/views", get(handlers::get_views))
        .route("/documents/:id/image", get(handlers::get_original))
        .route("/documents/:id/thumbnail", get(handlers::get_original))
        .route("/documents/:id/export", get(handlers::export_document))
        .route("/documents/:id/process", post(handlers::process_document))
        .route(
            "/settings",
            get(handlers::get_settings).put(handlers::put_settings),
        )
}
