// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge from async callers to the synchronous stores.
//
// `rusqlite` and the artifact directory do blocking I/O, so every call made
// from a tokio task goes through `spawn_blocking`.

use scriptorium_core::error::{Result, ScriptoriumError};

/// Run a synchronous store operation on the blocking pool.
pub async fn run_blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ScriptoriumError::StorageUnavailable(format!("storage task: {e}")))?
}
