// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory preparation.

use std::path::{Path, PathBuf};

use scriptorium_core::config::ServiceConfig;
use scriptorium_core::error::{Result, ScriptoriumError};
use tracing::debug;

/// Create the data directory and the artifact directory beneath it.
///
/// Unlike a best-effort create, failure here is fatal: nothing can be
/// stored without it.
pub fn prepare(config: &ServiceConfig) -> Result<PathBuf> {
    create(&config.data_dir)?;
    create(&config.artifacts_dir())?;
    Ok(config.data_dir.clone())
}

fn create(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        ScriptoriumError::StorageUnavailable(format!("create {}: {e}", dir.display()))
    })?;
    debug!(path = %dir.display(), "data directory ready");
    Ok(())
}
