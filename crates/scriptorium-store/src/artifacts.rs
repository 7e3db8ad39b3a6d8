// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-addressed storage for original artifacts.
//
// Uploaded bytes are written once under `<root>/<sha256>`; identical uploads
// share a single blob.  Reads re-verify the digest so a corrupted blob is
// reported instead of being fed to recognition.

use std::path::{Path, PathBuf};

use scriptorium_core::error::{Result, ScriptoriumError};
use tracing::{debug, instrument};

use crate::integrity::{hash_bytes, is_digest, verify_hash};

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (or create) an artifact directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            ScriptoriumError::StorageUnavailable(format!(
                "create artifact dir {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `data` and return its digest.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn put(&self, data: &[u8]) -> Result<String> {
        let hash = hash_bytes(data);
        let path = self.root.join(&hash);
        if path.exists() {
            debug!(%hash, "artifact already stored");
            return Ok(hash);
        }

        let tmp = self.root.join(format!("{hash}.partial"));
        std::fs::write(&tmp, data)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| ScriptoriumError::StorageUnavailable(format!("write artifact {hash}: {e}")))?;

        debug!(%hash, "artifact stored");
        Ok(hash)
    }

    /// Load and verify the artifact stored under `hash`.
    #[instrument(skip(self))]
    pub fn get(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.path_for(hash)?;
        let data = std::fs::read(&path).map_err(|e| {
            ScriptoriumError::StorageUnavailable(format!("read artifact {hash}: {e}"))
        })?;
        verify_hash(&data, hash)?;
        Ok(data)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.path_for(hash).map(|p| p.is_file()).unwrap_or(false)
    }

    fn path_for(&self, hash: &str) -> Result<PathBuf> {
        if !is_digest(hash) {
            return Err(ScriptoriumError::InvalidRequest(format!(
                "malformed artifact key {hash:?}"
            )));
        }
        Ok(self.root.join(hash.to_ascii_lowercase()))
    }
}
