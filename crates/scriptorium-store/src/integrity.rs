// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact integrity — SHA-256 content addressing and tamper detection.

use scriptorium_core::error::ScriptoriumError;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
///
/// The digest doubles as the artifact's storage key.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that `data` matches the expected SHA-256 hex digest.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<(), ScriptoriumError> {
    let actual = hash_bytes(data);
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(ScriptoriumError::StorageUnavailable(format!(
            "artifact digest mismatch: expected {expected_hex}, got {actual}"
        )))
    }
}

/// Whether `s` has the shape of a SHA-256 hex digest.
///
/// Artifact keys are joined onto a directory path, so anything else is
/// rejected before it reaches the filesystem.
pub fn is_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
