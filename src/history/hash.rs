// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagrel contributors

//! Run identifiers and artifact digests
//!
//! Uses BLAKE3 for both.

use blake3::Hasher;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::TagrelError;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Fresh run id: 16 hex characters, unique per process invocation
pub fn new_run_id(workflow: &str, git_ref: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Hasher::new();
    hasher.update(workflow.as_bytes());
    hasher.update(b"\0");
    hasher.update(git_ref.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());

    let hex = hasher.finalize().to_hex();
    hex[..16].to_string()
}

/// BLAKE3 digest of a file's contents, hex encoded
pub fn digest_file(path: &Path) -> Result<String, TagrelError> {
    let mut file = std::fs::File::open(path).map_err(|e| TagrelError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut hasher = Hasher::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| TagrelError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_ids_are_unique() {
        let a = new_run_id("release", "refs/tags/v1.0.0");
        let b = new_run_id("release", "refs/tags/v1.0.0");
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_matches_blake3() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.exe");
        std::fs::write(&path, b"binary").unwrap();

        assert_eq!(
            digest_file(&path).unwrap(),
            blake3::hash(b"binary").to_hex().to_string()
        );
    }

    #[test]
    fn test_digest_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(digest_file(&dir.path().join("missing")).is_err());
    }
}
