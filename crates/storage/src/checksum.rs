// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot directory checksums.
//!
//! Every snapshot directory carries a `CHECKSUM` file: an algorithm
//! identifier and a hex digest covering every other file, relative paths
//! included, in sorted path order. A snapshot whose recomputed digest
//! does not match is treated as unreadable, never repaired.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Name of the checksum file inside a snapshot directory.
pub const CHECKSUM_FILE: &str = "CHECKSUM";

const ALGORITHM: &str = "sha256";

#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("checksum io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compute the combined digest and write the `CHECKSUM` file.
pub fn write(dir: &Path) -> Result<String, ChecksumError> {
    let digest = combined_digest(dir)?;
    std::fs::write(dir.join(CHECKSUM_FILE), format!("{ALGORITHM} {digest}\n"))?;
    Ok(digest)
}

/// Recompute the digest and compare against the stored `CHECKSUM` file.
///
/// Returns `false` for a missing, malformed, or mismatching checksum —
/// all three mean "do not trust this directory". Only I/O failures are
/// errors.
pub fn verify(dir: &Path) -> Result<bool, ChecksumError> {
    let checksum_path = dir.join(CHECKSUM_FILE);
    let raw = match std::fs::read_to_string(&checksum_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let mut parts = raw.split_whitespace();
    let (algorithm, stored) = match (parts.next(), parts.next()) {
        (Some(algorithm), Some(stored)) => (algorithm, stored),
        _ => return Ok(false),
    };
    if algorithm != ALGORITHM {
        tracing::warn!(dir = %dir.display(), algorithm, "unknown checksum algorithm");
        return Ok(false);
    }

    Ok(combined_digest(dir)? == stored)
}

/// Digest over every file except `CHECKSUM`, in sorted relative-path
/// order, hashing each path before its contents so renames are caught.
fn combined_digest(dir: &Path) -> Result<String, ChecksumError> {
    let mut files = collect_files(dir, dir)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in files {
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(dir.join(&relative))?);
    }
    Ok(hex(&hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path) -> Result<Vec<PathBuf>, ChecksumError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            files.extend(collect_files(root, &path)?);
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            if relative.as_os_str() != CHECKSUM_FILE {
                files.push(relative);
            }
        }
    }
    Ok(files)
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "checksum_tests.rs"]
mod tests;
