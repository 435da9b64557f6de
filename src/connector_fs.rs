//! Local source discovery.
//!
//! Walks the source directory for supported document files, skipping
//! version-control, build, and dependency trees. Each file gets a document
//! id derived from its relative path and a SHA-256 content hash. Output is
//! sorted by relative path so runs are deterministic.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::extract::FileKind;

/// A supported file found under the source directory.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated on every platform.
    pub relative: String,
    /// Relative path with separators replaced by `_`.
    pub document_id: String,
    /// SHA-256 hex digest of the file bytes.
    pub content_hash: String,
}

/// Find supported files under `root`.
///
/// A missing root is logged and yields nothing. Files that cannot be read
/// for hashing are logged and skipped.
pub fn discover_files(root: &Path) -> Result<Vec<LocalFile>> {
    if !root.is_dir() {
        warn!(dir = %root.display(), "source directory not found; skipping local documents");
        return Ok(Vec::new());
    }

    let exclude_set = build_globset(&[
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ])?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || FileKind::from_path(path).is_none() {
            continue;
        }

        let content_hash = match hash_file(path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not hash file; skipping");
                continue;
            }
        };

        files.push(LocalFile {
            path: path.to_path_buf(),
            document_id: rel_str.replace('/', "_"),
            relative: rel_str,
            content_hash,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    if files.is_empty() {
        warn!(dir = %root.display(), "no supported files found");
    }

    Ok(files)
}

pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
