//! Index repair: drop segments whose files are missing or truncated.
//!
//! tantivy records its live segments in `meta.json`. When a crash or a
//! flaky filesystem loses segment files, opening the index fails; the fix
//! is to rewrite `meta.json` without the damaged segments, accepting the
//! loss of the documents they held. An optional full directory backup is
//! taken first, and the index is reopened afterwards to prove the surgery
//! worked.

use crate::error::{EngineError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.json";

/// Repair options.
#[derive(Debug, Clone, Copy)]
pub struct RepairOptions {
    /// Copy the whole index directory aside before touching it.
    pub create_backup: bool,
    /// Reopen the index after surgery to confirm it loads.
    pub validate_after: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            validate_after: true,
        }
    }
}

/// Outcome of a repair run.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub success: bool,
    pub removed_segments: usize,
    pub lost_documents: u64,
    pub backup_path: Option<PathBuf>,
}

/// Runs check-and-fix on an index directory.
///
/// The caller must have disposed any live writer first; repair works on
/// the files alone.
///
/// # Errors
///
/// Fails when `meta.json` is absent or unreadable, or the backup copy
/// cannot be written.
pub fn repair_index(index_path: &Path, options: RepairOptions) -> Result<RepairOutcome> {
    let meta_path = index_path.join(META_FILE);
    let raw = std::fs::read_to_string(&meta_path).map_err(|e| EngineError::IndexCorrupt {
        detail: format!("cannot read {}: {e}", meta_path.display()),
    })?;
    let mut meta: Value = serde_json::from_str(&raw).map_err(|e| EngineError::IndexCorrupt {
        detail: format!("malformed {}: {e}", meta_path.display()),
    })?;

    let backup_path = if options.create_backup {
        let dest = backup_destination(index_path);
        copy_dir(index_path, &dest)?;
        tracing::info!(backup = %dest.display(), "index backed up before repair");
        Some(dest)
    } else {
        None
    };

    let segments = meta
        .get_mut("segments")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| EngineError::IndexCorrupt {
            detail: "meta.json has no segments array".into(),
        })?;

    let mut removed_segments = 0usize;
    let mut lost_documents = 0u64;

    segments.retain(|segment| {
        let healthy = segment_is_healthy(index_path, segment);
        if !healthy {
            removed_segments += 1;
            lost_documents += live_docs(segment);
            tracing::warn!(segment = %segment_id_of(segment), "dropping damaged segment");
        }
        healthy
    });

    if removed_segments > 0 {
        // Atomic rewrite: the old meta survives a crash mid-write.
        let tmp = index_path.join("meta.json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&meta)?)?;
        std::fs::rename(&tmp, &meta_path)?;
    }

    let success = if options.validate_after {
        match tantivy::Index::open_in_dir(index_path) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "index still unreadable after repair");
                false
            }
        }
    } else {
        true
    };

    Ok(RepairOutcome {
        success,
        removed_segments,
        lost_documents,
        backup_path,
    })
}

/// A segment is healthy when it has at least one on-disk file and none of
/// its files are zero-length.
fn segment_is_healthy(index_path: &Path, segment: &Value) -> bool {
    let stem = segment_id_of(segment);
    if stem.is_empty() {
        return false;
    }

    let mut file_count = 0usize;
    let entries = match std::fs::read_dir(index_path) {
        Ok(e) => e,
        Err(_) => return false,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(stem.as_str()) {
            continue;
        }
        file_count += 1;
        if entry.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
            return false;
        }
    }

    file_count > 0 || live_docs(segment) == 0
}

/// Segment id with uuid dashes stripped, matching on-disk file stems.
fn segment_id_of(segment: &Value) -> String {
    segment
        .get("segment_id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .replace('-', "")
}

/// Live (non-deleted) document count of a segment.
fn live_docs(segment: &Value) -> u64 {
    let max_doc = segment.get("max_doc").and_then(Value::as_u64).unwrap_or(0);
    let deleted = segment
        .get("deletes")
        .and_then(|d| d.get("num_deleted_docs"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    max_doc.saturating_sub(deleted)
}

/// Picks an unused sibling path for the backup copy.
fn backup_destination(index_path: &Path) -> PathBuf {
    let base = index_path.with_extension("bak");
    if !base.exists() {
        return base;
    }
    for n in 1u32.. {
        let candidate = index_path.with_extension(format!("bak{n}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("exhausted backup suffixes")
}

/// Recursive directory copy (flat indexes, but robust to subdirectories).
fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
