//! Writer-lock management.
//!
//! tantivy guards its single writer with a lock file in the index
//! directory. A crash leaves the file behind and every later writer open
//! fails with a lock-obtain error. This module probes for such stale locks
//! and removes them — but only ever *after* an open has actually failed
//! with a lock error, so a healthy concurrent writer is never clobbered.

use std::io;
use std::path::Path;
use std::time::Duration;

/// Name of tantivy's writer lock file inside an index directory.
pub const WRITER_LOCK_FILE: &str = ".tantivy-writer.lock";

/// Result of probing an index directory for a writer lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockProbe {
    pub present: bool,
    /// Age of the lock file, when the filesystem can tell us.
    pub age: Option<Duration>,
    /// Owning pid. tantivy lock files carry no pid, so this stays `None`
    /// unless a future lock format records one.
    pub owner_pid: Option<u32>,
}

impl LockProbe {
    const ABSENT: Self = Self {
        present: false,
        age: None,
        owner_pid: None,
    };
}

/// Probes `index_path` for a writer lock file.
///
/// # Errors
///
/// Returns an IO error for failures other than the file being absent.
pub fn probe(index_path: &Path) -> io::Result<LockProbe> {
    let lock_path = index_path.join(WRITER_LOCK_FILE);
    let meta = match std::fs::metadata(&lock_path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockProbe::ABSENT),
        Err(e) => return Err(e),
    };

    let age = meta
        .modified()
        .ok()
        .and_then(|t| t.elapsed().ok());

    Ok(LockProbe {
        present: true,
        age,
        owner_pid: None,
    })
}

/// Removes the writer lock file. Returns whether a file was removed.
///
/// # Errors
///
/// Returns an IO error for failures other than the file being absent.
pub fn force_remove(index_path: &Path) -> io::Result<bool> {
    let lock_path = index_path.join(WRITER_LOCK_FILE);
    match std::fs::remove_file(&lock_path) {
        Ok(()) => {
            tracing::warn!(path = %lock_path.display(), "removed stale writer lock");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether a tantivy error is a writer-lock acquisition failure.
///
/// Only this error kind authorises a [`force_remove`] attempt.
#[must_use]
pub fn is_lock_error(err: &tantivy::TantivyError) -> bool {
    matches!(err, tantivy::TantivyError::LockFailure(..))
}
