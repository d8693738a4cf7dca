//! Type-safe newtypes for codequarry.
//!
//! These newtypes provide compile-time safety and semantic clarity
//! for core domain concepts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic fingerprint of a canonicalised workspace path.
///
/// The hash doubles as the on-disk index directory name and the key of every
/// in-memory workspace map, so it must be identical for the same path across
/// processes and hosts. Normally 16 hex chars; widened to 32 when the
/// catalogue detects a collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceHash(String);

impl WorkspaceHash {
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a widened (collision-disambiguated) hash.
    #[must_use]
    pub fn is_widened(&self) -> bool {
        self.0.len() > 16
    }
}

impl fmt::Display for WorkspaceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkspaceHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for WorkspaceHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Millisecond ticks since the Unix epoch.
///
/// Used for document modification times (indexed for range queries) and
/// context last-access stamps. A plain u64 on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ticks(pub u64);

impl Ticks {
    #[must_use]
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock ticks. Saturates at zero if the clock is before
    /// the epoch.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Elapsed milliseconds from `self` to `later`, zero if `later` is older.
    #[must_use]
    pub const fn elapsed_until(self, later: Ticks) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// Compile-time assertions for thread safety.
// These ensure Send+Sync remain implemented and catch regressions.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<WorkspaceHash>();
    assert_send_sync::<Ticks>();
};
