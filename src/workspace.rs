//! Workspace path resolution and the persisted workspace catalogue.
//!
//! A workspace is identified by its canonical absolute root path. The
//! resolver derives a deterministic hash from that path; the hash names the
//! on-disk index directory and keys every in-memory map, so the same path
//! must produce the same hash across processes and hosts.
//!
//! The catalogue is a small JSON file in the index base directory mapping
//! hash → canonical path. It lets the service re-discover previously indexed
//! workspaces at startup and carries the collision tiebreaker.

use crate::error::{EngineError, Result};
use crate::types::WorkspaceHash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the persisted hash → path catalogue.
pub const CATALOGUE_FILE: &str = "workspaces.json";

/// A resolved workspace: canonical root, stable hash, index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkspace {
    /// Canonical absolute root path (symlinks resolved, no trailing separator).
    pub root: PathBuf,
    /// Deterministic fingerprint of `root`.
    pub hash: WorkspaceHash,
    /// Index directory for this workspace under the base directory.
    pub index_path: PathBuf,
}

/// Returns the central base directory holding all per-workspace indexes.
///
/// `~/.cache/codequarry` on Linux, the platform cache dir elsewhere. The
/// directory is not created here; the index service creates it lazily.
#[must_use]
pub fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("codequarry")
}

/// Computes the full (32 hex chars) workspace fingerprint of a normalised path.
fn full_hash(normalised: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalised.as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Normalises a canonical path into the string that gets hashed.
///
/// Comparison is case-insensitive where the host filesystem is, so the
/// hash input is case-folded there and left intact elsewhere.
fn hash_input(canonical: &Path) -> String {
    let s = canonical.to_string_lossy();
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        s.to_lowercase()
    } else {
        s.into_owned()
    }
}

/// Resolves a workspace root into its canonical form, hash, and index path.
///
/// The root must be non-empty and name an existing directory. Symlinks are
/// resolved and trailing separators stripped by canonicalisation.
///
/// # Errors
///
/// Returns `EngineError::Workspace` for an empty path or a root that does
/// not exist or is not a directory.
pub fn resolve(root: &Path, base_dir: &Path) -> Result<ResolvedWorkspace> {
    if root.as_os_str().is_empty() {
        return Err(EngineError::Workspace("workspace path is empty".into()));
    }

    let canonical = dunce::canonicalize(root).map_err(|e| {
        EngineError::Workspace(format!("cannot resolve '{}': {e}", root.display()))
    })?;
    if !canonical.is_dir() {
        return Err(EngineError::Workspace(format!(
            "'{}' is not a directory",
            canonical.display()
        )));
    }

    let hash = WorkspaceHash::new(&full_hash(&hash_input(&canonical))[..16]);
    let index_path = base_dir.join(hash.as_str());
    Ok(ResolvedWorkspace {
        root: canonical,
        hash,
        index_path,
    })
}

/// Persisted hash → canonical-path catalogue.
///
/// BTreeMap keeps the serialised file diff-stable. The catalogue is the
/// source of truth for the collision tiebreak: a widened hash recorded here
/// wins over the freshly derived short hash on the next resolve.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Catalogue {
    entries: BTreeMap<String, String>,
}

impl Catalogue {
    /// Loads the catalogue from the base directory, empty if absent.
    ///
    /// A malformed catalogue is treated as empty (logged, not fatal): losing
    /// the mapping only costs startup re-discovery.
    #[must_use]
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join(CATALOGUE_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "malformed catalogue; starting empty");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Writes the catalogue to the base directory.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(base_dir)?;
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(base_dir.join(CATALOGUE_FILE), raw)?;
        Ok(())
    }

    /// Registers a resolved workspace, widening the hash on collision.
    ///
    /// If the short hash is already mapped to a *different* canonical path,
    /// the new workspace gets the full 32-char fingerprint instead, and that
    /// widened mapping is what persists. Returns the hash to use.
    pub fn register(&mut self, resolved: &ResolvedWorkspace) -> WorkspaceHash {
        let path_str = resolved.root.to_string_lossy().into_owned();
        let short = resolved.hash.as_str().to_string();

        match self.entries.get(&short) {
            Some(existing) if *existing != path_str => {
                let wide = full_hash(&hash_input(&resolved.root));
                tracing::warn!(
                    short = %short,
                    existing = %existing,
                    new = %path_str,
                    "workspace hash collision; widening to full fingerprint"
                );
                self.entries.insert(wide.clone(), path_str);
                WorkspaceHash::new(wide)
            }
            _ => {
                self.entries.insert(short.clone(), path_str);
                WorkspaceHash::new(short)
            }
        }
    }

    /// Looks up the canonical path recorded for a hash.
    #[must_use]
    pub fn path_for(&self, hash: &WorkspaceHash) -> Option<&str> {
        self.entries.get(hash.as_str()).map(String::as_str)
    }

    /// Read-only hash resolution for a workspace already registered.
    ///
    /// Returns the short hash when it maps to this workspace, the widened
    /// hash when a collision was recorded earlier, and `None` for an
    /// unregistered workspace (callers then go through [`Self::register`]).
    #[must_use]
    pub fn resolve_hash(&self, resolved: &ResolvedWorkspace) -> Option<WorkspaceHash> {
        let path_str = resolved.root.to_string_lossy();
        match self.entries.get(resolved.hash.as_str()) {
            Some(known) if *known == path_str => Some(resolved.hash.clone()),
            _ => {
                let wide = full_hash(&hash_input(&resolved.root));
                match self.entries.get(&wide) {
                    Some(known) if *known == path_str => Some(WorkspaceHash::new(wide)),
                    _ => None,
                }
            }
        }
    }

    /// Iterates over all recorded (hash, path) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(h, p)| (h.as_str(), p.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_path_same_hash() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base");
        let a = resolve(dir.path(), &base).unwrap();
        let b = resolve(dir.path(), &base).unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.index_path, b.index_path);
    }

    #[test]
    fn test_trailing_separator_is_irrelevant() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base");
        let with_sep = PathBuf::from(format!("{}/", dir.path().display()));
        let a = resolve(dir.path(), &base).unwrap();
        let b = resolve(&with_sep, &base).unwrap();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_is_sixteen_hex_chars() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve(dir.path(), dir.path()).unwrap();
        assert_eq!(resolved.hash.as_str().len(), 16);
        assert!(resolved.hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = resolve(Path::new(""), Path::new("/tmp")).unwrap_err();
        assert_eq!(err.code(), "WORKSPACE_ERROR");
    }

    #[test]
    fn test_missing_root_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(resolve(&missing, dir.path()).is_err());
    }

    #[test]
    fn test_catalogue_roundtrip() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve(dir.path(), dir.path()).unwrap();

        let mut cat = Catalogue::default();
        let hash = cat.register(&resolved);
        cat.save(dir.path()).unwrap();

        let loaded = Catalogue::load(dir.path());
        assert_eq!(
            loaded.path_for(&hash).unwrap(),
            resolved.root.to_string_lossy()
        );
    }

    #[test]
    fn test_collision_widens_hash() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let resolved = resolve(dir.path(), dir.path()).unwrap();

        let mut cat = Catalogue::default();
        // Forge a collision: same short hash already maps elsewhere.
        cat.entries.insert(
            resolved.hash.as_str().to_string(),
            other.path().to_string_lossy().into_owned(),
        );

        let widened = cat.register(&resolved);
        assert!(widened.is_widened());
        assert_eq!(widened.as_str().len(), 32);
        assert_eq!(
            cat.path_for(&widened).unwrap(),
            resolved.root.to_string_lossy()
        );
    }

    #[test]
    fn test_malformed_catalogue_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CATALOGUE_FILE), "{not json").unwrap();
        assert!(Catalogue::load(dir.path()).is_empty());
    }
}
