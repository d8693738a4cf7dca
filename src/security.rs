//! Security checks for the MCP surface.
//!
//! Two concerns survive into the engine: validating a caller-supplied
//! workspace root before it becomes an index, and keeping credential-shaped
//! files out of search responses. Performance exclusions stay under
//! `.gitignore` control; only security-sensitive files are hardcoded.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Security-related errors.
#[derive(Error, Debug, Clone)]
pub enum SecurityError {
    #[error("Workspace root must be an absolute path, got '{path}'")]
    RelativeRoot { path: String },

    #[error("Workspace root '{path}' does not exist or is not a directory")]
    MissingRoot { path: String },

    #[error("Refusing to index system directory '{path}'")]
    SystemRoot { path: String },
}

impl SecurityError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RelativeRoot { .. } => "RELATIVE_ROOT",
            Self::MissingRoot { .. } => "MISSING_ROOT",
            Self::SystemRoot { .. } => "SYSTEM_ROOT",
        }
    }
}

/// Directories that must never become a workspace root.
const FORBIDDEN_ROOTS: &[&str] = &["/", "/bin", "/boot", "/dev", "/etc", "/proc", "/sys", "/usr"];

/// Validates and canonicalises a caller-supplied workspace root.
///
/// # Errors
///
/// Rejects relative paths, missing directories, and system roots.
pub fn validate_workspace_root(path: &Path) -> Result<PathBuf, SecurityError> {
    if !path.is_absolute() {
        return Err(SecurityError::RelativeRoot {
            path: path.display().to_string(),
        });
    }

    let canonical = dunce::canonicalize(path).map_err(|_| SecurityError::MissingRoot {
        path: path.display().to_string(),
    })?;
    if !canonical.is_dir() {
        return Err(SecurityError::MissingRoot {
            path: canonical.display().to_string(),
        });
    }

    let canonical_str = canonical.to_string_lossy();
    if FORBIDDEN_ROOTS
        .iter()
        .any(|f| canonical_str.as_ref() == *f)
    {
        return Err(SecurityError::SystemRoot {
            path: canonical_str.into_owned(),
        });
    }

    Ok(canonical)
}

/// Filename patterns that identify credential-shaped files.
///
/// Matched against the file name (and for the `path:` entries, the whole
/// relative path). Hits on these files are dropped from responses.
const SENSITIVE_NAMES: &[&str] = &[
    ".env",
    ".envrc",
    ".netrc",
    ".npmrc",
    ".pypirc",
    ".git-credentials",
    "credentials.json",
    "secrets.json",
    "secrets.yaml",
    "secrets.yml",
    "id_rsa",
    "id_ed25519",
    "id_ecdsa",
    "master.key",
    "terraform.tfstate",
];

const SENSITIVE_SUFFIXES: &[&str] = &[".pem", ".key", ".p12", ".pfx", ".jks", ".tfstate", ".kdbx"];

const SENSITIVE_PATH_PARTS: &[&str] = &[".aws/credentials", ".ssh/", ".kube/config", ".docker/config.json"];

/// Returns the reason a path is sensitive, or `None` when it is safe.
#[must_use]
pub fn is_sensitive_file(relative_path: &str) -> Option<&'static str> {
    let normalised = relative_path.replace('\\', "/");
    let filename = normalised.rsplit('/').next().unwrap_or(&normalised);

    if SENSITIVE_NAMES.contains(&filename) || filename.starts_with(".env.") {
        return Some("credential file");
    }
    if SENSITIVE_SUFFIXES.iter().any(|s| filename.ends_with(s)) {
        return Some("key or certificate material");
    }
    if SENSITIVE_PATH_PARTS.iter().any(|p| normalised.contains(p)) {
        return Some("credential directory");
    }
    None
}
