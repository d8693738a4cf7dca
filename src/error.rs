//! Error types for codequarry.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation. Every externally visible failure maps to
//! exactly one categorical kind; callers can branch on [`EngineError::code`]
//! without parsing messages.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No index exists for workspace '{}'; initialise it first", workspace.display())]
    IndexMissing { workspace: PathBuf },

    #[error("Index at '{}' is unavailable: {reason}", index_path.display())]
    IndexUnavailable { index_path: PathBuf, reason: String },

    #[error("Index corruption detected: {detail}; run 'repair'")]
    IndexCorrupt { detail: String },

    #[error("Stored schema differs from the current schema; run 'rebuild'")]
    SchemaMismatch,

    #[error("Query parse error: {0}")]
    QueryParse(String),

    #[error("{operation} exceeded its {}ms budget", budget_ms)]
    Timeout { operation: &'static str, budget_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Concurrent-index cap reached and eviction failed; retry later")]
    ResourceExhausted,

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Internal error [{id}]: {detail}")]
    Internal { id: String, detail: String },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::IndexMissing { .. } => "INDEX_MISSING",
            Self::IndexUnavailable { .. } => "INDEX_UNAVAILABLE",
            Self::IndexCorrupt { .. } => "INDEX_CORRUPT",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::QueryParse(_) => "QUERY_PARSE_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Workspace(_) => "WORKSPACE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Tool(_) => "TOOL_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix this error by changing its input or
    /// retrying with a different request (as opposed to a server fault).
    ///
    /// Client-fixable errors go on the tool result channel so an LLM can
    /// see them and adapt; server faults go on the protocol error channel.
    #[must_use]
    pub fn is_client_fixable(&self) -> bool {
        matches!(
            self,
            Self::IndexMissing { .. }
                | Self::QueryParse(_)
                | Self::SchemaMismatch
                | Self::IndexCorrupt { .. }
                | Self::ResourceExhausted
                | Self::Workspace(_)
                | Self::Tool(_)
        )
    }

    /// Wraps an unexpected failure with an opaque correlation id.
    ///
    /// The id is logged alongside the full context so operators can match a
    /// surfaced error back to the log stream.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let id = format!("{:08x}", xxhash_rust::xxh3::xxh3_64(detail.as_bytes()) as u32);
        tracing::error!(id = %id, detail = %detail, "internal error");
        Self::Internal { id, detail }
    }
}

impl From<tantivy::TantivyError> for EngineError {
    fn from(err: tantivy::TantivyError) -> Self {
        use tantivy::TantivyError;
        match err {
            TantivyError::LockFailure(e, msg) => Self::IndexUnavailable {
                index_path: PathBuf::new(),
                reason: match msg {
                    Some(m) => format!("{e}: {m}"),
                    None => e.to_string(),
                },
            },
            TantivyError::IncompatibleIndex(e) => Self::IndexCorrupt {
                detail: format!("{e:?}"),
            },
            TantivyError::DataCorruption(e) => Self::IndexCorrupt {
                detail: format!("{e:?}"),
            },
            TantivyError::IoError(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<tantivy::query::QueryParserError> for EngineError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        Self::QueryParse(err.to_string())
    }
}

// Conversion to rmcp tool errors
impl From<EngineError> for rmcp::ErrorData {
    fn from(err: EngineError) -> Self {
        rmcp::ErrorData::internal_error(err.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            EngineError::IndexMissing {
                workspace: PathBuf::from("/w")
            }
            .code(),
            "INDEX_MISSING"
        );
        assert_eq!(EngineError::SchemaMismatch.code(), "SCHEMA_MISMATCH");
        assert_eq!(
            EngineError::Timeout {
                operation: "commit",
                budget_ms: 60_000
            }
            .code(),
            "TIMEOUT"
        );
    }

    #[test]
    fn test_client_fixable_classification() {
        assert!(EngineError::QueryParse("bad".into()).is_client_fixable());
        assert!(EngineError::IndexMissing {
            workspace: PathBuf::from("/w")
        }
        .is_client_fixable());
        assert!(!EngineError::Cancelled.is_client_fixable());
        assert!(!EngineError::internal("boom").is_client_fixable());
    }

    #[test]
    fn test_internal_id_is_deterministic() {
        let a = EngineError::internal("same detail");
        let b = EngineError::internal("same detail");
        match (a, b) {
            (EngineError::Internal { id: ia, .. }, EngineError::Internal { id: ib, .. }) => {
                assert_eq!(ia, ib);
            }
            _ => unreachable!(),
        }
    }
}
