//! Indexing MCP tool.

use crate::error::Result;
use crate::index::IndexService;
use crate::supplier::FileSupplier;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(IndexProgress) + Send + Sync>;

/// Indexing progress information.
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub files_processed: usize,
    pub files_total: usize,
}

/// Documents handed to the writer per batch. Small enough that progress
/// updates stay lively, large enough to amortise the writer lock.
const BATCH_SIZE: usize = 100;

/// Input for the index tool.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct IndexInput {
    /// Clear the index and rebuild from scratch
    #[serde(default)]
    pub force: bool,
}

/// Output for the index tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexOutput {
    pub files_indexed: usize,
    pub auto_commits: usize,
    pub doc_count: u64,
    pub message: String,
}

/// Executes the index tool: walk the workspace, upsert every file, commit.
///
/// # Errors
///
/// Propagates supplier and writer failures.
pub fn execute_index(
    service: &IndexService,
    root: &Path,
    input: IndexInput,
    progress: Option<ProgressCallback>,
) -> Result<IndexOutput> {
    service.initialise(root)?;
    if input.force {
        service.clear(root)?;
    }

    let events = FileSupplier::new(root.to_path_buf()).collect()?;
    let total = events.len();

    let mut files_indexed = 0usize;
    let mut auto_commits = 0usize;
    for batch in events.chunks(BATCH_SIZE) {
        let outcome = service.index_documents(root, batch)?;
        files_indexed += outcome.indexed;
        auto_commits += outcome.auto_commits;
        if let Some(ref cb) = progress {
            cb(IndexProgress {
                files_processed: files_indexed,
                files_total: total,
            });
        }
    }
    service.commit(root)?;

    let doc_count = service.statistics(root)?.doc_count;
    Ok(IndexOutput {
        files_indexed,
        auto_commits,
        doc_count,
        message: format!("Indexed {files_indexed} files ({doc_count} documents searchable)"),
    })
}
