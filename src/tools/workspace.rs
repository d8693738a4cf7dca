//! Workspace lifecycle and diagnostics MCP tools.

use crate::error::Result;
use crate::index::{IndexService, RepairOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output for the rebuild tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebuildOutput {
    pub workspace_hash: String,
    pub index_path: String,
    pub doc_count: u64,
    pub message: String,
}

/// Disposes and re-creates a workspace's index with the current schema.
///
/// # Errors
///
/// Propagates resolution and filesystem failures.
pub fn execute_rebuild(service: &IndexService, root: &Path) -> Result<RebuildOutput> {
    let outcome = service.force_rebuild(root)?;
    Ok(RebuildOutput {
        workspace_hash: outcome.workspace_hash.to_string(),
        index_path: outcome.index_path.display().to_string(),
        doc_count: outcome.doc_count,
        message: "Index rebuilt with the current schema; run 'index' to repopulate".to_string(),
    })
}

/// Input for the repair tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RepairInput {
    /// Copy the index directory aside before repairing (default: true)
    #[serde(default = "default_true")]
    pub create_backup: bool,
    /// Reopen the index afterwards to confirm the fix (default: true)
    #[serde(default = "default_true")]
    pub validate_after: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for RepairInput {
    fn default() -> Self {
        Self {
            create_backup: true,
            validate_after: true,
        }
    }
}

/// Output for the repair tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepairToolOutput {
    pub success: bool,
    pub removed_segments: usize,
    pub lost_documents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// Runs check-and-fix on a workspace's index.
///
/// # Errors
///
/// Propagates repair failures (unreadable meta, failed backup).
pub fn execute_repair(
    service: &IndexService,
    root: &Path,
    input: RepairInput,
) -> Result<RepairToolOutput> {
    let outcome = service.repair(
        root,
        RepairOptions {
            create_backup: input.create_backup,
            validate_after: input.validate_after,
        },
    )?;
    Ok(RepairToolOutput {
        success: outcome.success,
        removed_segments: outcome.removed_segments,
        lost_documents: outcome.lost_documents,
        backup_path: outcome.backup_path.map(|p| p.display().to_string()),
    })
}

/// Deletes every document in a workspace's index.
///
/// # Errors
///
/// Propagates writer failures.
pub fn execute_clear(service: &IndexService, root: &Path) -> Result<String> {
    service.clear(root)?;
    Ok("Index cleared".to_string())
}

/// Input for the optimise tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct OptimiseInput {
    /// Target maximum segment count (default: 1)
    #[serde(default = "default_segments")]
    pub max_segments: usize,
}

const fn default_segments() -> usize {
    1
}

/// Output for the optimise tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimiseOutput {
    pub segment_count: usize,
}

/// Force-merges a workspace's index.
///
/// # Errors
///
/// Propagates merge failures.
pub fn execute_optimise(
    service: &IndexService,
    root: &Path,
    input: OptimiseInput,
) -> Result<OptimiseOutput> {
    let segment_count = service.optimise(root, input.max_segments)?;
    Ok(OptimiseOutput { segment_count })
}

/// Output for the stats tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsOutput {
    pub workspace_hash: String,
    pub doc_count: u64,
    pub segment_count: usize,
    pub index_size_bytes: u64,
    pub index_size_human: String,
    pub live_contexts: usize,
    pub stale_locks_removed: u64,
}

/// Executes the stats tool.
///
/// # Errors
///
/// Propagates resolution failures.
pub fn execute_stats(service: &IndexService, root: &Path) -> Result<StatsOutput> {
    let stats = service.statistics(root)?;
    Ok(StatsOutput {
        workspace_hash: stats.workspace_hash.to_string(),
        doc_count: stats.doc_count,
        segment_count: stats.segment_count,
        index_size_bytes: stats.index_size_bytes,
        index_size_human: human_bytes(stats.index_size_bytes),
        live_contexts: service.live_contexts(),
        stale_locks_removed: service.stale_locks_removed(),
    })
}

/// Output for the health tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthOutput {
    pub workspace_hash: String,
    pub state: String,
    pub doc_count: u64,
    pub segment_count: usize,
    pub pending_docs: u64,
    pub committed_opstamp: u64,
    pub reader_opstamp: u64,
    /// Opstamps the cached reader trails the writer by (NRT staleness).
    pub reader_lag: u64,
}

/// Executes the health tool.
///
/// # Errors
///
/// Propagates resolution failures.
pub fn execute_health(service: &IndexService, root: &Path) -> Result<HealthOutput> {
    let report = service.health(root)?;
    Ok(HealthOutput {
        workspace_hash: report.workspace_hash.to_string(),
        state: match report.state {
            crate::index::ContextState::Open => "open".to_string(),
            crate::index::ContextState::NeedsRepair => "needs_repair".to_string(),
        },
        doc_count: report.doc_count,
        segment_count: report.segment_count,
        pending_docs: report.pending_docs,
        committed_opstamp: report.committed_opstamp,
        reader_opstamp: report.reader_opstamp,
        reader_lag: report.reader_lag(),
    })
}

/// One known workspace.
#[derive(Debug, Serialize, JsonSchema)]
pub struct WorkspaceEntry {
    pub hash: String,
    pub path: String,
}

/// Output for the workspaces tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacesOutput {
    pub workspaces: Vec<WorkspaceEntry>,
    pub live_contexts: usize,
}

/// Lists catalogue-known workspaces.
pub fn execute_workspaces(service: &IndexService) -> WorkspacesOutput {
    WorkspacesOutput {
        workspaces: service
            .known_workspaces()
            .into_iter()
            .map(|(hash, path)| WorkspaceEntry { hash, path })
            .collect(),
        live_contexts: service.live_contexts(),
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
