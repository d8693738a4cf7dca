//! MCP tool implementations.

mod index;
mod search;
mod workspace;

// index
pub use index::{execute_index, IndexInput, IndexOutput, IndexProgress, ProgressCallback};

// search
pub use search::{execute_details, execute_search, DetailsInput, DetailsOutput, SearchToolInput};

// workspace
pub use workspace::{
    execute_clear, execute_health, execute_optimise, execute_rebuild, execute_repair,
    execute_stats, execute_workspaces, HealthOutput, OptimiseInput, OptimiseOutput, RebuildOutput,
    RepairInput, RepairToolOutput, StatsOutput, WorkspaceEntry, WorkspacesOutput,
};
