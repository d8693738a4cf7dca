//! Engine configuration.
//!
//! All knobs recognised by the engine, with defaults matching production
//! use. A config file (JSON) can override any subset; unknown keys are
//! rejected so typos fail loudly at startup.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Merge-policy tuning passed through to the index writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MergePolicyConfig {
    /// Maximum number of segments merged in one operation.
    pub max_merge_at_once: usize,
    /// Target segment count per size tier.
    pub segments_per_tier: f64,
    /// Segments larger than this are never merge sources.
    pub max_merged_segment_mb: f64,
}

impl Default for MergePolicyConfig {
    fn default() -> Self {
        Self {
            max_merge_at_once: 10,
            segments_per_tier: 10.0,
            max_merged_segment_mb: 5120.0,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Cap on simultaneously open per-workspace index contexts.
    pub max_concurrent_indexes: usize,
    /// Contexts idle longer than this are evicted by the sweeper.
    pub inactivity_threshold_minutes: u64,
    /// Writer heap, in megabytes.
    pub writer_ram_buffer_mb: f64,
    /// Soft cap on uncommitted documents before an automatic commit.
    pub writer_max_buffered_docs: usize,
    /// Back indexes with RAM instead of disk (tests only; nothing persists).
    pub use_in_memory_directory: bool,
    /// Reload the reader on every commit instead of on the next search.
    pub eager_reader_refresh: bool,
    /// Merge-policy tuning.
    pub merge_policy: MergePolicyConfig,
    /// Lifetime of cached detail-request payloads, in seconds.
    pub detail_cache_ttl_seconds: u64,
    /// Documents larger than this do not get their content stored
    /// (snippets and exact line mapping degrade gracefully).
    pub stored_field_cap_kb: usize,
    /// Token budget for summary-mode responses.
    pub summary_token_budget: u32,
    /// Token budget for full-mode responses.
    pub full_token_budget: u32,
    /// Writer-lock acquisition budget, in seconds.
    pub writer_lock_timeout_secs: u64,
    /// Budget for acquiring the writer during context disposal, in seconds.
    pub dispose_timeout_secs: u64,
    /// Entry cap for the line-lookup result cache.
    pub line_cache_entries: usize,
    /// Default context radius (lines before/after a match).
    pub context_radius: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_indexes: 10,
            inactivity_threshold_minutes: 30,
            writer_ram_buffer_mb: 256.0,
            writer_max_buffered_docs: 1000,
            use_in_memory_directory: false,
            eager_reader_refresh: false,
            merge_policy: MergePolicyConfig::default(),
            detail_cache_ttl_seconds: 300,
            stored_field_cap_kb: 512,
            summary_token_budget: 2000,
            full_token_budget: 10_000,
            writer_lock_timeout_secs: 60,
            dispose_timeout_secs: 5,
            line_cache_entries: 2048,
            context_radius: 3,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file, with defaults for absent keys.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("invalid config '{}': {e}", path.display())))
    }

    /// Writer heap in bytes, clamped to tantivy's minimum arena size.
    #[must_use]
    pub fn writer_heap_bytes(&self) -> usize {
        let bytes = (self.writer_ram_buffer_mb * 1024.0 * 1024.0) as usize;
        bytes.max(15 * 1024 * 1024)
    }

    #[must_use]
    pub fn writer_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.writer_lock_timeout_secs)
    }

    #[must_use]
    pub fn dispose_timeout(&self) -> Duration {
        Duration::from_secs(self.dispose_timeout_secs)
    }

    #[must_use]
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_minutes * 60)
    }

    #[must_use]
    pub fn detail_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_cache_ttl_seconds)
    }

    #[must_use]
    pub fn stored_field_cap_bytes(&self) -> usize {
        self.stored_field_cap_kb * 1024
    }
}
