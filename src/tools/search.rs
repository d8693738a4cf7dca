//! Search-related MCP tools.

use crate::error::{EngineError, Result};
use crate::index::{IndexService, SearchRequest};
use crate::response::{tokens, BuildRequest, ResponseBuilder, ResponseEnvelope, ResponseMode};
use crate::search::confidence;
use crate::security;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inline results a summary defaults to before confidence weighs in.
const DEFAULT_INLINE: usize = 10;

/// Input for the search tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchToolInput {
    /// Search query (tantivy syntax: terms, AND/OR, field:term, quotes)
    pub query: String,
    /// Maximum results to consider (default: 50)
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Response mode: "summary" or "full" (default: summary)
    #[serde(default)]
    pub mode: ResponseMode,
    /// Restrict matching to one field (content, filename, path, ...)
    #[serde(default)]
    pub field: Option<String>,
    /// Context lines around each match; 0 uses the configured default
    /// radius (omit to disable context entirely)
    #[serde(default)]
    pub context_lines: Option<usize>,
    /// Include highlighted snippets
    #[serde(default)]
    pub include_snippets: bool,
    /// Token budget override for this response
    #[serde(default)]
    pub token_budget: Option<u32>,
}

const fn default_max_results() -> usize {
    50
}

/// Executes the search tool: query, enrich, analyse, assemble.
///
/// # Errors
///
/// Propagates typed engine errors (parse failures, missing index, ...).
pub fn execute_search(
    service: &IndexService,
    builder: &ResponseBuilder,
    root: &Path,
    input: SearchToolInput,
) -> Result<ResponseEnvelope> {
    let request = SearchRequest {
        query: input.query,
        max_results: input.max_results.clamp(1, 500),
        field: input.field.clone(),
        context_lines: input.context_lines.map(|n| {
            if n == 0 {
                service.config().context_radius
            } else {
                n.min(50)
            }
        }),
        include_snippets: input.include_snippets,
    };

    let mut outcome = service.search(root, &request)?;

    // Credential-shaped files never reach a response.
    outcome
        .hits
        .retain(|h| security::is_sensitive_file(&h.doc.path).is_none());

    let scores: Vec<f32> = outcome.hits.iter().map(|h| h.score).collect();
    let report = confidence::analyze(&scores, DEFAULT_INLINE);

    let workspace = service
        .statistics(root)
        .map(|s| s.workspace_hash.to_string())
        .unwrap_or_default();

    Ok(builder.build(&BuildRequest {
        operation: "search",
        workspace: &workspace,
        mode: input.mode,
        field: input.field,
        outcome: &outcome,
        confidence: &report,
        token_budget: input.token_budget,
    }))
}

/// Input for the details tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetailsInput {
    /// Detail-request token from a previous summary response
    pub token: String,
}

/// Output for the details tool.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetailsOutput {
    pub success: bool,
    /// The full result set referenced by the token.
    pub results: serde_json::Value,
    pub estimated_tokens: u32,
    pub cached: bool,
    pub safety_limit_applied: bool,
}

/// Redeems a detail token minted by a summary response.
///
/// An oversized payload is truncated to the full budget rather than
/// rejected, with the safety flag set.
///
/// # Errors
///
/// Returns a tool error for an expired or unknown token.
pub fn execute_details(builder: &ResponseBuilder, input: DetailsInput) -> Result<DetailsOutput> {
    let (mut results, estimated_tokens) = builder.redeem(&input.token).ok_or_else(|| {
        EngineError::Tool(
            "Detail token is unknown or has expired; re-run the search to mint a new one".into(),
        )
    })?;

    let full_budget = builder.budget_for(ResponseMode::Full, None);
    let hard_cap = full_budget + full_budget / 5;
    let mut safety_limit_applied = false;

    if estimated_tokens > hard_cap {
        if let Some(items) = results.as_array_mut() {
            // Keep whole items up to the budget; partial items are useless.
            let mut kept = 0usize;
            let mut spent = 0u32;
            for item in items.iter() {
                let cost = tokens::estimate_str(&item.to_string());
                if spent + cost > full_budget {
                    break;
                }
                spent += cost;
                kept += 1;
            }
            items.truncate(kept.max(1));
            safety_limit_applied = true;
        }
    }

    let estimated_tokens = tokens::estimate(&results);
    Ok(DetailsOutput {
        success: true,
        results,
        estimated_tokens,
        cached: true,
        safety_limit_applied,
    })
}
