//! The response envelope: the stable wire shape every search answer uses.
//!
//! Field names are part of the external contract and serialise in
//! camelCase regardless of internal naming.

use crate::response::actions::{Action, DetailLevelEstimate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response mode requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Few inline results, detail token for the rest.
    #[default]
    Summary,
    /// Everything inline, within the full budget.
    Full,
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => f.write_str("summary"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// Echo of the request that produced this response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEcho {
    pub text: String,
    pub workspace: String,
    pub mode: ResponseMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Headline numbers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBlock {
    pub total_hits: usize,
    pub returned: usize,
    pub elapsed_ms: u64,
    pub confidence: ConfidenceBlock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBlock {
    pub level: String,
    pub recommended_count: usize,
    pub top_score: f32,
    pub score_gap: f32,
}

/// One inline result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub file: String,
    pub path: String,
    pub score: f64,
    /// 1-based; 0 when the match could not be located.
    pub line: u32,
    pub is_accurate: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containing_method: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextLineOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// One context line around a match.
#[derive(Debug, Clone, Serialize)]
pub struct ContextLineOut {
    pub line: u32,
    pub content: String,
    #[serde(rename = "match")]
    pub is_match: bool,
}

/// Inline-vs-total bookkeeping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub included: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Result-set distributions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub by_extension: BTreeMap<String, usize>,
    pub by_directory: BTreeMap<String, usize>,
}

/// A file with disproportionately many matches.
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub file: String,
    pub matches: u32,
    pub lines: u32,
}

/// Budget and caching metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaBlock {
    pub mode: ResponseMode,
    pub estimated_tokens: u32,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_request_token: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_detail_levels: Vec<DetailLevelEstimate>,
    pub safety_limit_applied: bool,
}

/// The full response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,
    pub operation: String,
    pub query: QueryEcho,
    pub summary: SummaryBlock,
    pub results: Vec<ResultItem>,
    pub results_summary: ResultsSummary,
    pub distribution: Distribution,
    pub hotspots: Vec<Hotspot>,
    pub insights: Vec<String>,
    pub actions: Vec<Action>,
    pub meta: MetaBlock,
}
