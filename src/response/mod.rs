//! Token-budgeted response assembly.
//!
//! Takes raw enriched hits plus confidence analysis and emits the fixed
//! envelope: inline results sized to the budget, distributions, hotspots,
//! insights, follow-up actions, and — in summary mode — a detail token the
//! caller can redeem for the full dataset.

pub mod actions;
pub mod detail_cache;
pub mod envelope;
pub mod tokens;

pub use actions::{Action, ActionContext, ActionPriority, DetailLevel, DetailLevelEstimate};
pub use detail_cache::DetailCache;
pub use envelope::{
    ContextLineOut, Distribution, Hotspot, MetaBlock, QueryEcho, ResponseEnvelope, ResponseMode,
    ResultItem, ResultsSummary, SummaryBlock,
};

use crate::index::service::{Hit, SearchOutcome};
use crate::search::confidence::ConfidenceReport;
use crate::search::line_aware::extract_literal_terms;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Inline results a summary shows when confidence has no opinion.
const DEFAULT_INLINE: usize = 10;
/// Inline results after the safety limit fires.
const SAFETY_INLINE: usize = 3;
/// Hotspots carried per response.
const HOTSPOT_LIMIT: usize = 5;
/// A response may overshoot its budget by this fraction before the safety
/// limit fires (estimation is approximate).
const HARD_CAP_SLACK_DIVISOR: u32 = 5;

/// A search ready for envelope assembly.
pub struct BuildRequest<'a> {
    pub operation: &'a str,
    pub workspace: &'a str,
    pub mode: ResponseMode,
    pub field: Option<String>,
    pub outcome: &'a SearchOutcome,
    pub confidence: &'a ConfidenceReport,
    /// Caller-declared budget; `None` uses the mode's configured default.
    pub token_budget: Option<u32>,
}

/// Assembles budget-bounded envelopes.
pub struct ResponseBuilder {
    summary_budget: u32,
    full_budget: u32,
    details: Arc<DetailCache>,
}

impl ResponseBuilder {
    #[must_use]
    pub fn new(summary_budget: u32, full_budget: u32, details: Arc<DetailCache>) -> Self {
        Self {
            summary_budget,
            full_budget,
            details,
        }
    }

    #[must_use]
    pub fn detail_cache(&self) -> &Arc<DetailCache> {
        &self.details
    }

    /// Budget applicable to a request.
    #[must_use]
    pub fn budget_for(&self, mode: ResponseMode, declared: Option<u32>) -> u32 {
        declared.unwrap_or(match mode {
            ResponseMode::Summary => self.summary_budget,
            ResponseMode::Full => self.full_budget,
        })
    }

    /// Builds the envelope for a search outcome.
    #[must_use]
    pub fn build(&self, request: &BuildRequest<'_>) -> ResponseEnvelope {
        let outcome = request.outcome;
        let confidence = request.confidence;
        let budget = self.budget_for(request.mode, request.token_budget);
        let hard_cap = budget + budget / HARD_CAP_SLACK_DIVISOR;

        let distribution = compute_distribution(&outcome.hits);
        let hotspots = compute_hotspots(&outcome.hits);

        // Step 2: pick the inline count.
        let has_context = outcome.hits.iter().any(|h| h.line.context.is_some());
        let mut inline = match request.mode {
            ResponseMode::Full => outcome.hits.len(),
            ResponseMode::Summary => DEFAULT_INLINE.min(confidence.recommended_count),
        };
        if has_context {
            // Contextful results cost several times a bare one.
            inline = (inline / 2).max(1.min(inline));
        }
        inline = inline.min(outcome.hits.len());

        let mut items: Vec<ResultItem> = outcome.hits[..inline].iter().map(to_item).collect();

        // Step 3: pre-estimate and apply the safety limit if over the cap.
        let mut safety_limit_applied = false;
        let mut insights: Vec<String> = Vec::new();
        if tokens::estimate(&items) > hard_cap {
            safety_limit_applied = true;
            items.truncate(SAFETY_INLINE);
            for item in &mut items {
                item.context.clear();
                item.snippet = None;
            }
            insights.push(format!(
                "Response exceeded the {budget}-token budget; showing {} results without context",
                items.len()
            ));
        }
        let included = items.len();

        // Step 4: insights.
        insights.extend(generate_insights(outcome, &distribution, confidence));

        // Step 6: mint the detail token before actions so the action can
        // carry its estimate.
        let mut detail_request_token = None;
        let mut available_detail_levels = Vec::new();
        let mut detail_estimate = 0u32;
        if request.mode == ResponseMode::Summary && outcome.hits.len() > included {
            let full_items: Vec<ResultItem> = outcome.hits.iter().map(to_item).collect();
            detail_estimate = tokens::estimate(&full_items);
            if let Ok(payload) = serde_json::to_value(&full_items) {
                let token = self.details.insert(payload, detail_estimate);
                detail_request_token = Some(token);
                available_detail_levels = DetailLevel::ALL
                    .iter()
                    .map(|l| l.estimate(detail_estimate))
                    .collect();
            }
        }

        // Step 5: actions.
        let actions = generate_actions(
            outcome,
            &distribution,
            included,
            detail_request_token.as_deref(),
            detail_estimate,
        );

        let mut envelope = ResponseEnvelope {
            success: true,
            operation: request.operation.to_string(),
            query: QueryEcho {
                text: outcome.query_text.clone(),
                workspace: request.workspace.to_string(),
                mode: request.mode,
                field: request.field.clone(),
            },
            summary: SummaryBlock {
                total_hits: outcome.total_hits,
                returned: included,
                elapsed_ms: outcome.elapsed_ms,
                confidence: envelope::ConfidenceBlock {
                    level: confidence.level.as_str().to_string(),
                    recommended_count: confidence.recommended_count,
                    top_score: confidence.top_score,
                    score_gap: confidence.score_gap,
                },
            },
            results: items,
            results_summary: ResultsSummary {
                included,
                total: outcome.total_hits,
                has_more: outcome.total_hits > included,
            },
            distribution,
            hotspots,
            insights,
            actions,
            meta: MetaBlock {
                mode: request.mode,
                estimated_tokens: 0,
                cached: false,
                detail_request_token,
                available_detail_levels,
                safety_limit_applied,
            },
        };

        // Step 7: final estimate over the assembled envelope. The item-level
        // pre-estimate misses framing (distribution, actions, insights), so
        // the safety limit gets a second chance here.
        envelope.meta.estimated_tokens = tokens::estimate(&envelope);
        if envelope.meta.estimated_tokens > hard_cap && !envelope.meta.safety_limit_applied {
            envelope.results.truncate(SAFETY_INLINE);
            for item in &mut envelope.results {
                item.context.clear();
                item.snippet = None;
            }
            let included = envelope.results.len();
            envelope.results_summary.included = included;
            envelope.results_summary.has_more = envelope.results_summary.total > included;
            envelope.summary.returned = included;
            envelope.insights.insert(
                0,
                format!(
                    "Response exceeded the {budget}-token budget; showing {included} results without context"
                ),
            );
            envelope.meta.safety_limit_applied = true;
            envelope.meta.estimated_tokens = tokens::estimate(&envelope);
        }
        envelope
    }

    /// Redeems a detail token: the cached full result set and its estimate.
    #[must_use]
    pub fn redeem(&self, token: &str) -> Option<(serde_json::Value, u32)> {
        self.details.fetch(token)
    }
}

fn to_item(hit: &Hit) -> ResultItem {
    let (containing_type, containing_method) = hit
        .type_context
        .as_ref()
        .map(|t| (t.containing_type.clone(), t.containing_method.clone()))
        .unwrap_or((None, None));

    ResultItem {
        file: hit.doc.filename.clone(),
        path: hit.doc.path.clone(),
        score: round3(hit.score as f64),
        line: hit.line.line_number,
        is_accurate: hit.line.is_accurate,
        from_cache: hit.line.is_from_cache,
        containing_type,
        containing_method,
        language: hit.doc.language.clone(),
        context: hit
            .line
            .context
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|c| ContextLineOut {
                line: c.line,
                content: c.content.clone(),
                is_match: c.is_match,
            })
            .collect(),
        snippet: hit.snippets.first().map(|s| s.text.clone()),
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn compute_distribution(hits: &[Hit]) -> Distribution {
    let mut by_extension: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_directory: BTreeMap<String, usize> = BTreeMap::new();
    for hit in hits {
        let ext = if hit.doc.extension.is_empty() {
            "(none)".to_string()
        } else {
            hit.doc.extension.clone()
        };
        *by_extension.entry(ext).or_default() += 1;
        *by_directory.entry(hit.doc.directory.clone()).or_default() += 1;
    }
    Distribution {
        by_extension,
        by_directory,
    }
}

fn compute_hotspots(hits: &[Hit]) -> Vec<Hotspot> {
    let mut spots: Vec<Hotspot> = hits
        .iter()
        .filter(|h| h.line.match_count > 0)
        .map(|h| Hotspot {
            file: h.doc.path.clone(),
            matches: h.line.match_count,
            lines: h.doc.line_count(),
        })
        .collect();
    spots.sort_by(|a, b| b.matches.cmp(&a.matches).then_with(|| a.file.cmp(&b.file)));
    spots.truncate(HOTSPOT_LIMIT);
    spots
}

fn generate_insights(
    outcome: &SearchOutcome,
    distribution: &Distribution,
    confidence: &ConfidenceReport,
) -> Vec<String> {
    let mut insights = Vec::new();

    if outcome.hits.is_empty() {
        insights.push(
            "No results; try a broader term, a wildcard, or check the workspace is indexed"
                .to_string(),
        );
        return insights;
    }

    if let Some(ref insight) = confidence.insight {
        insights.push(insight.clone());
    }

    let total = outcome.hits.len();
    if let Some((ext, count)) = distribution.by_extension.iter().max_by_key(|(_, c)| **c) {
        if *count * 2 >= total && total > 2 {
            insights.push(format!("{count} of {total} results are .{ext} files"));
        }
    }
    if let Some((dir, count)) = distribution.by_directory.iter().max_by_key(|(_, c)| **c) {
        if *count * 5 >= total * 3 && total > 2 {
            insights.push(format!("Results concentrate in {dir}/ ({count} of {total})"));
        }
    }
    if outcome.elapsed_ms > 1000 {
        insights.push(format!(
            "Query took {}ms; narrower terms or a field restriction would be faster",
            outcome.elapsed_ms
        ));
    }

    insights
}

fn generate_actions(
    outcome: &SearchOutcome,
    distribution: &Distribution,
    included: usize,
    detail_token: Option<&str>,
    detail_estimate: u32,
) -> Vec<Action> {
    let mut actions = Vec::new();

    if let Some(first) = outcome.hits.first() {
        actions.push(Action::ViewFirstResult {
            path: first.doc.path.clone(),
        });
    }

    if outcome.total_hits > included && included > 0 {
        if let Some((ext, _)) = distribution.by_extension.iter().max_by_key(|(_, c)| **c) {
            if ext != "(none)" {
                actions.push(Action::FilterByExtension {
                    extension: ext.clone(),
                });
            }
        }
        if let Some(term) = extract_literal_terms(&outcome.query_text).first() {
            actions.push(Action::NarrowQuery {
                suggestion: format!("{term} AND filename:{term}"),
            });
        }
    }

    if outcome.hits.is_empty() {
        if let Some(term) = extract_literal_terms(&outcome.query_text).first() {
            actions.push(Action::TryFuzzy { term: term.clone() });
            actions.push(Action::TryWildcard { term: term.clone() });
        }
    }

    if let Some(token) = detail_token {
        actions.push(Action::RequestFullDetails {
            token: token.to_string(),
            estimated_tokens: detail_estimate,
        });
    }

    actions
}
