//! Follow-up actions and detail levels as tagged sums.
//!
//! Every action variant carries exactly its own parameters; the open
//! "bag of properties" shape exists only at the serialisation boundary,
//! where each variant renders to the stable `{id, parameters, tokens,
//! priority}` wire form.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Priority shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPriority {
    High,
    Medium,
    Low,
}

impl ActionPriority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// When an action is worth offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionContext {
    Always,
    ManyResults,
    EmptyResults,
    Exploration,
}

/// The canonical follow-up actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ViewFirstResult { path: String },
    FilterByExtension { extension: String },
    NarrowQuery { suggestion: String },
    TryFuzzy { term: String },
    TryWildcard { term: String },
    RequestFullDetails { token: String, estimated_tokens: u32 },
}

impl Action {
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::ViewFirstResult { .. } => "view-first-result",
            Self::FilterByExtension { .. } => "filter-by-top-extension",
            Self::NarrowQuery { .. } => "narrow-query",
            Self::TryFuzzy { .. } => "try-fuzzy",
            Self::TryWildcard { .. } => "try-wildcard",
            Self::RequestFullDetails { .. } => "request-full-details",
        }
    }

    #[must_use]
    pub fn priority(&self) -> ActionPriority {
        match self {
            Self::ViewFirstResult { .. } | Self::RequestFullDetails { .. } => ActionPriority::High,
            Self::FilterByExtension { .. } | Self::NarrowQuery { .. } => ActionPriority::Medium,
            Self::TryFuzzy { .. } | Self::TryWildcard { .. } => ActionPriority::Low,
        }
    }

    #[must_use]
    pub fn context(&self) -> ActionContext {
        match self {
            Self::ViewFirstResult { .. } => ActionContext::Always,
            Self::FilterByExtension { .. } | Self::NarrowQuery { .. } => ActionContext::ManyResults,
            Self::TryFuzzy { .. } | Self::TryWildcard { .. } => ActionContext::EmptyResults,
            Self::RequestFullDetails { .. } => ActionContext::Exploration,
        }
    }

    /// Cost of taking the action, pre-estimated for the caller's planning.
    #[must_use]
    pub fn estimated_tokens(&self) -> u32 {
        match self {
            Self::ViewFirstResult { .. } => 500,
            Self::FilterByExtension { .. } | Self::NarrowQuery { .. } => 300,
            Self::TryFuzzy { .. } | Self::TryWildcard { .. } => 400,
            Self::RequestFullDetails {
                estimated_tokens, ..
            } => *estimated_tokens,
        }
    }

    fn parameters(&self) -> serde_json::Value {
        match self {
            Self::ViewFirstResult { path } => serde_json::json!({ "path": path }),
            Self::FilterByExtension { extension } => serde_json::json!({ "extension": extension }),
            Self::NarrowQuery { suggestion } => serde_json::json!({ "suggestion": suggestion }),
            Self::TryFuzzy { term } => serde_json::json!({ "query": format!("{term}~") }),
            Self::TryWildcard { term } => serde_json::json!({ "query": format!("{term}*") }),
            Self::RequestFullDetails { token, .. } => serde_json::json!({ "token": token }),
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Action", 4)?;
        s.serialize_field("id", self.id())?;
        s.serialize_field("parameters", &self.parameters())?;
        s.serialize_field("tokens", &self.estimated_tokens())?;
        s.serialize_field("priority", self.priority().as_str())?;
        s.end()
    }
}

/// Detail levels a summary response can advertise next to its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    FullContent,
    WithRelationships,
    WithFileAnalysis,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 3] = [
        Self::FullContent,
        Self::WithRelationships,
        Self::WithFileAnalysis,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullContent => "full-content",
            Self::WithRelationships => "with-relationships",
            Self::WithFileAnalysis => "with-file-analysis",
        }
    }

    /// Multiplier applied to the base payload estimate for this level.
    #[must_use]
    fn cost_factor(self) -> u32 {
        match self {
            Self::FullContent => 1,
            Self::WithRelationships => 2,
            Self::WithFileAnalysis => 3,
        }
    }

    #[must_use]
    pub fn estimate(self, base_tokens: u32) -> DetailLevelEstimate {
        DetailLevelEstimate {
            level: self,
            estimated_tokens: base_tokens.saturating_mul(self.cost_factor()),
        }
    }
}

/// One advertised detail level with its pre-estimated cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailLevelEstimate {
    pub level: DetailLevel,
    pub estimated_tokens: u32,
}

impl Serialize for DetailLevelEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DetailLevelEstimate", 2)?;
        s.serialize_field("level", self.level.as_str())?;
        s.serialize_field("estimatedTokens", &self.estimated_tokens)?;
        s.end()
    }
}
