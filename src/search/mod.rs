//! Hit enrichment: line mapping, type context, confidence, snippets.

pub mod confidence;
pub mod line_aware;
pub mod snippets;
pub mod type_context;

pub use confidence::{ConfidenceLevel, ConfidenceReport};
pub use line_aware::{extract_literal_terms, ContextLine, LineAwareService, LineResult};
pub use snippets::Snippet;
pub use type_context::{
    ExtractionRequest, PatternTypeExtractor, TypeContext, TypeExtractor, TypeInfo,
};
