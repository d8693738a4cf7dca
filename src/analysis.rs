//! Code-aware analysis pipeline.
//!
//! Every indexed text field goes through: simple tokenizer → lowercase →
//! optional stop-word filter → optional synonym expansion → optional Porter
//! stemmer. Exact-match fields (path, filename) bypass the pipeline entirely
//! and use the raw keyword tokenizer, since stemming or expanding them would
//! break term-level deletes and lookups.
//!
//! The same analyzers run at index time, at query-parse time, and when the
//! line-aware service re-derives term offsets, so the three always agree on
//! token text.

use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tantivy::tokenizer::{
    BoxTokenStream, Language, LowerCaser, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer,
    Token, TokenFilter, TokenStream,
};
use tantivy::Index;

/// Tokenizer name for content-like fields (stop + synonym + stem).
pub const CONTENT_TOKENIZER: &str = "code_content";
/// Tokenizer name for category-like fields (synonym only).
pub const CATEGORY_TOKENIZER: &str = "code_category";

/// Domain synonym groups. Within a group every member expands to every other
/// member, so "login" finds documents that only say "auth" and vice versa.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["auth", "authentication", "login", "signin", "credential"],
    &["database", "db", "sql", "storage", "persistence"],
    &["api", "endpoint", "route", "handler", "controller"],
    &["config", "configuration", "settings", "options"],
    &["test", "spec", "assert", "fixture", "mock"],
    &["error", "exception", "failure", "fault", "panic"],
    &["performance", "perf", "latency", "throughput", "benchmark"],
    &["logging", "log", "trace", "audit"],
    &["cache", "caching", "memoize", "lru"],
    &["network", "http", "socket", "request"],
    &["concurrency", "thread", "async", "parallel", "mutex"],
    &["file", "path", "directory", "filesystem"],
    &["search", "query", "find", "lookup"],
    &["security", "crypto", "encryption", "secret"],
];

/// Stop words for content analysis. Kept small and code-aware: English
/// glue words only, no language keywords (those are real search targets).
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "into", "is", "it", "of", "on", "or",
    "such", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was", "will",
    "with",
];

type SynonymMap = Arc<AHashMap<String, Arc<[String]>>>;

/// Builds the bidirectional synonym map from the static groups.
///
/// Malformed members (empty, uppercase, whitespace) are dropped with a
/// warning; a group that loses all but one member expands nothing. The map
/// must never fail to build — a degraded empty map still indexes correctly.
fn build_synonym_map() -> SynonymMap {
    let mut map: AHashMap<String, Arc<[String]>> = AHashMap::new();

    for group in SYNONYM_GROUPS {
        let members: Vec<&str> = group
            .iter()
            .copied()
            .filter(|m| {
                let ok = !m.is_empty() && m.chars().all(|c| c.is_ascii_lowercase() || c == '_');
                if !ok {
                    tracing::warn!(member = %m, "dropping malformed synonym member");
                }
                ok
            })
            .collect();

        for &member in &members {
            let expansions: Arc<[String]> = members
                .iter()
                .filter(|&&other| other != member)
                .map(|&s| s.to_string())
                .collect();
            if !expansions.is_empty() {
                map.insert(member.to_string(), expansions);
            }
        }
    }

    Arc::new(map)
}

/// Token filter that injects group synonyms behind each matching token.
///
/// Expansions reuse the source token's byte span and position, so offsets
/// derived from any expansion still point at the original term in the text.
#[derive(Clone)]
pub struct SynonymFilter {
    map: SynonymMap,
}

impl SynonymFilter {
    #[must_use]
    pub fn from_groups() -> Self {
        Self {
            map: build_synonym_map(),
        }
    }

    /// Number of terms with at least one expansion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl TokenFilter for SynonymFilter {
    fn transform<'a>(&self, token_stream: BoxTokenStream<'a>) -> BoxTokenStream<'a> {
        BoxTokenStream::from(SynonymTokenStream {
            tail: token_stream,
            map: Arc::clone(&self.map),
            pending: VecDeque::new(),
            current: Token::default(),
        })
    }
}

struct SynonymTokenStream<'a> {
    tail: BoxTokenStream<'a>,
    map: SynonymMap,
    pending: VecDeque<Token>,
    current: Token,
}

impl TokenStream for SynonymTokenStream<'_> {
    fn advance(&mut self) -> bool {
        if let Some(tok) = self.pending.pop_front() {
            self.current = tok;
            return true;
        }
        if !self.tail.advance() {
            return false;
        }
        let tok = self.tail.token().clone();
        if let Some(expansions) = self.map.get(&tok.text) {
            for synonym in expansions.iter() {
                let mut expanded = tok.clone();
                expanded.text = synonym.clone();
                self.pending.push_back(expanded);
            }
        }
        self.current = tok;
        true
    }

    fn token(&self) -> &Token {
        &self.current
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.current
    }
}

/// The immutable per-workspace analyzer set.
///
/// Built once, registered on every index the service opens, and shared
/// freely; adding a field policy therefore requires a rebuild.
#[derive(Clone)]
pub struct AnalyzerSet {
    content: TextAnalyzer,
    category: TextAnalyzer,
}

impl AnalyzerSet {
    #[must_use]
    pub fn new() -> Self {
        let synonyms = SynonymFilter::from_groups();
        if synonyms.is_empty() {
            tracing::warn!("synonym map is empty; continuing without expansion");
        }

        let stop_words: Vec<String> = STOP_WORDS.iter().map(|s| (*s).to_string()).collect();

        let content = TextAnalyzer::from(SimpleTokenizer)
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(stop_words))
            .filter(synonyms.clone())
            .filter(Stemmer::new(Language::English));

        let category = TextAnalyzer::from(SimpleTokenizer)
            .filter(LowerCaser)
            .filter(synonyms);

        Self { content, category }
    }

    /// Registers both analyzers on an index under their schema names.
    pub fn register(&self, index: &Index) {
        index
            .tokenizers()
            .register(CONTENT_TOKENIZER, self.content.clone());
        index
            .tokenizers()
            .register(CATEGORY_TOKENIZER, self.category.clone());
    }

    /// The analyzer applied to content-like fields.
    #[must_use]
    pub fn content(&self) -> &TextAnalyzer {
        &self.content
    }
}

impl Default for AnalyzerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// One analysed token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub text: String,
    /// Byte offset of the first byte of the source term.
    pub start: u32,
    /// Byte offset one past the last byte of the source term.
    pub end: u32,
}

/// Runs `text` through an analyzer, collecting tokens with byte spans.
///
/// Synonym expansions appear as extra tokens sharing the source span.
#[must_use]
pub fn token_spans(analyzer: &TextAnalyzer, text: &str) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        let tok = stream.token();
        spans.push(TokenSpan {
            text: tok.text.clone(),
            start: tok.offset_from as u32,
            end: tok.offset_to as u32,
        });
    }
    spans
}

/// Analyses a short query fragment into bare term texts.
#[must_use]
pub fn analyze_terms(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    token_spans(analyzer, text).into_iter().map(|s| s.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_analyzer() -> TextAnalyzer {
        AnalyzerSet::new().content().clone()
    }

    #[test]
    fn test_lowercase_and_stem() {
        let terms = analyze_terms(&content_analyzer(), "Connecting CONNECTED");
        // Porter reduces both to the same stem
        assert_eq!(terms[0], terms[1]);
    }

    #[test]
    fn test_stop_words_removed_from_content() {
        let terms = analyze_terms(&content_analyzer(), "the quick function");
        assert!(!terms.iter().any(|t| t == "the"));
        assert!(terms.iter().any(|t| t.starts_with("quick")));
    }

    #[test]
    fn test_synonyms_expand_bidirectionally() {
        let a = AnalyzerSet::new();
        let login = analyze_terms(a.content(), "login");
        let auth = analyze_terms(a.content(), "auth");
        // "login" must expand to include "auth" and vice versa
        assert!(login.iter().any(|t| t == "auth"), "{login:?}");
        assert!(auth.iter().any(|t| t == "login"), "{auth:?}");
    }

    #[test]
    fn test_expansion_keeps_source_span() {
        let a = AnalyzerSet::new();
        let spans = token_spans(a.content(), "db pool");
        let db_span = spans.iter().find(|s| s.text == "db").unwrap();
        for s in spans.iter().filter(|s| s.start == db_span.start) {
            assert_eq!(s.end, db_span.end);
        }
        // At least one expansion shares db's span
        assert!(spans.iter().filter(|s| s.start == db_span.start).count() > 1);
    }

    #[test]
    fn test_category_analyzer_does_not_stem() {
        let a = AnalyzerSet::new();
        let terms = analyze_terms(&a.category, "connections");
        assert!(terms.iter().any(|t| t == "connections"));
    }

    #[test]
    fn test_token_spans_are_byte_offsets() {
        let spans = token_spans(&content_analyzer(), "héllo world");
        let world = spans.iter().find(|s| s.text == "world").unwrap();
        // 'é' is two bytes, so "world" starts at byte 7
        assert_eq!(world.start, 7);
        assert_eq!(world.end, 12);
    }

    #[test]
    fn test_synonym_map_nonempty() {
        assert!(!SynonymFilter::from_groups().is_empty());
    }
}
