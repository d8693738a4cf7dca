//! Line-aware retrieval: map a hit back to an accurate 1-based line number
//! and optional surrounding context lines.
//!
//! The fast path looks the query's analysed literal terms up in the
//! document's stored term vectors, translating the earliest byte offset to
//! a line via binary search over the stored line starts. When the blob is
//! absent (large file over the stored cap) the stored content is
//! re-tokenised instead, and the result is flagged inaccurate. Results are
//! memoised in a bounded cache keyed by (path, query fingerprint).

use crate::analysis::{self, AnalyzerSet};
use crate::schema::{line_for_offset, StoredDoc};
use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use xxhash_rust::xxh3::xxh3_64;

/// Line information for one hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResult {
    /// 1-based line of the earliest match; 0 when nothing matched.
    pub line_number: u32,
    /// True when derived from term vectors, false on any fallback.
    pub is_accurate: bool,
    pub is_from_cache: bool,
    /// Byte offset of the earliest match, when one exists.
    pub match_offset: Option<u32>,
    /// Number of term occurrences found in this document.
    pub match_count: u32,
    pub context: Option<Vec<ContextLine>>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

/// One line of surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine {
    pub line: u32,
    pub content: String,
    pub is_match: bool,
}

/// Strips query syntax down to bare literal terms.
///
/// Field prefixes (`filename:foo`), quotes, boolean operators, grouping,
/// boosts and wildcards are all removed; what remains is whitespace-split.
#[must_use]
pub fn extract_literal_terms(raw_query: &str) -> Vec<String> {
    raw_query
        .split_whitespace()
        .filter(|w| !matches!(*w, "AND" | "OR" | "NOT" | "TO"))
        .filter_map(|word| {
            // Drop a field prefix if present
            let word = match word.split_once(':') {
                Some((_, rest)) => rest,
                None => word,
            };
            let cleaned: String = word
                .chars()
                .filter(|c| !matches!(c, '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}'))
                .filter(|c| !matches!(c, '+' | '-' | '^' | '*' | '?' | '~'))
                .collect();
            let cleaned = cleaned.trim().to_lowercase();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}

/// Bounded insertion-order cache. Eviction is FIFO — at this size the
/// difference from true LRU is noise, and it avoids per-hit reordering.
struct BoundedCache {
    map: AHashMap<u64, LineResult>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl BoundedCache {
    fn new(capacity: usize) -> Self {
        Self {
            map: AHashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn get(&self, key: u64) -> Option<LineResult> {
        self.map.get(&key).cloned()
    }

    fn insert(&mut self, key: u64, value: LineResult) {
        if self.capacity == 0 {
            return;
        }
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        if self.map.insert(key, value).is_none() {
            self.order.push_back(key);
        }
    }
}

/// The line-aware service. One per index service; shared across workspaces
/// (the cache key includes the document path, which embeds the workspace).
pub struct LineAwareService {
    analyzers: AnalyzerSet,
    cache: Mutex<BoundedCache>,
}

impl LineAwareService {
    #[must_use]
    pub fn new(analyzers: AnalyzerSet, cache_entries: usize) -> Self {
        Self {
            analyzers,
            cache: Mutex::new(BoundedCache::new(cache_entries)),
        }
    }

    /// Locates the query's earliest match in a stored document.
    ///
    /// `context_radius` requests N lines before and after the match line,
    /// sliced from the stored content; context is never cached because the
    /// radius varies per request.
    pub fn locate(
        &self,
        workspace: &str,
        doc: &StoredDoc,
        raw_query: &str,
        context_radius: Option<usize>,
    ) -> LineResult {
        let key = fingerprint(workspace, &doc.path, raw_query);

        let mut result = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.get(key)
        }
        .map(|mut cached| {
            cached.is_from_cache = true;
            cached
        })
        .unwrap_or_else(|| {
            let fresh = self.locate_uncached(doc, raw_query);
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(key, fresh.clone());
            fresh
        });

        if let Some(radius) = context_radius {
            if result.line_number > 0 {
                let (context, start, end) = slice_context(doc, result.line_number, radius);
                result.start_line = start;
                result.end_line = end;
                result.context = context;
            }
        }
        result
    }

    fn locate_uncached(&self, doc: &StoredDoc, raw_query: &str) -> LineResult {
        let literals = extract_literal_terms(raw_query);

        // Literal terms must be analysed the same way content was, so the
        // stemmed/expanded forms line up with the term-vector keys.
        let mut terms: Vec<String> = Vec::with_capacity(literals.len());
        for literal in &literals {
            terms.extend(analysis::analyze_terms(self.analyzers.content(), literal));
        }
        terms.sort_unstable();
        terms.dedup();

        if let Some(ref vectors) = doc.term_vectors {
            // Synonym expansions share the source offset; dedupe so one
            // occurrence counts once.
            let mut offsets: Vec<u32> = Vec::new();
            for term in &terms {
                if let Some(found) = vectors.offsets(term) {
                    offsets.extend_from_slice(found);
                }
            }
            offsets.sort_unstable();
            offsets.dedup();
            if let Some(&offset) = offsets.first() {
                return LineResult {
                    line_number: line_for_offset(&doc.line_starts, offset),
                    is_accurate: true,
                    is_from_cache: false,
                    match_offset: Some(offset),
                    match_count: offsets.len() as u32,
                    context: None,
                    start_line: None,
                    end_line: None,
                };
            }
        }

        // Fallback: re-tokenise whatever content we have and scan.
        if let Some(ref content) = doc.content {
            let mut offsets: Vec<u32> = Vec::new();
            for span in analysis::token_spans(self.analyzers.content(), content) {
                if terms.binary_search(&span.text).is_ok() {
                    offsets.push(span.start);
                }
            }
            offsets.sort_unstable();
            offsets.dedup();
            if let Some(&offset) = offsets.first() {
                return LineResult {
                    line_number: line_for_offset(&doc.line_starts, offset),
                    is_accurate: false,
                    is_from_cache: false,
                    match_offset: Some(offset),
                    match_count: offsets.len() as u32,
                    context: None,
                    start_line: None,
                    end_line: None,
                };
            }
        }

        // Scored but unlocatable (content excluded from storage, or the
        // match came from a non-content field).
        LineResult {
            line_number: 0,
            is_accurate: false,
            is_from_cache: false,
            match_offset: None,
            match_count: 0,
            context: None,
            start_line: None,
            end_line: None,
        }
    }
}

/// Slices ±radius lines around `line` from the stored content.
fn slice_context(
    doc: &StoredDoc,
    line: u32,
    radius: usize,
) -> (Option<Vec<ContextLine>>, Option<u32>, Option<u32>) {
    let content = match doc.content {
        Some(ref c) => c,
        None => return (None, None, None),
    };
    let starts = &doc.line_starts;
    let total = starts.len() as u32;
    if line == 0 || line > total {
        return (None, None, None);
    }

    let start_line = line.saturating_sub(radius as u32).max(1);
    let end_line = (line + radius as u32).min(total);

    let mut lines = Vec::with_capacity((end_line - start_line + 1) as usize);
    for n in start_line..=end_line {
        let from = starts[(n - 1) as usize] as usize;
        let to = if (n as usize) < starts.len() {
            starts[n as usize] as usize
        } else {
            content.len()
        };
        let text = content[from..to.min(content.len())].trim_end_matches('\n');
        lines.push(ContextLine {
            line: n,
            content: text.to_string(),
            is_match: n == line,
        });
    }
    (Some(lines), Some(start_line), Some(end_line))
}

fn fingerprint(workspace: &str, path: &str, raw_query: &str) -> u64 {
    let mut buf = Vec::with_capacity(workspace.len() + path.len() + raw_query.len() + 2);
    buf.extend_from_slice(workspace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(path.as_bytes());
    buf.push(0);
    buf.extend_from_slice(raw_query.as_bytes());
    xxh3_64(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{compute_line_starts, TermVectors};
    use crate::types::Ticks;

    fn doc_for(content: &str) -> StoredDoc {
        let analyzers = AnalyzerSet::new();
        StoredDoc {
            path: "a.txt".into(),
            filename: "a.txt".into(),
            extension: "txt".into(),
            directory: ".".into(),
            language: String::new(),
            content: Some(content.to_string()),
            modified: Ticks::new(0),
            size: content.len() as u64,
            line_starts: compute_line_starts(content),
            term_vectors: Some(TermVectors::build(analyzers.content(), content)),
            type_info: None,
        }
    }

    fn service() -> LineAwareService {
        LineAwareService::new(AnalyzerSet::new(), 64)
    }

    #[test]
    fn test_extract_literal_terms() {
        assert_eq!(
            extract_literal_terms(r#"filename:foo AND "bar baz" +qux*"#),
            vec!["foo", "bar", "baz", "qux"]
        );
        assert!(extract_literal_terms("AND OR NOT").is_empty());
    }

    #[test]
    fn test_exact_match_line_one() {
        let doc = doc_for("foo\nbar\nbaz foo\n");
        let result = service().locate("ws", &doc, "foo", None);
        assert_eq!(result.line_number, 1);
        assert!(result.is_accurate);
        assert!(!result.is_from_cache);
        assert_eq!(result.match_count, 2);
    }

    #[test]
    fn test_earliest_of_multiple_matches_wins() {
        let doc = doc_for("alpha\nbeta\nalpha\n");
        let result = service().locate("ws", &doc, "alpha", None);
        assert_eq!(result.line_number, 1);
        assert_eq!(result.match_offset, Some(0));
    }

    #[test]
    fn test_match_on_later_line() {
        let doc = doc_for("foo\nbar\nbaz quux\n");
        let result = service().locate("ws", &doc, "quux", None);
        assert_eq!(result.line_number, 3);
        assert!(result.is_accurate);
    }

    #[test]
    fn test_cache_flags_second_lookup() {
        let svc = service();
        let doc = doc_for("foo\nbar\n");
        let first = svc.locate("ws", &doc, "foo", None);
        assert!(!first.is_from_cache);
        let second = svc.locate("ws", &doc, "foo", None);
        assert!(second.is_from_cache);
        assert_eq!(second.line_number, first.line_number);
    }

    #[test]
    fn test_fallback_without_term_vectors() {
        let mut doc = doc_for("one\ntwo needle\n");
        doc.term_vectors = None;
        let result = service().locate("ws", &doc, "needle", None);
        assert_eq!(result.line_number, 2);
        assert!(!result.is_accurate);
    }

    #[test]
    fn test_zero_matches_is_line_zero() {
        let doc = doc_for("one\ntwo\n");
        let result = service().locate("ws", &doc, "absent", None);
        assert_eq!(result.line_number, 0);
        assert!(!result.is_accurate);
    }

    #[test]
    fn test_nothing_stored_is_line_zero() {
        let mut doc = doc_for("anything\n");
        doc.term_vectors = None;
        doc.content = None;
        let result = service().locate("ws", &doc, "anything", None);
        assert_eq!(result.line_number, 0);
        assert!(!result.is_accurate);
    }

    #[test]
    fn test_context_slicing() {
        let doc = doc_for("foo\nbar\nbaz foo\n");
        let result = service().locate("ws", &doc, "foo", Some(1));
        let ctx = result.context.unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx[0].line, 1);
        assert_eq!(ctx[0].content, "foo");
        assert!(ctx[0].is_match);
        assert_eq!(ctx[1].line, 2);
        assert_eq!(ctx[1].content, "bar");
        assert!(!ctx[1].is_match);
        assert_eq!(result.start_line, Some(1));
        assert_eq!(result.end_line, Some(2));
    }

    #[test]
    fn test_context_clamps_at_file_edges() {
        let doc = doc_for("a\nb\nc\n");
        let result = service().locate("ws", &doc, "c", Some(5));
        let ctx = result.context.unwrap();
        assert_eq!(ctx.first().unwrap().line, 1);
        assert_eq!(ctx.last().unwrap().line, 3);
    }

    #[test]
    fn test_multibyte_content_offsets() {
        let doc = doc_for("héllo wörld\nneedle\n");
        let result = service().locate("ws", &doc, "needle", None);
        assert_eq!(result.line_number, 2);
        assert!(result.is_accurate);
    }

    #[test]
    fn test_synonym_match_locates_source_term() {
        // Query "login" must locate the "auth" occurrence via expansion.
        let doc = doc_for("fn auth() {}\n");
        let result = service().locate("ws", &doc, "login", None);
        assert_eq!(result.line_number, 1);
        assert!(result.is_accurate);
    }

    #[test]
    fn test_stemmed_query_matches() {
        let doc = doc_for("handles connections\n");
        let result = service().locate("ws", &doc, "connection", None);
        assert_eq!(result.line_number, 1);
    }

    #[test]
    fn test_bounded_cache_evicts() {
        let mut cache = BoundedCache::new(2);
        let r = LineResult {
            line_number: 1,
            is_accurate: true,
            is_from_cache: false,
            match_offset: Some(0),
            match_count: 1,
            context: None,
            start_line: None,
            end_line: None,
        };
        cache.insert(1, r.clone());
        cache.insert(2, r.clone());
        cache.insert(3, r);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
        assert!(cache.get(3).is_some());
    }
}
