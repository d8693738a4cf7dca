//! Document schema: field definitions, stored/indexed policy, and the
//! stored helper blobs (line-break offsets, term vectors, type info).
//!
//! `path` is the only update key: an upsert is a delete-by-term on `path`
//! followed by an add. `content` is indexed with positions but never stored;
//! its raw text lives in the parallel stored-only `content_stored` field,
//! added per document only while the text is under the stored-field cap, so
//! index size stays proportional to source size.

use crate::analysis::{self, CONTENT_TOKENIZER};
use crate::error::{EngineError, Result};
use crate::types::Ticks;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tantivy::schema::{
    BytesOptions, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST,
    INDEXED, STORED, STRING,
};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::Document;

/// Offsets recorded per distinct term in the stored term-vector blob.
/// Line mapping only ever needs the earliest ones.
const MAX_OFFSETS_PER_TERM: usize = 64;

/// The fixed field set, resolved once per schema build.
#[derive(Clone)]
pub struct DocSchema {
    schema: Schema,

    // Unique update key: workspace-relative path, indexed raw.
    pub path: Field,
    pub filename: Field,
    pub extension: Field,
    pub directory: Field,
    pub language: Field,

    // Indexed with positions, never stored.
    pub content: Field,
    // Raw text, stored only, present while under the stored-field cap.
    pub content_stored: Field,

    pub modified: Field,
    pub size: Field,

    // Ascending u32-LE byte offsets of every line start.
    pub line_breaks: Field,
    // bincode map: analysed term -> ascending byte offsets.
    pub term_vectors: Field,
    // JSON blob from the type-extraction collaborator.
    pub type_info: Field,
}

impl DocSchema {
    #[must_use]
    pub fn build() -> Self {
        let mut builder = Schema::builder();

        let content_indexing = TextFieldIndexing::default()
            .set_tokenizer(CONTENT_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);

        let path = builder.add_text_field("path", STRING | STORED);
        let filename = builder.add_text_field("filename", STRING | STORED);
        let extension = builder.add_text_field("extension", STRING | STORED);
        let directory = builder.add_text_field("directory", STRING | STORED);
        let language = builder.add_text_field("language", STRING | STORED);

        let content = builder.add_text_field(
            "content",
            TextOptions::default().set_indexing_options(content_indexing),
        );
        let content_stored =
            builder.add_text_field("content_stored", TextOptions::default().set_stored());

        let modified = builder.add_u64_field("modified", INDEXED | STORED | FAST);
        let size = builder.add_u64_field("size", STORED | FAST);

        let line_breaks =
            builder.add_bytes_field("line_breaks", BytesOptions::default().set_stored());
        let term_vectors =
            builder.add_bytes_field("term_vectors", BytesOptions::default().set_stored());
        let type_info = builder.add_text_field("type_info", TextOptions::default().set_stored());

        Self {
            schema: builder.build(),
            path,
            filename,
            extension,
            directory,
            language,
            content,
            content_stored,
            modified,
            size,
            line_breaks,
            term_vectors,
            type_info,
        }
    }

    #[must_use]
    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    /// Whether an on-disk schema matches the current field definitions.
    ///
    /// Compared structurally via serde, since tantivy persists the schema
    /// in `meta.json` in exactly this shape.
    #[must_use]
    pub fn matches(&self, other: &Schema) -> bool {
        serde_json::to_value(&self.schema).ok() == serde_json::to_value(other).ok()
    }

    /// Builds a tantivy document for one source file.
    ///
    /// Heavy stored blobs (raw content, term vectors) are attached only
    /// while the content is under `stored_cap_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the term-vector blob fails to encode.
    pub fn make_document(
        &self,
        rec: &DocRecord<'_>,
        analyzer: &TextAnalyzer,
        stored_cap_bytes: usize,
    ) -> Result<Document> {
        let mut doc = Document::default();
        doc.add_text(self.path, rec.relative_path);
        doc.add_text(self.filename, file_name_of(rec.relative_path));
        doc.add_text(self.extension, extension_of(rec.relative_path));
        doc.add_text(self.directory, directory_of(rec.relative_path));
        doc.add_text(self.language, rec.language.unwrap_or(""));
        doc.add_u64(self.modified, rec.modified.as_u64());
        doc.add_u64(self.size, rec.size);

        doc.add_text(self.content, rec.content);
        doc.add_bytes(
            self.line_breaks,
            encode_line_breaks(&compute_line_starts(rec.content)),
        );

        if rec.content.len() <= stored_cap_bytes {
            doc.add_text(self.content_stored, rec.content);
            let vectors = TermVectors::build(analyzer, rec.content);
            let blob = bincode::serialize(&vectors)
                .map_err(|e| EngineError::internal(format!("term vector encode: {e}")))?;
            doc.add_bytes(self.term_vectors, blob);
        }

        if let Some(ref json) = rec.type_info_json {
            doc.add_text(self.type_info, json);
        }

        Ok(doc)
    }

    /// Reads the stored side of a retrieved document.
    ///
    /// # Errors
    ///
    /// Returns an internal error when mandatory stored fields are absent,
    /// which only happens on a schema the service did not write.
    pub fn read_document(&self, doc: &Document) -> Result<StoredDoc> {
        let text = |field, name: &str| -> Result<String> {
            doc.get_first(field)
                .and_then(Value::as_text)
                .map(str::to_owned)
                .ok_or_else(|| EngineError::internal(format!("stored field '{name}' missing")))
        };

        let line_starts = doc
            .get_first(self.line_breaks)
            .and_then(Value::as_bytes)
            .map(decode_line_breaks)
            .unwrap_or_else(|| vec![0]);

        let term_vectors = doc
            .get_first(self.term_vectors)
            .and_then(Value::as_bytes)
            .and_then(|b| match bincode::deserialize::<TermVectors>(b) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::debug!(error = %e, "undecodable term-vector blob; falling back");
                    None
                }
            });

        Ok(StoredDoc {
            path: text(self.path, "path")?,
            filename: text(self.filename, "filename").unwrap_or_default(),
            extension: text(self.extension, "extension").unwrap_or_default(),
            directory: text(self.directory, "directory").unwrap_or_default(),
            language: text(self.language, "language").unwrap_or_default(),
            content: doc
                .get_first(self.content_stored)
                .and_then(Value::as_text)
                .map(str::to_owned),
            modified: Ticks::new(
                doc.get_first(self.modified).and_then(Value::as_u64).unwrap_or(0),
            ),
            size: doc.get_first(self.size).and_then(Value::as_u64).unwrap_or(0),
            line_starts,
            term_vectors,
            type_info: doc
                .get_first(self.type_info)
                .and_then(Value::as_text)
                .map(str::to_owned),
        })
    }
}

/// Input for building one document.
#[derive(Debug)]
pub struct DocRecord<'a> {
    pub relative_path: &'a str,
    pub content: &'a str,
    pub modified: Ticks,
    pub size: u64,
    pub language: Option<&'a str>,
    pub type_info_json: Option<String>,
}

/// The stored side of one retrieved document.
#[derive(Debug, Clone)]
pub struct StoredDoc {
    pub path: String,
    pub filename: String,
    pub extension: String,
    pub directory: String,
    pub language: String,
    pub content: Option<String>,
    pub modified: Ticks,
    pub size: u64,
    pub line_starts: Vec<u32>,
    pub term_vectors: Option<TermVectors>,
    pub type_info: Option<String>,
}

impl StoredDoc {
    /// Total line count, derived from the line-start array.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }
}

/// Per-document map of analysed term → ascending byte offsets.
///
/// This is the term-vector analogue: built with the same analyzer that
/// indexes `content`, so query-side analysed terms look up directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermVectors(pub BTreeMap<String, Vec<u32>>);

impl TermVectors {
    /// Builds term vectors for `content`, keeping the earliest
    /// [`MAX_OFFSETS_PER_TERM`] offsets of each term.
    #[must_use]
    pub fn build(analyzer: &TextAnalyzer, content: &str) -> Self {
        let mut map: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for span in analysis::token_spans(analyzer, content) {
            let offsets = map.entry(span.text).or_default();
            if offsets.len() < MAX_OFFSETS_PER_TERM {
                offsets.push(span.start);
            }
        }
        // Synonym expansions can emit offsets out of order; lookups assume
        // ascending.
        for offsets in map.values_mut() {
            offsets.sort_unstable();
            offsets.dedup();
        }
        Self(map)
    }

    /// Offsets of a single analysed term.
    #[must_use]
    pub fn offsets(&self, term: &str) -> Option<&[u32]> {
        self.0.get(term).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Byte offsets of every line start in `content`, always beginning with 0.
#[must_use]
pub fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = Vec::with_capacity(64);
    starts.push(0);
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' && i + 1 < content.len() {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

/// 1-based line number of the line containing byte `offset`.
#[must_use]
pub fn line_for_offset(line_starts: &[u32], offset: u32) -> u32 {
    line_starts.partition_point(|&s| s <= offset) as u32
}

/// Packs line starts as little-endian u32s (the stored representation).
#[must_use]
pub fn encode_line_breaks(starts: &[u32]) -> Vec<u8> {
    starts.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Unpacks the stored line-start bytes. Trailing partial words are ignored.
#[must_use]
pub fn decode_line_breaks(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn file_name_of(relative_path: &str) -> &str {
    Path::new(relative_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(relative_path)
}

fn extension_of(relative_path: &str) -> &str {
    Path::new(relative_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
}

fn directory_of(relative_path: &str) -> &str {
    Path::new(relative_path)
        .parent()
        .and_then(|p| p.to_str())
        .filter(|p| !p.is_empty())
        .unwrap_or(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalyzerSet;

    #[test]
    fn test_line_starts_basic() {
        assert_eq!(compute_line_starts("foo\nbar\nbaz foo\n"), vec![0, 4, 8]);
        assert_eq!(compute_line_starts(""), vec![0]);
        assert_eq!(compute_line_starts("one line"), vec![0]);
    }

    #[test]
    fn test_line_for_offset() {
        let starts = compute_line_starts("foo\nbar\nbaz foo\n");
        assert_eq!(line_for_offset(&starts, 0), 1);
        assert_eq!(line_for_offset(&starts, 3), 1);
        assert_eq!(line_for_offset(&starts, 4), 2);
        assert_eq!(line_for_offset(&starts, 12), 3);
    }

    #[test]
    fn test_line_breaks_roundtrip() {
        let starts = vec![0, 17, 300, 70_000];
        assert_eq!(decode_line_breaks(&encode_line_breaks(&starts)), starts);
    }

    #[test]
    fn test_line_starts_are_byte_offsets() {
        // 'é' is two bytes; the second line starts after them
        let starts = compute_line_starts("é\nx\n");
        assert_eq!(starts, vec![0, 3]);
    }

    #[test]
    fn test_term_vectors_lookup() {
        let analyzers = AnalyzerSet::new();
        let tv = TermVectors::build(analyzers.content(), "foo\nbar\nbaz foo\n");
        let foo = tv.offsets("foo").unwrap();
        assert_eq!(foo, &[0, 12]);
    }

    #[test]
    fn test_term_vector_offsets_ascending() {
        let analyzers = AnalyzerSet::new();
        let tv = TermVectors::build(analyzers.content(), "login auth login");
        for offsets in tv.0.values() {
            for w in offsets.windows(2) {
                assert!(w[0] < w[1]);
            }
        }
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(file_name_of("src/index/mod.rs"), "mod.rs");
        assert_eq!(extension_of("src/index/mod.rs"), "rs");
        assert_eq!(directory_of("src/index/mod.rs"), "src/index");
        assert_eq!(directory_of("README.md"), ".");
    }

    #[test]
    fn test_document_roundtrip() {
        let analyzers = AnalyzerSet::new();
        let fields = DocSchema::build();
        let rec = DocRecord {
            relative_path: "src/auth.rs",
            content: "fn authenticate() {}\nfn other() {}\n",
            modified: Ticks::new(1234),
            size: 35,
            language: Some("rust"),
            type_info_json: Some(r#"{"types":[],"methods":[],"language":"rust"}"#.into()),
        };

        let doc = fields.make_document(&rec, analyzers.content(), 1024).unwrap();
        let stored = fields.read_document(&doc).unwrap();

        assert_eq!(stored.path, "src/auth.rs");
        assert_eq!(stored.filename, "auth.rs");
        assert_eq!(stored.extension, "rs");
        assert_eq!(stored.directory, "src");
        assert_eq!(stored.language, "rust");
        assert_eq!(stored.modified, Ticks::new(1234));
        assert!(stored.content.is_some());
        assert!(stored.term_vectors.is_some());
        assert_eq!(stored.line_count(), 2);
    }

    #[test]
    fn test_large_content_not_stored() {
        let analyzers = AnalyzerSet::new();
        let fields = DocSchema::build();
        let big = "word ".repeat(1000);
        let rec = DocRecord {
            relative_path: "big.txt",
            content: &big,
            modified: Ticks::new(0),
            size: big.len() as u64,
            language: None,
            type_info_json: None,
        };

        let doc = fields.make_document(&rec, analyzers.content(), 100).unwrap();
        let stored = fields.read_document(&doc).unwrap();
        assert!(stored.content.is_none());
        assert!(stored.term_vectors.is_none());
        // Line breaks are always stored
        assert!(!stored.line_starts.is_empty());
    }

    #[test]
    fn test_schema_matches_self() {
        let a = DocSchema::build();
        let b = DocSchema::build();
        assert!(a.matches(&b.schema()));
    }
}
