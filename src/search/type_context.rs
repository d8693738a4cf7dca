//! Type-context extraction and resolution.
//!
//! At index time a [`TypeExtractor`] produces the types and methods of each
//! document; the engine serialises that as an opaque stored JSON blob. At
//! query time the blob is decoded and the hit's *containing type* is the
//! nearest type whose start line is at or above the hit line. A blob that
//! fails to decode yields no type context and never fails the query.

use serde::{Deserialize, Serialize};

/// One extracted type (struct, class, enum, trait, interface, module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub name: String,
    pub kind: String,
    /// 1-based line of the declaration.
    pub line: u32,
}

/// One extracted method or function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    pub line: u32,
    pub signature: String,
}

/// The per-document extraction result, stored as the `type_info` blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub types: Vec<TypeEntry>,
    pub methods: Vec<MethodEntry>,
    pub language: String,
}

impl TypeInfo {
    /// Serialises for storage. Infallible in practice; a failure degrades
    /// to "no type info" with a warning.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(error = %e, "type info serialisation failed; dropping");
                None
            }
        }
    }
}

/// Per-hit type context, reconstructed from the stored blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeContext {
    /// Nearest enclosing type (greatest declaration line ≤ hit line).
    pub containing_type: Option<String>,
    /// Nearest enclosing method, same rule.
    pub containing_method: Option<String>,
    /// Types declared near the hit, nearest first.
    pub nearby_types: Vec<TypeEntry>,
    pub language: String,
}

/// How many nearby types a hit carries.
const NEARBY_LIMIT: usize = 3;

/// Decodes the stored blob and resolves context for a hit line.
///
/// Returns `None` for an absent or undecodable blob or a hit with no line.
#[must_use]
pub fn resolve(type_info_json: Option<&str>, hit_line: u32) -> Option<TypeContext> {
    let raw = type_info_json?;
    let info: TypeInfo = match serde_json::from_str(raw) {
        Ok(i) => i,
        Err(e) => {
            tracing::debug!(error = %e, "undecodable type_info blob; hit returned without context");
            return None;
        }
    };
    if hit_line == 0 {
        return None;
    }

    let containing_type = info
        .types
        .iter()
        .filter(|t| t.line <= hit_line)
        .max_by_key(|t| t.line)
        .map(|t| t.name.clone());
    let containing_method = info
        .methods
        .iter()
        .filter(|m| m.line <= hit_line)
        .max_by_key(|m| m.line)
        .map(|m| m.name.clone());

    let mut nearby: Vec<TypeEntry> = info.types.clone();
    nearby.sort_by_key(|t| t.line.abs_diff(hit_line));
    nearby.truncate(NEARBY_LIMIT);

    Some(TypeContext {
        containing_type,
        containing_method,
        nearby_types: nearby,
        language: info.language,
    })
}

/// Extraction request handed to the collaborator.
#[derive(Debug)]
pub struct ExtractionRequest<'a> {
    pub path: &'a str,
    pub language: Option<&'a str>,
    pub content: &'a str,
}

/// The type-extraction collaborator.
///
/// Failures are represented as `None` and are never fatal to indexing.
pub trait TypeExtractor: Send + Sync {
    fn extract(&self, request: &ExtractionRequest<'_>) -> Option<TypeInfo>;
}

/// Default extractor: line-prefix matching per language family.
///
/// Deliberately shallow — it recognises top-level declarations, which is
/// what containing-type resolution needs. A language server can replace it
/// through the trait.
pub struct PatternTypeExtractor;

impl TypeExtractor for PatternTypeExtractor {
    fn extract(&self, request: &ExtractionRequest<'_>) -> Option<TypeInfo> {
        let language = request
            .language
            .map(str::to_owned)
            .or_else(|| crate::supplier::language_for(request.path).map(str::to_owned))?;

        let mut info = TypeInfo {
            types: Vec::new(),
            methods: Vec::new(),
            language: language.clone(),
        };

        for (i, line) in request.content.lines().enumerate() {
            let line_num = (i + 1) as u32;
            let trimmed = line.trim_start();
            match language.as_str() {
                "rust" => scan_rust(trimmed, line_num, &mut info),
                "python" => scan_python(trimmed, line_num, &mut info),
                "javascript" | "typescript" => scan_js(trimmed, line_num, &mut info),
                "go" => scan_go(trimmed, line_num, &mut info),
                "csharp" | "java" => scan_clike(trimmed, line_num, &mut info),
                _ => {}
            }
        }

        if info.types.is_empty() && info.methods.is_empty() {
            None
        } else {
            Some(info)
        }
    }
}

/// First identifier after a keyword prefix, stopping at punctuation.
fn ident_after<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    (!name.is_empty()).then_some(name)
}

fn push_type(info: &mut TypeInfo, name: &str, kind: &str, line: u32) {
    info.types.push(TypeEntry {
        name: name.to_string(),
        kind: kind.to_string(),
        line,
    });
}

fn push_method(info: &mut TypeInfo, name: &str, line: u32, signature: &str) {
    info.methods.push(MethodEntry {
        name: name.to_string(),
        line,
        signature: signature.trim().trim_end_matches('{').trim().to_string(),
    });
}

fn scan_rust(line: &str, n: u32, info: &mut TypeInfo) {
    let line = line.strip_prefix("pub ").unwrap_or(line);
    for (prefix, kind) in [
        ("struct ", "struct"),
        ("enum ", "enum"),
        ("trait ", "trait"),
        ("mod ", "module"),
    ] {
        if let Some(name) = ident_after(line, prefix) {
            push_type(info, name, kind, n);
            return;
        }
    }
    if let Some(name) = ident_after(line, "impl ") {
        push_type(info, name, "impl", n);
        return;
    }
    let fn_line = line.strip_prefix("async ").unwrap_or(line);
    if let Some(name) = ident_after(fn_line, "fn ") {
        push_method(info, name, n, line);
    }
}

fn scan_python(line: &str, n: u32, info: &mut TypeInfo) {
    if let Some(name) = ident_after(line, "class ") {
        push_type(info, name, "class", n);
        return;
    }
    let fn_line = line.strip_prefix("async ").unwrap_or(line);
    if let Some(name) = ident_after(fn_line, "def ") {
        push_method(info, name, n, line);
    }
}

fn scan_js(line: &str, n: u32, info: &mut TypeInfo) {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let line = line.strip_prefix("default ").unwrap_or(line);
    for (prefix, kind) in [
        ("class ", "class"),
        ("interface ", "interface"),
        ("enum ", "enum"),
        ("type ", "type"),
    ] {
        if let Some(name) = ident_after(line, prefix) {
            push_type(info, name, kind, n);
            return;
        }
    }
    let fn_line = line.strip_prefix("async ").unwrap_or(line);
    if let Some(name) = ident_after(fn_line, "function ") {
        push_method(info, name, n, line);
    }
}

fn scan_go(line: &str, n: u32, info: &mut TypeInfo) {
    if let Some(rest) = line.strip_prefix("type ") {
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if end > 0 {
            let kind = if rest[end..].trim_start().starts_with("interface") {
                "interface"
            } else {
                "struct"
            };
            push_type(info, &rest[..end], kind, n);
            return;
        }
    }
    if let Some(rest) = line.strip_prefix("func ") {
        // Skip an optional receiver: func (s *Server) Name(...)
        let rest = match rest.strip_prefix('(') {
            Some(r) => r.split_once(')').map(|(_, after)| after.trim_start()).unwrap_or(r),
            None => rest,
        };
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if end > 0 {
            push_method(info, &rest[..end], n, line);
        }
    }
}

fn scan_clike(line: &str, n: u32, info: &mut TypeInfo) {
    let stripped = line
        .trim_start_matches("public ")
        .trim_start_matches("private ")
        .trim_start_matches("protected ")
        .trim_start_matches("internal ")
        .trim_start_matches("static ")
        .trim_start_matches("abstract ")
        .trim_start_matches("sealed ")
        .trim_start_matches("final ");
    for (prefix, kind) in [
        ("class ", "class"),
        ("interface ", "interface"),
        ("enum ", "enum"),
        ("record ", "record"),
        ("struct ", "struct"),
    ] {
        if let Some(name) = ident_after(stripped, prefix) {
            push_type(info, name, kind, n);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, content: &str) -> Option<TypeInfo> {
        PatternTypeExtractor.extract(&ExtractionRequest {
            path,
            language: None,
            content,
        })
    }

    #[test]
    fn test_rust_extraction() {
        let info = extract(
            "a.rs",
            "pub struct Engine {}\n\nimpl Engine {\n    pub fn start(&self) {}\n}\n",
        )
        .unwrap();
        assert_eq!(info.language, "rust");
        assert_eq!(info.types[0].name, "Engine");
        assert_eq!(info.types[0].kind, "struct");
        assert_eq!(info.types[1].kind, "impl");
        assert_eq!(info.methods[0].name, "start");
        assert_eq!(info.methods[0].line, 4);
    }

    #[test]
    fn test_python_extraction() {
        let info = extract("m.py", "class Engine:\n    def start(self):\n        pass\n").unwrap();
        assert_eq!(info.types[0].name, "Engine");
        assert_eq!(info.methods[0].name, "start");
    }

    #[test]
    fn test_go_receiver_method() {
        let info = extract("s.go", "type Server struct {}\n\nfunc (s *Server) Run() {}\n").unwrap();
        assert_eq!(info.types[0].name, "Server");
        assert_eq!(info.methods[0].name, "Run");
    }

    #[test]
    fn test_unknown_language_is_none() {
        assert!(extract("notes.xyz", "struct Thing {}").is_none());
    }

    #[test]
    fn test_containing_type_resolution() {
        let info = TypeInfo {
            types: vec![
                TypeEntry {
                    name: "First".into(),
                    kind: "struct".into(),
                    line: 1,
                },
                TypeEntry {
                    name: "Second".into(),
                    kind: "struct".into(),
                    line: 10,
                },
            ],
            methods: vec![MethodEntry {
                name: "go".into(),
                line: 11,
                signature: "fn go()".into(),
            }],
            language: "rust".into(),
        };
        let json = info.to_json().unwrap();

        let ctx = resolve(Some(&json), 12).unwrap();
        assert_eq!(ctx.containing_type.as_deref(), Some("Second"));
        assert_eq!(ctx.containing_method.as_deref(), Some("go"));

        let ctx = resolve(Some(&json), 5).unwrap();
        assert_eq!(ctx.containing_type.as_deref(), Some("First"));
        assert_eq!(ctx.containing_method, None);
    }

    #[test]
    fn test_undecodable_blob_is_none() {
        assert!(resolve(Some("{broken"), 3).is_none());
        assert!(resolve(None, 3).is_none());
    }

    #[test]
    fn test_line_zero_hit_has_no_context() {
        let json = TypeInfo {
            types: vec![TypeEntry {
                name: "T".into(),
                kind: "struct".into(),
                line: 1,
            }],
            methods: vec![],
            language: "rust".into(),
        }
        .to_json()
        .unwrap();
        assert!(resolve(Some(&json), 0).is_none());
    }
}
