//! Shared corpus generation for benchmarks.
//!
//! Not part of the public API; exposed so `benches/` can build realistic
//! workspaces without duplicating the generator.

use std::path::Path;

/// Writes `count` synthetic source files under `root`.
///
/// The generated code mixes identifiers, domain words (auth, config,
/// database) and plain prose so analysis, synonym expansion, and snippet
/// extraction all have something to chew on.
///
/// # Panics
///
/// Panics on IO failure; benchmarks have no error channel worth wiring.
pub fn write_corpus(root: &Path, count: usize) {
    for i in 0..count {
        let dir = root.join(format!("module_{}", i % 10));
        std::fs::create_dir_all(&dir).unwrap();
        let content = source_file(i);
        std::fs::write(dir.join(format!("file_{i}.rs")), content).unwrap();
    }
}

/// One synthetic source file, deterministic per index.
#[must_use]
pub fn source_file(i: usize) -> String {
    format!(
        r#"//! Module {i}: request handling and auth plumbing.

pub struct Handler{i} {{
    config: Config,
    retries: u32,
}}

impl Handler{i} {{
    pub fn authenticate(&self) -> Result<Session, AuthError> {{
        let credentials = self.config.credentials();
        validate(&credentials)?;
        log::debug!("handler {i} authenticated");
        Ok(Session::new({i}))
    }}

    pub fn query_database(&self, term: &str) -> Vec<Row> {{
        let connection = pool().acquire();
        connection.select("items", term)
    }}
}}

fn validate(credentials: &Credentials) -> Result<(), AuthError> {{
    if credentials.expired() {{
        return Err(AuthError::Expired);
    }}
    Ok(())
}}
"#
    )
}
