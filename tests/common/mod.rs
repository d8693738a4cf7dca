//! Common test utilities for codequarry integration tests.
//!
//! Provides `TestEnv` for setting up isolated test environments: a
//! throwaway index base directory, a throwaway workspace, and an
//! `IndexService` wired over both.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use codequarry::index::IndexService;
use codequarry::response::{DetailCache, ResponseBuilder};
use codequarry::supplier::{language_for, FileEvent};
use codequarry::types::Ticks;
use codequarry::EngineConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Engine configuration tuned for tests: small writer heap, defaults
/// otherwise.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        writer_ram_buffer_mb: 16.0,
        ..EngineConfig::default()
    }
}

/// A complete test environment with service, base dir, and workspace.
pub struct TestEnv {
    pub base: TempDir,
    pub workspace: TempDir,
    pub service: Arc<IndexService>,
}

impl TestEnv {
    /// Creates a new empty test environment.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let base = TempDir::new().expect("Failed to create base directory");
        let workspace = TempDir::new().expect("Failed to create workspace directory");
        let service = Arc::new(IndexService::with_base_dir(config, base.path().to_path_buf()));
        Self {
            base,
            workspace,
            service,
        }
    }

    /// The workspace root path.
    pub fn root(&self) -> &Path {
        self.workspace.path()
    }

    /// A second service over the same base directory (simulates a restart).
    ///
    /// Call `service.shutdown()` first so the writer lock is released.
    pub fn reopened_service(&self) -> IndexService {
        IndexService::with_base_dir(test_config(), self.base.path().to_path_buf())
    }

    /// Writes a file into the workspace.
    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.workspace.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write test file");
    }

    /// Walks the workspace and indexes everything, committing at the end.
    pub fn index_all(&self) {
        codequarry::tools::execute_index(
            &self.service,
            self.root(),
            codequarry::tools::IndexInput { force: false },
            None,
        )
        .expect("Failed to index workspace");
    }

    /// Builds a response builder sharing nothing with the service (the
    /// production wiring in `server.rs` does the same).
    pub fn builder(&self) -> ResponseBuilder {
        let config = test_config();
        ResponseBuilder::new(
            config.summary_token_budget,
            config.full_token_budget,
            Arc::new(DetailCache::new(config.detail_cache_ttl())),
        )
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A synthetic document event, bypassing the filesystem supplier.
pub fn event(relative_path: &str, content: &str) -> FileEvent {
    FileEvent {
        path: PathBuf::from(relative_path),
        relative_path: relative_path.to_string(),
        content: content.to_string(),
        modified: Ticks::now(),
        size: content.len() as u64,
        language: language_for(relative_path).map(str::to_owned),
    }
}

/// Creates a test environment with pre-populated Rust source files.
pub fn rust_codebase() -> TestEnv {
    let env = TestEnv::new();

    env.write_file(
        "main.rs",
        r#"fn main() {
    let config = Config::load();
    let result = authenticate(&config);
    println!("{:?}", result);
}
"#,
    );

    env.write_file(
        "auth.rs",
        r#"use crate::config::Config;
use crate::error::AuthError;

/// Authenticates a user with the given configuration.
pub fn authenticate(config: &Config) -> Result<User, AuthError> {
    let credentials = config.credentials();
    validate_credentials(&credentials)?;
    Ok(User::new("authenticated_user"))
}

fn validate_credentials(creds: &Credentials) -> Result<(), AuthError> {
    if creds.is_valid() {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

pub struct User {
    username: String,
}

impl User {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
        }
    }
}
"#,
    );

    env.write_file(
        "config.rs",
        r#"/// Application configuration.
pub struct Config {
    api_key: String,
    timeout: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            api_key: std::env::var("API_KEY").unwrap_or_default(),
            timeout: 30,
        }
    }
}
"#,
    );

    env
}

/// Asserts that hits contain a document with the given path.
pub fn assert_hits_contain(outcome: &codequarry::index::SearchOutcome, path: &str) {
    assert!(
        outcome.hits.iter().any(|h| h.doc.path == path),
        "Expected hits to contain '{}', got: {:?}",
        path,
        outcome.hits.iter().map(|h| &h.doc.path).collect::<Vec<_>>()
    );
}

/// Asserts that hits do NOT contain a document with the given path.
pub fn assert_hits_not_contain(outcome: &codequarry::index::SearchOutcome, path: &str) {
    assert!(
        outcome.hits.iter().all(|h| h.doc.path != path),
        "Expected hits NOT to contain '{}'",
        path
    );
}
