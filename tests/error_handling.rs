//! Error-path integration tests: every failure surfaces exactly one
//! categorical kind with a stable code.

mod common;

use codequarry::index::SearchRequest;
use codequarry::EngineConfig;
use common::{event, test_config, TestEnv};
use std::path::Path;

#[test]
fn test_search_before_initialise_is_index_missing() {
    let env = TestEnv::new();
    let err = env
        .service
        .search(env.root(), &SearchRequest::new("anything", 10))
        .unwrap_err();
    assert_eq!(err.code(), "INDEX_MISSING");
    assert!(err.is_client_fixable());
}

#[test]
fn test_commit_before_initialise_is_index_missing() {
    let env = TestEnv::new();
    let err = env.service.commit(env.root()).unwrap_err();
    assert_eq!(err.code(), "INDEX_MISSING");
}

#[test]
fn test_empty_workspace_path_rejected() {
    let env = TestEnv::new();
    let err = env.service.initialise(Path::new("")).unwrap_err();
    assert_eq!(err.code(), "WORKSPACE_ERROR");
}

#[test]
fn test_missing_workspace_dir_rejected() {
    let env = TestEnv::new();
    let err = env
        .service
        .initialise(Path::new("/no/such/workspace/root"))
        .unwrap_err();
    assert_eq!(err.code(), "WORKSPACE_ERROR");
}

#[test]
fn test_parse_error_is_recoverable() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn recoverable() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    let err = env
        .service
        .search(env.root(), &SearchRequest::new("\"unterminated", 10))
        .unwrap_err();
    assert_eq!(err.code(), "QUERY_PARSE_ERROR");
    assert!(err.is_client_fixable());

    // The context is unharmed; a valid query still works.
    let outcome = env
        .service
        .search(env.root(), &SearchRequest::new("recoverable", 10))
        .unwrap();
    assert_eq!(outcome.total_hits, 1);
}

#[test]
fn test_zero_index_cap_is_resource_exhausted() {
    let config = EngineConfig {
        max_concurrent_indexes: 0,
        ..test_config()
    };
    let env = TestEnv::with_config(config);
    let err = env.service.initialise(env.root()).unwrap_err();
    assert_eq!(err.code(), "RESOURCE_EXHAUSTED");
}

#[test]
fn test_repair_on_missing_index_is_corrupt() {
    let env = TestEnv::new();
    // The workspace exists but nothing was ever indexed there.
    let err = env
        .service
        .repair(env.root(), codequarry::index::RepairOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "INDEX_CORRUPT");
}

#[test]
fn test_repair_rejected_for_in_memory_mode() {
    let config = EngineConfig {
        use_in_memory_directory: true,
        ..test_config()
    };
    let env = TestEnv::with_config(config);
    env.service.initialise(env.root()).unwrap();

    let err = env
        .service
        .repair(env.root(), codequarry::index::RepairOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "TOOL_ERROR");
}

#[test]
fn test_unknown_config_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"max_concurrent_indexs": 3}"#).unwrap();

    let err = EngineConfig::from_file(&path).unwrap_err();
    assert_eq!(err.code(), "CONFIG_ERROR");
}

#[test]
fn test_error_messages_are_human_readable() {
    let env = TestEnv::new();
    let err = env
        .service
        .search(env.root(), &SearchRequest::new("x", 10))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("initialise"), "unhelpful message: {message}");
}

#[test]
fn test_shutdown_is_idempotent() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn fine() {}\n")])
        .unwrap();

    // Shutdown commits best-effort and never errors, even twice.
    env.service.shutdown();
    env.service.shutdown();
    assert_eq!(env.service.live_contexts(), 0);

    // Uncommitted work was flushed by the dispose-time commit.
    let reopened = env.reopened_service();
    let outcome = reopened
        .search(env.root(), &SearchRequest::new("fine", 10))
        .unwrap();
    assert_eq!(outcome.total_hits, 1);
}
