//! Index lifecycle integration tests: initialise, commit visibility, LRU
//! eviction, stale locks, rebuild, repair.

mod common;

use codequarry::index::{RepairOptions, SearchRequest};
use codequarry::EngineConfig;
use common::{event, test_config, TestEnv};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_initialise_new_workspace() {
    let env = TestEnv::new();
    let outcome = env.service.initialise(env.root()).unwrap();

    assert!(outcome.is_new);
    assert_eq!(outcome.doc_count, 0);
    assert_eq!(outcome.workspace_hash.as_str().len(), 16);
    assert!(outcome.index_path.starts_with(env.base.path()));
    assert!(outcome.index_path.join("meta.json").exists());
}

#[test]
fn test_initialise_is_stable_across_restarts() {
    let env = TestEnv::new();
    let first = env.service.initialise(env.root()).unwrap();
    env.service.shutdown();

    let reopened = env.reopened_service();
    let second = reopened.initialise(env.root()).unwrap();
    assert!(!second.is_new);
    assert_eq!(first.workspace_hash, second.workspace_hash);
    assert_eq!(first.index_path, second.index_path);
}

#[test]
fn test_catalogue_restores_workspaces() {
    let env = TestEnv::new();
    env.service.initialise(env.root()).unwrap();
    env.service.shutdown();

    let reopened = env.reopened_service();
    let known = reopened.known_workspaces();
    assert_eq!(known.len(), 1);
    let canonical = dunce::canonicalize(env.root()).unwrap();
    assert_eq!(known[0].1, canonical.to_string_lossy());
}

#[test]
fn test_index_commit_search_roundtrip() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn zebrafish() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    let outcome = env
        .service
        .search(env.root(), &SearchRequest::new("zebrafish", 10))
        .unwrap();
    assert!(outcome.total_hits >= 1);
    common::assert_hits_contain(&outcome, "a.rs");
}

#[test]
fn test_commit_visibility() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("d1.rs", "fn first_marker() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    // d2 is written but not committed: searches still see only d1.
    env.service
        .index_documents(env.root(), &[event("d2.rs", "fn second_marker() {}\n")])
        .unwrap();

    let d1 = env
        .service
        .search(env.root(), &SearchRequest::new("first_marker", 10))
        .unwrap();
    assert_eq!(d1.total_hits, 1);

    let d2 = env
        .service
        .search(env.root(), &SearchRequest::new("second_marker", 10))
        .unwrap();
    assert_eq!(d2.total_hits, 0);

    // After the commit both are visible.
    env.service.commit(env.root()).unwrap();
    let d2 = env
        .service
        .search(env.root(), &SearchRequest::new("second_marker", 10))
        .unwrap();
    assert_eq!(d2.total_hits, 1);
}

#[test]
fn test_upsert_idempotence() {
    let env = TestEnv::new();
    let doc = event("same.rs", "fn stable_contents() {}\n");

    env.service.index_documents(env.root(), &[doc.clone()]).unwrap();
    env.service.commit(env.root()).unwrap();
    let first = env.service.statistics(env.root()).unwrap().doc_count;

    env.service.index_documents(env.root(), &[doc]).unwrap();
    env.service.commit(env.root()).unwrap();
    let second = env.service.statistics(env.root()).unwrap().doc_count;

    assert_eq!(first, 1);
    assert_eq!(second, 1);

    let outcome = env
        .service
        .search(env.root(), &SearchRequest::new("stable_contents", 10))
        .unwrap();
    assert_eq!(outcome.total_hits, 1);
}

#[test]
fn test_upsert_replaces_content() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("f.rs", "fn old_marker() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    env.service
        .index_documents(env.root(), &[event("f.rs", "fn new_marker() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    let old = env
        .service
        .search(env.root(), &SearchRequest::new("old_marker", 10))
        .unwrap();
    assert_eq!(old.total_hits, 0);
    let new = env
        .service
        .search(env.root(), &SearchRequest::new("new_marker", 10))
        .unwrap();
    assert_eq!(new.total_hits, 1);
}

#[test]
fn test_delete_document() {
    let env = TestEnv::new();
    env.service
        .index_documents(
            env.root(),
            &[
                event("keep.rs", "fn shared_marker() {}\n"),
                event("drop.rs", "fn shared_marker() {}\n"),
            ],
        )
        .unwrap();
    env.service.commit(env.root()).unwrap();

    env.service.delete_document(env.root(), "drop.rs").unwrap();
    env.service.commit(env.root()).unwrap();

    let outcome = env
        .service
        .search(env.root(), &SearchRequest::new("shared_marker", 10))
        .unwrap();
    assert_eq!(outcome.total_hits, 1);
    common::assert_hits_contain(&outcome, "keep.rs");
    common::assert_hits_not_contain(&outcome, "drop.rs");
}

#[test]
fn test_clear_empties_index() {
    let env = TestEnv::new();
    env.service
        .index_documents(
            env.root(),
            &[
                event("a.rs", "fn apple() {}\n"),
                event("b.rs", "fn banana() {}\n"),
            ],
        )
        .unwrap();
    env.service.commit(env.root()).unwrap();

    env.service.clear(env.root()).unwrap();

    assert_eq!(env.service.statistics(env.root()).unwrap().doc_count, 0);
    let outcome = env
        .service
        .search(env.root(), &SearchRequest::new("apple", 10))
        .unwrap();
    assert_eq!(outcome.total_hits, 0);
}

#[test]
fn test_lru_eviction_and_reopen() {
    let config = EngineConfig {
        max_concurrent_indexes: 2,
        ..test_config()
    };
    let env = TestEnv::with_config(config);
    let p2 = TempDir::new().unwrap();
    let p3 = TempDir::new().unwrap();

    env.service
        .index_documents(env.root(), &[event("one.rs", "fn workspace_one() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();
    let before = env.service.statistics(env.root()).unwrap().doc_count;
    assert_eq!(before, 1);

    // Make access times distinguishable, then touch P2 and open P3.
    std::thread::sleep(Duration::from_millis(10));
    env.service.initialise(p2.path()).unwrap();
    std::thread::sleep(Duration::from_millis(10));
    env.service.initialise(p3.path()).unwrap();

    // The cap is 2: the LRU context (the first workspace) was evicted.
    assert_eq!(env.service.live_contexts(), 2);

    // statistics() triggers a transparent re-open with the same contents.
    let after = env.service.statistics(env.root()).unwrap().doc_count;
    assert_eq!(after, before);
    assert_eq!(env.service.live_contexts(), 2);
}

#[test]
fn test_inactivity_eviction() {
    let config = EngineConfig {
        inactivity_threshold_minutes: 0,
        ..test_config()
    };
    let env = TestEnv::with_config(config);
    env.service.initialise(env.root()).unwrap();
    assert_eq!(env.service.live_contexts(), 1);

    std::thread::sleep(Duration::from_millis(5));
    let evicted = env.service.evict_idle();
    assert_eq!(evicted, 1);
    assert_eq!(env.service.live_contexts(), 0);
}

#[test]
fn test_leftover_lock_file_does_not_block_reopen() {
    let env = TestEnv::new();
    let outcome = env.service.initialise(env.root()).unwrap();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn survivor() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();
    env.service.shutdown();

    // Simulate a crash that left the writer lock file behind.
    std::fs::write(
        outcome
            .index_path
            .join(codequarry::index::lock::WRITER_LOCK_FILE),
        b"",
    )
    .unwrap();

    let reopened = env.reopened_service();
    let second = reopened.initialise(env.root()).unwrap();
    assert!(!second.is_new);
    assert_eq!(second.doc_count, 1);

    let found = reopened
        .search(env.root(), &SearchRequest::new("survivor", 10))
        .unwrap();
    assert_eq!(found.total_hits, 1);
}

#[test]
fn test_force_rebuild_discards_segments() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn ephemeral() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();
    let index_path = env.service.statistics(env.root()).unwrap();
    assert_eq!(index_path.doc_count, 1);

    let outcome = env.service.force_rebuild(env.root()).unwrap();
    assert!(outcome.is_new);
    assert_eq!(outcome.doc_count, 0);

    // Previous on-disk segments are gone.
    let found = env
        .service
        .search(env.root(), &SearchRequest::new("ephemeral", 10))
        .unwrap();
    assert_eq!(found.total_hits, 0);

    // The rebuilt index accepts new documents.
    env.service
        .index_documents(env.root(), &[event("b.rs", "fn replacement() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();
    let found = env
        .service
        .search(env.root(), &SearchRequest::new("replacement", 10))
        .unwrap();
    assert_eq!(found.total_hits, 1);
}

#[test]
fn test_schema_mismatch_detected_and_fixed_by_rebuild() {
    let env = TestEnv::new();
    let outcome = env.service.initialise(env.root()).unwrap();
    env.service.shutdown();

    // Tamper with the persisted schema: rename a field.
    let meta_path = outcome.index_path.join("meta.json");
    let meta = std::fs::read_to_string(&meta_path).unwrap();
    assert!(meta.contains("term_vectors"));
    std::fs::write(&meta_path, meta.replace("term_vectors", "term_vectors_v0")).unwrap();

    let reopened = env.reopened_service();
    let err = reopened.initialise(env.root()).unwrap_err();
    assert_eq!(err.code(), "SCHEMA_MISMATCH");

    // force_rebuild recovers.
    let rebuilt = reopened.force_rebuild(env.root()).unwrap();
    assert!(rebuilt.is_new);
    assert!(reopened.initialise(env.root()).is_ok());
}

#[test]
fn test_repair_healthy_index_is_noop() {
    let env = TestEnv::new();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn fine() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    let outcome = env
        .service
        .repair(
            env.root(),
            RepairOptions {
                create_backup: false,
                validate_after: true,
            },
        )
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.removed_segments, 0);
    assert_eq!(outcome.lost_documents, 0);

    // The workspace still works after the context bounce.
    let found = env
        .service
        .search(env.root(), &SearchRequest::new("fine", 10))
        .unwrap();
    assert_eq!(found.total_hits, 1);
}

#[test]
fn test_repair_drops_damaged_segments() {
    let env = TestEnv::new();
    let init = env.service.initialise(env.root()).unwrap();
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn doomed() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();
    env.service.shutdown();

    // Truncate every segment file.
    for entry in std::fs::read_dir(&init.index_path).unwrap().flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy().into_owned();
        if name != "meta.json" && !name.starts_with('.') {
            std::fs::write(entry.path(), b"").unwrap();
        }
    }

    let reopened = env.reopened_service();
    let outcome = reopened
        .repair(
            env.root(),
            RepairOptions {
                create_backup: true,
                validate_after: true,
            },
        )
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.removed_segments, 1);
    assert_eq!(outcome.lost_documents, 1);
    assert!(outcome.backup_path.is_some());

    // The repaired index opens empty and accepts new writes.
    assert_eq!(reopened.statistics(env.root()).unwrap().doc_count, 0);
    reopened
        .index_documents(env.root(), &[event("b.rs", "fn recovered() {}\n")])
        .unwrap();
    reopened.commit(env.root()).unwrap();
    assert_eq!(reopened.statistics(env.root()).unwrap().doc_count, 1);
}

#[test]
fn test_optimise_merges_segments() {
    let env = TestEnv::new();
    // Several commits leave several segments behind.
    for i in 0..4 {
        env.service
            .index_documents(
                env.root(),
                &[event(&format!("f{i}.rs"), &format!("fn func_{i}() {{}}\n"))],
            )
            .unwrap();
        env.service.commit(env.root()).unwrap();
    }
    let before = env.service.health(env.root()).unwrap().segment_count;
    assert!(before > 1);

    let after = env.service.optimise(env.root(), 1).unwrap();
    assert_eq!(after, 1);

    // Contents survive the merge.
    let found = env
        .service
        .search(env.root(), &SearchRequest::new("func_2", 10))
        .unwrap();
    assert_eq!(found.total_hits, 1);
}

#[test]
fn test_buffered_doc_cap_triggers_auto_commit() {
    let config = EngineConfig {
        writer_max_buffered_docs: 5,
        ..test_config()
    };
    let env = TestEnv::with_config(config);

    let events: Vec<_> = (0..12)
        .map(|i| event(&format!("f{i}.rs"), &format!("fn buffered_{i}() {{}}\n")))
        .collect();
    let outcome = env.service.index_documents(env.root(), &events).unwrap();

    assert_eq!(outcome.indexed, 12);
    assert_eq!(outcome.auto_commits, 2);

    // The two auto-commits made the first ten documents visible without an
    // explicit commit.
    assert_eq!(env.service.statistics(env.root()).unwrap().doc_count, 10);
    env.service.commit(env.root()).unwrap();
    assert_eq!(env.service.statistics(env.root()).unwrap().doc_count, 12);
}

#[test]
fn test_health_reports_pending_and_lag() {
    let env = TestEnv::new();
    env.service.initialise(env.root()).unwrap();

    env.service
        .index_documents(env.root(), &[event("a.rs", "fn pending() {}\n")])
        .unwrap();
    let health = env.service.health(env.root()).unwrap();
    assert_eq!(health.pending_docs, 1);

    env.service.commit(env.root()).unwrap();
    let health = env.service.health(env.root()).unwrap();
    assert_eq!(health.pending_docs, 0);
    assert_eq!(health.reader_lag(), 0);
    assert_eq!(health.doc_count, 1);
}

#[test]
fn test_eager_refresh_config_still_searches_after_commit() {
    let config = EngineConfig {
        eager_reader_refresh: true,
        ..test_config()
    };
    let env = TestEnv::with_config(config);
    env.service
        .index_documents(env.root(), &[event("a.rs", "fn eager() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();

    // OnCommit reload is asynchronous in tantivy; give it a moment.
    let mut found = 0;
    for _ in 0..50 {
        found = env
            .service
            .search(env.root(), &SearchRequest::new("eager", 10))
            .unwrap()
            .total_hits;
        if found == 1 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(found, 1);
}

#[test]
fn test_in_memory_mode() {
    let config = EngineConfig {
        use_in_memory_directory: true,
        ..test_config()
    };
    let env = TestEnv::with_config(config);
    let outcome = env.service.initialise(env.root()).unwrap();
    assert!(outcome.is_new);

    env.service
        .index_documents(env.root(), &[event("a.rs", "fn volatile() {}\n")])
        .unwrap();
    env.service.commit(env.root()).unwrap();
    let found = env
        .service
        .search(env.root(), &SearchRequest::new("volatile", 10))
        .unwrap();
    assert_eq!(found.total_hits, 1);

    // Nothing was persisted to the base directory.
    assert!(!env.base.path().join(outcome.workspace_hash.as_str()).exists());
}
