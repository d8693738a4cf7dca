//! Per-workspace index context.
//!
//! Bundles everything one live workspace needs: the tantivy index handle,
//! the mutex-guarded writer, the cached reader, and the access bookkeeping
//! the eviction policies run on. The context never reaches back into the
//! service; it only carries the configuration values it needs.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::types::{Ticks, WorkspaceHash};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, TryLockError};
use std::time::{Duration, Instant};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher};

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Open,
    /// Corruption was detected; searches fail until `repair()` runs.
    NeedsRepair,
}

/// In-memory handle for one workspace's index.
pub struct IndexContext {
    hash: WorkspaceHash,
    root: PathBuf,
    index_path: PathBuf,
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    state: RwLock<ContextState>,
    eager_refresh: bool,
    in_memory: bool,

    last_access: AtomicU64,
    /// Documents added since the last commit (soft-flush trigger).
    pending_docs: AtomicU64,
    /// Opstamp of the last successful commit.
    committed_opstamp: AtomicU64,
    /// Opstamp the cached reader has observed.
    reader_opstamp: AtomicU64,
}

impl IndexContext {
    /// Wraps an opened index and writer into a live context.
    ///
    /// # Errors
    ///
    /// Fails if the reader cannot be opened.
    pub fn new(
        hash: WorkspaceHash,
        root: PathBuf,
        index_path: PathBuf,
        index: Index,
        writer: IndexWriter,
        config: &EngineConfig,
    ) -> Result<Self> {
        let policy = if config.eager_reader_refresh {
            ReloadPolicy::OnCommit
        } else {
            ReloadPolicy::Manual
        };
        let reader: IndexReader = index.reader_builder().reload_policy(policy).try_into()?;

        Ok(Self {
            hash,
            root,
            index_path,
            index,
            writer: Mutex::new(writer),
            reader,
            state: RwLock::new(ContextState::Open),
            eager_refresh: config.eager_reader_refresh,
            in_memory: config.use_in_memory_directory,
            last_access: AtomicU64::new(Ticks::now().as_u64()),
            pending_docs: AtomicU64::new(0),
            committed_opstamp: AtomicU64::new(0),
            reader_opstamp: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn hash(&self) -> &WorkspaceHash {
        &self.hash
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Bumps the access stamp. Called on every externally visible operation.
    pub fn touch(&self) {
        self.last_access.store(Ticks::now().as_u64(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn last_access(&self) -> Ticks {
        Ticks::new(self.last_access.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Flags the context corrupt; searches fail until repair.
    pub fn mark_needs_repair(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = ContextState::NeedsRepair;
    }

    /// Clears the repair flag after a successful repair.
    pub fn mark_repaired(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = ContextState::Open;
    }

    /// Acquires the writer with a deadline.
    ///
    /// Lock poisoning is recovered: the writer itself stays consistent
    /// because tantivy serialises commits internally.
    ///
    /// # Errors
    ///
    /// `EngineError::Timeout` when the deadline passes.
    pub fn lock_writer(&self, budget: Duration) -> Result<MutexGuard<'_, IndexWriter>> {
        let deadline = Instant::now() + budget;
        loop {
            match self.writer.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(EngineError::Timeout {
                            operation: "writer lock",
                            budget_ms: budget.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }

    /// Commits through an already-held writer guard and refreshes the reader.
    ///
    /// Reader reload is synchronous with the commit, so the next search on
    /// this context observes the committed state.
    ///
    /// # Errors
    ///
    /// Propagates commit or reload failures.
    pub fn commit_with(&self, writer: &mut IndexWriter) -> Result<u64> {
        let opstamp = writer.commit()?;
        self.committed_opstamp.store(opstamp, Ordering::Release);
        self.pending_docs.store(0, Ordering::Relaxed);
        if !self.eager_refresh {
            self.reader.reload()?;
        }
        self.reader_opstamp.store(opstamp, Ordering::Release);
        self.touch();
        Ok(opstamp)
    }

    /// Returns a searcher over the last committed state.
    ///
    /// # Errors
    ///
    /// `EngineError::IndexCorrupt` while the context needs repair.
    pub fn searcher(&self) -> Result<Searcher> {
        if self.state() == ContextState::NeedsRepair {
            return Err(EngineError::IndexCorrupt {
                detail: format!("workspace {} is flagged for repair", self.hash),
            });
        }
        self.touch();
        Ok(self.reader.searcher())
    }

    /// Records `n` freshly added documents; returns the new pending total.
    pub fn note_added(&self, n: u64) -> u64 {
        self.pending_docs.fetch_add(n, Ordering::Relaxed) + n
    }

    #[must_use]
    pub fn pending_docs(&self) -> u64 {
        self.pending_docs.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn committed_opstamp(&self) -> u64 {
        self.committed_opstamp.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn reader_opstamp(&self) -> u64 {
        self.reader_opstamp.load(Ordering::Acquire)
    }

    /// Documents visible to the cached reader.
    #[must_use]
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Best-effort final commit before the context is dropped.
    ///
    /// Failures never propagate: shutdown and eviction must always
    /// complete. A writer that cannot be acquired within the budget is
    /// abandoned with a warning; its uncommitted documents are lost.
    pub fn dispose(&self, budget: Duration) {
        match self.lock_writer(budget) {
            Ok(mut writer) => {
                if self.pending_docs() > 0 {
                    if let Err(e) = self.commit_with(&mut writer) {
                        tracing::warn!(
                            workspace = %self.hash,
                            error = %e,
                            "commit-on-dispose failed; uncommitted documents lost"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(workspace = %self.hash, error = %e, "forced disposal without final commit");
            }
        }
        tracing::debug!(workspace = %self.hash, "context disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalyzerSet;
    use crate::schema::DocSchema;

    fn ram_context(config: &EngineConfig) -> IndexContext {
        let fields = DocSchema::build();
        let index = Index::create_in_ram(fields.schema());
        AnalyzerSet::new().register(&index);
        let writer = index.writer_with_num_threads(1, 16 * 1024 * 1024).unwrap();
        IndexContext::new(
            WorkspaceHash::new("cafebabe00000000"),
            PathBuf::from("/tmp/w"),
            PathBuf::from("/tmp/idx"),
            index,
            writer,
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_touch_advances_last_access() {
        let ctx = ram_context(&EngineConfig::default());
        let before = ctx.last_access();
        std::thread::sleep(Duration::from_millis(5));
        ctx.touch();
        assert!(ctx.last_access() >= before);
    }

    #[test]
    fn test_needs_repair_blocks_search() {
        let ctx = ram_context(&EngineConfig::default());
        assert!(ctx.searcher().is_ok());

        ctx.mark_needs_repair();
        let err = ctx.searcher().unwrap_err();
        assert_eq!(err.code(), "INDEX_CORRUPT");

        ctx.mark_repaired();
        assert!(ctx.searcher().is_ok());
    }

    #[test]
    fn test_writer_lock_timeout() {
        let ctx = ram_context(&EngineConfig::default());
        let _held = ctx.lock_writer(Duration::from_secs(1)).unwrap();

        let err = match ctx.lock_writer(Duration::from_millis(30)) {
            Ok(_) => panic!("expected lock_writer to time out"),
            Err(e) => e,
        };
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn test_commit_updates_opstamps_and_pending() {
        let ctx = ram_context(&EngineConfig::default());
        ctx.note_added(3);
        assert_eq!(ctx.pending_docs(), 3);

        let mut writer = ctx.lock_writer(Duration::from_secs(1)).unwrap();
        let opstamp = ctx.commit_with(&mut writer).unwrap();
        drop(writer);

        assert_eq!(ctx.pending_docs(), 0);
        assert_eq!(ctx.committed_opstamp(), opstamp);
        assert_eq!(ctx.reader_opstamp(), opstamp);
    }
}
