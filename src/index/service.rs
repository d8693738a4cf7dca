//! The index service: per-workspace lifecycle, search, and maintenance.
//!
//! One service owns every live [`IndexContext`]. The context map takes
//! cheap read locks on the hot path; creation and eviction serialise on a
//! dedicated slow-path mutex so two callers cannot race the concurrent-
//! index cap. All operations are blocking; the MCP layer bridges them with
//! `spawn_blocking`.

use crate::analysis::AnalyzerSet;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::index::context::{ContextState, IndexContext};
use crate::index::lock;
use crate::index::repair::{repair_index, RepairOptions, RepairOutcome};
use crate::pressure::{MemoryPressure, PressureDirective, ThresholdPressure};
use crate::schema::{DocRecord, DocSchema, StoredDoc};
use crate::search::line_aware::{extract_literal_terms, LineAwareService, LineResult};
use crate::search::type_context::{
    ExtractionRequest, PatternTypeExtractor, TypeContext, TypeExtractor,
};
use crate::search::{snippets, Snippet};
use crate::supplier::FileEvent;
use crate::types::{Ticks, WorkspaceHash};
use crate::workspace::{self, Catalogue};
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tantivy::collector::{Count, TopDocs};
use tantivy::merge_policy::LogMergePolicy;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Term};
use tantivy::{Index, IndexWriter};

/// Outcome of `initialise` and `force_rebuild`.
#[derive(Debug, Clone)]
pub struct InitOutcome {
    pub workspace_hash: WorkspaceHash,
    pub index_path: PathBuf,
    pub is_new: bool,
    pub doc_count: u64,
}

/// Outcome of `index_documents`.
#[derive(Debug, Clone, Default)]
pub struct IndexOutcome {
    pub indexed: usize,
    pub auto_commits: usize,
    pub bytes_seen: u64,
}

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    /// Restrict matching to one field (default: content).
    pub field: Option<String>,
    /// Context radius in lines; `None` disables context.
    pub context_lines: Option<usize>,
    pub include_snippets: bool,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
            field: None,
            context_lines: None,
            include_snippets: false,
        }
    }
}

/// One enriched hit.
#[derive(Debug, Clone)]
pub struct Hit {
    pub score: f32,
    pub doc: StoredDoc,
    pub line: LineResult,
    pub type_context: Option<TypeContext>,
    pub snippets: Vec<Snippet>,
}

/// Outcome of `search`.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub total_hits: usize,
    pub hits: Vec<Hit>,
    pub elapsed_ms: u64,
    pub query_text: String,
}

/// Diagnostic snapshot for `health`.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub workspace_hash: WorkspaceHash,
    pub state: ContextState,
    pub doc_count: u64,
    pub segment_count: usize,
    pub pending_docs: u64,
    pub committed_opstamp: u64,
    pub reader_opstamp: u64,
}

impl HealthReport {
    /// How far the cached reader trails the writer, in opstamps.
    #[must_use]
    pub fn reader_lag(&self) -> u64 {
        self.committed_opstamp.saturating_sub(self.reader_opstamp)
    }
}

/// Diagnostic snapshot for `statistics`.
#[derive(Debug, Clone)]
pub struct IndexStatistics {
    pub workspace_hash: WorkspaceHash,
    pub doc_count: u64,
    pub segment_count: usize,
    pub index_size_bytes: u64,
    pub last_access: Ticks,
}

/// How many extra candidates to fetch for the rescoring pass.
const RESCORE_HEADROOM: usize = 2;
/// Snippets carried per hit before the response layer trims by budget.
const SNIPPETS_PER_HIT: usize = 3;

/// Rough average indexed-document footprint, used to translate the
/// byte-denominated merge cap into tantivy's doc-denominated one.
const APPROX_DOC_BYTES: u64 = 4096;

pub struct IndexService {
    config: EngineConfig,
    base_dir: PathBuf,
    fields: DocSchema,
    analyzers: AnalyzerSet,
    lines: LineAwareService,
    extractor: Arc<dyn TypeExtractor>,
    pressure: Arc<dyn MemoryPressure>,

    contexts: RwLock<AHashMap<String, Arc<IndexContext>>>,
    /// Serialises context creation and eviction (the slow path).
    create_lock: Mutex<()>,
    catalogue: Mutex<Catalogue>,
    stale_locks_removed: AtomicU64,
}

impl IndexService {
    /// Creates a service over the default base directory.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_base_dir(config, workspace::default_base_dir())
    }

    /// Creates a service with an explicit base directory (tests, CLI).
    #[must_use]
    pub fn with_base_dir(config: EngineConfig, base_dir: PathBuf) -> Self {
        let analyzers = AnalyzerSet::new();
        let pressure: Arc<dyn MemoryPressure> = Arc::new(ThresholdPressure::new(
            (config.writer_ram_buffer_mb * 1024.0 * 1024.0) as u64,
        ));
        let catalogue = Catalogue::load(&base_dir);
        if !catalogue.is_empty() {
            tracing::info!(workspaces = catalogue.len(), "catalogue restored");
        }

        Self {
            lines: LineAwareService::new(analyzers.clone(), config.line_cache_entries),
            fields: DocSchema::build(),
            analyzers,
            extractor: Arc::new(PatternTypeExtractor),
            pressure,
            contexts: RwLock::new(AHashMap::new()),
            create_lock: Mutex::new(()),
            catalogue: Mutex::new(catalogue),
            stale_locks_removed: AtomicU64::new(0),
            base_dir,
            config,
        }
    }

    /// Overrides the memory-pressure collaborator.
    pub fn set_pressure(&mut self, pressure: Arc<dyn MemoryPressure>) {
        self.pressure = pressure;
    }

    /// Overrides the type-extraction collaborator.
    pub fn set_extractor(&mut self, extractor: Arc<dyn TypeExtractor>) {
        self.extractor = extractor;
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Stale writer locks removed over this service's lifetime.
    #[must_use]
    pub fn stale_locks_removed(&self) -> u64 {
        self.stale_locks_removed.load(Ordering::Relaxed)
    }

    /// Workspaces known to the catalogue (hash, canonical path).
    #[must_use]
    pub fn known_workspaces(&self) -> Vec<(String, String)> {
        let catalogue = self.catalogue.lock().unwrap_or_else(|e| e.into_inner());
        catalogue
            .iter()
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .collect()
    }

    /// Number of live contexts.
    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.read_contexts().len()
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Initialises (or re-opens) the index for a workspace.
    pub fn initialise(&self, root: &Path) -> Result<InitOutcome> {
        let (ctx, is_new) = self.acquire(root, true)?;
        Ok(InitOutcome {
            workspace_hash: ctx.hash().clone(),
            index_path: ctx.index_path().to_path_buf(),
            is_new,
            doc_count: ctx.doc_count(),
        })
    }

    /// Upserts documents by their `path` field.
    ///
    /// Reports RAM pressure after every document; a `FlushAndReduce`
    /// directive (or crossing the buffered-doc cap) triggers a commit.
    pub fn index_documents(&self, root: &Path, events: &[FileEvent]) -> Result<IndexOutcome> {
        let (ctx, _) = self.acquire(root, true)?;
        let mut writer = ctx.lock_writer(self.config.writer_lock_timeout())?;

        let mut outcome = IndexOutcome::default();
        for event in events {
            writer.delete_term(Term::from_field_text(self.fields.path, &event.relative_path));

            let type_info_json = self
                .extractor
                .extract(&ExtractionRequest {
                    path: &event.relative_path,
                    language: event.language.as_deref(),
                    content: &event.content,
                })
                .and_then(|info| info.to_json());

            let rec = DocRecord {
                relative_path: &event.relative_path,
                content: &event.content,
                modified: event.modified,
                size: event.size,
                language: event.language.as_deref(),
                type_info_json,
            };
            let doc = self.fields.make_document(
                &rec,
                self.analyzers.content(),
                self.config.stored_field_cap_bytes(),
            )?;
            writer.add_document(doc)?;

            outcome.indexed += 1;
            outcome.bytes_seen += event.content.len() as u64;
            let pending = ctx.note_added(1);

            let flush_requested =
                self.pressure.report(outcome.bytes_seen) == PressureDirective::FlushAndReduce;
            if pending >= self.config.writer_max_buffered_docs as u64 || flush_requested {
                ctx.commit_with(&mut writer)?;
                outcome.auto_commits += 1;
            }
        }
        ctx.touch();
        Ok(outcome)
    }

    /// Deletes one document by its workspace-relative path.
    pub fn delete_document(&self, root: &Path, relative_path: &str) -> Result<()> {
        let (ctx, _) = self.acquire(root, false)?;
        let writer = ctx.lock_writer(self.config.writer_lock_timeout())?;
        writer.delete_term(Term::from_field_text(self.fields.path, relative_path));
        drop(writer);
        ctx.touch();
        Ok(())
    }

    /// Flushes the writer and refreshes the reader.
    pub fn commit(&self, root: &Path) -> Result<u64> {
        let (ctx, _) = self.acquire(root, false)?;
        let mut writer = ctx.lock_writer(self.config.writer_lock_timeout())?;
        ctx.commit_with(&mut writer)
    }

    /// Deletes every document and commits.
    pub fn clear(&self, root: &Path) -> Result<()> {
        let (ctx, _) = self.acquire(root, false)?;
        let mut writer = ctx.lock_writer(self.config.writer_lock_timeout())?;
        writer.delete_all_documents()?;
        ctx.commit_with(&mut writer)?;
        Ok(())
    }

    /// Disposes the context, wipes the on-disk index, and re-creates it
    /// with the current schema. Required after any schema change.
    pub fn force_rebuild(&self, root: &Path) -> Result<InitOutcome> {
        let resolved = workspace::resolve(root, &self.base_dir)?;
        let hash = self.catalogue_hash(&resolved);

        self.remove_context(hash.as_str());
        if !self.config.use_in_memory_directory && resolved.index_path.exists() {
            std::fs::remove_dir_all(&resolved.index_path)?;
        }

        let (ctx, _) = self.acquire(root, true)?;
        Ok(InitOutcome {
            workspace_hash: ctx.hash().clone(),
            index_path: ctx.index_path().to_path_buf(),
            is_new: true,
            doc_count: ctx.doc_count(),
        })
    }

    /// Runs check-and-fix on a workspace's index directory.
    ///
    /// The live context is disposed first so the writer lock is free; on a
    /// successful repair the next operation re-opens the index.
    pub fn repair(&self, root: &Path, options: RepairOptions) -> Result<RepairOutcome> {
        let resolved = workspace::resolve(root, &self.base_dir)?;
        if self.config.use_in_memory_directory {
            return Err(EngineError::Tool(
                "repair is meaningless for in-memory indexes; use rebuild".into(),
            ));
        }
        let hash = self.catalogue_hash(&resolved);
        self.remove_context(hash.as_str());

        let outcome = repair_index(&resolved.index_path, options)?;
        if outcome.success {
            tracing::info!(
                workspace = %hash,
                removed = outcome.removed_segments,
                lost = outcome.lost_documents,
                "repair complete"
            );
        }
        Ok(outcome)
    }

    /// Force-merges down to at most `max_segments` segments.
    ///
    /// Returns the resulting segment count.
    pub fn optimise(&self, root: &Path, max_segments: usize) -> Result<usize> {
        let (ctx, _) = self.acquire(root, false)?;
        let metas = ctx.index().searchable_segment_metas()?;
        if metas.len() <= max_segments.max(1) {
            return Ok(metas.len());
        }

        let ids: Vec<_> = metas.iter().map(|m| m.id()).collect();
        let mut writer = ctx.lock_writer(self.config.writer_lock_timeout())?;
        writer.merge(&ids).wait()?;
        writer.garbage_collect_files().wait()?;
        ctx.commit_with(&mut writer)?;
        drop(writer);

        Ok(ctx.index().searchable_segment_metas()?.len())
    }

    // ── search ──────────────────────────────────────────────────────────────

    /// Runs a query and returns enriched, rescored, deterministic hits.
    pub fn search(&self, root: &Path, request: &SearchRequest) -> Result<SearchOutcome> {
        let started = Instant::now();
        let (ctx, _) = self.acquire(root, false)?;
        let searcher = ctx.searcher()?;

        let default_field = self.field_for(request.field.as_deref())?;
        let parser = QueryParser::for_index(ctx.index(), vec![default_field]);
        let query = parser.parse_query(&request.query)?;

        let fetch = request
            .max_results
            .saturating_mul(RESCORE_HEADROOM)
            .clamp(1, 1000);
        let (top, total_hits) = searcher.search(&query, &(TopDocs::with_limit(fetch), Count))?;

        let literals = extract_literal_terms(&request.query);
        let now = Ticks::now();
        let workspace_key = ctx.hash().as_str().to_string();

        let mut hits = Vec::with_capacity(top.len());
        for (raw_score, address) in top {
            let doc = searcher.doc(address)?;
            let stored = self.fields.read_document(&doc)?;

            let line = self.lines.locate(
                &workspace_key,
                &stored,
                &request.query,
                request.context_lines,
            );
            let type_context =
                crate::search::type_context::resolve(stored.type_info.as_deref(), line.line_number);

            let snippet_list = if request.include_snippets {
                stored
                    .content
                    .as_deref()
                    .map(|content| {
                        snippets::extract(content, &stored.line_starts, &literals, SNIPPETS_PER_HIT)
                    })
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            let score = raw_score * rescore_factor(&stored, type_context.is_some(), &literals, now);
            hits.push(Hit {
                score,
                doc: stored,
                line,
                type_context,
                snippets: snippet_list,
            });
        }

        // Descending score; ties break on ascending path for determinism.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc.path.cmp(&b.doc.path))
        });
        hits.truncate(request.max_results);

        Ok(SearchOutcome {
            total_hits,
            hits,
            elapsed_ms: started.elapsed().as_millis() as u64,
            query_text: request.query.clone(),
        })
    }

    // ── diagnostics ─────────────────────────────────────────────────────────

    pub fn health(&self, root: &Path) -> Result<HealthReport> {
        let (ctx, _) = self.acquire(root, false)?;
        Ok(HealthReport {
            workspace_hash: ctx.hash().clone(),
            state: ctx.state(),
            doc_count: ctx.doc_count(),
            segment_count: ctx.index().searchable_segment_metas()?.len(),
            pending_docs: ctx.pending_docs(),
            committed_opstamp: ctx.committed_opstamp(),
            reader_opstamp: ctx.reader_opstamp(),
        })
    }

    pub fn statistics(&self, root: &Path) -> Result<IndexStatistics> {
        let (ctx, _) = self.acquire(root, false)?;
        let index_size_bytes = if ctx.is_in_memory() {
            0
        } else {
            dir_size(ctx.index_path())
        };
        Ok(IndexStatistics {
            workspace_hash: ctx.hash().clone(),
            doc_count: ctx.doc_count(),
            segment_count: ctx.index().searchable_segment_metas()?.len(),
            index_size_bytes,
            last_access: ctx.last_access(),
        })
    }

    // ── eviction & shutdown ─────────────────────────────────────────────────

    /// Evicts every context idle past the inactivity threshold.
    ///
    /// Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let threshold = self.config.inactivity_threshold();
        let now = Ticks::now();
        let victims: Vec<Arc<IndexContext>> = {
            let _slow = self.create_lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut map = self.write_contexts();
            let keys: Vec<String> = map
                .iter()
                .filter(|(_, ctx)| {
                    ctx.last_access().elapsed_until(now) >= threshold.as_millis() as u64
                })
                .map(|(k, _)| k.clone())
                .collect();
            keys.iter().filter_map(|k| map.remove(k)).collect()
        };

        for ctx in &victims {
            tracing::info!(workspace = %ctx.hash(), "evicting idle context");
            ctx.dispose(self.config.dispose_timeout());
        }
        victims.len()
    }

    /// Disposes every context (process shutdown).
    pub fn shutdown(&self) {
        let victims: Vec<Arc<IndexContext>> = {
            let mut map = self.write_contexts();
            map.drain().map(|(_, ctx)| ctx).collect()
        };
        for ctx in victims {
            ctx.dispose(self.config.dispose_timeout());
        }
    }

    /// Spawns the periodic inactivity sweeper.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let svc = Arc::clone(&service);
                let evicted = tokio::task::spawn_blocking(move || svc.evict_idle())
                    .await
                    .unwrap_or(0);
                if evicted > 0 {
                    tracing::debug!(evicted, "inactivity sweep");
                }
            }
        })
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn read_contexts(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, AHashMap<String, Arc<IndexContext>>> {
        self.contexts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_contexts(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, AHashMap<String, Arc<IndexContext>>> {
        self.contexts.write().unwrap_or_else(|e| e.into_inner())
    }

    fn remove_context(&self, hash: &str) {
        let removed = {
            let _slow = self.create_lock.lock().unwrap_or_else(|e| e.into_inner());
            self.write_contexts().remove(hash)
        };
        if let Some(ctx) = removed {
            ctx.dispose(self.config.dispose_timeout());
        }
    }

    /// Registers in the catalogue and returns the (possibly widened) hash.
    ///
    /// Already-registered workspaces resolve without touching the file.
    fn catalogue_hash(&self, resolved: &workspace::ResolvedWorkspace) -> WorkspaceHash {
        let mut catalogue = self.catalogue.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hash) = catalogue.resolve_hash(resolved) {
            return hash;
        }
        let hash = catalogue.register(resolved);
        if !self.config.use_in_memory_directory {
            if let Err(e) = catalogue.save(&self.base_dir) {
                tracing::warn!(error = %e, "catalogue save failed");
            }
        }
        hash
    }

    /// Looks up or creates the context for a workspace.
    ///
    /// With `create = false`, a workspace with no live context and no
    /// on-disk index surfaces `IndexMissing`. Returns the context and
    /// whether a brand-new index was created.
    fn acquire(&self, root: &Path, create: bool) -> Result<(Arc<IndexContext>, bool)> {
        let resolved = workspace::resolve(root, &self.base_dir)?;
        let hash = self.catalogue_hash(&resolved);

        if let Some(ctx) = self.read_contexts().get(hash.as_str()) {
            ctx.touch();
            return Ok((Arc::clone(ctx), false));
        }

        // Slow path: serialise creation and eviction.
        let _slow = self.create_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ctx) = self.read_contexts().get(hash.as_str()) {
            ctx.touch();
            return Ok((Arc::clone(ctx), false));
        }

        let index_path = self.base_dir.join(hash.as_str());
        let on_disk = !self.config.use_in_memory_directory && index_path.join("meta.json").exists();
        if !create && !on_disk {
            return Err(EngineError::IndexMissing {
                workspace: resolved.root.clone(),
            });
        }

        self.evict_for_capacity()?;

        let (index, is_new) = self.open_index(&index_path, on_disk)?;
        self.analyzers.register(&index);
        let writer = self.open_writer_with_recovery(&index, &index_path)?;

        let ctx = Arc::new(IndexContext::new(
            hash.clone(),
            resolved.root,
            index_path,
            index,
            writer,
            &self.config,
        )?);
        self.write_contexts().insert(hash.as_str().to_string(), Arc::clone(&ctx));
        tracing::info!(workspace = %hash, is_new, "context opened");
        Ok((ctx, is_new))
    }

    /// Makes room for one more context. Caller holds the slow-path lock.
    fn evict_for_capacity(&self) -> Result<()> {
        if self.config.max_concurrent_indexes == 0 {
            return Err(EngineError::ResourceExhausted);
        }
        loop {
            let victim = {
                let map = self.read_contexts();
                if map.len() < self.config.max_concurrent_indexes {
                    return Ok(());
                }
                map.iter()
                    .min_by_key(|(_, ctx)| ctx.last_access())
                    .map(|(k, _)| k.clone())
            };
            let Some(key) = victim else {
                return Err(EngineError::ResourceExhausted);
            };
            let removed = self.write_contexts().remove(&key);
            if let Some(ctx) = removed {
                tracing::info!(workspace = %ctx.hash(), "evicting LRU context at capacity");
                ctx.dispose(self.config.dispose_timeout());
            }
        }
    }

    fn open_index(&self, index_path: &Path, on_disk: bool) -> Result<(Index, bool)> {
        if self.config.use_in_memory_directory {
            return Ok((Index::create_in_ram(self.fields.schema()), true));
        }

        if on_disk {
            let index = Index::open_in_dir(index_path)?;
            if !self.fields.matches(&index.schema()) {
                return Err(EngineError::SchemaMismatch);
            }
            Ok((index, false))
        } else {
            std::fs::create_dir_all(index_path)?;
            let index = Index::create_in_dir(index_path, self.fields.schema())?;
            Ok((index, true))
        }
    }

    /// Opens the writer, recovering from a stale lock exactly once.
    fn open_writer_with_recovery(&self, index: &Index, index_path: &Path) -> Result<IndexWriter> {
        match self.open_writer(index) {
            Ok(writer) => Ok(writer),
            Err(first_err) if lock::is_lock_error(&first_err) => {
                let probe = lock::probe(index_path)?;
                tracing::warn!(
                    path = %index_path.display(),
                    age = ?probe.age,
                    "writer lock obtain failed; attempting stale-lock removal"
                );
                if lock::force_remove(index_path)? {
                    self.stale_locks_removed.fetch_add(1, Ordering::Relaxed);
                    self.open_writer(index).map_err(|e| EngineError::IndexUnavailable {
                        index_path: index_path.to_path_buf(),
                        reason: format!("writer still locked after stale-lock removal: {e}"),
                    })
                } else {
                    Err(EngineError::IndexUnavailable {
                        index_path: index_path.to_path_buf(),
                        reason: first_err.to_string(),
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_writer(&self, index: &Index) -> tantivy::Result<IndexWriter> {
        let writer = index.writer_with_num_threads(1, self.config.writer_heap_bytes())?;
        let merge = &self.config.merge_policy;
        let mut policy = LogMergePolicy::default();
        policy.set_min_num_segments(merge.max_merge_at_once);
        // tantivy's log policy caps by document count, not bytes; translate
        // with the average indexed-document footprint.
        let max_docs = (merge.max_merged_segment_mb * 1024.0 * 1024.0) as u64 / APPROX_DOC_BYTES;
        policy.set_max_docs_before_merge(max_docs.max(1) as usize);
        policy.set_level_log_size(merge.segments_per_tier.max(1.0).log10());
        writer.set_merge_policy(Box::new(policy));
        Ok(writer)
    }

    fn field_for(&self, name: Option<&str>) -> Result<Field> {
        match name.unwrap_or("content") {
            "content" => Ok(self.fields.content),
            "filename" => Ok(self.fields.filename),
            "path" => Ok(self.fields.path),
            "directory" => Ok(self.fields.directory),
            "extension" => Ok(self.fields.extension),
            "language" => Ok(self.fields.language),
            other => Err(EngineError::QueryParse(format!(
                "unknown field '{other}'; valid fields: content, filename, path, directory, extension, language"
            ))),
        }
    }
}

/// Multi-factor rescoring: recency, filename match, type proximity.
fn rescore_factor(doc: &StoredDoc, has_type_context: bool, literals: &[String], now: Ticks) -> f32 {
    let mut factor = 1.0f32;

    let filename = doc.filename.to_lowercase();
    if literals.iter().any(|t| filename.contains(t.as_str())) {
        factor *= 1.25;
    }

    let age_days = doc.modified.elapsed_until(now) / 86_400_000;
    if doc.modified.as_u64() > 0 {
        if age_days <= 7 {
            factor *= 1.15;
        } else if age_days <= 30 {
            factor *= 1.05;
        }
    }

    if has_type_context {
        factor *= 1.05;
    }
    factor
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

// Compile-time assertions for thread safety.
// These ensure Send+Sync remain implemented and catch regressions.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<IndexService>();
    assert_send_sync::<SearchOutcome>();
    assert_send_sync::<Hit>();
};
