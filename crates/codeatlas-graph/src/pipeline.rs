use crate::cascade::{CallerCountCache, CascadeQueueBuilder};
use crate::reindex::BatchReindexer;
use crate::repair::EdgeRepairer;
use codeatlas_cache::{CacheInvalidator, InvalidationReport};
use codeatlas_core::{
    CacheStore, ChangeType, ChangedFile, CodeAtlasError, EntityChurn, EntityId, EntityKind,
    GraphStore, IndexingConfig, RepairReport, Result, Scope, VectorIndex,
};
use codeatlas_git::{DiffComputer, DiffOutcome};
use codeatlas_parser::PluginRegistry;
use codeatlas_vector::EmbeddingUpdater;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Counts-only result of one indexing cycle; bulk payloads stay in the
/// stores the stages wrote them to.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Set when the before-revision vanished from history; the orchestrator
    /// must schedule a full rescan instead of trusting this cycle.
    pub full_rescan_required: Option<String>,
    pub files_changed: usize,
    pub entities_written: usize,
    pub edges_written: usize,
    pub files_quarantined: usize,
    pub repair: RepairReport,
    pub rejustify_queued: usize,
    pub cascade_queued: usize,
    pub embeddings_updated: usize,
    pub cache: InvalidationReport,
}

/// In-process composition of the engine stages. The orchestrator may call
/// the stages individually with the same semantics; each is idempotent, so
/// at-least-once retries are safe.
pub struct IndexingPipeline {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorIndex>,
    cache: Arc<dyn CacheStore>,
    registry: Arc<PluginRegistry>,
    caller_cache: Arc<CallerCountCache>,
    config: IndexingConfig,
}

impl IndexingPipeline {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorIndex>,
        cache: Arc<dyn CacheStore>,
        config: IndexingConfig,
    ) -> Self {
        Self {
            graph,
            vector,
            cache,
            registry: Arc::new(PluginRegistry::with_default_plugins()),
            caller_cache: Arc::new(CallerCountCache::new()),
            config,
        }
    }

    /// Diff two revisions and run one incremental cycle over the result.
    pub async fn run(
        &self,
        scope: &Scope,
        workspace: &Path,
        before: &str,
        after: &str,
    ) -> Result<RunSummary> {
        let computer =
            DiffComputer::open(workspace).map_err(|e| CodeAtlasError::Git(e.to_string()))?;
        let changes = match computer
            .diff(before, after)
            .map_err(|e| CodeAtlasError::Git(e.to_string()))?
        {
            DiffOutcome::Changes(changes) => changes,
            DiffOutcome::FullRescanRequired { missing_revision } => {
                warn!(
                    revision = %missing_revision,
                    "diff base unresolvable, surfacing full-rescan signal"
                );
                return Ok(RunSummary {
                    full_rescan_required: Some(missing_revision),
                    ..RunSummary::default()
                });
            }
        };
        self.run_with_changes(scope, workspace, &changes).await
    }

    /// One incremental cycle over an already-computed changed-file list.
    pub async fn run_with_changes(
        &self,
        scope: &Scope,
        workspace: &Path,
        changes: &[ChangedFile],
    ) -> Result<RunSummary> {
        let to_index: Vec<String> = changes
            .iter()
            .filter(|c| c.change_type != ChangeType::Removed)
            .map(|c| c.path.clone())
            .collect();
        let removed: Vec<String> = changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Removed)
            .map(|c| c.path.clone())
            .collect();

        // Snapshot the prior entity set of every touched file; churn is the
        // difference against what the batch writes.
        let mut prior: HashMap<String, Vec<(EntityId, EntityKind)>> = HashMap::new();
        for path in to_index.iter().chain(removed.iter()) {
            let entities = self.graph.get_entities_by_file(scope, path).await?;
            prior.insert(
                path.clone(),
                entities.into_iter().map(|e| (e.id, e.kind)).collect(),
            );
        }

        let reindexer = BatchReindexer::new(self.registry.clone(), &self.config);
        let report = reindexer
            .reindex(scope, self.graph.as_ref(), workspace, &to_index)
            .await?;

        let new_ids: HashSet<&EntityId> = report.entity_ids.iter().collect();
        let quarantined_paths: HashSet<&str> = report
            .quarantined
            .iter()
            .map(|q| q.file_path.as_str())
            .collect();

        let mut churn = EntityChurn::default();
        for id in &report.entity_ids {
            let previously_known = prior
                .values()
                .flatten()
                .any(|(prior_id, _)| prior_id == id);
            if previously_known {
                churn.updated.push(id.clone());
            } else {
                churn.added.push(id.clone());
            }
        }
        let removed_paths: HashSet<&str> = removed.iter().map(|p| p.as_str()).collect();
        for (path, entities) in &prior {
            // A file that is quarantined this cycle keeps its prior entities:
            // the graph state stays whatever the last good parse produced.
            if quarantined_paths.contains(path.as_str()) {
                continue;
            }
            for (id, kind) in entities {
                if new_ids.contains(id) {
                    continue;
                }
                // A placeholder outlives re-indexing attempts of a file that
                // is still quarantined, but goes down with the file itself.
                if *kind == EntityKind::QuarantinePlaceholder
                    && !removed_paths.contains(path.as_str())
                {
                    continue;
                }
                churn.deleted.push(id.clone());
            }
        }

        // Repair runs first so doomed entities are still readable, then the
        // stale entities go; the dangling window closes within this batch.
        let repair = EdgeRepairer::new()
            .repair(scope, self.graph.as_ref(), &churn)
            .await?;
        if !churn.deleted.is_empty() {
            self.graph
                .batch_delete_entities(scope, &churn.deleted)
                .await?;
        }

        let mut changed_for_cascade = churn.added.clone();
        changed_for_cascade.extend(churn.updated.iter().cloned());
        let queues = CascadeQueueBuilder::new(self.caller_cache.clone(), self.config.cascade.clone())
            .build(scope, self.graph.as_ref(), &changed_for_cascade)
            .await?;

        let embeddings_updated = if queues.is_empty() {
            // Nothing to recompute is a skip, not an error.
            0
        } else {
            let mut merged = queues.rejustify.clone();
            merged.extend(queues.cascade.iter().cloned());
            EmbeddingUpdater::new(self.vector.clone(), self.config.embedding.clone())
                .update(scope, self.graph.as_ref(), &merged)
                .await?
                .embeddings_updated
        };

        let cache = CacheInvalidator::new(self.cache.clone())
            .invalidate(&scope.organization_id, &scope.repository_id)
            .await;

        let summary = RunSummary {
            full_rescan_required: None,
            files_changed: changes.len(),
            entities_written: report.entity_count,
            edges_written: report.edge_count,
            files_quarantined: report.quarantined.len(),
            repair,
            rejustify_queued: queues.rejustify.len(),
            cascade_queued: queues.cascade.len(),
            embeddings_updated,
            cache,
        };
        info!(
            files = summary.files_changed,
            entities = summary.entities_written,
            edges = summary.edges_written,
            quarantined = summary.files_quarantined,
            rejustify = summary.rejustify_queued,
            cascade = summary.cascade_queued,
            "indexing cycle complete"
        );
        Ok(summary)
    }
}
