use crate::quarantine::{ParseOutcome, QuarantineManager};
use codeatlas_core::{
    Edge, EdgeKind, Entity, EntityKind, GraphStore, IndexEvent, IndexingConfig, QuarantineRecord,
    ReindexReport, Result, Scope,
};
use codeatlas_parser::{FileInput, ParsedFile, PluginRegistry};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

enum FileOutcome {
    /// No plugin covers the extension; the file still appears in listings
    /// but is excluded from quarantine accounting.
    Unsupported { file_entity: Entity },
    Parsed {
        path: String,
        file_entity: Entity,
        parsed: ParsedFile,
    },
    Quarantined {
        record: QuarantineRecord,
        placeholder: Entity,
    },
    Missing,
}

/// Parses a changed-file batch and writes the results to the graph store in
/// one place. Only ids and counts leave this stage; bulk payloads never
/// cross the orchestration boundary twice. Prior entities of a re-indexed
/// file are left in place. Reconciliation owns deletion, which keeps this
/// stage idempotent under partial retries.
pub struct BatchReindexer {
    registry: Arc<PluginRegistry>,
    quarantine: QuarantineManager,
}

impl BatchReindexer {
    pub fn new(registry: Arc<PluginRegistry>, config: &IndexingConfig) -> Self {
        Self {
            registry,
            quarantine: QuarantineManager::new(&config.quarantine),
        }
    }

    pub async fn reindex(
        &self,
        scope: &Scope,
        graph: &dyn GraphStore,
        workspace: &Path,
        paths: &[String],
    ) -> Result<ReindexReport> {
        // Independent files, no shared mutable state: parse in parallel.
        let outcomes: Vec<FileOutcome> = paths
            .par_iter()
            .map(|path| self.index_one(scope, workspace, path))
            .collect();

        let mut entities = Vec::new();
        let mut edges = Vec::new();
        let mut unresolved = Vec::new();
        let mut quarantined = Vec::new();
        let mut healable = Vec::new();
        let mut entity_ids = Vec::new();

        for outcome in outcomes {
            match outcome {
                FileOutcome::Unsupported { file_entity } => {
                    entity_ids.push(file_entity.id.clone());
                    entities.push(file_entity);
                }
                FileOutcome::Parsed {
                    path,
                    file_entity,
                    parsed,
                } => {
                    let file_id = file_entity.id.clone();
                    entity_ids.push(file_id.clone());
                    entities.push(file_entity);
                    for child in parsed.entities {
                        edges.push(Edge::new(
                            file_id.clone(),
                            child.id.clone(),
                            EdgeKind::Contains,
                        ));
                        entity_ids.push(child.id.clone());
                        entities.push(child);
                    }
                    edges.extend(parsed.edges);
                    unresolved.extend(parsed.unresolved_refs);
                    healable.push(path);
                }
                FileOutcome::Quarantined {
                    record,
                    placeholder,
                } => {
                    entities.push(placeholder);
                    quarantined.push(record);
                }
                FileOutcome::Missing => {}
            }
        }

        let entity_count = entity_ids.len();
        let edge_count = edges.len();

        graph.bulk_upsert_entities(scope, entities).await?;
        graph.bulk_upsert_edges(scope, edges).await?;
        if !unresolved.is_empty() {
            graph.park_unresolved_refs(scope, unresolved).await?;
        }
        for path in &healable {
            self.quarantine.heal(scope, graph, path).await?;
        }
        graph
            .insert_index_event(
                scope,
                IndexEvent {
                    occurred_at: chrono::Utc::now(),
                    files_indexed: paths.len(),
                    entities_written: entity_count,
                    edges_written: edge_count,
                    files_quarantined: quarantined.len(),
                },
            )
            .await?;

        info!(
            files = paths.len(),
            entities = entity_count,
            edges = edge_count,
            quarantined = quarantined.len(),
            "batch reindex complete"
        );
        Ok(ReindexReport {
            entity_ids,
            entity_count,
            edge_count,
            quarantined,
        })
    }

    fn index_one(&self, scope: &Scope, workspace: &Path, path: &str) -> FileOutcome {
        let file_entity = Entity::new(scope, EntityKind::File, path, path);
        let Some(plugin) = self.registry.for_path(path) else {
            return FileOutcome::Unsupported { file_entity };
        };

        let full_path = workspace.join(path);
        let size_bytes = match std::fs::metadata(&full_path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                warn!(file = path, "file vanished before indexing, skipping");
                return FileOutcome::Missing;
            }
        };

        let outcome = self.quarantine.guard(scope, path, size_bytes, || {
            let source = std::fs::read_to_string(&full_path)?;
            plugin.parse(scope, &FileInput::new(path, source))
        });
        match outcome {
            ParseOutcome::Parsed(parsed) => FileOutcome::Parsed {
                path: path.to_string(),
                file_entity,
                parsed,
            },
            ParseOutcome::Quarantined {
                record,
                placeholder,
            } => FileOutcome::Quarantined {
                record,
                placeholder,
            },
        }
    }
}
