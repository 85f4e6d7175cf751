use codeatlas_core::{
    Edge, Entity, EntityChurn, EntityId, GraphStore, RepairReport, Result, Scope, UnresolvedRef,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Restores referential integrity after entity churn. Must run while the
/// deleted entities are still readable (deletion happens after repair), so
/// their identity fields can drive re-resolution of renamed targets.
pub struct EdgeRepairer;

impl EdgeRepairer {
    pub fn new() -> Self {
        Self
    }

    pub async fn repair(
        &self,
        scope: &Scope,
        graph: &dyn GraphStore,
        churn: &EntityChurn,
    ) -> Result<RepairReport> {
        let deleted: HashSet<&EntityId> = churn.deleted.iter().collect();
        let mut report = RepairReport::default();

        // Snapshot the doomed entities before anything is removed; a rename
        // re-points inbound edges to the one exported successor in the same
        // file with the same kind.
        let mut doomed: HashMap<EntityId, Entity> = HashMap::new();
        for id in &churn.deleted {
            if let Some(entity) = graph.get_entity(scope, id).await? {
                doomed.insert(id.clone(), entity);
            }
        }
        let mut added_entities: Vec<Entity> = Vec::new();
        for id in &churn.added {
            if let Some(entity) = graph.get_entity(scope, id).await? {
                added_entities.push(entity);
            }
        }

        // (a) drop every edge touching a deleted id.
        let all_edges = graph.all_edges(scope).await?;
        let dangling: Vec<Edge> = all_edges
            .into_iter()
            .filter(|e| deleted.contains(&e.from_id) || deleted.contains(&e.to_id))
            .collect();
        let mut created = Vec::new();
        let mut reparked = Vec::new();
        for edge in &dangling {
            // Inbound edges from surviving entities are candidates for
            // re-pointing; everything else just disappears with its owner.
            if deleted.contains(&edge.from_id) {
                continue;
            }
            let Some(old_target) = doomed.get(&edge.to_id) else {
                continue;
            };
            let candidates: Vec<&Entity> = added_entities
                .iter()
                .filter(|e| {
                    e.file_path == old_target.file_path
                        && e.kind == old_target.kind
                        && e.exported == Some(true)
                })
                .collect();
            match candidates.as_slice() {
                [only] => {
                    created.push(Edge::new(edge.from_id.clone(), only.id.clone(), edge.kind));
                }
                [] => {
                    warn!(
                        from = %edge.from_id,
                        target = %old_target.name,
                        kind = %edge.kind,
                        "dangling edge target has no successor, parking reference"
                    );
                    reparked.push(UnresolvedRef {
                        from_id: edge.from_id.clone(),
                        target_name: old_target.name.clone(),
                        kind: edge.kind,
                    });
                }
                _ => {
                    warn!(
                        from = %edge.from_id,
                        target = %old_target.name,
                        candidates = candidates.len(),
                        "ambiguous successor for dangling edge, leaving unresolved"
                    );
                    reparked.push(UnresolvedRef {
                        from_id: edge.from_id.clone(),
                        target_name: old_target.name.clone(),
                        kind: edge.kind,
                    });
                }
            }
        }
        report.edges_deleted += graph.delete_edges(scope, &dangling).await?;

        // (b) cross-file resolution of parse-time references: match by
        // (name, exported) within the repository; ties are never guessed.
        for r in graph.take_unresolved_refs(scope).await? {
            if deleted.contains(&r.from_id) {
                continue;
            }
            let matches = graph.find_exported_by_name(scope, &r.target_name).await?;
            match matches.as_slice() {
                [only] if only.id != r.from_id => {
                    created.push(Edge::new(r.from_id.clone(), only.id.clone(), r.kind));
                }
                [_] => {}
                [] => {
                    debug!(
                        target = %r.target_name,
                        kind = %r.kind,
                        "reference still unresolved, keeping parked"
                    );
                    reparked.push(r);
                }
                many => {
                    warn!(
                        target = %r.target_name,
                        candidates = many.len(),
                        "ambiguous exported name, leaving reference unresolved"
                    );
                    reparked.push(r);
                }
            }
        }

        report.edges_created = created.len();
        if !created.is_empty() {
            graph.bulk_upsert_edges(scope, created).await?;
        }
        if !reparked.is_empty() {
            graph.park_unresolved_refs(scope, reparked).await?;
        }

        info!(
            edges_created = report.edges_created,
            edges_deleted = report.edges_deleted,
            "edge repair complete"
        );
        Ok(report)
    }
}

impl Default for EdgeRepairer {
    fn default() -> Self {
        Self::new()
    }
}
