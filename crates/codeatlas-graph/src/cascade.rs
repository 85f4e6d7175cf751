use codeatlas_core::{
    CascadeConfig, CascadeQueues, EdgeKind, EntityId, GraphStore, Result, Scope,
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Process-local caller-count cache. Passed in explicitly rather than living
/// in a global, and cleared at the start of every build so repeated runs see
/// the latest graph shape.
#[derive(Default)]
pub struct CallerCountCache {
    counts: DashMap<EntityId, usize>,
}

impl CallerCountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.counts.clear();
    }

    async fn caller_count(
        &self,
        scope: &Scope,
        graph: &dyn GraphStore,
        id: &EntityId,
    ) -> Result<usize> {
        if let Some(count) = self.counts.get(id) {
            return Ok(*count);
        }
        let count = graph
            .inbound_edges(scope, std::slice::from_ref(id), EdgeKind::Calls)
            .await?
            .len();
        self.counts.insert(id.clone(), count);
        Ok(count)
    }
}

/// Computes, from a set of changed entities, the minimal dependent set whose
/// derived metadata must be recomputed. Breadth-first over inbound `calls`
/// edges; a hub entity (caller count above the cutoff) is enqueued but not
/// expanded, so one small change cannot degrade into a full-repository walk.
pub struct CascadeQueueBuilder {
    cache: Arc<CallerCountCache>,
    config: CascadeConfig,
}

impl CascadeQueueBuilder {
    pub fn new(cache: Arc<CallerCountCache>, config: CascadeConfig) -> Self {
        Self { cache, config }
    }

    pub async fn build(
        &self,
        scope: &Scope,
        graph: &dyn GraphStore,
        changed_ids: &[EntityId],
    ) -> Result<CascadeQueues> {
        self.cache.clear();

        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut rejustify: Vec<EntityId> = Vec::new();
        for id in changed_ids {
            if seen.insert(id.clone()) {
                rejustify.push(id.clone());
            }
        }
        let mut cascade: Vec<EntityId> = Vec::new();
        let mut frontier: Vec<EntityId> = rejustify.clone();

        'bfs: for depth in 1..=self.config.max_depth {
            let mut next = Vec::new();
            for id in &frontier {
                let callers = self.cache.caller_count(scope, graph, id).await?;
                if callers > self.config.hub_caller_cutoff {
                    debug!(
                        entity_id = %id,
                        callers,
                        cutoff = self.config.hub_caller_cutoff,
                        "hub entity reached, not expanding"
                    );
                    continue;
                }
                for edge in graph
                    .inbound_edges(scope, std::slice::from_ref(id), EdgeKind::Calls)
                    .await?
                {
                    if !seen.insert(edge.from_id.clone()) {
                        continue;
                    }
                    cascade.push(edge.from_id.clone());
                    next.push(edge.from_id);
                    if cascade.len() >= self.config.max_queue {
                        warn!(
                            max_queue = self.config.max_queue,
                            "cascade queue ceiling reached, truncating traversal"
                        );
                        break 'bfs;
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            debug!(depth, frontier = next.len(), "cascade frontier expanded");
            frontier = next;
        }

        debug!(
            direct = rejustify.len(),
            cascade = cascade.len(),
            "cascade queues built"
        );
        // An empty merged queue means "skip", not an error; the caller
        // checks `is_empty` on the returned queues.
        Ok(CascadeQueues { rejustify, cascade })
    }
}
