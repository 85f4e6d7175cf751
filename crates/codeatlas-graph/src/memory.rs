//! DashMap-backed in-process adapters for the collaborator ports. The
//! default store for tests and local runs; production adapters live outside
//! this engine.

use async_trait::async_trait;
use codeatlas_core::{
    CacheStore, Edge, EdgeKind, Entity, EntityId, GraphStore, IndexEvent, Result, Scope,
    UnresolvedRef, VectorIndex,
};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct RepoState {
    entities: HashMap<EntityId, Entity>,
    edges: HashSet<Edge>,
    unresolved: Vec<UnresolvedRef>,
    events: Vec<IndexEvent>,
}

#[derive(Default)]
pub struct InMemoryGraphStore {
    repos: DashMap<Scope, RepoState>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self, scope: &Scope) -> usize {
        self.repos.get(scope).map(|r| r.entities.len()).unwrap_or(0)
    }

    pub fn edge_count(&self, scope: &Scope) -> usize {
        self.repos.get(scope).map(|r| r.edges.len()).unwrap_or(0)
    }

    pub fn event_count(&self, scope: &Scope) -> usize {
        self.repos.get(scope).map(|r| r.events.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn bulk_upsert_entities(&self, scope: &Scope, entities: Vec<Entity>) -> Result<()> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        for entity in entities {
            repo.entities.insert(entity.id.clone(), entity);
        }
        Ok(())
    }

    async fn bulk_upsert_edges(&self, scope: &Scope, edges: Vec<Edge>) -> Result<()> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        repo.edges.extend(edges);
        Ok(())
    }

    async fn get_entity(&self, scope: &Scope, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self
            .repos
            .get(scope)
            .and_then(|r| r.entities.get(id).cloned()))
    }

    async fn get_entities_by_file(&self, scope: &Scope, file_path: &str) -> Result<Vec<Entity>> {
        Ok(self
            .repos
            .get(scope)
            .map(|r| {
                r.entities
                    .values()
                    .filter(|e| e.file_path == file_path)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn batch_delete_entities(&self, scope: &Scope, ids: &[EntityId]) -> Result<usize> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        let mut removed = 0;
        for id in ids {
            if repo.entities.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn all_edges(&self, scope: &Scope) -> Result<Vec<Edge>> {
        Ok(self
            .repos
            .get(scope)
            .map(|r| r.edges.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn inbound_edges(
        &self,
        scope: &Scope,
        ids: &[EntityId],
        kind: EdgeKind,
    ) -> Result<Vec<Edge>> {
        let targets: HashSet<&EntityId> = ids.iter().collect();
        Ok(self
            .repos
            .get(scope)
            .map(|r| {
                r.edges
                    .iter()
                    .filter(|e| e.kind == kind && targets.contains(&e.to_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_edges(&self, scope: &Scope, edges: &[Edge]) -> Result<usize> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        let mut removed = 0;
        for edge in edges {
            if repo.edges.remove(edge) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn find_exported_by_name(&self, scope: &Scope, name: &str) -> Result<Vec<Entity>> {
        Ok(self
            .repos
            .get(scope)
            .map(|r| {
                r.entities
                    .values()
                    .filter(|e| e.name == name && e.exported == Some(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn park_unresolved_refs(&self, scope: &Scope, refs: Vec<UnresolvedRef>) -> Result<()> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        for r in refs {
            if !repo.unresolved.contains(&r) {
                repo.unresolved.push(r);
            }
        }
        Ok(())
    }

    async fn take_unresolved_refs(&self, scope: &Scope) -> Result<Vec<UnresolvedRef>> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        Ok(std::mem::take(&mut repo.unresolved))
    }

    async fn insert_index_event(&self, scope: &Scope, event: IndexEvent) -> Result<()> {
        let mut repo = self.repos.entry(scope.clone()).or_default();
        repo.events.push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, String>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn supports_prefix_invalidation(&self) -> bool {
        true
    }

    async fn invalidate_by_prefix(&self, prefix: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        Ok(keys.len())
    }
}

/// Deterministic stand-in embedder: a small vector derived from byte sums.
/// Good enough to assert upsert-by-id semantics without a model in the loop.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    vectors: DashMap<(Scope, EntityId), Vec<f32>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector_count(&self, scope: &Scope) -> usize {
        self.vectors.iter().filter(|e| &e.key().0 == scope).count()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0f32; 8];
                for (i, b) in t.bytes().enumerate() {
                    v[i % 8] += b as f32;
                }
                v
            })
            .collect())
    }

    async fn upsert(
        &self,
        scope: &Scope,
        ids: &[EntityId],
        vectors: Vec<Vec<f32>>,
        _metadata: Vec<serde_json::Value>,
    ) -> Result<()> {
        for (id, vector) in ids.iter().zip(vectors) {
            self.vectors.insert((scope.clone(), id.clone()), vector);
        }
        Ok(())
    }
}
