use crate::types::{
    Edge, EdgeKind, Entity, EntityId, IndexEvent, Scope, UnresolvedRef,
};
use crate::Result;
use async_trait::async_trait;

/// Graph storage port. The adapter owns query performance (compound indexing
/// on org+repo+path); this engine guarantees it always supplies the scope.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn bulk_upsert_entities(&self, scope: &Scope, entities: Vec<Entity>) -> Result<()>;
    async fn bulk_upsert_edges(&self, scope: &Scope, edges: Vec<Edge>) -> Result<()>;
    async fn get_entity(&self, scope: &Scope, id: &EntityId) -> Result<Option<Entity>>;
    async fn get_entities_by_file(&self, scope: &Scope, file_path: &str) -> Result<Vec<Entity>>;
    async fn batch_delete_entities(&self, scope: &Scope, ids: &[EntityId]) -> Result<usize>;
    async fn all_edges(&self, scope: &Scope) -> Result<Vec<Edge>>;
    /// Edges of `kind` pointing *at* any of `ids`.
    async fn inbound_edges(
        &self,
        scope: &Scope,
        ids: &[EntityId],
        kind: EdgeKind,
    ) -> Result<Vec<Edge>>;
    async fn delete_edges(&self, scope: &Scope, edges: &[Edge]) -> Result<usize>;
    /// Exported entities matching `name` within the repository scope.
    async fn find_exported_by_name(&self, scope: &Scope, name: &str) -> Result<Vec<Entity>>;
    /// Park parse-time references whose targets live outside the current batch.
    async fn park_unresolved_refs(&self, scope: &Scope, refs: Vec<UnresolvedRef>) -> Result<()>;
    /// Drain parked references for a reconciliation cycle.
    async fn take_unresolved_refs(&self, scope: &Scope) -> Result<Vec<UnresolvedRef>>;
    async fn insert_index_event(&self, scope: &Scope, event: IndexEvent) -> Result<()>;
}

/// Vector index port: embedding provider plus id-keyed upsert, so stale
/// vectors are overwritten rather than duplicated.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn upsert(
        &self,
        scope: &Scope,
        ids: &[EntityId],
        vectors: Vec<Vec<f32>>,
        metadata: Vec<serde_json::Value>,
    ) -> Result<()>;
}

/// Read-cache port. Prefix invalidation is an optional capability; the
/// invalidator degrades gracefully when a backend lacks it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn invalidate(&self, key: &str) -> Result<()>;
    fn supports_prefix_invalidation(&self) -> bool {
        false
    }
    async fn invalidate_by_prefix(&self, prefix: &str) -> Result<usize>;
}
