use codeatlas_core::{
    EmbeddingConfig, EmbeddingReport, Entity, EntityId, GraphStore, Result, Scope, VectorIndex,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Keeps the vector index in sync with changed entity text. Upserts are
/// keyed by entity id, so a re-embedded entity overwrites its stale vector
/// instead of duplicating it.
pub struct EmbeddingUpdater {
    index: Arc<dyn VectorIndex>,
    config: EmbeddingConfig,
}

impl EmbeddingUpdater {
    pub fn new(index: Arc<dyn VectorIndex>, config: EmbeddingConfig) -> Self {
        Self { index, config }
    }

    pub async fn update(
        &self,
        scope: &Scope,
        graph: &dyn GraphStore,
        changed_ids: &[EntityId],
    ) -> Result<EmbeddingReport> {
        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        for id in changed_ids {
            match graph.get_entity(scope, id).await? {
                Some(entity) => {
                    texts.push(entity_text(&entity, self.config.max_text_chars));
                    metadata.push(serde_json::json!({
                        "kind": entity.kind.to_string(),
                        "name": entity.name,
                        "file_path": entity.file_path,
                    }));
                    ids.push(id.clone());
                }
                // Deleted between queue build and embedding; nothing to embed.
                None => warn!(entity_id = %id, "skipping embedding for missing entity"),
            }
        }

        let mut updated = 0;
        for start in (0..ids.len()).step_by(self.config.batch_size.max(1)) {
            let end = (start + self.config.batch_size.max(1)).min(ids.len());
            let vectors = self.index.embed(&texts[start..end]).await?;
            self.index
                .upsert(
                    scope,
                    &ids[start..end],
                    vectors,
                    metadata[start..end].to_vec(),
                )
                .await?;
            updated += end - start;
        }
        debug!(embeddings_updated = updated, "vector index synchronized");
        Ok(EmbeddingReport {
            embeddings_updated: updated,
        })
    }
}

/// Bounded textual representation handed to the embedder: identity fields
/// first, then the truncated body, then any prior annotation text.
pub fn entity_text(entity: &Entity, max_chars: usize) -> String {
    let mut text = format!(
        "{} {} in {}",
        entity.kind, entity.name, entity.file_path
    );
    if let Some(sig) = &entity.signature {
        text.push('\n');
        text.push_str(sig);
    }
    if let Some(body) = &entity.body {
        text.push('\n');
        text.push_str(body);
    }
    if let Some(doc) = &entity.doc {
        text.push('\n');
        text.push_str(doc);
    }
    if text.chars().count() > max_chars {
        text = text.chars().take(max_chars).collect();
    }
    text
}
