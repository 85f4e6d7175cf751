use codeatlas_core::{
    quarantine_id, Entity, EntityKind, GraphStore, QuarantineConfig, QuarantineRecord, Result,
    Scope,
};
use codeatlas_parser::ParsedFile;
use tracing::{info, warn};

#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(ParsedFile),
    Quarantined {
        record: QuarantineRecord,
        placeholder: Entity,
    },
}

/// Isolates failing and oversized files as placeholder entities so one bad
/// input never fails the whole batch. Placeholder ids are deterministic per
/// (repository, path), so re-runs cannot duplicate them and healing can
/// delete by id instead of scanning.
pub struct QuarantineManager {
    max_file_bytes: u64,
}

impl QuarantineManager {
    pub fn new(config: &QuarantineConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Wraps one parse attempt. The ceiling is checked before the parser
    /// runs at all; a parse error becomes the quarantine reason.
    pub fn guard<F>(
        &self,
        scope: &Scope,
        file_path: &str,
        size_bytes: u64,
        parse_fn: F,
    ) -> ParseOutcome
    where
        F: FnOnce() -> Result<ParsedFile>,
    {
        if size_bytes > self.max_file_bytes {
            warn!(
                file = file_path,
                size_bytes,
                ceiling = self.max_file_bytes,
                "file exceeds size ceiling, quarantining"
            );
            return self.quarantine(scope, file_path, size_bytes, "oversized".to_string());
        }
        match parse_fn() {
            Ok(parsed) => ParseOutcome::Parsed(parsed),
            Err(e) => {
                warn!(file = file_path, error = %e, "parse failed, quarantining");
                self.quarantine(scope, file_path, size_bytes, e.to_string())
            }
        }
    }

    fn quarantine(
        &self,
        scope: &Scope,
        file_path: &str,
        size_bytes: u64,
        reason: String,
    ) -> ParseOutcome {
        let record = QuarantineRecord {
            file_path: file_path.to_string(),
            reason,
            size_bytes,
            quarantined_at: chrono::Utc::now(),
        };
        ParseOutcome::Quarantined {
            placeholder: placeholder_entity(scope, &record),
            record,
        }
    }

    /// Heals a previously quarantined path after a successful parse: if the
    /// graph still holds the placeholder, exactly that id is deleted.
    pub async fn heal(
        &self,
        scope: &Scope,
        graph: &dyn GraphStore,
        file_path: &str,
    ) -> Result<bool> {
        let id = quarantine_id(&scope.repository_id, file_path);
        if graph.get_entity(scope, &id).await?.is_none() {
            return Ok(false);
        }
        graph.batch_delete_entities(scope, &[id]).await?;
        info!(file = file_path, "quarantine placeholder healed");
        Ok(true)
    }
}

pub fn placeholder_entity(scope: &Scope, record: &QuarantineRecord) -> Entity {
    let mut entity = Entity::new(
        scope,
        EntityKind::QuarantinePlaceholder,
        record.file_path.clone(),
        record.file_path.clone(),
    )
    .with_doc(record.reason.clone());
    entity.id = quarantine_id(&scope.repository_id, &record.file_path);
    entity.body = serde_json::to_string(record).ok();
    entity
}
