use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable 16-hex-character entity identifier derived by [`crate::hash::entity_id`].
pub type EntityId = String;

/// Tenancy boundary: every read and write is scoped by organization + repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub organization_id: String,
    pub repository_id: String,
}

impl Scope {
    pub fn new(organization_id: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            repository_id: repository_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Other(String),
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Function,
    Class,
    Interface,
    Variable,
    Directory,
    QuarantinePlaceholder,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::File => "file",
            EntityKind::Function => "function",
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::Variable => "variable",
            EntityKind::Directory => "directory",
            EntityKind::QuarantinePlaceholder => "quarantine-placeholder",
        };
        write!(f, "{}", s)
    }
}

/// A named code construct in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub organization_id: String,
    pub repository_id: String,
    pub kind: EntityKind,
    pub name: String,
    pub file_path: String,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub language: Option<Language>,
    pub signature: Option<String>,
    pub exported: Option<bool>,
    pub doc: Option<String>,
    pub parent: Option<String>,
    pub body: Option<String>,
}

impl Entity {
    pub fn new(
        scope: &Scope,
        kind: EntityKind,
        name: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let file_path = file_path.into();
        let id = crate::hash::entity_id(&scope.repository_id, &file_path, kind, &name, None);
        Self {
            id,
            organization_id: scope.organization_id.clone(),
            repository_id: scope.repository_id.clone(),
            kind,
            name,
            file_path,
            start_line: None,
            end_line: None,
            language: None,
            signature: None,
            exported: None,
            doc: None,
            parent: None,
            body: None,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        let signature = signature.into();
        self.id = crate::hash::entity_id(
            &self.repository_id,
            &self.file_path,
            self.kind,
            &self.name,
            Some(&signature),
        );
        self.signature = Some(signature);
        self
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = Some(exported);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Calls,
    Imports,
    Extends,
    Implements,
    Contains,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::Contains => "contains",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calls" => Ok(EdgeKind::Calls),
            "imports" => Ok(EdgeKind::Imports),
            "extends" => Ok(EdgeKind::Extends),
            "implements" => Ok(EdgeKind::Implements),
            "contains" => Ok(EdgeKind::Contains),
            other => Err(format!("unknown edge kind: {}", other)),
        }
    }
}

/// Directed relationship between two entities, scoped like the entities themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: EntityId,
    pub to_id: EntityId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from_id: impl Into<EntityId>, to_id: impl Into<EntityId>, kind: EdgeKind) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            kind,
        }
    }
}

/// Edge whose target could not be resolved to an id at parse time.
/// The Edge Repairer later matches `target_name` against exported entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnresolvedRef {
    pub from_id: EntityId,
    pub target_name: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub change_type: ChangeType,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub file_path: String,
    pub reason: String,
    pub size_bytes: u64,
    pub quarantined_at: chrono::DateTime<chrono::Utc>,
}

/// Request-scoped recomputation queues. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeQueues {
    /// Entities whose own source text changed.
    pub rejustify: Vec<EntityId>,
    /// Entities reachable from the direct set via inbound `calls` edges.
    pub cascade: Vec<EntityId>,
}

impl CascadeQueues {
    pub fn is_empty(&self) -> bool {
        self.rejustify.is_empty() && self.cascade.is_empty()
    }
}

/// Entity churn of one reconciliation cycle, consumed by the Edge Repairer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityChurn {
    pub added: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    pub deleted: Vec<EntityId>,
}

/// Stage outputs carry ids and counts only; bulk payloads stay inside the
/// stage that produced them.
///
/// `entity_ids` and `entity_count` cover real code entities only.
/// Quarantine placeholders are written to the store but reported through
/// `quarantined` instead, so downstream stages never cascade from or embed
/// a placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexReport {
    pub entity_ids: Vec<EntityId>,
    pub entity_count: usize,
    pub edge_count: usize,
    pub quarantined: Vec<QuarantineRecord>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RepairReport {
    pub edges_created: usize,
    pub edges_deleted: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmbeddingReport {
    pub embeddings_updated: usize,
}

/// Audit record written once per completed reindex batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEvent {
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    pub files_indexed: usize,
    pub entities_written: usize,
    pub edges_written: usize,
    pub files_quarantined: usize,
}
