use crate::{RegexFallbackPlugin, TreeSitterPlugin};
use codeatlas_core::{Edge, Entity, Result, Scope, UnresolvedRef};
use std::path::Path;
use std::sync::Arc;

/// One file handed to a plugin. Content is read by the re-indexer so the
/// size ceiling can be checked before any parse work happens.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub path: String,
    pub source: String,
    pub size_bytes: u64,
}

impl FileInput {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let size_bytes = source.len() as u64;
        Self {
            path: path.into(),
            source,
            size_bytes,
        }
    }
}

/// Parse output: entities plus edges that resolved within the file, plus
/// references whose targets live elsewhere and are left for the Edge Repairer.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub unresolved_refs: Vec<UnresolvedRef>,
}

pub trait ParserPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn extensions(&self) -> Vec<&'static str>;
    fn parse(&self, scope: &Scope, file: &FileInput) -> Result<ParsedFile>;
}

/// Extension-keyed dispatch over the registered plugins, resolved once per
/// file. The structural plugin wins when both cover an extension.
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ParserPlugin>>,
}

impl PluginRegistry {
    /// Default line-up: tree-sitter structural parsing, regex fallback for
    /// the syntactic-only languages.
    pub fn with_default_plugins() -> Self {
        Self {
            plugins: vec![
                Arc::new(TreeSitterPlugin::new()),
                Arc::new(RegexFallbackPlugin::new()),
            ],
        }
    }

    pub fn new(plugins: Vec<Arc<dyn ParserPlugin>>) -> Self {
        Self { plugins }
    }

    /// `None` means the extension is unsupported: the file is recorded as a
    /// bare file entity and excluded from quarantine accounting.
    pub fn for_path(&self, path: &str) -> Option<Arc<dyn ParserPlugin>> {
        let extension = Path::new(path).extension()?.to_str()?;
        self.plugins
            .iter()
            .find(|p| p.extensions().contains(&extension))
            .cloned()
    }
}
