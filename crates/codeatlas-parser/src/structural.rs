use crate::registry::{FileInput, ParsedFile, ParserPlugin};
use crate::visitor::EntityExtractor;
use crate::LanguageRegistry;
use codeatlas_core::{CodeAtlasError, Result, Scope};
use tracing::debug;

/// Structural parsing strategy: full AST extraction through tree-sitter,
/// with same-file reference resolution. The precise, higher-cost option.
pub struct TreeSitterPlugin {
    registry: LanguageRegistry,
}

impl TreeSitterPlugin {
    pub fn new() -> Self {
        Self {
            registry: LanguageRegistry::new(),
        }
    }
}

impl Default for TreeSitterPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserPlugin for TreeSitterPlugin {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn extensions(&self) -> Vec<&'static str> {
        self.registry.extensions()
    }

    fn parse(&self, scope: &Scope, file: &FileInput) -> Result<ParsedFile> {
        let language = self.registry.detect_language(&file.path).ok_or_else(|| {
            CodeAtlasError::Parse(format!("unknown file type: {}", file.path))
        })?;
        let mut parser = self.registry.create_parser(&language).ok_or_else(|| {
            CodeAtlasError::Parse(format!("no grammar for language: {}", language))
        })?;
        let tree = parser
            .parse(&file.source, None)
            .ok_or_else(|| CodeAtlasError::Parse(format!("failed to parse {}", file.path)))?;

        let extraction =
            EntityExtractor::new(scope, language, &file.path, &file.source).extract(tree.root_node());
        debug!(
            file = %file.path,
            entities = extraction.entities.len(),
            edges = extraction.edges.len(),
            unresolved = extraction.unresolved_refs.len(),
            "structural parse complete"
        );
        Ok(ParsedFile {
            entities: extraction.entities,
            edges: extraction.edges,
            unresolved_refs: extraction.unresolved_refs,
        })
    }
}
