// ABOUTME: Parser plugin registry for the CodeAtlas indexing engine.
// ABOUTME: Dispatches files by extension to a tree-sitter structural plugin or a regex fallback.

pub mod fallback;
pub mod language;
pub mod registry;
pub mod structural;
pub mod visitor;

pub use fallback::RegexFallbackPlugin;
pub use language::LanguageRegistry;
pub use registry::{FileInput, ParsedFile, ParserPlugin, PluginRegistry};
pub use structural::TreeSitterPlugin;
