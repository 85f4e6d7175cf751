// ABOUTME: Maps file extensions to Tree-sitter grammars and builds configured parsers.
use codeatlas_core::Language;
use std::collections::HashMap;
use tree_sitter::Parser;

pub struct LanguageConfig {
    pub language: tree_sitter::Language,
    pub file_extensions: Vec<&'static str>,
}

pub struct LanguageRegistry {
    configs: HashMap<Language, LanguageConfig>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut configs = HashMap::new();

        configs.insert(
            Language::Rust,
            LanguageConfig {
                language: tree_sitter_rust::LANGUAGE.into(),
                file_extensions: vec!["rs"],
            },
        );

        configs.insert(
            Language::TypeScript,
            LanguageConfig {
                language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                file_extensions: vec!["ts", "tsx"],
            },
        );

        configs.insert(
            Language::JavaScript,
            LanguageConfig {
                language: tree_sitter_javascript::LANGUAGE.into(),
                file_extensions: vec!["js", "jsx", "mjs"],
            },
        );

        configs.insert(
            Language::Python,
            LanguageConfig {
                language: tree_sitter_python::LANGUAGE.into(),
                file_extensions: vec!["py", "pyi"],
            },
        );

        configs.insert(
            Language::Go,
            LanguageConfig {
                language: tree_sitter_go::LANGUAGE.into(),
                file_extensions: vec!["go"],
            },
        );

        Self { configs }
    }

    pub fn detect_language(&self, file_path: &str) -> Option<Language> {
        let extension = std::path::Path::new(file_path).extension()?.to_str()?;
        for (lang, config) in &self.configs {
            if config.file_extensions.contains(&extension) {
                return Some(lang.clone());
            }
        }
        None
    }

    pub fn extensions(&self) -> Vec<&'static str> {
        let mut all: Vec<&'static str> = self
            .configs
            .values()
            .flat_map(|c| c.file_extensions.iter().copied())
            .collect();
        all.sort_unstable();
        all
    }

    pub fn create_parser(&self, language: &Language) -> Option<Parser> {
        let config = self.configs.get(language)?;
        let mut parser = Parser::new();
        parser.set_language(&config.language).ok()?;
        Some(parser)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

    #[test]
    fn registered_languages_use_supported_versions() {
        let registry = LanguageRegistry::new();
        for (language, config) in &registry.configs {
            let version = config.language.version();
            assert!(
                (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version),
                "Language {:?} uses incompatible Tree-sitter ABI {}",
                language,
                version,
            );
        }
    }

    #[test]
    fn detects_language_from_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.detect_language("src/a.ts"), Some(Language::TypeScript));
        assert_eq!(registry.detect_language("pkg/main.go"), Some(Language::Go));
        assert_eq!(registry.detect_language("README.md"), None);
        assert_eq!(registry.detect_language("Makefile"), None);
    }
}
