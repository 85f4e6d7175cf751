use crate::registry::{FileInput, ParsedFile, ParserPlugin};
use codeatlas_core::{Entity, EntityKind, Language, Result, Scope};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Syntactic fallback strategy: line-regex extraction of declaration-shaped
/// constructs for languages without a structural grammar in this build.
/// Lower cost, no reference resolution; unresolved linking is left to the
/// repairer with whatever names the structural side exports.
pub struct RegexFallbackPlugin;

struct LinePattern {
    regex: &'static Lazy<Regex>,
    kind: EntityKind,
}

static FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+|static\s+)*(?:def|function|func|fn)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:public\s+|abstract\s+|final\s+)*(?:class|module|trait)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static INTERFACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:public\s+)?interface\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static PATTERNS: &[LinePattern] = &[
    LinePattern {
        regex: &FUNCTION_RE,
        kind: EntityKind::Function,
    },
    LinePattern {
        regex: &TYPE_RE,
        kind: EntityKind::Class,
    },
    LinePattern {
        regex: &INTERFACE_RE,
        kind: EntityKind::Interface,
    },
];

impl RegexFallbackPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegexFallbackPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserPlugin for RegexFallbackPlugin {
    fn name(&self) -> &'static str {
        "regex-fallback"
    }

    fn extensions(&self) -> Vec<&'static str> {
        vec!["rb", "rake", "php", "java", "kt", "swift"]
    }

    fn parse(&self, scope: &Scope, file: &FileInput) -> Result<ParsedFile> {
        let language = fallback_language(&file.path);
        let mut entities = Vec::new();
        for (lineno, line) in file.source.lines().enumerate() {
            for pattern in PATTERNS {
                if let Some(caps) = pattern.regex.captures(line) {
                    let name = caps[1].to_string();
                    let line_num = lineno as u32 + 1;
                    entities.push(
                        Entity::new(scope, pattern.kind, name, file.path.clone())
                            .with_language(language.clone())
                            .with_lines(line_num, line_num)
                            .with_body(line.trim().to_string()),
                    );
                    break;
                }
            }
        }
        debug!(
            file = %file.path,
            entities = entities.len(),
            "fallback parse complete"
        );
        Ok(ParsedFile {
            entities,
            edges: Vec::new(),
            unresolved_refs: Vec::new(),
        })
    }
}

fn fallback_language(path: &str) -> Language {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    Language::Other(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ruby_defs_and_classes() {
        let scope = Scope::new("org-1", "repo-1");
        let source = "class User\n  def full_name\n    [first, last].join(' ')\n  end\nend\n";
        let parsed = RegexFallbackPlugin::new()
            .parse(&scope, &FileInput::new("app/models/user.rb", source))
            .unwrap();
        let names: Vec<&str> = parsed.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["User", "full_name"]);
        assert_eq!(parsed.entities[0].kind, EntityKind::Class);
        assert_eq!(parsed.entities[1].kind, EntityKind::Function);
        assert!(parsed.edges.is_empty());
    }

    #[test]
    fn extracts_java_interface() {
        let scope = Scope::new("org-1", "repo-1");
        let parsed = RegexFallbackPlugin::new()
            .parse(
                &scope,
                &FileInput::new("src/Greeter.java", "public interface Greeter {}\n"),
            )
            .unwrap();
        assert_eq!(parsed.entities.len(), 1);
        assert_eq!(parsed.entities[0].kind, EntityKind::Interface);
    }
}
