use codeatlas_core::{
    entity_id, Edge, EdgeKind, Entity, EntityId, EntityKind, Language, Scope, UnresolvedRef,
};
use std::collections::HashMap;
use tree_sitter::Node;

/// Reference collected during the walk; resolved against same-file
/// definitions afterwards, parked as an [`UnresolvedRef`] otherwise.
struct RawRef {
    from_id: EntityId,
    target_name: String,
    kind: EdgeKind,
}

pub struct EntityExtractor<'a> {
    scope: &'a Scope,
    language: Language,
    file_path: &'a str,
    source: &'a str,
    file_id: EntityId,
    entities: Vec<Entity>,
    refs: Vec<RawRef>,
}

pub struct Extraction {
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub unresolved_refs: Vec<UnresolvedRef>,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(scope: &'a Scope, language: Language, file_path: &'a str, source: &'a str) -> Self {
        let file_id = entity_id(
            &scope.repository_id,
            file_path,
            EntityKind::File,
            file_path,
            None,
        );
        Self {
            scope,
            language,
            file_path,
            source,
            file_id,
            entities: Vec::new(),
            refs: Vec::new(),
        }
    }

    pub fn extract(mut self, root: Node) -> Extraction {
        self.visit(root, None);
        self.resolve()
    }

    fn visit(&mut self, node: Node, parent: Option<usize>) {
        let mut next_parent = parent;

        if let Some(kind) = self.entity_kind(&node) {
            if let Some(index) = self.record_entity(&node, kind, parent) {
                next_parent = Some(index);
            }
        } else if self.is_call(&node) {
            self.record_call(&node, parent);
        } else if self.is_import(&node) {
            self.record_imports(&node);
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, next_parent);
        }
    }

    /// Same-file resolution pass. A reference matching exactly one local
    /// definition becomes an edge; everything else is left for the repairer.
    fn resolve(self) -> Extraction {
        let mut by_name: HashMap<&str, Vec<&EntityId>> = HashMap::new();
        for entity in &self.entities {
            by_name.entry(entity.name.as_str()).or_default().push(&entity.id);
        }

        let mut edges = Vec::new();
        let mut unresolved = Vec::new();
        for r in &self.refs {
            match by_name.get(r.target_name.as_str()) {
                Some(ids) if ids.len() == 1 && *ids[0] != r.from_id => {
                    edges.push(Edge::new(r.from_id.clone(), ids[0].clone(), r.kind));
                }
                Some(ids) if ids.len() == 1 => {} // self-reference, drop
                _ => unresolved.push(UnresolvedRef {
                    from_id: r.from_id.clone(),
                    target_name: r.target_name.clone(),
                    kind: r.kind,
                }),
            }
        }

        Extraction {
            entities: self.entities,
            edges,
            unresolved_refs: unresolved,
        }
    }

    fn entity_kind(&self, node: &Node) -> Option<EntityKind> {
        match (&self.language, node.kind()) {
            (Language::Rust, "function_item") => Some(EntityKind::Function),
            (Language::Rust, "struct_item" | "enum_item") => Some(EntityKind::Class),
            (Language::Rust, "trait_item") => Some(EntityKind::Interface),
            (Language::Rust, "const_item" | "static_item") => Some(EntityKind::Variable),

            (Language::TypeScript | Language::JavaScript, "function_declaration") => {
                Some(EntityKind::Function)
            }
            (Language::TypeScript | Language::JavaScript, "method_definition") => {
                Some(EntityKind::Function)
            }
            (Language::TypeScript | Language::JavaScript, "class_declaration") => {
                Some(EntityKind::Class)
            }
            (Language::TypeScript, "interface_declaration") => Some(EntityKind::Interface),
            (Language::TypeScript | Language::JavaScript, "variable_declarator") => {
                // Locals are not entities; only module-level declarations count.
                if node
                    .parent()
                    .and_then(|p| p.parent())
                    .map(|g| g.kind() == "program" || g.kind() == "export_statement")
                    .unwrap_or(false)
                {
                    let is_fn = node
                        .child_by_field_name("value")
                        .map(|v| v.kind() == "arrow_function" || v.kind() == "function_expression")
                        .unwrap_or(false);
                    Some(if is_fn {
                        EntityKind::Function
                    } else {
                        EntityKind::Variable
                    })
                } else {
                    None
                }
            }

            (Language::Python, "function_definition") => Some(EntityKind::Function),
            (Language::Python, "class_definition") => Some(EntityKind::Class),

            (Language::Go, "function_declaration" | "method_declaration") => {
                Some(EntityKind::Function)
            }
            (Language::Go, "type_spec") => {
                let is_interface = node
                    .child_by_field_name("type")
                    .map(|t| t.kind() == "interface_type")
                    .unwrap_or(false);
                Some(if is_interface {
                    EntityKind::Interface
                } else {
                    EntityKind::Class
                })
            }

            _ => None,
        }
    }

    fn record_entity(&mut self, node: &Node, kind: EntityKind, parent: Option<usize>) -> Option<usize> {
        let name = self.node_name(node)?;
        let signature = self.signature_of(node, kind);

        let mut entity = Entity::new(self.scope, kind, name.clone(), self.file_path)
            .with_language(self.language.clone())
            .with_lines(
                node.start_position().row as u32 + 1,
                node.end_position().row as u32 + 1,
            )
            .with_exported(self.is_exported(node, &name, parent))
            .with_body(self.node_text(node));
        if let Some(sig) = signature {
            entity = entity.with_signature(sig);
        }
        if let Some(doc) = self.doc_of(node) {
            entity = entity.with_doc(doc);
        }
        if let Some(p) = parent {
            let parent_name = self.entities[p].name.clone();
            entity = entity.with_parent(parent_name);
        }

        let index = self.entities.len();
        let entity_id = entity.id.clone();
        self.entities.push(entity);

        if matches!(kind, EntityKind::Class | EntityKind::Interface) {
            self.record_heritage(node, &entity_id);
        }
        Some(index)
    }

    fn record_call(&mut self, node: &Node, parent: Option<usize>) {
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };
        let Some(name) = trailing_identifier(&self.node_text(&callee)) else {
            return;
        };
        let from_id = match parent {
            Some(p) => self.entities[p].id.clone(),
            None => self.file_id.clone(),
        };
        self.refs.push(RawRef {
            from_id,
            target_name: name,
            kind: EdgeKind::Calls,
        });
    }

    fn record_imports(&mut self, node: &Node) {
        for name in self.imported_names(node) {
            self.refs.push(RawRef {
                from_id: self.file_id.clone(),
                target_name: name,
                kind: EdgeKind::Imports,
            });
        }
    }

    fn record_heritage(&mut self, node: &Node, from_id: &EntityId) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "class_heritage" => {
                    let mut inner = child.walk();
                    for clause in child.named_children(&mut inner) {
                        let kind = match clause.kind() {
                            "extends_clause" => EdgeKind::Extends,
                            "implements_clause" => EdgeKind::Implements,
                            _ => continue,
                        };
                        for name in identifier_descendants(&clause, self.source) {
                            self.refs.push(RawRef {
                                from_id: from_id.clone(),
                                target_name: name,
                                kind,
                            });
                        }
                    }
                }
                // Python superclass list.
                "argument_list" => {
                    for name in identifier_descendants(&child, self.source) {
                        self.refs.push(RawRef {
                            from_id: from_id.clone(),
                            target_name: name,
                            kind: EdgeKind::Extends,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn is_call(&self, node: &Node) -> bool {
        match self.language {
            Language::Python => node.kind() == "call",
            _ => node.kind() == "call_expression",
        }
    }

    fn is_import(&self, node: &Node) -> bool {
        matches!(
            (&self.language, node.kind()),
            (Language::Rust, "use_declaration")
                | (Language::TypeScript | Language::JavaScript, "import_statement")
                | (Language::Python, "import_statement" | "import_from_statement")
        )
    }

    fn imported_names(&self, node: &Node) -> Vec<String> {
        let mut names = Vec::new();
        match self.language {
            Language::Rust => {
                // `use a::b::C;` and `use a::{B, C};` both resolve to leaf names.
                let text = self.node_text(node);
                let inner = text.trim_start_matches("use").trim_end_matches(';').trim();
                if let Some(open) = inner.find('{') {
                    let list = inner[open + 1..].trim_end_matches('}');
                    for part in list.split(',') {
                        if let Some(name) = use_leaf(part) {
                            names.push(name);
                        }
                    }
                } else if let Some(name) = use_leaf(inner) {
                    names.push(name);
                }
            }
            Language::TypeScript | Language::JavaScript => {
                for spec in named_descendants(node, "import_specifier") {
                    if let Some(name) = spec.child_by_field_name("name") {
                        names.push(self.node_text(&name));
                    }
                }
            }
            Language::Python => {
                for dotted in named_descendants(node, "dotted_name") {
                    let text = self.node_text(&dotted);
                    if let Some(leaf) = text.rsplit('.').next() {
                        names.push(leaf.to_string());
                    }
                }
            }
            _ => {}
        }
        names.retain(|n| !n.is_empty() && *n != "*");
        names
    }

    fn node_name(&self, node: &Node) -> Option<String> {
        let name_node = node.child_by_field_name("name")?;
        Some(self.node_text(&name_node))
    }

    /// Function signature: declaration text up to the body. Kept identical
    /// across bodies so implementation-only changes preserve the entity id.
    fn signature_of(&self, node: &Node, kind: EntityKind) -> Option<String> {
        if kind != EntityKind::Function {
            return None;
        }
        let text = self.node_text(node);
        let head = match node.child_by_field_name("body") {
            Some(body) => {
                let offset = body.start_byte().saturating_sub(node.start_byte());
                text.get(..offset).unwrap_or(&text).to_string()
            }
            None => text.lines().next().unwrap_or_default().to_string(),
        };
        let collapsed = head.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(truncate_chars(&collapsed, 200))
        }
    }

    fn doc_of(&self, node: &Node) -> Option<String> {
        // Export wrappers sit between a declaration and its doc comment.
        let anchor = match node.parent() {
            Some(p) if p.kind() == "export_statement" => p,
            _ => *node,
        };
        let sibling = anchor.prev_named_sibling()?;
        if !sibling.kind().contains("comment") {
            return None;
        }
        let raw = self.node_text(&sibling);
        let cleaned = raw
            .lines()
            .map(|l| {
                l.trim()
                    .trim_start_matches("///")
                    .trim_start_matches("//")
                    .trim_start_matches("/*")
                    .trim_end_matches("*/")
                    .trim_start_matches('*')
                    .trim_start_matches('#')
                    .trim()
            })
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if cleaned.is_empty() {
            None
        } else {
            Some(truncate_chars(&cleaned, 500))
        }
    }

    fn is_exported(&self, node: &Node, name: &str, parent: Option<usize>) -> bool {
        match self.language {
            Language::Rust => {
                let mut cursor = node.walk();
                let visible = node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "visibility_modifier");
                visible
            }
            Language::TypeScript | Language::JavaScript => {
                let mut current = node.parent();
                while let Some(p) = current {
                    if p.kind() == "export_statement" {
                        return true;
                    }
                    if p.kind() == "program" {
                        break;
                    }
                    current = p.parent();
                }
                false
            }
            Language::Python => parent.is_none() && !name.starts_with('_'),
            Language::Go => name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false),
            Language::Other(_) => false,
        }
    }

    fn node_text(&self, node: &Node) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or_default()
            .to_string()
    }
}

/// Last identifier segment of a callee expression: `a.b.c(...)` -> `c`,
/// `mod::f` -> `f`. Non-identifier callees yield nothing.
fn trailing_identifier(expr: &str) -> Option<String> {
    let last = expr
        .rsplit(|c| c == '.' || c == ':')
        .next()?
        .trim()
        .trim_end_matches(|c| c == '!' || c == '?');
    let last = last.split('<').next().unwrap_or(last).trim();
    if last.is_empty()
        || !last
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    {
        return None;
    }
    Some(last.to_string())
}

fn use_leaf(path: &str) -> Option<String> {
    let without_alias = path.split(" as ").next().unwrap_or(path).trim();
    let leaf = without_alias.rsplit("::").next()?.trim();
    if leaf.is_empty() || leaf == "self" {
        None
    } else {
        Some(leaf.to_string())
    }
}

fn named_descendants<'t>(node: &Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            if child.kind() == kind {
                found.push(child);
            }
            stack.push(child);
        }
    }
    found
}

fn identifier_descendants(node: &Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if current.kind() == "identifier" || current.kind() == "type_identifier" {
            if let Ok(text) = current.utf8_text(source.as_bytes()) {
                names.push(text.to_string());
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    names
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
