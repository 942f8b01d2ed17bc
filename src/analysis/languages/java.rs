//! Java front end using tree-sitter.
//!
//! Qualifiers are annotations: `@Encrypted String key`, `@NonNull` on a
//! method for its return value, and so on. Lowering runs in three phases
//! over all files of a compilation: declarations (types, fields, methods,
//! parameters), override links, then bodies with lexical scopes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tracing::{debug, trace};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::{
    FileId, LanguageFrontend, LiteralKind, NodeId, NodeKind, ParsedFile, Program, ProgramBuilder,
    Span, Symbol, SymbolId, SymbolKind,
};

const TYPE_QUERY: &str = r#"
(class_declaration
  name: (identifier) @type_name
) @type

(interface_declaration
  name: (identifier) @type_name
) @type

(enum_declaration
  name: (identifier) @type_name
) @type
"#;

/// Declarations found in phase one, keyed for the later phases.
#[derive(Default)]
struct DeclIndex {
    /// (file index, tree-sitter node id) of a declaration -> its symbol.
    by_node: HashMap<(usize, usize), SymbolId>,
    /// Simple type name -> type symbol (first declaration wins).
    types: HashMap<String, SymbolId>,
    /// Method name -> every method symbol with that name.
    methods: HashMap<String, Vec<SymbolId>>,
}

enum Lookup {
    Found(SymbolId),
    Ambiguous,
    Missing,
}

pub struct JavaFrontend {
    language: Language,
}

impl JavaFrontend {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    fn collect_declarations(
        &self,
        builder: &mut ProgramBuilder,
        index: &mut DeclIndex,
        file_idx: usize,
        parsed: &ParsedFile,
    ) -> anyhow::Result<()> {
        let query = Query::new(&self.language, TYPE_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        while let Some(m) = matches.next() {
            let mut name = None;
            let mut type_node = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "type_name" => name = Some(parsed.node_text(capture.node).to_string()),
                    "type" => type_node = Some(capture.node),
                    _ => {}
                }
            }

            if let (Some(name), Some(node)) = (name, type_node) {
                declare_type(builder, index, file_idx, parsed, node, name);
            }
        }

        Ok(())
    }
}

impl Default for JavaFrontend {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageFrontend for JavaFrontend {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Java source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn lower(&self, files: &[ParsedFile]) -> anyhow::Result<Program> {
        let mut builder = ProgramBuilder::new();
        let mut index = DeclIndex::default();

        for (file_idx, parsed) in files.iter().enumerate() {
            self.collect_declarations(&mut builder, &mut index, file_idx, parsed)?;
        }

        link_overrides(&mut builder, &index);

        for (file_idx, parsed) in files.iter().enumerate() {
            let file = builder.add_file(
                parsed.path.clone(),
                String::from_utf8_lossy(&parsed.source).into_owned(),
            );
            if parsed.tree.root_node().has_error() {
                builder.mark_parse_errors(file);
            }

            let mut lowerer = Lowerer {
                builder: &mut builder,
                index: &index,
                parsed,
                file,
                file_idx,
                scopes: Vec::new(),
                current_type: None,
            };
            if let Some(root) = lowerer.lower(parsed.tree.root_node()) {
                builder.set_root(file, root);
            }
        }

        let program = builder.finish();
        debug!(
            files = files.len(),
            nodes = program.node_count(),
            symbols = program.symbols().len(),
            "lowered java program"
        );
        Ok(program)
    }
}

// =============================================================================
// Phase 1: declarations
// =============================================================================

fn declare_type(
    builder: &mut ProgramBuilder,
    index: &mut DeclIndex,
    file_idx: usize,
    parsed: &ParsedFile,
    node: Node,
    name: String,
) {
    let mut symbol = Symbol::new(name.clone(), SymbolKind::Type);
    symbol.qualifiers = annotation_names(parsed, node);
    symbol.bases = base_type_names(parsed, node);
    let type_id = builder.add_symbol(symbol);
    index.by_node.insert((file_idx, node.id()), type_id);
    index.types.entry(name).or_insert(type_id);

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };

    for member in member_nodes(body) {
        match member.kind() {
            "method_declaration" | "constructor_declaration" => {
                declare_method(builder, index, file_idx, parsed, member, type_id);
            }
            "field_declaration" | "constant_declaration" => {
                declare_fields(builder, index, file_idx, parsed, member, type_id);
            }
            _ => {}
        }
    }
}

fn declare_method(
    builder: &mut ProgramBuilder,
    index: &mut DeclIndex,
    file_idx: usize,
    parsed: &ParsedFile,
    node: Node,
    owner: SymbolId,
) {
    let name = field_text(parsed, node, "name");
    let mut method = Symbol::new(name.clone(), SymbolKind::Method);
    method.qualifiers = annotation_names(parsed, node);
    method.type_name = node
        .child_by_field_name("type")
        .map(|t| simple_type_name(parsed.node_text(t)));
    method.container = Some(owner);
    let method_id = builder.add_symbol(method);

    for param in parameter_nodes(node) {
        let Some(param_name) = parameter_name(parsed, param) else {
            continue;
        };
        let mut symbol = Symbol::new(param_name, SymbolKind::Parameter);
        symbol.qualifiers = annotation_names(parsed, param);
        symbol.type_name = param
            .child_by_field_name("type")
            .map(|t| simple_type_name(parsed.node_text(t)));
        symbol.container = Some(method_id);
        let param_id = builder.add_symbol(symbol);
        builder.symbol_mut(method_id).parameters.push(param_id);
        index.by_node.insert((file_idx, param.id()), param_id);
    }

    builder.symbol_mut(owner).members.push(method_id);
    index.by_node.insert((file_idx, node.id()), method_id);
    index.methods.entry(name).or_default().push(method_id);
}

fn declare_fields(
    builder: &mut ProgramBuilder,
    index: &mut DeclIndex,
    file_idx: usize,
    parsed: &ParsedFile,
    node: Node,
    owner: SymbolId,
) {
    let qualifiers = annotation_names(parsed, node);
    let type_name = node
        .child_by_field_name("type")
        .map(|t| simple_type_name(parsed.node_text(t)));

    let declarators: Vec<Node> = node
        .children_by_field_name("declarator", &mut node.walk())
        .collect();
    for declarator in declarators {
        let mut symbol = Symbol::new(field_text(parsed, declarator, "name"), SymbolKind::Field);
        symbol.qualifiers = qualifiers.clone();
        symbol.type_name = type_name.clone();
        symbol.container = Some(owner);
        let field_id = builder.add_symbol(symbol);
        builder.symbol_mut(owner).members.push(field_id);
        index.by_node.insert((file_idx, declarator.id()), field_id);
    }
}

// =============================================================================
// Phase 2: overrides
// =============================================================================

fn link_overrides(builder: &mut ProgramBuilder, index: &DeclIndex) {
    let methods: Vec<SymbolId> = index.methods.values().flatten().copied().collect();

    for method in methods {
        let symbol = builder.symbol(method);
        let Some(owner) = symbol.container else {
            continue;
        };
        let name = symbol.name.clone();
        let arity = symbol.parameters.len();

        let found = lookup_member(builder, index, owner, false, |s| {
            s.kind == SymbolKind::Method && s.name == name && s.parameters.len() == arity
        });
        if let Lookup::Found(base) = found {
            trace!(method = %name, "linked override");
            builder.symbol_mut(method).overrides = Some(base);
        }
    }
}

/// Breadth-first search of `owner` (optionally) and its supertypes for a
/// member. Several matches on one type is an overload-resolution failure.
fn lookup_member(
    builder: &ProgramBuilder,
    index: &DeclIndex,
    owner: SymbolId,
    include_owner: bool,
    matches: impl Fn(&Symbol) -> bool,
) -> Lookup {
    let mut queue = VecDeque::new();
    let mut seen = HashSet::new();

    if include_owner {
        queue.push_back(owner);
    } else {
        seen.insert(owner);
        enqueue_bases(builder, index, owner, &mut queue);
    }

    while let Some(ty) = queue.pop_front() {
        if !seen.insert(ty) {
            continue;
        }

        let found: Vec<SymbolId> = builder
            .symbol(ty)
            .members
            .iter()
            .copied()
            .filter(|&m| matches(builder.symbol(m)))
            .collect();
        match found.as_slice() {
            [] => {}
            [single] => return Lookup::Found(*single),
            _ => return Lookup::Ambiguous,
        }

        enqueue_bases(builder, index, ty, &mut queue);
    }

    Lookup::Missing
}

fn enqueue_bases(
    builder: &ProgramBuilder,
    index: &DeclIndex,
    ty: SymbolId,
    queue: &mut VecDeque<SymbolId>,
) {
    for base in &builder.symbol(ty).bases {
        if let Some(&base_id) = index.types.get(base) {
            queue.push_back(base_id);
        }
    }
}

// =============================================================================
// Phase 3: bodies
// =============================================================================

struct Lowerer<'a> {
    builder: &'a mut ProgramBuilder,
    index: &'a DeclIndex,
    parsed: &'a ParsedFile,
    file: FileId,
    file_idx: usize,
    scopes: Vec<HashMap<String, SymbolId>>,
    current_type: Option<SymbolId>,
}

impl<'a> Lowerer<'a> {
    fn push(&mut self, kind: NodeKind, node: Node<'a>, children: Vec<NodeId>) -> NodeId {
        self.builder
            .push(self.file, kind, Span::from_node(node), children)
    }

    fn declared(&self, node: Node<'a>) -> Option<SymbolId> {
        self.index.by_node.get(&(self.file_idx, node.id())).copied()
    }

    fn text(&self, node: Node<'a>) -> String {
        self.parsed.node_text(node).to_string()
    }

    fn bind(&mut self, name: String, symbol: SymbolId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, symbol);
        }
    }

    fn lower_children(&mut self, node: Node<'a>) -> Vec<NodeId> {
        let children: Vec<Node<'a>> = node.named_children(&mut node.walk()).collect();
        children.into_iter().filter_map(|c| self.lower(c)).collect()
    }

    fn lower_scoped(&mut self, node: Node<'a>) -> Vec<NodeId> {
        self.scopes.push(HashMap::new());
        let children = self.lower_children(node);
        self.scopes.pop();
        children
    }

    fn lower_field(&mut self, node: Node<'a>, field: &str) -> Option<NodeId> {
        node.child_by_field_name(field).and_then(|c| self.lower(c))
    }

    fn lower(&mut self, node: Node<'a>) -> Option<NodeId> {
        match node.kind() {
            "line_comment" | "block_comment" | "modifiers" | "package_declaration"
            | "import_declaration" => None,
            "program" => {
                let children = self.lower_children(node);
                Some(self.push(NodeKind::Unit, node, children))
            }
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                Some(self.lower_type(node))
            }
            "method_declaration" | "constructor_declaration" => Some(self.lower_method(node)),
            "field_declaration" | "constant_declaration" => Some(self.lower_fields(node)),
            "local_variable_declaration" => Some(self.lower_locals(node)),
            "block" | "constructor_body" => {
                let children = self.lower_scoped(node);
                Some(self.push(NodeKind::Block, node, children))
            }
            "expression_statement" | "parenthesized_expression" => {
                let inner = node
                    .named_children(&mut node.walk())
                    .find(|c| !is_comment(c));
                inner.and_then(|c| self.lower(c))
            }
            "return_statement" => {
                let inner = node
                    .named_children(&mut node.walk())
                    .find(|c| !is_comment(c));
                let value = inner.and_then(|c| self.lower(c));
                Some(self.push(NodeKind::Return { value }, node, value.into_iter().collect()))
            }
            "if_statement" => Some(self.lower_if(node)),
            "enhanced_for_statement" => Some(self.lower_for_each(node)),
            "lambda_expression" => Some(self.lower_lambda(node)),
            "catch_formal_parameter" => {
                self.bind_local(node);
                None
            }
            "method_invocation" => Some(self.lower_invocation(node)),
            "field_access" => Some(self.lower_field_access(node)),
            "identifier" => {
                let name = self.text(node);
                let resolved = self.resolve_name(&name);
                let id = self.push(NodeKind::Identifier { name }, node, vec![]);
                if let Some(symbol) = resolved {
                    self.builder.resolve(id, symbol);
                }
                Some(id)
            }
            "this" => Some(self.push(NodeKind::This, node, vec![])),
            "assignment_expression" => {
                let op = field_text(self.parsed, node, "operator");
                let target = self.lower_field(node, "left");
                let value = self.lower_field(node, "right");
                match (target, value) {
                    (Some(target), Some(value)) => Some(self.push(
                        NodeKind::Assignment { op, target, value },
                        node,
                        vec![target, value],
                    )),
                    _ => Some(self.lower_other(node)),
                }
            }
            "ternary_expression" => {
                let condition = self.lower_field(node, "condition");
                let when_true = self.lower_field(node, "consequence");
                let when_false = self.lower_field(node, "alternative");
                match (condition, when_true, when_false) {
                    (Some(condition), Some(when_true), Some(when_false)) => Some(self.push(
                        NodeKind::Conditional {
                            condition,
                            when_true,
                            when_false,
                        },
                        node,
                        vec![condition, when_true, when_false],
                    )),
                    _ => Some(self.lower_other(node)),
                }
            }
            "binary_expression" => {
                let op = field_text(self.parsed, node, "operator");
                let left = self.lower_field(node, "left");
                let right = self.lower_field(node, "right");
                match (left, right) {
                    (Some(left), Some(right)) => Some(self.push(
                        NodeKind::Binary { op, left, right },
                        node,
                        vec![left, right],
                    )),
                    _ => Some(self.lower_other(node)),
                }
            }
            "string_literal" | "text_block" => {
                let value = unquote(self.parsed.node_text(node));
                Some(self.push(
                    NodeKind::Literal {
                        kind: LiteralKind::String,
                        value: Some(value),
                    },
                    node,
                    vec![],
                ))
            }
            "null_literal" => Some(self.push(
                NodeKind::Literal {
                    kind: LiteralKind::Null,
                    value: None,
                },
                node,
                vec![],
            )),
            kind if kind.ends_with("_literal") || kind == "true" || kind == "false" => {
                let value = self.text(node);
                Some(self.push(
                    NodeKind::Literal {
                        kind: LiteralKind::Other,
                        value: Some(value),
                    },
                    node,
                    vec![],
                ))
            }
            _ if node.is_named() => Some(self.lower_other(node)),
            _ => None,
        }
    }

    fn lower_other(&mut self, node: Node<'a>) -> NodeId {
        let children = self.lower_scoped(node);
        self.push(
            NodeKind::Other {
                kind: node.kind().to_string(),
            },
            node,
            children,
        )
    }

    fn lower_type(&mut self, node: Node<'a>) -> NodeId {
        let symbol = self.declared(node);
        let saved = self.current_type;
        if symbol.is_some() {
            self.current_type = symbol;
        }

        let name = field_text(self.parsed, node, "name");
        let children = match node.child_by_field_name("body") {
            Some(body) => self.lower_children(body),
            None => Vec::new(),
        };
        self.current_type = saved;

        let id = self.push(NodeKind::TypeDecl { name }, node, children);
        if let Some(symbol) = symbol {
            self.builder.declare(id, symbol);
        }
        id
    }

    fn lower_method(&mut self, node: Node<'a>) -> NodeId {
        let symbol = self.declared(node);
        let name = field_text(self.parsed, node, "name");

        self.scopes.push(HashMap::new());
        let mut params = Vec::new();
        for param in parameter_nodes(node) {
            let param_name = parameter_name(self.parsed, param).unwrap_or_default();
            let id = self.push(
                NodeKind::Parameter {
                    name: param_name.clone(),
                },
                param,
                vec![],
            );
            if let Some(param_symbol) = self.declared(param) {
                self.builder.declare(id, param_symbol);
                self.bind(param_name, param_symbol);
            }
            params.push(id);
        }
        let body = self.lower_field(node, "body");
        self.scopes.pop();

        let mut children = params.clone();
        children.extend(body);
        let id = self.push(NodeKind::MethodDecl { name, params, body }, node, children);
        if let Some(symbol) = symbol {
            self.builder.declare(id, symbol);
        }
        id
    }

    fn lower_fields(&mut self, node: Node<'a>) -> NodeId {
        let declarators: Vec<Node<'a>> = node
            .children_by_field_name("declarator", &mut node.walk())
            .collect();

        let mut children = Vec::new();
        for declarator in declarators {
            let name = field_text(self.parsed, declarator, "name");
            let initializer = self.lower_field(declarator, "value");
            let id = self.push(
                NodeKind::VariableDecl { name, initializer },
                declarator,
                initializer.into_iter().collect(),
            );
            if let Some(symbol) = self.declared(declarator) {
                self.builder.declare(id, symbol);
            }
            children.push(id);
        }

        self.push(
            NodeKind::Other {
                kind: node.kind().to_string(),
            },
            node,
            children,
        )
    }

    fn lower_locals(&mut self, node: Node<'a>) -> NodeId {
        let qualifiers = annotation_names(self.parsed, node);
        let type_name = node
            .child_by_field_name("type")
            .map(|t| simple_type_name(self.parsed.node_text(t)));
        let declarators: Vec<Node<'a>> = node
            .children_by_field_name("declarator", &mut node.walk())
            .collect();

        let mut children = Vec::new();
        for declarator in declarators {
            let name = field_text(self.parsed, declarator, "name");
            // The initializer is lowered before the name comes into scope.
            let initializer = self.lower_field(declarator, "value");

            let mut local = Symbol::new(name.clone(), SymbolKind::Local);
            local.qualifiers = qualifiers.clone();
            local.type_name = type_name.clone();
            let symbol = self.builder.add_symbol(local);

            let id = self.push(
                NodeKind::VariableDecl {
                    name: name.clone(),
                    initializer,
                },
                declarator,
                initializer.into_iter().collect(),
            );
            self.builder.declare(id, symbol);
            self.bind(name, symbol);
            children.push(id);
        }

        self.push(
            NodeKind::Other {
                kind: node.kind().to_string(),
            },
            node,
            children,
        )
    }

    /// Declare a local from a node carrying `name`, `type`, and modifiers.
    fn bind_local(&mut self, node: Node<'a>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let mut local = Symbol::new(name.clone(), SymbolKind::Local);
        local.qualifiers = annotation_names(self.parsed, node);
        local.type_name = node
            .child_by_field_name("type")
            .map(|t| simple_type_name(self.parsed.node_text(t)));
        let symbol = self.builder.add_symbol(local);
        self.bind(name, symbol);
    }

    fn lower_if(&mut self, node: Node<'a>) -> NodeId {
        let condition = self.lower_field(node, "condition");
        let then_branch = self.lower_field(node, "consequence");
        let else_branch = self.lower_field(node, "alternative");

        match (condition, then_branch) {
            (Some(condition), Some(then_branch)) => {
                let mut children = vec![condition, then_branch];
                children.extend(else_branch);
                self.push(
                    NodeKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    node,
                    children,
                )
            }
            _ => {
                let children = [condition, then_branch, else_branch]
                    .into_iter()
                    .flatten()
                    .collect();
                self.push(
                    NodeKind::Other {
                        kind: node.kind().to_string(),
                    },
                    node,
                    children,
                )
            }
        }
    }

    fn lower_for_each(&mut self, node: Node<'a>) -> NodeId {
        self.scopes.push(HashMap::new());
        let value = self.lower_field(node, "value");
        self.bind_local(node);
        let body = self.lower_field(node, "body");
        self.scopes.pop();

        self.push(
            NodeKind::Other {
                kind: node.kind().to_string(),
            },
            node,
            [value, body].into_iter().flatten().collect(),
        )
    }

    fn lower_lambda(&mut self, node: Node<'a>) -> NodeId {
        self.scopes.push(HashMap::new());
        if let Some(params) = node.child_by_field_name("parameters") {
            match params.kind() {
                "identifier" => self.bind_plain_local(params),
                "formal_parameters" => {
                    for param in named_children(params) {
                        if param.kind() == "formal_parameter" {
                            self.bind_local(param);
                        }
                    }
                }
                _ => {
                    for param in named_children(params) {
                        if param.kind() == "identifier" {
                            self.bind_plain_local(param);
                        }
                    }
                }
            }
        }
        let body = self.lower_field(node, "body");
        self.scopes.pop();

        self.push(
            NodeKind::Other {
                kind: node.kind().to_string(),
            },
            node,
            body.into_iter().collect(),
        )
    }

    fn bind_plain_local(&mut self, name_node: Node<'a>) {
        let name = self.text(name_node);
        let symbol = self
            .builder
            .add_symbol(Symbol::new(name.clone(), SymbolKind::Local));
        self.bind(name, symbol);
    }

    fn lower_invocation(&mut self, node: Node<'a>) -> NodeId {
        let receiver = self.lower_field(node, "object");
        let name = field_text(self.parsed, node, "name");

        let args_node = node.child_by_field_name("arguments");
        let args = match args_node {
            Some(a) => self.lower_children(a),
            None => Vec::new(),
        };
        let arity = args.len();
        let arguments = self.push(NodeKind::ArgumentList, args_node.unwrap_or(node), args);

        let target = self.resolve_method(receiver, &name, arity);

        let mut children: Vec<NodeId> = receiver.into_iter().collect();
        children.push(arguments);
        let id = self.push(
            NodeKind::Invocation {
                name: name.clone(),
                receiver,
                arguments,
            },
            node,
            children,
        );
        match target {
            Some(method) => self.builder.resolve(id, method),
            None => trace!(method = %name, arity, "unresolved invocation"),
        }
        id
    }

    fn lower_field_access(&mut self, node: Node<'a>) -> NodeId {
        let Some(object) = self.lower_field(node, "object") else {
            return self.lower_other(node);
        };
        let member = field_text(self.parsed, node, "field");

        let target = self.receiver_type(object).and_then(|owner| {
            match lookup_member(&*self.builder, self.index, owner, true, |s| {
                s.kind == SymbolKind::Field && s.name == member
            }) {
                Lookup::Found(field) => Some(field),
                _ => None,
            }
        });

        let id = self.push(NodeKind::MemberAccess { object, member }, node, vec![object]);
        if let Some(field) = target {
            self.builder.resolve(id, field);
        }
        id
    }

    fn resolve_name(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&symbol) = scope.get(name) {
                return Some(symbol);
            }
        }

        if let Some(owner) = self.current_type {
            if let Lookup::Found(field) = lookup_member(&*self.builder, self.index, owner, true, |s| {
                s.kind == SymbolKind::Field && s.name == name
            }) {
                return Some(field);
            }
        }

        self.index.types.get(name).copied()
    }

    /// Type symbol whose members a receiver expression exposes.
    fn receiver_type(&self, receiver: NodeId) -> Option<SymbolId> {
        match self.builder.node_kind(receiver) {
            NodeKind::This => self.current_type,
            NodeKind::Other { kind } if kind == "super" => {
                let owner = self.current_type?;
                let base = self.builder.symbol(owner).bases.first()?;
                self.index.types.get(base).copied()
            }
            _ => {
                let symbol_id = self.builder.resolution(receiver)?;
                let symbol = self.builder.symbol(symbol_id);
                match symbol.kind {
                    SymbolKind::Type => Some(symbol_id),
                    _ => symbol
                        .type_name
                        .as_ref()
                        .and_then(|t| self.index.types.get(t).copied()),
                }
            }
        }
    }

    fn resolve_method(&self, receiver: Option<NodeId>, name: &str, arity: usize) -> Option<SymbolId> {
        let matches =
            |s: &Symbol| s.kind == SymbolKind::Method && s.name == name && s.parameters.len() == arity;

        let owner = match receiver {
            None => self.current_type,
            Some(r) => self.receiver_type(r),
        };

        if let Some(owner) = owner {
            return match lookup_member(&*self.builder, self.index, owner, true, matches) {
                Lookup::Found(method) => Some(method),
                Lookup::Ambiguous | Lookup::Missing => None,
            };
        }

        // Receiver of unknown type: accept a program-wide unique candidate.
        let candidates: Vec<SymbolId> = self
            .index
            .methods
            .get(name)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&m| matches(self.builder.symbol(m)))
            .collect();
        match candidates.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn is_comment(node: &Node) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    node.named_children(&mut node.walk()).collect()
}

fn field_text(parsed: &ParsedFile, node: Node, field: &str) -> String {
    node.child_by_field_name(field)
        .map(|n| parsed.node_text(n).to_string())
        .unwrap_or_default()
}

/// Members of a class, interface, or enum body.
fn member_nodes(body: Node) -> Vec<Node> {
    let mut members = Vec::new();
    for child in named_children(body) {
        if child.kind() == "enum_body_declarations" {
            members.extend(named_children(child));
        } else {
            members.push(child);
        }
    }
    members
}

fn parameter_nodes(method: Node) -> Vec<Node> {
    match method.child_by_field_name("parameters") {
        Some(params) => named_children(params)
            .into_iter()
            .filter(|p| matches!(p.kind(), "formal_parameter" | "spread_parameter"))
            .collect(),
        None => Vec::new(),
    }
}

fn parameter_name(parsed: &ParsedFile, param: Node) -> Option<String> {
    if let Some(name) = param.child_by_field_name("name") {
        return Some(parsed.node_text(name).to_string());
    }
    // spread_parameter: `String... values` wraps a variable_declarator
    named_children(param)
        .into_iter()
        .find(|c| c.kind() == "variable_declarator")
        .and_then(|d| d.child_by_field_name("name"))
        .map(|n| parsed.node_text(n).to_string())
}

/// Simple names of the annotations in a declaration's modifiers.
fn annotation_names(parsed: &ParsedFile, node: Node) -> Vec<String> {
    let mut names = Vec::new();
    for child in named_children(node) {
        if child.kind() != "modifiers" {
            continue;
        }
        for modifier in named_children(child) {
            if matches!(modifier.kind(), "marker_annotation" | "annotation") {
                if let Some(name) = modifier.child_by_field_name("name") {
                    names.push(simple_name(parsed.node_text(name)).to_string());
                }
            }
        }
    }
    names
}

fn base_type_names(parsed: &ParsedFile, node: Node) -> Vec<String> {
    let mut bases = Vec::new();
    for child in named_children(node) {
        if matches!(
            child.kind(),
            "superclass" | "super_interfaces" | "extends_interfaces"
        ) {
            collect_type_names(parsed, child, &mut bases);
        }
    }
    bases
}

fn collect_type_names(parsed: &ParsedFile, node: Node, out: &mut Vec<String>) {
    match node.kind() {
        "type_identifier" | "scoped_type_identifier" => {
            out.push(simple_name(parsed.node_text(node)).to_string());
        }
        "type_arguments" => {}
        _ => {
            for child in named_children(node) {
                collect_type_names(parsed, child, out);
            }
        }
    }
}

fn simple_name(text: &str) -> &str {
    text.rsplit('.').next().unwrap_or(text).trim()
}

/// `java.util.Map<K, V>[]` -> `Map`
fn simple_type_name(text: &str) -> String {
    let base = text.split('<').next().unwrap_or(text);
    simple_name(base.trim_end_matches("[]").trim()).to_string()
}

fn unquote(text: &str) -> String {
    let inner = if let Some(block) = text
        .strip_prefix("\"\"\"")
        .and_then(|t| t.strip_suffix("\"\"\""))
    {
        block.trim_start_matches(['\r', '\n'])
    } else {
        text.strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text)
    };
    inner.replace("\\\"", "\"").replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_java(source: &str) -> Program {
        let frontend = JavaFrontend::new();
        let parsed = frontend
            .parse(Path::new("Test.java"), source.as_bytes())
            .unwrap();
        frontend.lower(&[parsed]).unwrap()
    }

    fn symbol_named<'p>(program: &'p Program, name: &str, kind: SymbolKind) -> &'p Symbol {
        program
            .symbols()
            .iter()
            .find(|s| s.name == name && s.kind == kind)
            .unwrap_or_else(|| panic!("no {} named {}", kind, name))
    }

    fn invocations(program: &Program, name: &str) -> Vec<NodeId> {
        program
            .roots()
            .flat_map(|r| program.preorder(r))
            .filter(|&n| matches!(program.kind(n), NodeKind::Invocation { name: m, .. } if m == name))
            .collect()
    }

    #[test]
    fn test_declared_qualifiers() {
        let program = lower_java(
            r#"
class Vault {
    @Encrypted private String secret;

    @Encrypted
    public String seal(@Untainted String plain, int rounds) {
        @NonNull String local = plain;
        return local;
    }
}
"#,
        );

        let field = symbol_named(&program, "secret", SymbolKind::Field);
        assert_eq!(field.qualifiers, vec!["Encrypted"]);
        assert_eq!(field.type_name.as_deref(), Some("String"));

        let method = symbol_named(&program, "seal", SymbolKind::Method);
        assert_eq!(method.qualifiers, vec!["Encrypted"]);
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(program.qualifiers_of(method.parameters[0]), ["Untainted".to_string()]);
        assert!(program.qualifiers_of(method.parameters[1]).is_empty());

        let local = symbol_named(&program, "local", SymbolKind::Local);
        assert_eq!(local.qualifiers, vec!["NonNull"]);
    }

    #[test]
    fn test_scoped_annotation_uses_simple_name() {
        let program = lower_java(
            r#"
class A {
    @com.acme.quals.Encrypted String key;
}
"#,
        );
        let field = symbol_named(&program, "key", SymbolKind::Field);
        assert_eq!(field.qualifiers, vec!["Encrypted"]);
    }

    #[test]
    fn test_resolves_invocations_and_identifiers() {
        let program = lower_java(
            r#"
class Mailer {
    @Encrypted String key;
    void send(@Encrypted String body) {}
    void run() {
        send(key);
        this.send(this.key);
    }
}
"#,
        );

        let send = symbol_named(&program, "send", SymbolKind::Method);
        let calls = invocations(&program, "send");
        assert_eq!(calls.len(), 2);
        for call in calls {
            let resolved = program.symbol_of(call).unwrap();
            assert_eq!(program.symbol(resolved).name, send.name);
            let arg = program.arguments(call)[0];
            let field = program.symbol_of(arg).unwrap();
            assert_eq!(program.symbol(field).name, "key");
        }
    }

    #[test]
    fn test_receiver_type_resolution() {
        let program = lower_java(
            r#"
class Store {
    void put(@Encrypted String value) {}
}
class Client {
    Store store;
    void run(Store other) {
        other.put("x");
        store.put("y");
    }
}
"#,
        );
        let calls = invocations(&program, "put");
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|&c| program.symbol_of(c).is_some()));
    }

    #[test]
    fn test_overloads_are_unresolved() {
        let program = lower_java(
            r#"
class A {
    void log(String a) {}
    void log(Object a) {}
    void run() { log("x"); }
}
"#,
        );
        let calls = invocations(&program, "log");
        assert_eq!(calls.len(), 1);
        assert!(program.symbol_of(calls[0]).is_none());
    }

    #[test]
    fn test_override_links() {
        let program = lower_java(
            r#"
interface Source {
    @Encrypted String read(@NonNull String key);
}
class Base implements Source {
    public String read(String key) { return key; }
}
class Derived extends Base {
    public String read(String key) { return key; }
    public String other() { return null; }
}
"#,
        );

        let reads: Vec<&Symbol> = program
            .symbols()
            .iter()
            .filter(|s| s.kind == SymbolKind::Method && s.name == "read")
            .collect();
        assert_eq!(reads.len(), 3);

        let derived_read = reads
            .iter()
            .find(|s| s.container.map(|c| program.symbol(c).name.as_str()) == Some("Derived"))
            .unwrap();
        let base = program.symbol(derived_read.overrides.unwrap());
        assert_eq!(program.symbol(base.container.unwrap()).name, "Base");

        let base_read = program.symbol(base.overrides.unwrap());
        assert_eq!(program.symbol(base_read.container.unwrap()).name, "Source");

        let other = symbol_named(&program, "other", SymbolKind::Method);
        assert!(other.overrides.is_none());
    }

    #[test]
    fn test_literals_and_shapes() {
        let program = lower_java(
            r#"
class A {
    void run(boolean flag) {
        String s = flag ? "on" : null;
        Qual.assertQualifier(s, "s:NonNull");
    }
}
"#,
        );
        let nodes: Vec<NodeId> = program.roots().flat_map(|r| program.preorder(r)).collect();

        assert!(nodes
            .iter()
            .any(|&n| matches!(program.kind(n), NodeKind::Conditional { .. })));
        assert!(nodes.iter().any(|&n| program.constant_value(n)
            == Some(crate::analysis::Constant::Str("s:NonNull"))));
        assert!(nodes
            .iter()
            .any(|&n| program.constant_value(n) == Some(crate::analysis::Constant::Null)));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("\"\""), "");
        assert_eq!(unquote("\"say \\\"hi\\\"\""), "say \"hi\"");
    }

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name("java.util.Map<String, Integer>"), "Map");
        assert_eq!(simple_type_name("String[]"), "String");
        assert_eq!(simple_type_name("Store"), "Store");
    }
}
