//! Arena-backed program model shared by front ends and the checking engine.
//!
//! A `Program` owns every lowered syntax node of a compilation (all files),
//! the symbol table, and the resolution links between them. Nodes are
//! addressed by `NodeId`, an arena index, so two textually identical
//! expressions at different positions never compare equal.

use std::collections::HashMap;
use std::fmt;

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Identity of a lowered syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a source file inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Literal categories the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Null,
    /// Numbers, booleans, characters.
    Other,
}

/// Syntactic shape of a node.
///
/// Child ids stored in a variant are also present, in source order, in
/// `Node::children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of one source file.
    Unit,
    TypeDecl {
        name: String,
    },
    MethodDecl {
        name: String,
        params: Vec<NodeId>,
        body: Option<NodeId>,
    },
    Parameter {
        name: String,
    },
    Block,
    /// A field or local declarator, optionally initialized.
    VariableDecl {
        name: String,
        initializer: Option<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    If {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    Invocation {
        name: String,
        receiver: Option<NodeId>,
        arguments: NodeId,
    },
    ArgumentList,
    Identifier {
        name: String,
    },
    MemberAccess {
        object: NodeId,
        member: String,
    },
    Literal {
        kind: LiteralKind,
        value: Option<String>,
    },
    Conditional {
        condition: NodeId,
        when_true: NodeId,
        when_false: NodeId,
    },
    Binary {
        op: String,
        left: NodeId,
        right: NodeId,
    },
    Assignment {
        op: String,
        target: NodeId,
        value: NodeId,
    },
    This,
    /// Any shape the engine does not model; carries the source grammar kind.
    Other {
        kind: String,
    },
}

impl NodeKind {
    /// Short name used in log events and "not implemented" diagnostics.
    pub fn label(&self) -> &str {
        match self {
            NodeKind::Unit => "unit",
            NodeKind::TypeDecl { .. } => "type declaration",
            NodeKind::MethodDecl { .. } => "method declaration",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::Block => "block",
            NodeKind::VariableDecl { .. } => "variable declaration",
            NodeKind::Return { .. } => "return",
            NodeKind::If { .. } => "if",
            NodeKind::Invocation { .. } => "invocation",
            NodeKind::ArgumentList => "argument list",
            NodeKind::Identifier { .. } => "identifier",
            NodeKind::MemberAccess { .. } => "member access",
            NodeKind::Literal { .. } => "literal",
            NodeKind::Conditional { .. } => "conditional",
            NodeKind::Binary { .. } => "binary expression",
            NodeKind::Assignment { .. } => "assignment",
            NodeKind::This => "this",
            NodeKind::Other { kind } => kind,
        }
    }
}

/// A lowered syntax node.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub file: FileId,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Kind of declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Type,
    Method,
    Parameter,
    Field,
    Local,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Type => "type",
            SymbolKind::Method => "method",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Field => "field",
            SymbolKind::Local => "local",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared entity with its attribute names.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declared attribute names (for methods: the return qualifiers).
    pub qualifiers: Vec<String>,
    /// Declared type name, simple form (`Map<K, V>` -> `Map`).
    pub type_name: Option<String>,
    /// Owning type for members, owning method for parameters.
    pub container: Option<SymbolId>,
    /// Formal parameters, in order (methods only).
    pub parameters: Vec<SymbolId>,
    /// Fields and methods (types only).
    pub members: Vec<SymbolId>,
    /// Direct supertype names (types only).
    pub bases: Vec<String>,
    /// Base declaration this method overrides.
    pub overrides: Option<SymbolId>,
    pub declaration: Option<NodeId>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            qualifiers: Vec::new(),
            type_name: None,
            container: None,
            parameters: Vec::new(),
            members: Vec::new(),
            bases: Vec::new(),
            overrides: None,
            declaration: None,
        }
    }

    pub fn with_qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }
}

/// One source file of a program.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub source: String,
    pub root: Option<NodeId>,
    pub has_parse_errors: bool,
}

/// Compile-time value of a literal expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant<'a> {
    Str(&'a str),
    Null,
}

/// A lowered, resolved program.
#[derive(Debug, Default)]
pub struct Program {
    files: Vec<SourceFile>,
    nodes: Vec<Node>,
    symbols: Vec<Symbol>,
    resolutions: HashMap<NodeId, SymbolId>,
    declarations: HashMap<NodeId, SymbolId>,
}

impl Program {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    /// Ancestors from the parent outwards.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// `id` and all its descendants, in source (pre-)order.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    pub fn file_of(&self, id: NodeId) -> &SourceFile {
        self.file(self.node(id).file)
    }

    /// Root node of every file, in file order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.files.iter().filter_map(|f| f.root)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    /// The symbol an expression refers to, or `None` if unresolved.
    pub fn symbol_of(&self, id: NodeId) -> Option<SymbolId> {
        self.resolutions.get(&id).copied()
    }

    /// The symbol a declaration node introduces.
    pub fn declared_symbol(&self, id: NodeId) -> Option<SymbolId> {
        self.declarations.get(&id).copied()
    }

    pub fn qualifiers_of(&self, id: SymbolId) -> &[String] {
        &self.symbol(id).qualifiers
    }

    pub fn constant_value(&self, id: NodeId) -> Option<Constant<'_>> {
        match self.kind(id) {
            NodeKind::Literal {
                kind: LiteralKind::String,
                value,
            } => Some(Constant::Str(value.as_deref().unwrap_or(""))),
            NodeKind::Literal {
                kind: LiteralKind::Null,
                ..
            } => Some(Constant::Null),
            _ => None,
        }
    }

    /// Argument expressions of an invocation, in order.
    pub fn arguments(&self, invocation: NodeId) -> &[NodeId] {
        match self.kind(invocation) {
            NodeKind::Invocation { arguments, .. } => self.children(*arguments),
            _ => &[],
        }
    }

    /// Smallest block containing `id`.
    pub fn enclosing_block(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&a| matches!(self.kind(a), NodeKind::Block))
    }

    /// Dotted access path of an identifier or member-access chain
    /// (`this.key.value`), or `None` for any other shape.
    pub fn expression_path(&self, id: NodeId) -> Option<String> {
        match self.kind(id) {
            NodeKind::Identifier { name } => Some(name.clone()),
            NodeKind::This => Some("this".to_string()),
            NodeKind::MemberAccess { object, member } => {
                let base = self.expression_path(*object)?;
                Some(format!("{}.{}", base, member))
            }
            _ => None,
        }
    }
}

/// Incremental constructor for `Program`, used by front ends and tests.
///
/// Nodes are pushed bottom-up: children first, then the parent that lists
/// them, which fills in the children's parent links.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<String>, source: impl Into<String>) -> FileId {
        let id = FileId(self.program.files.len() as u32);
        self.program.files.push(SourceFile {
            path: path.into(),
            source: source.into(),
            root: None,
            has_parse_errors: false,
        });
        id
    }

    pub fn set_root(&mut self, file: FileId, root: NodeId) {
        self.program.files[file.index()].root = Some(root);
    }

    pub fn mark_parse_errors(&mut self, file: FileId) {
        self.program.files[file.index()].has_parse_errors = true;
    }

    pub fn push(
        &mut self,
        file: FileId,
        kind: NodeKind,
        span: Span,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.program.nodes.len() as u32);
        for &child in &children {
            self.program.nodes[child.index()].parent = Some(id);
        }
        self.program.nodes.push(Node {
            kind,
            file,
            span,
            parent: None,
            children,
        });
        id
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.program.symbols.len() as u32);
        self.program.symbols.push(symbol);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.program.symbol(id)
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.program.symbols[id.index()]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.program.symbols
    }

    pub fn node_kind(&self, id: NodeId) -> &NodeKind {
        self.program.kind(id)
    }

    pub fn resolution(&self, node: NodeId) -> Option<SymbolId> {
        self.program.symbol_of(node)
    }

    /// Record that expression `node` refers to `symbol`.
    pub fn resolve(&mut self, node: NodeId, symbol: SymbolId) {
        self.program.resolutions.insert(node, symbol);
    }

    /// Record that declaration `node` introduces `symbol`.
    pub fn declare(&mut self, node: NodeId, symbol: SymbolId) {
        self.program.declarations.insert(node, symbol);
        let sym = self.symbol_mut(symbol);
        if sym.declaration.is_none() {
            sym.declaration = Some(node);
        }
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: &mut ProgramBuilder, file: FileId, name: &str) -> NodeId {
        b.push(
            file,
            NodeKind::Identifier {
                name: name.to_string(),
            },
            Span::default(),
            vec![],
        )
    }

    #[test]
    fn test_identical_expressions_have_distinct_ids() {
        let mut b = ProgramBuilder::new();
        let file = b.add_file("A.java", "");
        let first = leaf(&mut b, file, "x");
        let second = leaf(&mut b, file, "x");
        assert_ne!(first, second);
    }

    #[test]
    fn test_parent_links_and_preorder() {
        let mut b = ProgramBuilder::new();
        let file = b.add_file("A.java", "");
        let object = leaf(&mut b, file, "this_key");
        let access = b.push(
            file,
            NodeKind::MemberAccess {
                object,
                member: "value".to_string(),
            },
            Span::default(),
            vec![object],
        );
        let block = b.push(file, NodeKind::Block, Span::default(), vec![access]);
        b.set_root(file, block);
        let program = b.finish();

        assert_eq!(program.parent(object), Some(access));
        assert_eq!(program.preorder(block), vec![block, access, object]);
        assert_eq!(program.enclosing_block(object), Some(block));
        assert_eq!(
            program.expression_path(access).as_deref(),
            Some("this_key.value")
        );
        assert_eq!(program.roots().count(), 1);
    }

    #[test]
    fn test_constant_value() {
        let mut b = ProgramBuilder::new();
        let file = b.add_file("A.java", "");
        let s = b.push(
            file,
            NodeKind::Literal {
                kind: LiteralKind::String,
                value: Some("key:Encrypted".to_string()),
            },
            Span::default(),
            vec![],
        );
        let n = b.push(
            file,
            NodeKind::Literal {
                kind: LiteralKind::Null,
                value: None,
            },
            Span::default(),
            vec![],
        );
        let program = b.finish();
        assert_eq!(program.constant_value(s), Some(Constant::Str("key:Encrypted")));
        assert_eq!(program.constant_value(n), Some(Constant::Null));
    }

    #[test]
    fn test_declare_sets_symbol_declaration() {
        let mut b = ProgramBuilder::new();
        let file = b.add_file("A.java", "");
        let sym = b.add_symbol(Symbol::new("key", SymbolKind::Local).with_qualifiers(["Encrypted"]));
        let decl = b.push(
            file,
            NodeKind::VariableDecl {
                name: "key".to_string(),
                initializer: None,
            },
            Span::default(),
            vec![],
        );
        b.declare(decl, sym);
        let program = b.finish();
        assert_eq!(program.declared_symbol(decl), Some(sym));
        assert_eq!(program.symbol(sym).declaration, Some(decl));
        assert_eq!(program.qualifiers_of(sym), ["Encrypted".to_string()]);
    }
}
