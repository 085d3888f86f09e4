use {crate::lexer::TokenKind, std::fmt};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum VarType {
    Int,
    Char,
}

impl VarType {
    pub fn size(&self) -> i32 {
        match self {
            VarType::Int => crate::storage::INT_SIZE,
            VarType::Char => crate::storage::CHAR_SIZE,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VarType::Int => write!(f, "int"),
            VarType::Char => write!(f, "char"),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    Ne,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperator {
    fn from_token(kind: TokenKind) -> Option<BinaryOperator> {
        Some(match kind {
            TokenKind::Or => BinaryOperator::Or,
            TokenKind::And => BinaryOperator::And,
            TokenKind::Eq => BinaryOperator::Eq,
            TokenKind::Ne => BinaryOperator::Ne,
            TokenKind::Less => BinaryOperator::Less,
            TokenKind::LessEq => BinaryOperator::LessEq,
            TokenKind::Greater => BinaryOperator::Greater,
            TokenKind::GreaterEq => BinaryOperator::GreaterEq,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Star => BinaryOperator::Multiply,
            TokenKind::Slash => BinaryOperator::Divide,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }
}

/// What a node stands for. The first group are grammar constructs, the rest are leaves built
/// from tokens.
#[derive(PartialEq, Clone, Debug)]
pub enum NodeKind {
    Program,
    FuncDecl,
    VarDecl,
    Param,
    Block,
    ExprList,

    Type(VarType),
    Ident(String),
    Num(i32),
    Float(f32),
    LBrack,
    RBrack,
    Return,
    Read,
    Write,
    Writeln,
    Break,
    If,
    Else,
    While,
    Assign,
    Binary(BinaryOperator),
    Negate,
    Not,
}

impl NodeKind {
    pub fn is_nonterminal(&self) -> bool {
        matches!(
            self,
            NodeKind::Program
                | NodeKind::FuncDecl
                | NodeKind::VarDecl
                | NodeKind::Param
                | NodeKind::Block
                | NodeKind::ExprList
        )
    }

    /// The leaf a matched token turns into. Punctuation has no node.
    pub fn from_token(
        kind: TokenKind,
        lexeme: &str,
        int_value: i32,
        float_value: f32,
    ) -> Option<NodeKind> {
        if let Some(op) = BinaryOperator::from_token(kind) {
            return Some(NodeKind::Binary(op));
        }

        Some(match kind {
            TokenKind::Ident => NodeKind::Ident(String::from(lexeme)),
            TokenKind::Num => NodeKind::Num(int_value),
            TokenKind::Float => NodeKind::Float(float_value),
            TokenKind::Int => NodeKind::Type(VarType::Int),
            TokenKind::Char => NodeKind::Type(VarType::Char),
            TokenKind::Read => NodeKind::Read,
            TokenKind::If => NodeKind::If,
            TokenKind::Else => NodeKind::Else,
            TokenKind::Break => NodeKind::Break,
            TokenKind::Write => NodeKind::Write,
            TokenKind::Writeln => NodeKind::Writeln,
            TokenKind::While => NodeKind::While,
            TokenKind::Return => NodeKind::Return,
            TokenKind::LBrack => NodeKind::LBrack,
            TokenKind::RBrack => NodeKind::RBrack,
            TokenKind::Assign => NodeKind::Assign,
            TokenKind::Not => NodeKind::Not,
            _ => return None,
        })
    }

    pub fn label(&self) -> String {
        match self {
            NodeKind::Program => String::from("PROGRAM"),
            NodeKind::FuncDecl => String::from("FUNC_DECL"),
            NodeKind::VarDecl => String::from("VAR_DECL"),
            NodeKind::Param => String::from("PARAM"),
            NodeKind::Block => String::from("BLOCK"),
            NodeKind::ExprList => String::from("EXPR_LIST"),
            NodeKind::Type(var_type) => format!("{}", var_type),
            NodeKind::Ident(name) => name.clone(),
            NodeKind::Num(val) => format!("{}", val),
            NodeKind::Float(val) => format!("{}", val),
            NodeKind::LBrack => String::from("["),
            NodeKind::RBrack => String::from("]"),
            NodeKind::Return => String::from("return"),
            NodeKind::Read => String::from("read"),
            NodeKind::Write => String::from("write"),
            NodeKind::Writeln => String::from("writeln"),
            NodeKind::Break => String::from("break"),
            NodeKind::If => String::from("if"),
            NodeKind::Else => String::from("else"),
            NodeKind::While => String::from("while"),
            NodeKind::Assign => String::from("="),
            NodeKind::Binary(op) => String::from(op.symbol()),
            NodeKind::Negate => String::from("-"),
            NodeKind::Not => String::from("!"),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct NodeId(usize);

#[derive(PartialEq, Clone, Debug)]
pub struct AstNode {
    pub kind: NodeKind,
    pub line: u32,
    pub children: Vec<NodeId>,
}

/// Owns every node of one syntax tree. Dropping the arena releases the whole tree at once.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Ast {
        Ast { nodes: vec![] }
    }

    pub fn create_node(&mut self, kind: NodeKind, line: u32) -> NodeId {
        self.nodes.push(AstNode {
            kind,
            line,
            children: vec![],
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(child.0 < self.nodes.len());
        self.nodes[parent.0].children.push(child);
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn line(&self, id: NodeId) -> u32 {
        self.nodes[id.0].line
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.0].children.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ident_name(&self, id: NodeId) -> Option<&str> {
        if let NodeKind::Ident(name) = self.kind(id) {
            Some(name)
        } else {
            None
        }
    }

    /// Depth-first walk that visits the children of a node from last to first before the node
    /// itself.
    pub fn traverse<F>(&self, root: NodeId, visitor: &mut F)
    where
        F: FnMut(&AstNode, u32),
    {
        self.traverse_at_depth(root, 0, visitor)
    }

    fn traverse_at_depth<F>(&self, id: NodeId, depth: u32, visitor: &mut F)
    where
        F: FnMut(&AstNode, u32),
    {
        for child in self.children(id).iter().rev() {
            self.traverse_at_depth(*child, depth + 1, visitor);
        }

        visitor(self.node(id), depth);
    }

    /// The tree laid on its side: the root at the left margin and printed last, the last child
    /// on top.
    pub fn to_sideways_string(&self, root: NodeId) -> String {
        let mut result = String::new();
        self.traverse(root, &mut |node, depth| {
            result += &node.ast_to_string(depth);
            result += "\n";
        });
        result
    }

    /// A python script that draws the tree with nltk.
    pub fn to_nltk_script(&self, root: NodeId) -> String {
        format!(
            "from nltk import Tree\n\ntree = Tree.fromstring(\"\"\"{}\"\"\")\ntree.draw()\n",
            self.nltk_bracketed(root)
        )
    }

    fn nltk_bracketed(&self, id: NodeId) -> String {
        let node = self.node(id);
        let label = nltk_escape(&node.kind.label());
        if node.children.is_empty() {
            return label;
        }

        let mut result = format!("({}", label);
        for child in node.children.iter() {
            result += " ";
            result += &self.nltk_bracketed(*child);
        }
        result + ")"
    }
}

fn nltk_escape(label: &str) -> String {
    label.replace('(', "-LRB-").replace(')', "-RRB-")
}

pub trait AstToString {
    fn ast_to_string(&self, indent_levels: u32) -> String;

    fn get_indent_string(indent_levels: u32) -> String {
        let mut result = String::new();
        for _ in 0..indent_levels {
            result += "       ";
        }
        result
    }
}

impl AstToString for AstNode {
    fn ast_to_string(&self, indent_levels: u32) -> String {
        format!("{}{}", Self::get_indent_string(indent_levels), self.kind.label())
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
