use {
    crate::{
        ast::{Ast, NodeId, NodeKind},
        error::{CompileError, Diagnostic},
        lexer::{Lexer, Token, TokenKind, TokenSource, TokenValue},
    },
    tracing::{debug, instrument},
};

type ParseResult<T> = Result<T, CompileError>;

/// A parsed program along with every recoverable problem found on the way.
#[derive(Debug)]
pub struct ParseOutput {
    pub ast: Ast,
    pub root: NodeId,
    pub diagnostics: Vec<Diagnostic>,
}

fn starts_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Semicolon
            | TokenKind::Return
            | TokenKind::Read
            | TokenKind::Write
            | TokenKind::Writeln
            | TokenKind::Break
            | TokenKind::If
            | TokenKind::While
            | TokenKind::LBrace
    ) || starts_expression(kind)
}

fn starts_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Not
            | TokenKind::Minus
            | TokenKind::Num
            | TokenKind::Float
            | TokenKind::Ident
            | TokenKind::LParen
    )
}

pub struct Parser<S: TokenSource> {
    source: S,
    lookahead: Token,
    ast: Ast,
    diagnostics: Vec<Diagnostic>,
}

impl<S: TokenSource> Parser<S> {
    pub fn new(mut source: S) -> ParseResult<Parser<S>> {
        let lookahead = source.next_token();
        if let Some(err) = lookahead.to_error() {
            return Err(err);
        }

        let diagnostics = source.take_diagnostics();
        Ok(Parser {
            source,
            lookahead,
            ast: Ast::new(),
            diagnostics,
        })
    }

    fn advance(&mut self) -> ParseResult<()> {
        self.lookahead = self.source.next_token();
        self.diagnostics.append(&mut self.source.take_diagnostics());

        match self.lookahead.to_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.lookahead.kind == kind
    }

    fn report(&mut self, message: String) {
        let diagnostic = Diagnostic::new(self.lookahead.line, message);
        debug!(%diagnostic, "recovered");
        self.diagnostics.push(diagnostic);
    }

    fn fatal<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(CompileError::syntax(self.lookahead.line, message))
    }

    fn leaf_from_lookahead(&mut self) -> Option<NodeId> {
        let (int_value, float_value) = match self.lookahead.value {
            TokenValue::Int(val) => (val, 0.0),
            TokenValue::Float(val) => (0, val),
            _ => (0, 0.0),
        };

        NodeKind::from_token(self.lookahead.kind, &self.lookahead.lexeme, int_value, float_value)
            .map(|kind| self.ast.create_node(kind, self.lookahead.line))
    }

    /// Consumes the expected token. Tokens that belong in the tree come back as a new leaf.
    fn match_token(&mut self, expected: TokenKind) -> ParseResult<Option<NodeId>> {
        if self.at(expected) {
            let node = if expected.is_punctuation() {
                None
            } else {
                self.leaf_from_lookahead()
            };

            self.advance()?;
            return Ok(node);
        }

        match expected {
            TokenKind::Semicolon
            | TokenKind::LBrace
            | TokenKind::LParen
            | TokenKind::RParen
            | TokenKind::Comma => {
                self.report(format!(
                    "expected {} before {}. Compiler inserted it for you",
                    expected, self.lookahead.kind
                ));
                Ok(None)
            }
            TokenKind::RBrack => {
                self.report(format!(
                    "expected {} before {}. Compiler inserted it for you",
                    expected, self.lookahead.kind
                ));
                Ok(Some(self.ast.create_node(NodeKind::RBrack, self.lookahead.line)))
            }
            _ => self.fatal(format!("expected {} but found {}", expected, self.lookahead.kind)),
        }
    }

    fn match_node(&mut self, expected: TokenKind) -> ParseResult<NodeId> {
        match self.match_token(expected)? {
            Some(node) => Ok(node),
            None => self.fatal(format!("expected {}", expected)),
        }
    }

    /// Panic mode: throws away tokens until a ';' or '}' is next.
    fn skip_ahead(&mut self, message: &str) -> ParseResult<()> {
        self.report(String::from(message));

        while !self.at(TokenKind::Semicolon) && !self.at(TokenKind::RBrace) {
            if self.at(TokenKind::Done) {
                return self.fatal("unexpected end of file while skipping a bad statement");
            }

            self.advance()?;
        }

        debug!(line = self.lookahead.line, "resuming at {}", self.lookahead.kind);
        Ok(())
    }

    /// After a statement was skipped, finishes it off so the next one can start.
    fn discard_statement(&mut self) -> ParseResult<Option<NodeId>> {
        if self.at(TokenKind::Semicolon) {
            self.advance()?;
        }
        Ok(None)
    }

    #[instrument(level = "debug", skip_all)]
    pub fn parse_program(mut self) -> ParseResult<ParseOutput> {
        let root = self.ast.create_node(NodeKind::Program, self.lookahead.line);

        // Global variables come first. The first '(' after a name switches over to functions.
        loop {
            if self.at(TokenKind::Done) {
                return self.fatal("program must contain at least one function");
            }

            let (type_node, id_node) = self.declaration_start()?;
            if self.at(TokenKind::LParen) {
                let func = self.function_rest(type_node, id_node)?;
                self.ast.add_child(root, func);
                break;
            }

            let var_decl = self.var_decl_rest(type_node, id_node)?;
            self.ast.add_child(root, var_decl);
        }

        while !self.at(TokenKind::Done) {
            let (type_node, id_node) = self.declaration_start()?;
            let func = self.function_rest(type_node, id_node)?;
            self.ast.add_child(root, func);
        }

        Ok(ParseOutput {
            ast: self.ast,
            root,
            diagnostics: self.diagnostics,
        })
    }

    fn declaration_start(&mut self) -> ParseResult<(NodeId, NodeId)> {
        if !self.lookahead.kind.is_type() {
            return self.fatal(format!(
                "declarations must start with 'int' or 'char', found {}",
                self.lookahead.kind
            ));
        }

        let type_node = self.match_node(self.lookahead.kind)?;
        let id_node = self.match_node(TokenKind::Ident)?;
        Ok((type_node, id_node))
    }

    fn var_decl(&mut self) -> ParseResult<NodeId> {
        let (type_node, id_node) = self.declaration_start()?;
        self.var_decl_rest(type_node, id_node)
    }

    fn var_decl_rest(&mut self, type_node: NodeId, id_node: NodeId) -> ParseResult<NodeId> {
        let var_decl = self.ast.create_node(NodeKind::VarDecl, self.ast.line(type_node));
        self.ast.add_child(var_decl, type_node);
        self.ast.add_child(var_decl, id_node);

        if self.at(TokenKind::LBrack) {
            let lbrack = self.match_node(TokenKind::LBrack)?;
            let size = self.match_node(TokenKind::Num)?;
            let rbrack = self.match_node(TokenKind::RBrack)?;
            self.ast.add_child(var_decl, lbrack);
            self.ast.add_child(var_decl, size);
            self.ast.add_child(var_decl, rbrack);
        }

        self.match_token(TokenKind::Semicolon)?;
        Ok(var_decl)
    }

    fn function_rest(&mut self, type_node: NodeId, id_node: NodeId) -> ParseResult<NodeId> {
        let func = self.ast.create_node(NodeKind::FuncDecl, self.ast.line(type_node));
        self.ast.add_child(func, type_node);
        self.ast.add_child(func, id_node);

        self.match_token(TokenKind::LParen)?;

        if self.at(TokenKind::Ident) {
            return self.fatal("parameters must have type 'int' or 'char'");
        }

        if self.lookahead.kind.is_type() {
            loop {
                let param = self.param()?;
                self.ast.add_child(func, param);

                if self.at(TokenKind::Comma) {
                    self.advance()?;
                } else if self.lookahead.kind.is_type() {
                    self.match_token(TokenKind::Comma)?;
                } else {
                    break;
                }
            }
        }

        self.match_token(TokenKind::RParen)?;
        self.match_token(TokenKind::LBrace)?;

        let block = self.block()?;
        self.ast.add_child(func, block);
        Ok(func)
    }

    fn param(&mut self) -> ParseResult<NodeId> {
        if !self.lookahead.kind.is_type() {
            return self.fatal("parameters must have type 'int' or 'char'");
        }

        let type_node = self.match_node(self.lookahead.kind)?;
        let param = self.ast.create_node(NodeKind::Param, self.ast.line(type_node));
        let id_node = self.match_node(TokenKind::Ident)?;
        self.ast.add_child(param, type_node);
        self.ast.add_child(param, id_node);

        if self.at(TokenKind::LBrack) {
            let lbrack = self.match_node(TokenKind::LBrack)?;
            let rbrack = self.match_node(TokenKind::RBrack)?;
            self.ast.add_child(param, lbrack);
            self.ast.add_child(param, rbrack);
        }

        Ok(param)
    }

    /// Parses the rest of a block whose '{' was already consumed, through its closing '}'.
    fn block(&mut self) -> ParseResult<NodeId> {
        let block = self.ast.create_node(NodeKind::Block, self.lookahead.line);

        if !self.lookahead.kind.is_type() && !starts_statement(self.lookahead.kind) {
            return self.fatal(format!("bad start of block: {}", self.lookahead.kind));
        }

        while self.lookahead.kind.is_type() {
            let var_decl = self.var_decl()?;
            self.ast.add_child(block, var_decl);
        }

        if self.at(TokenKind::RBrace) {
            return self.fatal("a block must contain at least one statement");
        }

        loop {
            if self.at(TokenKind::RBrace) {
                self.advance()?;
                return Ok(block);
            }

            if self.at(TokenKind::Done) {
                return self.fatal("unexpected end of file inside a block");
            }

            if starts_statement(self.lookahead.kind) {
                if let Some(statement) = self.statement()? {
                    self.ast.add_child(block, statement);
                }
            } else {
                self.skip_ahead("Unexpected start to statement. Line ignored.")?;
                self.discard_statement()?;
            }
        }
    }

    fn statement(&mut self) -> ParseResult<Option<NodeId>> {
        match self.lookahead.kind {
            TokenKind::Semicolon => {
                self.advance()?;
                Ok(None)
            }
            TokenKind::Return | TokenKind::Write => {
                let node = self.match_node(self.lookahead.kind)?;
                match self.expression()? {
                    Some(expr) => self.ast.add_child(node, expr),
                    None => return self.discard_statement(),
                }
                self.match_token(TokenKind::Semicolon)?;
                Ok(Some(node))
            }
            TokenKind::Read => {
                let node = self.match_node(TokenKind::Read)?;
                let id_node = self.match_node(TokenKind::Ident)?;
                self.ast.add_child(node, id_node);
                self.match_token(TokenKind::Semicolon)?;
                Ok(Some(node))
            }
            TokenKind::Writeln | TokenKind::Break => {
                let node = self.match_node(self.lookahead.kind)?;
                self.match_token(TokenKind::Semicolon)?;
                Ok(Some(node))
            }
            TokenKind::If => {
                let node = self.match_node(TokenKind::If)?;
                self.match_token(TokenKind::LParen)?;
                match self.expression()? {
                    Some(cond) => self.ast.add_child(node, cond),
                    None => return self.discard_statement(),
                }
                self.match_token(TokenKind::RParen)?;

                if let Some(then_branch) = self.statement()? {
                    self.ast.add_child(node, then_branch);
                }

                let else_node = self.match_node(TokenKind::Else)?;
                if let Some(else_branch) = self.statement()? {
                    self.ast.add_child(else_node, else_branch);
                }
                self.ast.add_child(node, else_node);
                Ok(Some(node))
            }
            TokenKind::While => {
                let node = self.match_node(TokenKind::While)?;
                self.match_token(TokenKind::LParen)?;
                match self.expression()? {
                    Some(cond) => self.ast.add_child(node, cond),
                    None => return self.discard_statement(),
                }
                self.match_token(TokenKind::RParen)?;

                if let Some(body) = self.statement()? {
                    self.ast.add_child(node, body);
                }
                Ok(Some(node))
            }
            TokenKind::LBrace => {
                self.advance()?;
                Ok(Some(self.block()?))
            }
            TokenKind::Done => self.fatal("unexpected end of file, expected a statement"),
            _ => match self.expression()? {
                Some(expr) => {
                    self.match_token(TokenKind::Semicolon)?;
                    Ok(Some(expr))
                }
                None => self.discard_statement(),
            },
        }
    }

    fn expression(&mut self) -> ParseResult<Option<NodeId>> {
        let target = match self.or_expression()? {
            Some(node) => node,
            None => return Ok(None),
        };

        if !self.at(TokenKind::Assign) {
            return Ok(Some(target));
        }

        let assign = self.match_node(TokenKind::Assign)?;
        let value = match self.expression()? {
            Some(node) => node,
            None => return Ok(None),
        };

        self.ast.add_child(assign, target);
        self.ast.add_child(assign, value);
        Ok(Some(assign))
    }

    /// One left-associative precedence level.
    fn binary_level(
        &mut self,
        operators: &[TokenKind],
        operand: fn(&mut Self) -> ParseResult<Option<NodeId>>,
    ) -> ParseResult<Option<NodeId>> {
        let mut lhs = match operand(self)? {
            Some(node) => node,
            None => return Ok(None),
        };

        while operators.contains(&self.lookahead.kind) {
            let op = self.match_node(self.lookahead.kind)?;
            let rhs = match operand(self)? {
                Some(node) => node,
                None => return Ok(None),
            };

            self.ast.add_child(op, lhs);
            self.ast.add_child(op, rhs);
            lhs = op;
        }

        Ok(Some(lhs))
    }

    fn or_expression(&mut self) -> ParseResult<Option<NodeId>> {
        self.binary_level(&[TokenKind::Or], Self::and_expression)
    }

    fn and_expression(&mut self) -> ParseResult<Option<NodeId>> {
        self.binary_level(&[TokenKind::And], Self::equality_expression)
    }

    fn equality_expression(&mut self) -> ParseResult<Option<NodeId>> {
        self.binary_level(&[TokenKind::Eq, TokenKind::Ne], Self::relational_expression)
    }

    fn relational_expression(&mut self) -> ParseResult<Option<NodeId>> {
        self.binary_level(
            &[
                TokenKind::Less,
                TokenKind::LessEq,
                TokenKind::Greater,
                TokenKind::GreaterEq,
            ],
            Self::additive_expression,
        )
    }

    fn additive_expression(&mut self) -> ParseResult<Option<NodeId>> {
        self.binary_level(&[TokenKind::Plus, TokenKind::Minus], Self::multiplicative_expression)
    }

    fn multiplicative_expression(&mut self) -> ParseResult<Option<NodeId>> {
        self.binary_level(&[TokenKind::Star, TokenKind::Slash], Self::unary_expression)
    }

    fn unary_expression(&mut self) -> ParseResult<Option<NodeId>> {
        let node = match self.lookahead.kind {
            TokenKind::Not => self.match_node(TokenKind::Not)?,
            TokenKind::Minus => {
                let node = self.ast.create_node(NodeKind::Negate, self.lookahead.line);
                self.advance()?;
                node
            }
            _ => return self.primary_expression(),
        };

        let operand = match self.unary_expression()? {
            Some(operand) => operand,
            None => return Ok(None),
        };

        self.ast.add_child(node, operand);
        Ok(Some(node))
    }

    fn primary_expression(&mut self) -> ParseResult<Option<NodeId>> {
        match self.lookahead.kind {
            TokenKind::Num | TokenKind::Float => Ok(Some(self.match_node(self.lookahead.kind)?)),
            TokenKind::LParen => {
                self.advance()?;
                let inner = match self.expression()? {
                    Some(node) => node,
                    None => return Ok(None),
                };
                self.match_token(TokenKind::RParen)?;
                Ok(Some(inner))
            }
            TokenKind::Ident => {
                let id_node = self.match_node(TokenKind::Ident)?;

                if self.at(TokenKind::LParen) {
                    let args = self.ast.create_node(NodeKind::ExprList, self.lookahead.line);
                    self.advance()?;

                    if !self.at(TokenKind::RParen) {
                        loop {
                            let arg = match self.expression()? {
                                Some(node) => node,
                                None => return Ok(None),
                            };
                            self.ast.add_child(args, arg);

                            if self.at(TokenKind::Comma) {
                                self.advance()?;
                            } else if starts_expression(self.lookahead.kind) {
                                self.match_token(TokenKind::Comma)?;
                            } else {
                                break;
                            }
                        }
                    }

                    self.match_token(TokenKind::RParen)?;
                    self.ast.add_child(id_node, args);
                } else if self.at(TokenKind::LBrack) {
                    let lbrack = self.match_node(TokenKind::LBrack)?;
                    let index = match self.expression()? {
                        Some(node) => node,
                        None => return Ok(None),
                    };
                    let rbrack = self.match_node(TokenKind::RBrack)?;
                    self.ast.add_child(id_node, lbrack);
                    self.ast.add_child(id_node, index);
                    self.ast.add_child(id_node, rbrack);
                }

                Ok(Some(id_node))
            }
            _ => {
                self.skip_ahead("Invalid expression. Line ignored.")?;
                Ok(None)
            }
        }
    }
}

pub fn parse_source(input: &str) -> Result<ParseOutput, CompileError> {
    Parser::new(Lexer::new(input))?.parse_program()
}
