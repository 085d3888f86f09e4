use {
    crate::error::{CompileError, Diagnostic},
    regex::Regex,
    std::fmt,
    tracing::debug,
};

pub const MAX_LEXEME_LEN: usize = 128;

pub const KEYWORDS: [(&str, TokenKind); 10] = [
    ("read", TokenKind::Read),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("int", TokenKind::Int),
    ("char", TokenKind::Char),
    ("break", TokenKind::Break),
    ("write", TokenKind::Write),
    ("writeln", TokenKind::Writeln),
    ("while", TokenKind::While),
    ("return", TokenKind::Return),
];

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TokenKind {
    Ident,
    Num,
    Float,

    Read,
    If,
    Else,
    Int,
    Char,
    Break,
    Write,
    Writeln,
    While,
    Return,

    LBrack,
    RBrack,
    Eq,
    Assign,
    Ne,
    Not,
    Minus,
    Plus,
    Star,
    Slash,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,

    Semicolon,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,

    Done,
    Error,
}

impl TokenKind {
    /// Punctuation only steers the parser and never shows up in the syntax tree.
    pub fn is_punctuation(&self) -> bool {
        matches!(
            self,
            TokenKind::Semicolon
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Done
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(self, TokenKind::Int | TokenKind::Char)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::Num => "number",
            TokenKind::Float => "float",
            TokenKind::Read => "'read'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Int => "'int'",
            TokenKind::Char => "'char'",
            TokenKind::Break => "'break'",
            TokenKind::Write => "'write'",
            TokenKind::Writeln => "'writeln'",
            TokenKind::While => "'while'",
            TokenKind::Return => "'return'",
            TokenKind::LBrack => "'['",
            TokenKind::RBrack => "']'",
            TokenKind::Eq => "'=='",
            TokenKind::Assign => "'='",
            TokenKind::Ne => "'!='",
            TokenKind::Not => "'!'",
            TokenKind::Minus => "'-'",
            TokenKind::Plus => "'+'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Less => "'<'",
            TokenKind::LessEq => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEq => "'>='",
            TokenKind::And => "'&&'",
            TokenKind::Or => "'||'",
            TokenKind::Semicolon => "';'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Done => "end of file",
            TokenKind::Error => "invalid token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum TokenValue {
    None,
    Int(i32),
    Float(f32),
    Error(String),
}

#[derive(PartialEq, Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub value: TokenValue,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: &str, line: u32) -> Token {
        Token {
            kind,
            lexeme: String::from(lexeme),
            value: TokenValue::None,
            line,
        }
    }

    fn with_value(kind: TokenKind, lexeme: &str, value: TokenValue, line: u32) -> Token {
        Token {
            kind,
            lexeme: String::from(lexeme),
            value,
            line,
        }
    }

    fn error(message: impl Into<String>, lexeme: &str, line: u32) -> Token {
        Token::with_value(
            TokenKind::Error,
            lexeme,
            TokenValue::Error(message.into()),
            line,
        )
    }

    /// Converts an error token into the fatal error it stands for.
    pub fn to_error(&self) -> Option<CompileError> {
        if let TokenValue::Error(message) = &self.value {
            Some(CompileError::lex(self.line, message.clone()))
        } else {
            None
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            TokenValue::Int(val) => write!(
                f,
                "{:>4}: {:<12} {} ({})",
                self.line,
                format!("{:?}", self.kind),
                self.lexeme,
                val
            ),
            _ => write!(f, "{:>4}: {:<12} {}", self.line, format!("{:?}", self.kind), self.lexeme),
        }
    }
}

/// Anything the parser can pull tokens from, one at a time.
pub trait TokenSource {
    fn next_token(&mut self) -> Token;

    /// Non-fatal problems noticed while producing tokens so far.
    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        vec![]
    }
}

impl TokenSource for std::vec::IntoIter<Token> {
    fn next_token(&mut self) -> Token {
        self.next().unwrap_or_else(|| Token::new(TokenKind::Done, "", 0))
    }
}

#[derive(Clone, Copy, Debug)]
enum Rule {
    Whitespace,
    LineComment,
    BlockComment,
    Float,
    BadFloat,
    Hex,
    Decimal,
    CharLiteral,
    Word,
    Fixed(TokenKind),
    Lenient(TokenKind),
}

fn char_literal_value(body: &str) -> Option<i32> {
    let mut chars = body.chars();
    let value = match chars.next()? {
        '\\' => match chars.next()? {
            't' => '\t' as i32,
            'f' => 0x0c,
            'n' => '\n' as i32,
            'r' => '\r' as i32,
            'v' => 0x0b,
            _ => return None,
        },
        c => c as i32,
    };

    if chars.next().is_none() {
        Some(value)
    } else {
        None
    }
}

pub struct Lexer<'i> {
    remaining: &'i str,
    line: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'i> Lexer<'i> {
    pub fn new(input: &'i str) -> Lexer<'i> {
        Lexer {
            remaining: input,
            line: 1,
            diagnostics: vec![],
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn consume(&mut self, len: usize) -> &'i str {
        let (matched, rest) = self.remaining.split_at(len);
        self.remaining = rest;
        matched
    }

    fn count_lines(&mut self, text: &str) {
        self.line += text.matches('\n').count() as u32;
    }

    fn lex_word(&self, word: &str) -> Token {
        if word.len() > MAX_LEXEME_LEN {
            return Token::error(
                format!("identifiers can be at most {} characters long", MAX_LEXEME_LEN),
                word,
                self.line,
            );
        }

        KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == word)
            .map(|(_, kind)| Token::new(*kind, word, self.line))
            .unwrap_or_else(|| Token::new(TokenKind::Ident, word, self.line))
    }

    fn lex_integer(&self, text: &str) -> Token {
        match parse_int::parse::<i32>(text) {
            Ok(val) => Token::with_value(TokenKind::Num, text, TokenValue::Int(val), self.line),
            Err(_) => Token::error(
                format!("integer literal {} is out of range", text),
                text,
                self.line,
            ),
        }
    }
}

fn token_rule(pattern: &str, rule: Rule) -> (Regex, Rule) {
    (Regex::new(pattern).expect("failed to compile regex"), rule)
}

impl<'i> TokenSource for Lexer<'i> {
    fn next_token(&mut self) -> Token {
        lazy_static! {
            static ref TOKEN_REGEXES: Vec<(Regex, Rule)> = vec![
                token_rule(r"^\s+", Rule::Whitespace),
                token_rule(r"^//[^\n]*", Rule::LineComment),
                token_rule(r"^/\*", Rule::BlockComment),
                token_rule(r"^[0-9]+\.[0-9]+", Rule::Float),
                token_rule(r"^[0-9]+\.", Rule::BadFloat),
                token_rule(r"^0[xX][0-9a-fA-F]+", Rule::Hex),
                token_rule(r"^[0-9]+", Rule::Decimal),
                token_rule(r"^'(\\.|[^'\\\n])'", Rule::CharLiteral),
                token_rule(r"^[a-zA-Z][a-zA-Z0-9_]*", Rule::Word),
                token_rule(r"^==", Rule::Fixed(TokenKind::Eq)),
                token_rule(r"^!=", Rule::Fixed(TokenKind::Ne)),
                token_rule(r"^<=", Rule::Fixed(TokenKind::LessEq)),
                token_rule(r"^>=", Rule::Fixed(TokenKind::GreaterEq)),
                token_rule(r"^&&", Rule::Fixed(TokenKind::And)),
                token_rule(r"^\|\|", Rule::Fixed(TokenKind::Or)),
                token_rule(r"^&", Rule::Lenient(TokenKind::And)),
                token_rule(r"^\|", Rule::Lenient(TokenKind::Or)),
                token_rule(r"^=", Rule::Fixed(TokenKind::Assign)),
                token_rule(r"^!", Rule::Fixed(TokenKind::Not)),
                token_rule(r"^<", Rule::Fixed(TokenKind::Less)),
                token_rule(r"^>", Rule::Fixed(TokenKind::Greater)),
                token_rule(r"^\+", Rule::Fixed(TokenKind::Plus)),
                token_rule(r"^-", Rule::Fixed(TokenKind::Minus)),
                token_rule(r"^\*", Rule::Fixed(TokenKind::Star)),
                token_rule(r"^/", Rule::Fixed(TokenKind::Slash)),
                token_rule(r"^\[", Rule::Fixed(TokenKind::LBrack)),
                token_rule(r"^\]", Rule::Fixed(TokenKind::RBrack)),
                token_rule(r"^\{", Rule::Fixed(TokenKind::LBrace)),
                token_rule(r"^\}", Rule::Fixed(TokenKind::RBrace)),
                token_rule(r"^\(", Rule::Fixed(TokenKind::LParen)),
                token_rule(r"^\)", Rule::Fixed(TokenKind::RParen)),
                token_rule(r"^;", Rule::Fixed(TokenKind::Semicolon)),
                token_rule(r"^,", Rule::Fixed(TokenKind::Comma)),
            ];
        }

        'scan: loop {
            if self.remaining.is_empty() {
                return Token::new(TokenKind::Done, "", self.line);
            }

            for (r, rule) in TOKEN_REGEXES.iter() {
                let len = match r.find(self.remaining) {
                    Some(mat) => mat.end(),
                    None => continue,
                };

                let line = self.line;
                let token = match *rule {
                    Rule::Whitespace | Rule::LineComment => {
                        let text = self.consume(len);
                        self.count_lines(text);
                        continue 'scan;
                    }
                    Rule::BlockComment => match self.remaining[len..].find("*/") {
                        Some(end) => {
                            let text = self.consume(len + end + 2);
                            self.count_lines(text);
                            continue 'scan;
                        }
                        None => {
                            let text = self.consume(self.remaining.len());
                            self.count_lines(text);
                            Token::error("comment is never closed with */", "/*", line)
                        }
                    },
                    Rule::Float => {
                        let text = self.consume(len);
                        match text.parse::<f32>() {
                            Ok(val) => Token::with_value(
                                TokenKind::Float,
                                text,
                                TokenValue::Float(val),
                                line,
                            ),
                            Err(_) => Token::error("malformed float literal", text, line),
                        }
                    }
                    Rule::BadFloat => {
                        let text = self.consume(len);
                        Token::error("floats must have digits after the decimal point", text, line)
                    }
                    Rule::Hex | Rule::Decimal => {
                        let text = self.consume(len);
                        self.lex_integer(text)
                    }
                    Rule::CharLiteral => {
                        let text = self.consume(len);
                        match char_literal_value(&text[1..text.len() - 1]) {
                            Some(val) => {
                                Token::with_value(TokenKind::Num, text, TokenValue::Int(val), line)
                            }
                            None => Token::error(
                                format!("unknown escape in character literal {}", text),
                                text,
                                line,
                            ),
                        }
                    }
                    Rule::Word => {
                        let text = self.consume(len);
                        self.lex_word(text)
                    }
                    Rule::Fixed(kind) => {
                        let text = self.consume(len);
                        Token::new(kind, text, line)
                    }
                    Rule::Lenient(kind) => {
                        let text = self.consume(len);
                        let diagnostic = Diagnostic::new(
                            line,
                            format!("'{}' is not an operator, treating it as {}", text, kind),
                        );
                        debug!(%diagnostic, "lenient operator");
                        self.diagnostics.push(diagnostic);
                        Token::new(kind, text, line)
                    }
                };

                debug!(token = %token);
                return token;
            }

            let bad_len = self.remaining.chars().next().map_or(1, |c| c.len_utf8());
            let text = self.consume(bad_len);
            return Token::error(format!("unrecognized token '{}'", text), text, self.line);
        }
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Lexes the whole input up front. The first lexical error stops the scan.
pub fn lex_all_tokens(input: &str) -> Result<Vec<Token>, CompileError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = vec![];

    loop {
        let token = lexer.next_token();
        if let Some(err) = token.to_error() {
            return Err(err);
        }

        if token.kind == TokenKind::Done {
            return Ok(tokens);
        }

        tokens.push(token);
    }
}
