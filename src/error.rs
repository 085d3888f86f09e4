use std::fmt;
use thiserror::Error;

/// Anything that stops a compilation. Every variant that comes from the source text carries
/// the line it was found on.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Line {line}: {message}")]
    Lex { line: u32, message: String },

    #[error("Line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("Line {line}: {kind}")]
    Semantic { line: u32, kind: SemanticError },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    pub fn lex(line: u32, message: impl Into<String>) -> Self {
        CompileError::Lex {
            line,
            message: message.into(),
        }
    }

    pub fn syntax(line: u32, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn semantic(line: u32, kind: SemanticError) -> Self {
        CompileError::Semantic { line, kind }
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            CompileError::Lex { line, .. }
            | CompileError::Syntax { line, .. }
            | CompileError::Semantic { line, .. } => Some(*line),
            CompileError::Io { .. } => None,
        }
    }

    pub fn semantic_kind(&self) -> Option<&SemanticError> {
        if let CompileError::Semantic { kind, .. } = self {
            Some(kind)
        } else {
            None
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SemanticError {
    #[error("'{0}' was never declared")]
    Undeclared(String),

    #[error("'{0}' is declared more than once in the same scope")]
    Duplicate(String),

    #[error("cannot assign a value to function '{0}'")]
    AssignToFunction(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("function '{0}' can only be used by calling it")]
    FunctionWithoutCall(String),

    #[error("function '{name}' takes {expected} arguments but {found} were passed")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{name}' uses {count} parameters or arguments, but at most {max} are supported")]
    TooManyParameters {
        name: String,
        count: usize,
        max: usize,
    },

    #[error("'break;' can only be used within while loops")]
    BreakOutsideLoop,

    #[error("variable '{0}' is used before it is initialized")]
    Uninitialized(String),

    #[error("'{0}' is an array and cannot be used this way")]
    ArrayMisuse(String),

    #[error("'{0}' is not an array and cannot be indexed")]
    NotAnArray(String),

    #[error("array '{0}' must have a positive size")]
    InvalidArraySize(String),

    #[error("'{0}' is too large to fit in memory")]
    TooLarge(String),

    #[error("an assignment does not produce a value")]
    AssignmentAsValue,

    #[error("the left side of an assignment must be a variable")]
    InvalidAssignmentTarget,

    #[error("floating point values are not supported")]
    FloatUnsupported,

    #[error("malformed {0} in syntax tree")]
    MalformedTree(&'static str),
}

/// A recoverable problem. Compilation continues after one of these is recorded.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Diagnostic {
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}
