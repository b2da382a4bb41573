//! Error handling for subc

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("invalid token '{ch}'")]
    InvalidToken { ch: char, span: Span },

    #[error("integer literal {text} does not fit in 64 bits")]
    IntegerOverflow { text: String, span: Span },

    // ==================== Parser Errors ====================

    #[error("unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("expected expression, got {got}")]
    ExpectedExpr { got: String, span: Span },

    #[error("nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize, span: Span },

    // ==================== Semantic Errors ====================

    #[error("'{name}' used before declaration")]
    UndefinedVariable { name: String, span: Span },

    #[error("left side of assignment is not an assignable location")]
    NotAssignable { span: Span },

    #[error("'{name}' is a function, not a variable")]
    NotAVariable { name: String, span: Span },

    #[error("call to '{name}' passes {count} arguments; at most 6 are supported")]
    TooManyArguments { name: String, count: usize, span: Span },

    #[error("function '{name}' declares {count} parameters; at most 6 are supported")]
    TooManyParams { name: String, count: usize, span: Span },

    // ==================== Backend Errors ====================

    #[error("IO error: {0}")]
    Io(String),

    #[error("Code generation error: {0}")]
    CodeGen(String),
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::InvalidToken { span, .. } => Some(*span),
            Self::IntegerOverflow { span, .. } => Some(*span),
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::ExpectedExpr { span, .. } => Some(*span),
            Self::NestingTooDeep { span, .. } => Some(*span),
            Self::UndefinedVariable { span, .. } => Some(*span),
            Self::NotAssignable { span } => Some(*span),
            Self::NotAVariable { span, .. } => Some(*span),
            Self::TooManyArguments { span, .. } => Some(*span),
            Self::TooManyParams { span, .. } => Some(*span),
            Self::Io(_) | Self::CodeGen(_) => None,
        }
    }

    /// Name of the compilation phase that raised this error
    pub fn phase(&self) -> &'static str {
        match self {
            Self::InvalidToken { .. } | Self::IntegerOverflow { .. } => "lexical",
            Self::UnexpectedToken { .. }
            | Self::ExpectedExpr { .. }
            | Self::NestingTooDeep { .. } => "parse",
            Self::UndefinedVariable { .. }
            | Self::NotAssignable { .. }
            | Self::NotAVariable { .. }
            | Self::TooManyArguments { .. }
            | Self::TooManyParams { .. } => "semantic",
            Self::Io(_) => "io",
            Self::CodeGen(_) => "internal",
        }
    }

    /// Render the error against the source it came from, with a caret
    /// under the offending character.
    pub fn render(&self, source: &str) -> String {
        let header = format!("{} error: {}", self.phase(), self);
        let Some(span) = self.span() else {
            return header;
        };

        let (line, col) = span.line_col(source);
        let text = source.lines().nth(line - 1).unwrap_or("");
        // Tabs are kept so the caret lines up under any tab width
        let indent: String = text
            .chars()
            .take(col - 1)
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        let marker = format!("{indent}^");
        format!("{header}\n --> {line}:{col}\n{text}\n{marker}")
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
