//! Lexer for subc
//!
//! Converts source code into a stream of tokens, one `next_token` call at a
//! time. Two-character operators are tried before single-character ones.

use log::trace;

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The lexer state
pub struct Lexer {
    /// Source code as characters
    source: Vec<char>,
    /// Current position in source
    pos: usize,
    /// Start position of current token
    start: usize,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            start: 0,
        }
    }

    /// Get the current character without advancing
    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    /// Get the next character without advancing
    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    /// Create a span from start to current position
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    /// Create a token with the current span
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_ident_continue(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if !Self::is_ident_continue(c) {
                break;
            }
            self.advance();
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        let kind = TokenKind::keyword_from_str(&text).unwrap_or(TokenKind::Ident(text));
        self.make_token(kind)
    }

    /// Read a decimal integer literal
    fn read_number(&mut self) -> Result<Token> {
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.advance();
        }

        let text: String = self.source[self.start..self.pos].iter().collect();
        let value = text.parse::<i64>().map_err(|_| Error::IntegerOverflow {
            text: text.clone(),
            span: self.make_span(),
        })?;
        Ok(self.make_token(TokenKind::IntLit(value)))
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return Ok(Token::eof(self.make_span()));
        };

        let token = if Self::is_ident_start(c) {
            self.read_identifier()
        } else if c.is_ascii_digit() {
            self.read_number()?
        } else if let Some(kind) = self
            .peek_next()
            .and_then(|next| TokenKind::two_char_op(c, next))
        {
            self.advance();
            self.advance();
            self.make_token(kind)
        } else if let Some(kind) = TokenKind::one_char_op(c) {
            self.advance();
            self.make_token(kind)
        } else {
            return Err(Error::InvalidToken {
                ch: c,
                span: Span::new(self.pos, self.pos + 1),
            });
        };

        trace!("token {:?} at {}..{}", token.kind, token.span.start, token.span.end);
        Ok(token)
    }

    /// Tokenize the entire source and return all tokens, `Eof` included
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}
