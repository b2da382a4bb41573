//! Parser for subc
//!
//! Recursive descent over a lazy token stream with one token of lookahead.
//! Each binary precedence level is a left-associative loop over the level
//! below it; assignment recurses on itself and is right-associative.

use std::mem;

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Deepest nesting of blocks, unary operators, sub-expressions and
/// operator chains the parser accepts. Later passes recurse over the tree,
/// so this also bounds their stack use.
pub const MAX_NESTING: usize = 256;

/// The parser
pub struct Parser {
    lexer: Lexer,
    current: Token,
    /// Span of the most recently consumed token
    prev_span: Span,
    next_id: u32,
    /// Current nesting depth, see [`MAX_NESTING`]
    depth: usize,
}

impl Parser {
    /// Create a new parser from a lexer, priming the lookahead token
    pub fn new(mut lexer: Lexer) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            prev_span: Span::dummy(),
            next_id: 0,
            depth: 0,
        })
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.current
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current.kind
    }

    fn advance(&mut self) -> Result<Token> {
        let next = self.lexer.next_token()?;
        let token = mem::replace(&mut self.current, next);
        self.prev_span = token.span;
        Ok(token)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(self.current_kind()) == mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    /// Consume the current token if it has the expected kind, otherwise fail
    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            self.advance()
        } else {
            Err(Error::UnexpectedToken {
                expected: format!("'{}'", expected),
                got: self.current_kind().describe(),
                span: self.current().span,
            })
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> Result<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Span from `start` to the end of the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.prev_span)
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn enter_nesting(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::NestingTooDeep {
                limit: MAX_NESTING,
                span: self.current().span,
            });
        }
        Ok(())
    }

    fn exit_nesting(&mut self, levels: usize) {
        self.depth -= levels;
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program: `function_def*`
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut functions = Vec::new();

        while !self.is_at_end() {
            functions.push(self.parse_function()?);
        }

        Ok(Program { functions })
    }

    /// `"int" identifier "(" (formal_param ("," formal_param)*)? ")" block`
    fn parse_function(&mut self) -> Result<Function> {
        let start = self.current().span;
        let ret_type = self.parse_type()?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            params.push(self.parse_param()?);
            while self.consume(&TokenKind::Comma)? {
                params.push(self.parse_param()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;

        Ok(Function {
            name,
            ret_type,
            params,
            body,
            frame_size: 0,
            span: self.span_from(start),
        })
    }

    /// `"int" identifier`
    fn parse_param(&mut self) -> Result<Param> {
        let start = self.current().span;
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;

        Ok(Param {
            ty,
            name,
            span: self.span_from(start),
        })
    }

    fn parse_type(&mut self) -> Result<TypeSpec> {
        self.expect(TokenKind::Int)?;
        Ok(TypeSpec::Int)
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance()?;
                Ok(Ident {
                    name,
                    span: token.span,
                })
            }
            kind => Err(Error::UnexpectedToken {
                expected: "identifier".to_string(),
                got: kind.describe(),
                span: token.span,
            }),
        }
    }

    /// `"{" (var_decl | statement)* "}"`
    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current().span;
        self.enter_nesting()?;
        self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Int) {
                stmts.extend(self.parse_var_decl()?.into_iter().map(Stmt::VarDecl));
            } else if let Some(stmt) = self.parse_stmt()? {
                stmts.push(stmt);
            }
        }

        self.expect(TokenKind::RBrace)?;
        self.exit_nesting(1);

        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    /// `"int" identifier ("," identifier)* ";"`
    fn parse_var_decl(&mut self) -> Result<Vec<VarDecl>> {
        let ty = self.parse_type()?;

        let mut decls = Vec::new();
        loop {
            let name = self.parse_ident()?;
            let span = name.span;
            decls.push(VarDecl { ty, name, span });
            if !self.consume(&TokenKind::Comma)? {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(decls)
    }

    /// `"return" expr_stmt | block | expr_stmt`
    ///
    /// Returns `None` for an empty statement, which is dropped.
    fn parse_stmt(&mut self) -> Result<Option<Stmt>> {
        match self.current_kind() {
            TokenKind::Return => {
                let start = self.current().span;
                self.advance()?;
                let value = self.parse_expr_stmt()?;
                Ok(Some(Stmt::Return {
                    value,
                    span: self.span_from(start),
                }))
            }
            TokenKind::LBrace => Ok(Some(Stmt::Block(self.parse_block()?))),
            _ => Ok(self.parse_expr_stmt()?.map(Stmt::Expr)),
        }
    }

    /// `";" | expression ";"`
    fn parse_expr_stmt(&mut self) -> Result<Option<Expr>> {
        if self.consume(&TokenKind::Semicolon)? {
            return Ok(None);
        }

        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Some(expr))
    }

    // ==================== Expression Parsing ====================

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assign()
    }

    /// `equality ("=" assign)?`
    fn parse_assign(&mut self) -> Result<Expr> {
        self.enter_nesting()?;
        let target = self.parse_equality()?;

        let expr = if self.consume(&TokenKind::Eq)? {
            let value = self.parse_assign()?;
            let span = target.span().merge(&value.span());
            Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
                span,
            }
        } else {
            target
        };

        self.exit_nesting(1);
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        self.parse_left_assoc(&[BinOp::Eq, BinOp::Ne], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        self.parse_left_assoc(
            &[BinOp::Lt, BinOp::Le, BinOp::Gt, BinOp::Ge],
            Self::parse_add_sub,
        )
    }

    fn parse_add_sub(&mut self) -> Result<Expr> {
        self.parse_left_assoc(&[BinOp::Add, BinOp::Sub], Self::parse_mul_div)
    }

    fn parse_mul_div(&mut self) -> Result<Expr> {
        self.parse_left_assoc(&[BinOp::Mul, BinOp::Div], Self::parse_unary)
    }

    /// `operand (op operand)*` for the operators in `ops`
    fn parse_left_assoc(
        &mut self,
        ops: &[BinOp],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = operand(self)?;

        // Each operator adds a level to the left-leaning tree
        let mut levels = 0;
        while let Some(op) = Self::token_to_binop(self.current_kind()).filter(|op| ops.contains(op)) {
            self.enter_nesting()?;
            levels += 1;
            self.advance()?;
            let right = operand(self)?;
            let span = left.span().merge(&right.span());
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        self.exit_nesting(levels);
        Ok(left)
    }

    /// `("+" | "-") unary | primary`
    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.current_kind() {
            TokenKind::Plus => UnOp::Plus,
            TokenKind::Minus => UnOp::Neg,
            _ => return self.parse_primary(),
        };

        self.enter_nesting()?;
        let start = self.advance()?.span;
        let operand = self.parse_unary()?;
        self.exit_nesting(1);
        let span = start.merge(&operand.span());
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    /// `"(" expression ")" | identifier args? | integer_literal`
    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();

        match token.kind {
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                if self.check(&TokenKind::LParen) {
                    let name = Ident {
                        name,
                        span: token.span,
                    };
                    return self.parse_call(name);
                }
                Ok(Expr::Var {
                    id: self.fresh_id(),
                    name,
                    span: token.span,
                })
            }
            TokenKind::IntLit(value) => {
                self.advance()?;
                Ok(Expr::Num {
                    value,
                    span: token.span,
                })
            }
            kind => Err(Error::ExpectedExpr {
                got: kind.describe(),
                span: token.span,
            }),
        }
    }

    /// `"(" (assign ("," assign)*)? ")"` following a callee name
    fn parse_call(&mut self, name: Ident) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.parse_assign()?);
            while self.consume(&TokenKind::Comma)? {
                args.push(self.parse_assign()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        let span = self.span_from(name.span);
        Ok(Expr::Call { name, args, span })
    }

    fn token_to_binop(kind: &TokenKind) -> Option<BinOp> {
        match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::Ne => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            _ => None,
        }
    }
}
