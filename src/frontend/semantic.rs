//! Semantic Analysis for subc
//!
//! Performs:
//! - Symbol table management (scopes, declaration before use)
//! - Assignment target validation
//! - Stack frame layout: every parameter and local gets an 8-byte slot
//!
//! The resolved offsets are returned as an [`Analysis`] side table keyed by
//! [`NodeId`], so code generation never rebuilds scopes.

use std::collections::HashMap;

use log::{debug, info};

use crate::frontend::ast::*;
use crate::frontend::symbols::{FrameBuilder, Symbol, SymbolKind, SymbolTable};
use crate::utils::{Error, Result};

/// Registers available for integer arguments
pub const MAX_REG_ARGS: usize = 6;

// ==================== Analysis Results ====================

/// Resolved storage for one function
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameLayout {
    pub name: String,
    /// Sum of all slots declared anywhere in the function
    pub frame_size: i64,
    /// Parameter offsets, in declaration order
    pub params: Vec<i64>,
    /// Offset of the variable each `Expr::Var` refers to
    slots: HashMap<NodeId, i64>,
}

impl FrameLayout {
    /// Offset of the variable referenced by `id`
    pub fn slot(&self, id: NodeId) -> Option<i64> {
        self.slots.get(&id).copied()
    }
}

/// Output of semantic analysis, parallel to `Program::functions`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Analysis {
    pub functions: Vec<FrameLayout>,
}

/// Per-function state threaded through the walk
struct FunctionCtx {
    frame: FrameBuilder,
    layout: FrameLayout,
}

// ==================== Semantic Analyzer ====================

/// Semantic analyzer
pub struct SemanticAnalyzer {
    pub symbols: SymbolTable,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
        }
    }

    /// Analyze a program, filling in each function's `frame_size`
    pub fn analyze(&mut self, program: &mut Program) -> Result<Analysis> {
        let mut analysis = Analysis::default();

        for (index, func) in program.functions.iter_mut().enumerate() {
            self.symbols.insert(Symbol {
                name: func.name.name.clone(),
                ty: func.ret_type,
                kind: SymbolKind::Function {
                    index,
                    params: func.params.len(),
                },
                span: func.name.span,
            });

            let layout = self.check_function(func)?;
            func.frame_size = layout.frame_size;
            info!("{}: frame size {} bytes", layout.name, layout.frame_size);
            analysis.functions.push(layout);
        }

        Ok(analysis)
    }

    /// Lay out a function's frame and resolve every variable in its body
    fn check_function(&mut self, func: &Function) -> Result<FrameLayout> {
        if func.params.len() > MAX_REG_ARGS {
            return Err(Error::TooManyParams {
                name: func.name.name.clone(),
                count: func.params.len(),
                span: func.name.span,
            });
        }

        let mut ctx = FunctionCtx {
            frame: FrameBuilder::new(),
            layout: FrameLayout {
                name: func.name.name.clone(),
                ..FrameLayout::default()
            },
        };

        self.symbols.enter_scope(func.name.name.as_str());

        for (index, param) in func.params.iter().enumerate() {
            let offset = ctx.frame.alloc(param.ty);
            ctx.layout.params.push(offset);
            self.declare(Symbol {
                name: param.name.name.clone(),
                ty: param.ty,
                kind: SymbolKind::Param { offset, index },
                span: param.span,
            });
        }

        let result = self.check_block(&func.body, &mut ctx);
        self.symbols.exit_scope();
        result?;

        ctx.layout.frame_size = ctx.frame.size();
        Ok(ctx.layout)
    }

    fn declare(&mut self, symbol: Symbol) {
        if let Some(previous) = self.symbols.lookup_local(&symbol.name) {
            debug!(
                "{} redeclared in {}; previous slot {:?} is abandoned",
                symbol.name,
                self.symbols.scope_name(),
                previous.offset()
            );
        }
        self.symbols.insert(symbol);
    }

    /// Check a block inside its own scope
    fn check_block(&mut self, block: &Block, ctx: &mut FunctionCtx) -> Result<()> {
        let name = format!("{} block{}", self.symbols.scope_name(), self.symbols.level() + 1);
        self.symbols.enter_scope(name);

        let result = block
            .stmts
            .iter()
            .try_for_each(|stmt| self.check_stmt(stmt, ctx));

        self.symbols.exit_scope();
        result
    }

    fn check_stmt(&mut self, stmt: &Stmt, ctx: &mut FunctionCtx) -> Result<()> {
        match stmt {
            Stmt::VarDecl(decl) => {
                let offset = ctx.frame.alloc(decl.ty);
                self.declare(Symbol {
                    name: decl.name.name.clone(),
                    ty: decl.ty,
                    kind: SymbolKind::Variable { offset },
                    span: decl.span,
                });
                Ok(())
            }
            Stmt::Return { value, .. } => match value {
                Some(expr) => self.check_expr(expr, ctx),
                None => Ok(()),
            },
            Stmt::Block(block) => self.check_block(block, ctx),
            Stmt::Expr(expr) => self.check_expr(expr, ctx),
        }
    }

    fn check_expr(&mut self, expr: &Expr, ctx: &mut FunctionCtx) -> Result<()> {
        match expr {
            Expr::Num { .. } => Ok(()),
            Expr::Var { id, name, span } => {
                let symbol = self.symbols.lookup(name).ok_or_else(|| Error::UndefinedVariable {
                    name: name.clone(),
                    span: *span,
                })?;
                let offset = symbol.offset().ok_or_else(|| Error::NotAVariable {
                    name: name.clone(),
                    span: *span,
                })?;
                ctx.layout.slots.insert(*id, offset);
                Ok(())
            }
            Expr::Unary { operand, .. } => self.check_expr(operand, ctx),
            Expr::Binary { left, right, .. } => {
                self.check_expr(left, ctx)?;
                self.check_expr(right, ctx)
            }
            Expr::Assign { target, value, .. } => {
                if !matches!(**target, Expr::Var { .. }) {
                    return Err(Error::NotAssignable {
                        span: target.span(),
                    });
                }
                self.check_expr(target, ctx)?;
                self.check_expr(value, ctx)
            }
            Expr::Call { name, args, span } => {
                if args.len() > MAX_REG_ARGS {
                    return Err(Error::TooManyArguments {
                        name: name.name.clone(),
                        count: args.len(),
                        span: *span,
                    });
                }
                match self.symbols.lookup(&name.name).map(|s| &s.kind) {
                    Some(SymbolKind::Function { index, params }) => debug!(
                        "call {} -> function #{} ({} params, {} args)",
                        name.name,
                        index,
                        params,
                        args.len()
                    ),
                    _ => debug!("call {} -> external symbol", name.name),
                }
                args.iter().try_for_each(|arg| self.check_expr(arg, ctx))
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
