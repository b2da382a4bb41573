//! Abstract Syntax Tree definitions for subc

use serde::Serialize;

use crate::utils::Span;

/// Identity of a variable reference, assigned by the parser. The analyzer
/// keys its resolution table on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u32);

/// A complete program (translation unit)
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub functions: Vec<Function>,
}

/// Identifier with location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// The only type the language has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeSpec {
    Int,
}

impl TypeSpec {
    /// Size of a value of this type in a stack frame, in bytes
    pub fn size(&self) -> i64 {
        match self {
            TypeSpec::Int => 8,
        }
    }
}

/// Function definition
#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub name: Ident,
    pub ret_type: TypeSpec,
    pub params: Vec<Param>,
    pub body: Block,
    /// Bytes of local storage; zero until semantic analysis fills it in
    pub frame_size: i64,
    pub span: Span,
}

/// Formal parameter
#[derive(Debug, Clone, Serialize)]
pub struct Param {
    pub ty: TypeSpec,
    pub name: Ident,
    pub span: Span,
}

/// Local variable declaration (one per declared name)
#[derive(Debug, Clone, Serialize)]
pub struct VarDecl {
    pub ty: TypeSpec,
    pub name: Ident,
    pub span: Span,
}

/// Code block; opens a new scope
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, Serialize)]
pub enum Stmt {
    /// int name
    VarDecl(VarDecl),
    /// return [expr]
    Return { value: Option<Expr>, span: Span },
    /// { ... }
    Block(Block),
    /// expr
    Expr(Expr),
}

/// Expression
#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    Num {
        value: i64,
        span: Span,
    },
    Var {
        id: NodeId,
        name: String,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Call {
        name: Ident,
        args: Vec<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Num { span, .. }
            | Expr::Var { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Call { span, .. } => *span,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnOp {
    /// +x
    Plus,
    /// -x
    Neg,
}
