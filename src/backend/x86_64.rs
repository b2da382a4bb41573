//! x86-64 Code Generator
//!
//! Lowers the analyzed AST to AT&T assembly with a stack-machine strategy:
//! every expression leaves its value in `%rax`, and binary operators park
//! the right operand on the stack while the left one is evaluated. Locals
//! live in the frame and are addressed relative to `%rbp` using the offsets
//! recorded by semantic analysis.

use log::{debug, info};

use crate::backend::codegen::CodeGen;
use crate::frontend::ast::*;
use crate::frontend::semantic::{Analysis, FrameLayout, MAX_REG_ARGS};
use crate::utils::{Error, Result};

/// Integer argument registers, in calling-convention order
const ARG_REGS: [&str; MAX_REG_ARGS] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Stack alignment required at call boundaries
const STACK_ALIGN: i64 = 16;

/// Round `n` up to the nearest multiple of `align`.
/// For instance, `align_to(5, 8)` is 8 and `align_to(11, 8)` is 16.
pub fn align_to(n: i64, align: i64) -> i64 {
    (n + align - 1) / align * align
}

/// The function currently being lowered
struct FnCtx<'a> {
    name: &'a str,
    layout: &'a FrameLayout,
}

/// x86-64 assembly generator
pub struct X86_64CodeGen {
    target_triple: String,
    output: String,
    /// Words pushed by the expression currently being lowered
    depth: usize,
}

impl X86_64CodeGen {
    pub fn new(target: &str) -> Self {
        Self {
            target_triple: target.to_string(),
            output: String::new(),
            depth: 0,
        }
    }

    fn push(&mut self) {
        self.emit("push %rax");
        self.depth += 1;
    }

    fn pop(&mut self, reg: &str) {
        self.emit(&format!("pop %{reg}"));
        self.depth -= 1;
    }

    /// Write an indented instruction line
    fn emit(&mut self, line: &str) {
        self.output.push_str("  ");
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Write a label line (no indent)
    fn emit_label(&mut self, label: &str) {
        self.output.push_str(label);
        self.output.push_str(":\n");
    }

    fn gen_function(&mut self, func: &Function, layout: &FrameLayout) -> Result<()> {
        let name = func.name.name.as_str();
        if layout.name != name || layout.frame_size != func.frame_size {
            return Err(Error::CodeGen(format!(
                "frame layout for '{}' does not match function '{}'",
                layout.name, name
            )));
        }

        let stack_size = align_to(func.frame_size, STACK_ALIGN);
        debug!("{name}: reserving {stack_size} bytes");

        self.depth = 0;
        self.emit(".text");
        self.emit(&format!(".globl {name}"));
        self.emit_label(name);

        // Prologue
        self.emit("push %rbp");
        self.emit("mov %rsp, %rbp");
        self.emit(&format!("sub ${stack_size}, %rsp"));

        // Save passed-by-register arguments to their slots
        for (reg, offset) in ARG_REGS.iter().zip(&layout.params) {
            self.emit(&format!("mov %{reg}, {offset}(%rbp)"));
        }

        let ctx = FnCtx { name, layout };
        for stmt in &func.body.stmts {
            self.gen_stmt(stmt, &ctx)?;
        }

        // Epilogue
        self.emit_label(&format!(".{name}.return"));
        self.emit("mov %rbp, %rsp");
        self.emit("pop %rbp");
        self.emit("ret");
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt, ctx: &FnCtx) -> Result<()> {
        match stmt {
            Stmt::VarDecl(_) => Ok(()),
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.gen_expr(expr, ctx)?;
                }
                self.emit(&format!("jmp .{}.return", ctx.name));
                Ok(())
            }
            Stmt::Block(block) => block.stmts.iter().try_for_each(|s| self.gen_stmt(s, ctx)),
            Stmt::Expr(expr) => self.gen_expr(expr, ctx),
        }
    }

    /// Evaluate an expression into `%rax`
    fn gen_expr(&mut self, expr: &Expr, ctx: &FnCtx) -> Result<()> {
        match expr {
            Expr::Num { value, .. } => {
                self.emit(&format!("mov ${value}, %rax"));
            }
            Expr::Var { .. } => {
                self.gen_addr(expr, ctx)?;
                self.emit("mov (%rax), %rax");
            }
            Expr::Unary { op, operand, .. } => {
                self.gen_expr(operand, ctx)?;
                if *op == UnOp::Neg {
                    self.emit("neg %rax");
                }
            }
            Expr::Binary { op, left, right, .. } => {
                self.gen_expr(right, ctx)?;
                self.push();
                self.gen_expr(left, ctx)?;
                self.pop("rdi");
                self.gen_binop(*op);
            }
            Expr::Assign { target, value, .. } => {
                self.gen_addr(target, ctx)?;
                self.push();
                self.gen_expr(value, ctx)?;
                self.pop("rdi");
                self.emit("mov %rax, (%rdi)");
            }
            Expr::Call { name, args, .. } => {
                if args.len() > ARG_REGS.len() {
                    return Err(Error::CodeGen(format!(
                        "call to '{}' has {} arguments",
                        name.name,
                        args.len()
                    )));
                }
                for arg in args {
                    self.gen_expr(arg, ctx)?;
                    self.push();
                }
                for reg in ARG_REGS[..args.len()].iter().rev() {
                    self.pop(reg);
                }
                // %rsp is 16-byte aligned only when no words are pending
                let pad = self.depth % 2 == 1;
                if pad {
                    self.emit("sub $8, %rsp");
                }
                self.emit("mov $0, %rax");
                self.emit(&format!("call {}", name.name));
                if pad {
                    self.emit("add $8, %rsp");
                }
            }
        }
        Ok(())
    }

    /// Apply `op` to `%rax` (left) and `%rdi` (right), result in `%rax`
    fn gen_binop(&mut self, op: BinOp) {
        let set = match op {
            BinOp::Add => return self.emit("add %rdi, %rax"),
            BinOp::Sub => return self.emit("sub %rdi, %rax"),
            BinOp::Mul => return self.emit("imul %rdi, %rax"),
            BinOp::Div => {
                self.emit("cqo");
                self.emit("idiv %rdi");
                return;
            }
            BinOp::Eq => "sete",
            BinOp::Ne => "setne",
            BinOp::Lt => "setl",
            BinOp::Le => "setle",
            BinOp::Gt => "setg",
            BinOp::Ge => "setge",
        };
        self.emit("cmp %rdi, %rax");
        self.emit(&format!("{set} %al"));
        self.emit("movzb %al, %rax");
    }

    /// Load the address of an lvalue into `%rax`
    fn gen_addr(&mut self, expr: &Expr, ctx: &FnCtx) -> Result<()> {
        match expr {
            Expr::Var { id, name, .. } => {
                let offset = ctx.layout.slot(*id).ok_or_else(|| {
                    Error::CodeGen(format!("'{}' was not resolved in '{}'", name, ctx.name))
                })?;
                self.emit(&format!("lea {offset}(%rbp), %rax"));
                Ok(())
            }
            _ => Err(Error::CodeGen("not an lvalue".to_string())),
        }
    }
}

impl CodeGen for X86_64CodeGen {
    fn generate(&mut self, program: &Program, analysis: &Analysis) -> Result<String> {
        if program.functions.len() != analysis.functions.len() {
            return Err(Error::CodeGen(format!(
                "analysis covers {} functions, program has {}",
                analysis.functions.len(),
                program.functions.len()
            )));
        }

        self.output.clear();
        for (func, layout) in program.functions.iter().zip(&analysis.functions) {
            self.gen_function(func, layout)?;
        }
        info!("generated {} lines of assembly", self.output.lines().count());

        Ok(std::mem::take(&mut self.output))
    }

    fn target_triple(&self) -> &str {
        &self.target_triple
    }

    fn name(&self) -> &str {
        "x86_64"
    }
}
