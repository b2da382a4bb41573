//! Compilation pipeline: source text in, assembly text out.
//!
//! Each entry point runs the passes in order and stops at the first error.

use log::info;

use crate::backend::{CodeGen, X86_64CodeGen};
use crate::frontend::ast::Program;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::semantic::{Analysis, SemanticAnalyzer};
use crate::frontend::token::TokenKind;
use crate::utils::Result;

pub const TARGET_TRIPLE: &str = "x86_64-unknown-linux-gnu";

/// Literal value of every token in `source`, stopping before end of input
pub fn tokens(source: &str) -> Result<Vec<String>> {
    let tokens = Lexer::new(source).tokenize()?;
    info!("lexed {} tokens", tokens.len());
    Ok(tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.kind.to_string())
        .collect())
}

/// Lex and parse without analysis
pub fn parse(source: &str) -> Result<Program> {
    let mut parser = Parser::new(Lexer::new(source))?;
    let program = parser.parse_program()?;
    info!("parsed {} functions", program.functions.len());
    Ok(program)
}

/// Parse and analyze; the returned program has its frame sizes filled in
pub fn check(source: &str) -> Result<(Program, Analysis)> {
    let mut program = parse(source)?;
    let analysis = SemanticAnalyzer::new().analyze(&mut program)?;
    info!("semantic analysis passed");
    Ok((program, analysis))
}

/// Full pipeline
pub fn compile(source: &str) -> Result<String> {
    let (program, analysis) = check(source)?;
    let mut codegen = X86_64CodeGen::new(TARGET_TRIPLE);
    info!(
        "generating code with backend {} for {}",
        codegen.name(),
        codegen.target_triple()
    );
    codegen.generate(&program, &analysis)
}
