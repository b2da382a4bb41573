//! Code Generation trait - Backend abstraction

use crate::frontend::ast::Program;
use crate::frontend::semantic::Analysis;
use crate::utils::Result;

/// Code generation backend trait
pub trait CodeGen {
    /// Generate assembly text from an analyzed program
    fn generate(&mut self, program: &Program, analysis: &Analysis) -> Result<String>;

    /// Get the target triple (e.g., "x86_64-unknown-linux-gnu")
    fn target_triple(&self) -> &str;

    /// Get the backend name
    fn name(&self) -> &str;
}
