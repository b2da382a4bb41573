//! Symbol table: a chain of nested scopes, plus the per-function frame
//! builder that hands out stack slots.

use std::collections::HashMap;

use log::debug;

use crate::frontend::ast::TypeSpec;
use crate::utils::Span;

// ==================== Symbols ====================

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Symbol information
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeSpec,
    pub kind: SymbolKind,
    pub span: Span,
}

/// Kind of symbol
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    /// Local variable at `offset(%rbp)`
    Variable { offset: i64 },
    /// Formal parameter at `offset(%rbp)`, `index` in declaration order
    Param { offset: i64, index: usize },
    /// Function; `index` is its position in `Program::functions`
    Function { index: usize, params: usize },
}

impl Symbol {
    /// Stack offset for symbols that live in the frame
    pub fn offset(&self) -> Option<i64> {
        match self.kind {
            SymbolKind::Variable { offset } | SymbolKind::Param { offset, .. } => Some(offset),
            SymbolKind::Function { .. } => None,
        }
    }
}

// ==================== Scopes ====================

/// A scope containing symbols
#[derive(Debug)]
struct Scope {
    /// Diagnostic name, e.g. `main block2`
    name: String,
    level: usize,
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

/// Symbol table with nested scopes
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        // Create global scope
        let global = Scope {
            name: "global".to_string(),
            level: 0,
            parent: None,
            symbols: HashMap::new(),
        };
        Self {
            scopes: vec![global],
            current: ScopeId(0),
        }
    }

    /// Enter a new scope nested in the current one
    pub fn enter_scope(&mut self, name: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let scope = Scope {
            name: name.into(),
            level: self.level() + 1,
            parent: Some(self.current),
            symbols: HashMap::new(),
        };
        debug!("ENTER scope: {} (level {})", scope.name, scope.level);
        self.scopes.push(scope);
        self.current = id;
        id
    }

    /// Exit the current scope
    pub fn exit_scope(&mut self) {
        let scope = &self.scopes[self.current.0];
        debug!("LEAVE scope: {}", scope.name);
        if let Some(parent) = scope.parent {
            self.current = parent;
        }
    }

    /// Name of the current scope
    pub fn scope_name(&self) -> &str {
        &self.scopes[self.current.0].name
    }

    /// Nesting level of the current scope; the global scope is 0
    pub fn level(&self) -> usize {
        self.scopes[self.current.0].level
    }

    /// Define a symbol in the current scope, replacing any symbol of the
    /// same name already defined there
    pub fn insert(&mut self, symbol: Symbol) {
        let scope = &mut self.scopes[self.current.0];
        debug!("insert {} into {}: {:?}", symbol.name, scope.name, symbol.kind);
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Look up a symbol, searching from current scope upward
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id.0].symbols.get(name) {
                return Some(symbol);
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Look up a symbol only in the current scope
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes[self.current.0].symbols.get(name)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Frame Layout ====================

/// Running byte counter for one function's stack frame. Slots grow
/// downward from the frame pointer and are never reused.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    size: i64,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for a value of type `ty` and return its offset
    pub fn alloc(&mut self, ty: TypeSpec) -> i64 {
        self.size += ty.size();
        -self.size
    }

    /// Total bytes reserved so far
    pub fn size(&self) -> i64 {
        self.size
    }
}
