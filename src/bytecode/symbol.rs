//! Compile-time symbol resolution across nested scopes.

use std::collections::HashMap;

/// Where a symbol's storage lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Top-level binding, addressed by global slot
    Global,
    /// Binding inside a function, addressed relative to the frame's base
    Local,
    /// Captured from an enclosing function, addressed into the closure
    Free,
    /// Host-provided builtin, addressed into the registry
    Builtin,
}

/// A resolved binding: name, storage kind, and scope-local slot index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One scope's bindings, linked to its enclosing scope.
///
/// Tables nest by ownership: entering a function scope wraps the current
/// table, leaving it unwraps. A table without an outer table is the global
/// scope.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    free_symbols: Vec<Symbol>,
    num_definitions: usize,
}

impl SymbolTable {
    /// Create a root (global) table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table enclosed by `outer`.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Unwrap back to the enclosing table, if any.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    /// Define `name` in this scope, assigning the next local slot.
    /// Redefining a name replaces the old symbol; the slot counter still
    /// advances.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Record a builtin under its registry index. Does not consume a slot.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolve `name`, walking outward through enclosing scopes.
    ///
    /// A hit that is local (or already free) in an enclosing scope is
    /// promoted to a free symbol here, so closure capture chains through
    /// every intermediate function. The promotion is cached in this scope's
    /// store.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.outer.as_mut()?;
        let symbol = outer.resolve(name)?;
        if matches!(symbol.scope, SymbolScope::Global | SymbolScope::Builtin) {
            return Some(symbol);
        }
        Some(self.define_free(symbol))
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());
        let symbol = Symbol {
            name: original.name,
            scope: SymbolScope::Free,
            index: self.free_symbols.len() - 1,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// The originals captured by this scope, in capture order.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    /// How many slots this scope has consumed (parameters plus lets).
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }
}
