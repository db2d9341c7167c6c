use std::collections::HashMap;

use crate::types::{AssemblerError, SourcePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Constant,
    /// Supplied through the assembler options rather than the source.
    Predefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// `None` until the definition has been evaluated.
    pub value: Option<i64>,
    pub defined_at: SourcePosition,
}

/// Names are case-sensitive and unique within one assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` without a value yet.
    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        defined_at: SourcePosition,
    ) -> Result<(), AssemblerError> {
        if self.symbols.contains_key(name) {
            return Err(AssemblerError::DuplicateLabel(name.to_string()));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                kind,
                value: None,
                defined_at,
            },
        );
        Ok(())
    }

    /// Sets the value of an already declared symbol.
    pub fn bind(&mut self, name: &str, value: i64) {
        if let Some(symbol) = self.symbols.get_mut(name) {
            symbol.value = Some(value);
        }
    }

    pub fn define(
        &mut self,
        name: &str,
        kind: SymbolKind,
        value: i64,
        defined_at: SourcePosition,
    ) -> Result<(), AssemblerError> {
        self.declare(name, kind, defined_at)?;
        self.bind(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn value(&self, name: &str) -> Option<i64> {
        self.symbols.get(name).and_then(|s| s.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        let mut sorted: Vec<&Symbol> = self.symbols.values().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted.into_iter()
    }
}
