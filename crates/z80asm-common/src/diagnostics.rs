use std::fmt;
use thiserror::Error;

use crate::types::{AssemblerError, SourcePosition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: SourcePosition,
    pub error: AssemblerError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.error)
    }
}

/// Errors collected over one assembly, ordered by source position.
///
/// Entries at the same position keep the order they were recorded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("assembly failed with {} error(s)", .entries.len())]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: AssemblerError, position: SourcePosition) {
        tracing::debug!(%position, %error, "diagnostic recorded");
        let at = self.entries.partition_point(|d| d.position <= position);
        self.entries.insert(at, Diagnostic { position, error });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &AssemblerError> {
        self.entries.iter().map(|d| &d.error)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
