use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::expr::Expr;
use crate::registry::PlaceholderKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("Unknown mnemonic: {0}")]
    UnknownMnemonic(String),

    #[error("No variant of {mnemonic} accepts operands `{shape}`")]
    UnknownOperandForm { mnemonic: String, shape: String },

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Instruction at {address:#06x} runs past the end of the address space")]
    AddressOverflow { address: u32 },
}

/// An operand value that does not fit the slot it is encoded into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("relative jump out of range (offset {offset})")]
    RelativeJump { offset: i64 },

    #[error("{kind} value {value} out of range {min}..={max}")]
    Value {
        kind: PlaceholderKind,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// One-based line and column of a token in the source text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One operand token as classified by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandToken {
    /// Register, condition or punctuation, case-folded.
    Literal(String),
    Expr(Expr),
}

impl OperandToken {
    pub fn literal(text: &str) -> Self {
        OperandToken::Literal(text.to_ascii_lowercase())
    }

    pub fn number(value: i64) -> Self {
        OperandToken::Expr(Expr::Number(value))
    }
}

impl fmt::Display for OperandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandToken::Literal(text) => f.write_str(text),
            OperandToken::Expr(expr) => write!(f, "{}", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    pub mnemonic: String,
    pub operands: Vec<OperandToken>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Instruction(ParsedInstruction),
    /// `name equ expr`; the name is the line's label.
    Constant(Expr),
}

/// A source line after parsing. Blank and comment-only lines have neither part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub position: SourcePosition,
    pub label: Option<String>,
    pub statement: Option<Statement>,
}
