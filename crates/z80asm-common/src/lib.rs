pub mod assembler;
pub mod diagnostics;
pub mod encodable;
pub mod encoder;
pub mod expr;
pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod registry;
pub mod symbols;
pub mod types;

pub use assembler::{Assembler, Assembly, AssemblyOptions, Outcome, ResolvedInstruction};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use encodable::Z80Encodable;
pub use encoder::{encode, OperandValue};
pub use expr::{BinaryOp, Evaluator, Expr, ExprCategory, StandardEvaluator, UnaryOp};
pub use matcher::match_variant;
pub use registry::{
    CycleCounts, Flag, FlagEffect, FlagEffects, PlaceholderKind, Registry, RegistryError,
    TemplateByte, Token, Variant,
};
pub use symbols::{Symbol, SymbolKind, SymbolTable};
pub use types::*;
