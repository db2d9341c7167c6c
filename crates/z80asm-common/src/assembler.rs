use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::encoder::{encode, OperandValue};
use crate::expr::{Evaluator, Expr, StandardEvaluator};
use crate::matcher::match_variant;
use crate::parser::parse_source;
use crate::registry::{CycleCounts, FlagEffects, Registry, Token, Variant};
use crate::symbols::{SymbolKind, SymbolTable};
use crate::types::{
    AssemblerError, OperandToken, ParsedInstruction, SourceLine, SourcePosition, Statement,
};

/// One past the highest Z80 address.
const ADDRESS_SPACE: u32 = 0x1_0000;

/// Per-run settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Address of the first instruction.
    pub origin: u16,
    /// Constants bound before the first line is read.
    pub defines: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// An encoded instruction with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    pub address: u16,
    pub variant: Arc<Variant>,
    /// Evaluated placeholder operands, in template order.
    pub values: Vec<i64>,
    pub bytes: Vec<u8>,
    pub position: SourcePosition,
}

impl ResolvedInstruction {
    pub fn cycles(&self) -> CycleCounts {
        self.variant.cycles
    }

    pub fn flags(&self) -> &FlagEffects {
        &self.variant.flags
    }
}

/// Result of one assembly run.
///
/// A failed run still carries whatever instructions were encoded, for
/// listings and editors, but `bytes` refuses to hand them out as an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub outcome: Outcome,
    pub instructions: Vec<ResolvedInstruction>,
    pub diagnostics: Diagnostics,
    pub symbols: SymbolTable,
    pub origin: u16,
}

impl Assembly {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    /// The machine-code image starting at `origin`, or `None` if the run failed.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.is_success().then(|| concat_bytes(&self.instructions))
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, Diagnostics> {
        match self.outcome {
            Outcome::Succeeded => Ok(concat_bytes(&self.instructions)),
            Outcome::Failed => Err(self.diagnostics),
        }
    }
}

fn concat_bytes(instructions: &[ResolvedInstruction]) -> Vec<u8> {
    instructions
        .iter()
        .flat_map(|i| i.bytes.iter().copied())
        .collect()
}

/// Two-pass Z80 assembler.
///
/// The assembler itself holds only configuration; every call to
/// [`Assembler::assemble`] starts from a fresh context.
pub struct Assembler {
    registry: Arc<Registry>,
    evaluator: Box<dyn Evaluator>,
    options: AssemblyOptions,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// An assembler over the bundled Z80 table.
    pub fn new() -> Self {
        Self {
            registry: Registry::bundled(),
            evaluator: Box::new(StandardEvaluator),
            options: AssemblyOptions::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn with_options(mut self, options: AssemblyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn origin(mut self, origin: u16) -> Self {
        self.options.origin = origin;
        self
    }

    pub fn define(mut self, name: impl Into<String>, value: i64) -> Self {
        self.options.defines.insert(name.into(), value);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Parses and assembles `source`. Syntax errors are reported alongside
    /// assembly errors; lines that fail to parse are skipped.
    pub fn assemble_source(&self, source: &str) -> Assembly {
        let (lines, diagnostics) = parse_source(source);
        self.run(&lines, diagnostics)
    }

    pub fn assemble(&self, lines: &[SourceLine]) -> Assembly {
        self.run(lines, Diagnostics::new())
    }

    fn run(&self, lines: &[SourceLine], diagnostics: Diagnostics) -> Assembly {
        let mut context = AssemblyContext::new(self, diagnostics);
        context.predefine(&self.options.defines);
        context.assign_addresses(lines);
        context.resolve_deferred();
        context.encode_all();
        context.finish(self.options.origin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    AddressAssignment,
    Encoding,
}

/// An instruction placed in pass 1, waiting for its operand values.
struct Pending<'l> {
    address: u16,
    variant: Arc<Variant>,
    instruction: &'l ParsedInstruction,
}

struct DeferredConstant<'l> {
    name: &'l str,
    expr: &'l Expr,
    address: u16,
    position: SourcePosition,
}

/// State of a single assembly run.
struct AssemblyContext<'a, 'l> {
    registry: &'a Registry,
    evaluator: &'a dyn Evaluator,
    pass: Pass,
    pc: u32,
    symbols: SymbolTable,
    pending: Vec<Pending<'l>>,
    deferred: Vec<DeferredConstant<'l>>,
    resolved: Vec<ResolvedInstruction>,
    diagnostics: Diagnostics,
}

impl<'a, 'l> AssemblyContext<'a, 'l> {
    fn new(assembler: &'a Assembler, diagnostics: Diagnostics) -> Self {
        Self {
            registry: &assembler.registry,
            evaluator: &*assembler.evaluator,
            pass: Pass::AddressAssignment,
            pc: u32::from(assembler.options.origin),
            symbols: SymbolTable::new(),
            pending: Vec::new(),
            deferred: Vec::new(),
            resolved: Vec::new(),
            diagnostics,
        }
    }

    /// `$` at the current point of pass 1. Past the end of memory it sticks
    /// at the last address; the overflow itself is already reported.
    fn here(&self) -> u16 {
        u16::try_from(self.pc).unwrap_or(u16::MAX)
    }

    fn predefine(&mut self, defines: &BTreeMap<String, i64>) {
        for (name, value) in defines {
            if let Err(error) =
                self.symbols
                    .define(name, SymbolKind::Predefined, *value, SourcePosition::default())
            {
                self.diagnostics.record(error, SourcePosition::default());
            }
        }
    }

    fn assign_addresses(&mut self, lines: &'l [SourceLine]) {
        tracing::debug!(lines = lines.len(), origin = self.pc, "pass 1: assigning addresses");

        for line in lines {
            match (&line.label, &line.statement) {
                (Some(name), Some(Statement::Constant(expr))) => {
                    self.define_constant(name, expr, line.position)
                }
                (None, Some(Statement::Constant(_))) => self.diagnostics.record(
                    AssemblerError::Syntax("constant definition without a name".to_string()),
                    line.position,
                ),
                (label, statement) => {
                    if let Some(name) = label {
                        self.bind_label(name, line.position);
                    }
                    if let Some(Statement::Instruction(instruction)) = statement {
                        self.place(instruction);
                    }
                }
            }
        }

        tracing::debug!(
            instructions = self.pending.len(),
            symbols = self.symbols.len(),
            end = self.pc,
            "pass 1 complete"
        );
    }

    fn bind_label(&mut self, name: &str, position: SourcePosition) {
        let value = i64::from(self.pc);
        match self
            .symbols
            .define(name, SymbolKind::Label, value, position)
        {
            Ok(()) => tracing::trace!(label = name, address = value, "label bound"),
            Err(error) => self.diagnostics.record(error, position),
        }
    }

    fn define_constant(&mut self, name: &'l str, expr: &'l Expr, position: SourcePosition) {
        if let Err(error) = self.symbols.declare(name, SymbolKind::Constant, position) {
            self.diagnostics.record(error, position);
            return;
        }

        let address = self.here();
        match self.evaluator.evaluate(expr, &self.symbols, address) {
            Ok(value) => {
                self.symbols.bind(name, value);
                tracing::trace!(constant = name, value, "constant bound");
            }
            Err(AssemblerError::UndefinedSymbol(_)) => self.deferred.push(DeferredConstant {
                name,
                expr,
                address,
                position,
            }),
            Err(error) => self.diagnostics.record(error, position),
        }
    }

    fn place(&mut self, instruction: &'l ParsedInstruction) {
        let operands = self.fold_constants(&instruction.operands);
        let variant = match match_variant(self.registry, &instruction.mnemonic, &operands) {
            Ok(variant) => variant,
            Err(error) => {
                self.diagnostics.record(error, instruction.position);
                return;
            }
        };

        let start = self.pc;
        self.pc += u32::from(variant.byte_count);
        match u16::try_from(start) {
            Ok(address) if self.pc <= ADDRESS_SPACE => self.pending.push(Pending {
                address,
                variant,
                instruction,
            }),
            _ => self.diagnostics.record(
                AssemblerError::AddressOverflow { address: start },
                instruction.position,
            ),
        }
    }

    /// Replaces expressions already computable from the symbols seen so far
    /// by their value, so that `bit FLAG,a` can match the `bit 3,a` pattern.
    /// Used for matching only; pass 2 re-evaluates the written operands.
    fn fold_constants(&self, operands: &[OperandToken]) -> Vec<OperandToken> {
        operands
            .iter()
            .map(|operand| match operand {
                OperandToken::Expr(expr) if expr.literal_value().is_none() => self
                    .evaluator
                    .evaluate(expr, &self.symbols, self.here())
                    .map_or_else(|_| operand.clone(), OperandToken::number),
                _ => operand.clone(),
            })
            .collect()
    }

    /// Binds deferred constants, repeating while progress is made so chains
    /// of forward references settle.
    fn resolve_deferred(&mut self) {
        loop {
            let before = self.deferred.len();
            let deferred = std::mem::take(&mut self.deferred);
            for constant in deferred {
                match self
                    .evaluator
                    .evaluate(constant.expr, &self.symbols, constant.address)
                {
                    Ok(value) => {
                        self.symbols.bind(constant.name, value);
                        tracing::trace!(constant = constant.name, value, "deferred constant bound");
                    }
                    Err(AssemblerError::UndefinedSymbol(_)) => self.deferred.push(constant),
                    Err(error) => self.diagnostics.record(error, constant.position),
                }
            }
            if self.deferred.is_empty() || self.deferred.len() == before {
                break;
            }
        }

        for constant in std::mem::take(&mut self.deferred) {
            if let Err(error) =
                self.evaluator
                    .evaluate(constant.expr, &self.symbols, constant.address)
            {
                self.diagnostics.record(error, constant.position);
            }
        }
    }

    fn encode_all(&mut self) {
        self.pass = Pass::Encoding;
        tracing::debug!(instructions = self.pending.len(), "pass 2: encoding");

        for pending in std::mem::take(&mut self.pending) {
            let position = pending.instruction.position;
            match self.encode_one(&pending) {
                Ok(resolved) => {
                    tracing::trace!(
                        address = resolved.address,
                        variant = %resolved.variant,
                        bytes = ?resolved.bytes,
                        "encoded"
                    );
                    self.resolved.push(resolved);
                }
                Err(error) => self.diagnostics.record(error, position),
            }
        }
    }

    fn encode_one(&self, pending: &Pending<'l>) -> Result<ResolvedInstruction, AssemblerError> {
        debug_assert_eq!(self.pass, Pass::Encoding);
        let instruction = pending.instruction;

        let mut values = Vec::new();
        for (token, operand) in pending.variant.pattern.iter().zip(&instruction.operands) {
            if let (Token::Placeholder(_), OperandToken::Expr(expr)) = (token, operand) {
                let value = self
                    .evaluator
                    .evaluate(expr, &self.symbols, pending.address)?;
                values.push(OperandValue {
                    value,
                    signed_literal: self.is_signed_literal(expr),
                });
            }
        }

        let bytes = encode(&pending.variant, &values, pending.address)?;
        Ok(ResolvedInstruction {
            address: pending.address,
            variant: Arc::clone(&pending.variant),
            values: values.iter().map(|v| v.value).collect(),
            bytes,
            position: instruction.position,
        })
    }

    /// Predefined values are literals written outside the source, so a bare
    /// reference to one keeps its sign: `ld a,OFFSET` with `OFFSET=-1`.
    fn is_signed_literal(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Symbol(name) => self
                .symbols
                .get(name)
                .map_or(false, |symbol| symbol.kind == SymbolKind::Predefined),
            _ => expr.is_signed_literal(),
        }
    }

    fn finish(self, origin: u16) -> Assembly {
        let outcome = if self.diagnostics.is_empty() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        tracing::debug!(
            ?outcome,
            instructions = self.resolved.len(),
            errors = self.diagnostics.len(),
            "assembly finished"
        );
        Assembly {
            outcome,
            instructions: self.resolved,
            diagnostics: self.diagnostics,
            symbols: self.symbols,
            origin,
        }
    }
}
