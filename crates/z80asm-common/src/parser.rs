//! Turns lexed source lines into labels, instructions and constant definitions.
//!
//! Operands come out as one flat token stream matching the registry's
//! pattern layout: `ld a,(ix+5)` yields `a` `,` `(` `ix` `+` `5` `)`.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::lexer::{tokenize, Lexeme, LexemeKind};
use crate::types::{
    AssemblerError, OperandToken, ParsedInstruction, SourceLine, SourcePosition, Statement,
};

/// Register, register-pair and condition names. These are never symbols.
const RESERVED: &[&str] = &[
    "a", "b", "c", "d", "e", "h", "l", "i", "r", "f", "af", "af'", "bc", "de", "hl", "sp", "ix",
    "iy", "ixh", "ixl", "iyh", "iyl", "nz", "z", "nc", "po", "pe", "p", "m", "nv", "v",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Parses every line of `source`, dropping blank and comment-only lines.
/// Syntax errors are reported in the returned diagnostics. A label in front
/// of a bad instruction is kept so that references to it still resolve.
pub fn parse_source(source: &str) -> (Vec<SourceLine>, Diagnostics) {
    let mut lines = Vec::new();
    let mut diagnostics = Diagnostics::new();

    for (index, text) in source.lines().enumerate() {
        let (line, error) = parse_recovering(text, index + 1);
        if let Some(diagnostic) = error {
            diagnostics.record(diagnostic.error, diagnostic.position);
        }
        if line.label.is_some() || line.statement.is_some() {
            lines.push(line);
        }
    }

    (lines, diagnostics)
}

/// Parses one line. `line` is the one-based line number used in positions.
pub fn parse_line(text: &str, line: usize) -> Result<SourceLine, Diagnostic> {
    match parse_recovering(text, line) {
        (source_line, None) => Ok(source_line),
        (_, Some(diagnostic)) => Err(diagnostic),
    }
}

/// The line as far as it could be read, plus the error that stopped it.
fn parse_recovering(text: &str, line: usize) -> (SourceLine, Option<Diagnostic>) {
    let mut source_line = SourceLine {
        position: SourcePosition::new(line, 1),
        label: None,
        statement: None,
    };
    let lexemes = match tokenize(text, line) {
        Ok(lexemes) => lexemes,
        Err(diagnostic) => return (source_line, Some(diagnostic)),
    };
    if let Some(first) = lexemes.first() {
        source_line.position.column = first.column;
    }

    let mut cursor = Cursor {
        lexemes: &lexemes,
        index: 0,
        line,
        end_column: text.chars().count() + 1,
    };
    source_line.label = cursor.label();
    let is_constant = matches!(cursor.peek_kind(), Some(LexemeKind::Ident(w)) if is_equ(w));

    match cursor.statement(source_line.label.is_some()) {
        Ok(statement) => source_line.statement = statement,
        // A constant that failed to parse has no value to give its name.
        Err(diagnostic) => {
            if is_constant {
                source_line.label = None;
            }
            return (source_line, Some(diagnostic));
        }
    }
    (source_line, None)
}

struct Cursor<'a> {
    lexemes: &'a [Lexeme],
    index: usize,
    line: usize,
    end_column: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Lexeme> {
        self.lexemes.get(self.index)
    }

    fn peek_kind(&self) -> Option<&'a LexemeKind> {
        self.peek().map(|l| &l.kind)
    }

    fn position_of(&self, lexeme: &Lexeme) -> SourcePosition {
        SourcePosition::new(self.line, lexeme.column)
    }

    fn error_at(&self, lexeme: &Lexeme, message: &str) -> Diagnostic {
        Diagnostic {
            position: self.position_of(lexeme),
            error: AssemblerError::Syntax(message.to_string()),
        }
    }

    fn error_here(&self, message: &str) -> Diagnostic {
        let column = self.peek().map_or(self.end_column, |l| l.column);
        Diagnostic {
            position: SourcePosition::new(self.line, column),
            error: AssemblerError::Syntax(message.to_string()),
        }
    }

    /// `name:`, `name::`, or `name equ ...`.
    fn label(&mut self) -> Option<String> {
        let LexemeKind::Ident(name) = self.peek_kind()? else {
            return None;
        };
        match self.lexemes.get(self.index + 1).map(|l| &l.kind) {
            Some(LexemeKind::Colon) => {
                self.index += 2;
                if self.peek_kind() == Some(&LexemeKind::Colon) {
                    self.index += 1;
                }
                Some(name.clone())
            }
            Some(LexemeKind::Ident(next)) if is_equ(next) => {
                self.index += 1;
                Some(name.clone())
            }
            _ => None,
        }
    }

    /// Instruction or `equ` definition following the label, if any.
    fn statement(&mut self, has_label: bool) -> Result<Option<Statement>, Diagnostic> {
        let Some(first) = self.peek() else {
            return Ok(None);
        };
        let position = self.position_of(first);

        let LexemeKind::Ident(word) = &first.kind else {
            return Err(self.error_at(first, "expected a mnemonic"));
        };

        if is_equ(word) {
            if !has_label {
                return Err(self.error_at(first, "`equ` needs a name"));
            }
            self.index += 1;
            let expr = self.expression()?;
            self.expect_end()?;
            return Ok(Some(Statement::Constant(expr)));
        }

        let mnemonic = word.clone();
        self.index += 1;
        let operands = self.operands()?;
        Ok(Some(Statement::Instruction(ParsedInstruction {
            mnemonic,
            operands,
            position,
        })))
    }

    fn expect_end(&self) -> Result<(), Diagnostic> {
        match self.peek() {
            None => Ok(()),
            Some(lexeme) => Err(self.error_at(lexeme, "unexpected trailing input")),
        }
    }

    fn operands(&mut self) -> Result<Vec<OperandToken>, Diagnostic> {
        let mut tokens = Vec::new();
        if self.peek().is_none() {
            return Ok(tokens);
        }

        loop {
            let start = self.index;
            let mut depth = 0usize;
            while let Some(kind) = self.peek_kind() {
                match kind {
                    LexemeKind::LParen => depth += 1,
                    LexemeKind::RParen => {
                        depth = depth
                            .checked_sub(1)
                            .ok_or_else(|| self.error_here("unbalanced `)`"))?;
                    }
                    LexemeKind::Comma if depth == 0 => break,
                    _ => {}
                }
                self.index += 1;
            }
            if depth != 0 {
                return Err(self.error_here("missing `)`"));
            }

            let operand = &self.lexemes[start..self.index];
            if operand.is_empty() {
                return Err(self.error_here("empty operand"));
            }
            self.operand(operand, &mut tokens)?;

            if self.peek_kind() == Some(&LexemeKind::Comma) {
                tokens.push(OperandToken::literal(","));
                self.index += 1;
            } else {
                return Ok(tokens);
            }
        }
    }

    fn operand(
        &self,
        lexemes: &[Lexeme],
        tokens: &mut Vec<OperandToken>,
    ) -> Result<(), Diagnostic> {
        if let Some(literal) = reserved_word(lexemes) {
            tokens.push(literal);
            return Ok(());
        }

        // A bare word in front of another operand, like the `rlc` in
        // `ld b,rlc (ix+1)`, is part of the pattern rather than a symbol.
        if let [Lexeme {
            kind: LexemeKind::Ident(word),
            ..
        }, next, ..] = lexemes
        {
            if !is_reserved(word) && starts_operand(&next.kind) {
                tokens.push(OperandToken::literal(word));
                return self.operand(&lexemes[1..], tokens);
            }
        }

        if lexemes.first().map(|l| &l.kind) == Some(&LexemeKind::LParen)
            && closing_paren(lexemes) == Some(lexemes.len() - 1)
        {
            let inner = &lexemes[1..lexemes.len() - 1];
            tokens.push(OperandToken::literal("("));
            self.indirection(inner, &lexemes[0], tokens)?;
            tokens.push(OperandToken::literal(")"));
            return Ok(());
        }

        tokens.push(OperandToken::Expr(self.sub_expression(lexemes)?));
        Ok(())
    }

    /// Contents of `( ... )`: a register, `ix+d`/`iy-d`, or an address expression.
    fn indirection(
        &self,
        inner: &[Lexeme],
        open: &Lexeme,
        tokens: &mut Vec<OperandToken>,
    ) -> Result<(), Diagnostic> {
        if inner.is_empty() {
            return Err(self.error_at(open, "empty `()`"));
        }
        if let Some(literal) = reserved_word(inner) {
            tokens.push(literal);
            return Ok(());
        }

        if let LexemeKind::Ident(base) = &inner[0].kind {
            if base.eq_ignore_ascii_case("ix") || base.eq_ignore_ascii_case("iy") {
                tokens.push(OperandToken::literal(base));
                let displacement = match inner.get(1).map(|l| &l.kind) {
                    Some(LexemeKind::Plus) => &inner[2..],
                    // Keep the minus so `ix-3+1` still means `ix+(-3+1)`.
                    Some(LexemeKind::Minus) => &inner[1..],
                    _ => {
                        return Err(
                            self.error_at(&inner[1], "expected `+` or `-` after index register")
                        )
                    }
                };
                if displacement.is_empty() {
                    return Err(self.error_at(&inner[inner.len() - 1], "missing displacement"));
                }
                tokens.push(OperandToken::literal("+"));
                tokens.push(OperandToken::Expr(self.sub_expression(displacement)?));
                return Ok(());
            }
        }

        tokens.push(OperandToken::Expr(self.sub_expression(inner)?));
        Ok(())
    }

    fn sub_expression(&self, lexemes: &[Lexeme]) -> Result<Expr, Diagnostic> {
        let mut cursor = Cursor {
            lexemes,
            index: 0,
            line: self.line,
            end_column: lexemes.last().map_or(self.end_column, |l| l.column + 1),
        };
        let expr = cursor.expression()?;
        cursor.expect_end()?;
        Ok(expr)
    }

    fn expression(&mut self) -> Result<Expr, Diagnostic> {
        self.binary_level(0)
    }

    /// Precedence climbing over `|`, `^`, `&`, shifts, `+ -`, `* / %`.
    fn binary_level(&mut self, level: usize) -> Result<Expr, Diagnostic> {
        if level == BINARY_LEVELS {
            return self.unary();
        }

        let mut lhs = self.binary_level(level + 1)?;
        while let Some(op) = self.peek_kind().and_then(|kind| binary_op(level, kind)) {
            self.index += 1;
            let rhs = self.binary_level(level + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek_kind() {
            Some(LexemeKind::Minus) => Some(UnaryOp::Neg),
            Some(LexemeKind::Plus) => Some(UnaryOp::Plus),
            Some(LexemeKind::Tilde) => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.index += 1;
            let inner = self.unary()?;
            return Ok(Expr::Unary(op, Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, Diagnostic> {
        let Some(lexeme) = self.peek() else {
            return Err(self.error_here("expected an expression"));
        };
        self.index += 1;
        match &lexeme.kind {
            LexemeKind::Number(n) => Ok(Expr::Number(*n)),
            LexemeKind::Dollar => Ok(Expr::CurrentAddress),
            LexemeKind::Ident(name) if is_reserved(name) => Err(self.error_at(
                lexeme,
                &format!("register `{}` cannot be used in an expression", name),
            )),
            LexemeKind::Ident(name) => Ok(Expr::symbol(name.as_str())),
            LexemeKind::LParen => {
                let inner = self.expression()?;
                match self.peek_kind() {
                    Some(LexemeKind::RParen) => {
                        self.index += 1;
                        Ok(inner)
                    }
                    _ => Err(self.error_here("missing `)`")),
                }
            }
            _ => Err(self.error_at(lexeme, "expected an expression")),
        }
    }
}

const BINARY_LEVELS: usize = 6;

/// Binary operator of `kind` at precedence `level`, lowest first.
fn binary_op(level: usize, kind: &LexemeKind) -> Option<BinaryOp> {
    let op = match (level, kind) {
        (0, LexemeKind::Pipe) => BinaryOp::Or,
        (1, LexemeKind::Caret) => BinaryOp::Xor,
        (2, LexemeKind::Ampersand) => BinaryOp::And,
        (3, LexemeKind::Shl) => BinaryOp::Shl,
        (3, LexemeKind::Shr) => BinaryOp::Shr,
        (4, LexemeKind::Plus) => BinaryOp::Add,
        (4, LexemeKind::Minus) => BinaryOp::Sub,
        (5, LexemeKind::Star) => BinaryOp::Mul,
        (5, LexemeKind::Slash) => BinaryOp::Div,
        (5, LexemeKind::Percent) => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}

fn reserved_word(lexemes: &[Lexeme]) -> Option<OperandToken> {
    match lexemes {
        [Lexeme {
            kind: LexemeKind::Ident(name),
            ..
        }] if is_reserved(name) => Some(OperandToken::literal(name)),
        _ => None,
    }
}

fn is_equ(word: &str) -> bool {
    word.eq_ignore_ascii_case("equ") || word.eq_ignore_ascii_case(".equ")
}

/// Lexemes that cannot follow a symbol inside an expression.
fn starts_operand(kind: &LexemeKind) -> bool {
    matches!(
        kind,
        LexemeKind::LParen | LexemeKind::Number(_) | LexemeKind::Ident(_) | LexemeKind::Dollar
    )
}

/// Index of the `)` closing the `(` at index 0.
fn closing_paren(lexemes: &[Lexeme]) -> Option<usize> {
    let mut depth = 0usize;
    for (index, lexeme) in lexemes.iter().enumerate() {
        match lexeme.kind {
            LexemeKind::LParen => depth += 1,
            LexemeKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(text: &str) -> ParsedInstruction {
        match parse_line(text, 1).unwrap().statement {
            Some(Statement::Instruction(instruction)) => instruction,
            other => panic!("expected an instruction, got {:?}", other),
        }
    }

    fn shape(text: &str) -> String {
        instruction(text)
            .operands
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn labels_and_constants() {
        let line = parse_line("loop: djnz loop", 4).unwrap();
        assert_eq!(line.label.as_deref(), Some("loop"));
        assert!(matches!(line.statement, Some(Statement::Instruction(_))));

        let line = parse_line("exported:: nop", 1).unwrap();
        assert_eq!(line.label.as_deref(), Some("exported"));

        let line = parse_line("SIZE equ 4*8", 1).unwrap();
        assert_eq!(line.label.as_deref(), Some("SIZE"));
        assert_eq!(
            line.statement,
            Some(Statement::Constant(Expr::binary(
                BinaryOp::Mul,
                Expr::Number(4),
                Expr::Number(8)
            )))
        );

        let line = parse_line("   ; nothing here", 1).unwrap();
        assert!(line.label.is_none() && line.statement.is_none());
    }

    #[test]
    fn operand_streams() {
        assert_eq!(shape("ld a,(ix+5)"), "a , ( ix + 5 )");
        assert_eq!(shape("LD A,(HL)"), "a , ( hl )");
        assert_eq!(shape("ex af,af'"), "af , af'");
        assert_eq!(shape("ld (table+2),a"), "( (table + 2) ) , a");
        assert_eq!(shape("ld a,(1+2)*3"), "a , ((1 + 2) * 3)");
        assert_eq!(shape("out (c),0"), "( c ) , 0");
    }

    #[test]
    fn keyword_operands() {
        assert_eq!(shape("ld b,rlc (ix+1)"), "b , rlc ( ix + 1 )");
        assert_eq!(shape("ld c,SET 3,(iy-2)"), "c , set 3 , ( iy + -2 )");
        assert_eq!(shape("jp nv,0x10"), "nv , 16");
        // A symbol followed by an operator is still an expression.
        assert_eq!(shape("ld a,rl+1"), "a , (rl + 1)");
    }

    #[test]
    fn negative_index_displacement() {
        let operands = instruction("ld b,(iy-3+1)").operands;
        assert_eq!(operands[3], OperandToken::literal("iy"));
        assert_eq!(operands[4], OperandToken::literal("+"));
        assert_eq!(
            operands[5],
            OperandToken::Expr(Expr::binary(
                BinaryOp::Add,
                Expr::neg(Expr::Number(3)),
                Expr::Number(1)
            ))
        );
    }

    #[test]
    fn precedence() {
        let operands = instruction("ld hl,1+2*3<<1|4").operands;
        let expected = Expr::binary(
            BinaryOp::Or,
            Expr::binary(
                BinaryOp::Shl,
                Expr::binary(
                    BinaryOp::Add,
                    Expr::Number(1),
                    Expr::binary(BinaryOp::Mul, Expr::Number(2), Expr::Number(3)),
                ),
                Expr::Number(1),
            ),
            Expr::Number(4),
        );
        assert_eq!(operands[2], OperandToken::Expr(expected));
    }

    #[test]
    fn syntax_errors_carry_columns() {
        let err = parse_line("  ld a,", 9).unwrap_err();
        assert_eq!(err.position.line, 9);
        assert!(matches!(err.error, AssemblerError::Syntax(_)));

        let err = parse_line("ld a,(hl", 2).unwrap_err();
        assert!(matches!(err.error, AssemblerError::Syntax(_)));

        assert!(parse_line("equ 5", 1).is_err());
        assert!(parse_line("ld a,b+1", 1).is_err());
    }

    #[test]
    fn parse_source_skips_blank_lines_and_collects_errors() {
        let (lines, diagnostics) = parse_source("start:\n\n  nop\n  ld a,,b\n  halt\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.iter().next().unwrap().position.line, 4);
    }

    #[test]
    fn label_survives_a_bad_instruction() {
        let (lines, diagnostics) = parse_source("loop: ld a,,b\nSIZE equ 1+\n  jr loop");
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(lines[0].label.as_deref(), Some("loop"));
        assert!(lines[0].statement.is_none());
        // The broken constant is dropped entirely.
        assert_eq!(lines.len(), 2);
        assert!(lines[1].label.is_none());
    }
}
