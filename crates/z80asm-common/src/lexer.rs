//! Splits one source line into lexemes.

use crate::diagnostics::Diagnostic;
use crate::types::{AssemblerError, SourcePosition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexemeKind {
    /// Identifier as written; `af'` is kept as one identifier.
    Ident(String),
    Number(i64),
    /// Lone `$`.
    Dollar,
    Comma,
    Colon,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Shl,
    Shr,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    /// One-based column of the first character.
    pub column: usize,
}

impl Lexeme {
    /// Whether this lexeme can end an operand, which makes a following `%`
    /// the remainder operator rather than a binary prefix.
    fn ends_operand(&self) -> bool {
        matches!(
            self.kind,
            LexemeKind::Ident(_) | LexemeKind::Number(_) | LexemeKind::Dollar | LexemeKind::RParen
        )
    }
}

/// Lexes `text`, stopping at a `;` comment.
pub fn tokenize(text: &str, line: usize) -> Result<Vec<Lexeme>, Diagnostic> {
    let chars: Vec<char> = text.chars().collect();
    let mut lexemes: Vec<Lexeme> = Vec::new();
    let mut i = 0;

    let fail = |column: usize, message: String| Diagnostic {
        position: SourcePosition::new(line, column),
        error: AssemblerError::Syntax(message),
    };

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c == ';' {
            break;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let kind = if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let mut word: String = chars[start..i].iter().collect();
            if word.eq_ignore_ascii_case("af") && chars.get(i) == Some(&'\'') {
                word.push('\'');
                i += 1;
            }
            LexemeKind::Ident(word)
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            LexemeKind::Number(
                parse_number(&text).ok_or_else(|| fail(column, format!("invalid number `{}`", text)))?,
            )
        } else if c == '$' && chars.get(i + 1).is_some_and(|d| d.is_ascii_hexdigit()) {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            LexemeKind::Number(
                parse_number(&text).ok_or_else(|| fail(column, format!("invalid number `{}`", text)))?,
            )
        } else if c == '%'
            && !lexemes.last().is_some_and(Lexeme::ends_operand)
            && chars.get(i + 1).is_some_and(|d| matches!(d, '0' | '1'))
        {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            LexemeKind::Number(
                parse_number(&text).ok_or_else(|| fail(column, format!("invalid number `{}`", text)))?,
            )
        } else if c == '\'' {
            match (chars.get(i + 1), chars.get(i + 2)) {
                (Some(&ch), Some('\'')) => {
                    i += 3;
                    LexemeKind::Number(i64::from(u32::from(ch)))
                }
                _ => return Err(fail(column, "unterminated character literal".to_string())),
            }
        } else {
            let next = chars.get(i + 1).copied();
            let (kind, len) = match (c, next) {
                ('<', Some('<')) => (LexemeKind::Shl, 2),
                ('>', Some('>')) => (LexemeKind::Shr, 2),
                ('$', _) => (LexemeKind::Dollar, 1),
                (',', _) => (LexemeKind::Comma, 1),
                (':', _) => (LexemeKind::Colon, 1),
                ('(', _) => (LexemeKind::LParen, 1),
                (')', _) => (LexemeKind::RParen, 1),
                ('+', _) => (LexemeKind::Plus, 1),
                ('-', _) => (LexemeKind::Minus, 1),
                ('*', _) => (LexemeKind::Star, 1),
                ('/', _) => (LexemeKind::Slash, 1),
                ('%', _) => (LexemeKind::Percent, 1),
                ('&', _) => (LexemeKind::Ampersand, 1),
                ('|', _) => (LexemeKind::Pipe, 1),
                ('^', _) => (LexemeKind::Caret, 1),
                ('~', _) => (LexemeKind::Tilde, 1),
                _ => return Err(fail(column, format!("unexpected character `{}`", c))),
            };
            i += len;
            kind
        };

        lexemes.push(Lexeme { kind, column });
    }

    Ok(lexemes)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parses a numeric literal in any of the accepted notations:
/// `42`, `0x2A`, `$2A`, `2Ah`, `%101010`, `0b101010`, `101010b`, `'*'`.
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    let lower = text.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix("0x") {
        return radix(hex, 16);
    }
    if let Some(hex) = lower.strip_prefix('$') {
        return radix(hex, 16);
    }
    if let Some(bin) = lower.strip_prefix('%') {
        return radix(bin, 2);
    }
    if let Some(hex) = lower.strip_suffix('h') {
        if hex.starts_with(|c: char| c.is_ascii_digit()) {
            return radix(hex, 16);
        }
        return None;
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        if let Some(value) = radix(bin, 2) {
            return Some(value);
        }
    }
    if let Some(bin) = lower.strip_suffix('b') {
        return radix(bin, 2);
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        let mut chars = inner.chars();
        return match (chars.next(), chars.next()) {
            (Some(ch), None) => Some(i64::from(u32::from(ch))),
            _ => None,
        };
    }
    if let Some(negative) = lower.strip_prefix('-') {
        return parse_number(negative).and_then(i64::checked_neg);
    }
    radix(&lower, 10)
}

fn radix(digits: &str, radix: u32) -> Option<i64> {
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}
