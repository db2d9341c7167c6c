//! Variant selection by operand-token shape.
//!
//! Matching never needs symbol values: a placeholder accepts any expression
//! whose static category fits, and range checks happen at encode time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::registry::{PlaceholderKind, Registry, Token, Variant};
use crate::types::{AssemblerError, OperandToken, RangeError};

/// Returns the first variant of `mnemonic` whose pattern matches `operands`.
pub fn match_variant(
    registry: &Registry,
    mnemonic: &str,
    operands: &[OperandToken],
) -> Result<Arc<Variant>, AssemblerError> {
    let candidates = registry
        .variants(mnemonic)
        .ok_or_else(|| AssemblerError::UnknownMnemonic(mnemonic.to_string()))?;

    if let Some(variant) = candidates
        .iter()
        .find(|v| pattern_matches(&v.pattern, operands))
    {
        return Ok(Arc::clone(variant));
    }

    if let Some(err) = bit_index_out_of_range(candidates, operands) {
        return Err(err.into());
    }

    Err(AssemblerError::UnknownOperandForm {
        mnemonic: mnemonic.to_ascii_lowercase(),
        shape: shape_of(operands),
    })
}

pub fn pattern_matches(pattern: &[Token], operands: &[OperandToken]) -> bool {
    pattern.len() == operands.len()
        && pattern
            .iter()
            .zip(operands)
            .all(|(token, operand)| token_matches(token, operand))
}

fn token_matches(token: &Token, operand: &OperandToken) -> bool {
    match (token, operand) {
        (Token::Placeholder(kind), OperandToken::Expr(expr)) => kind.accepts(expr.category()),
        (Token::Placeholder(_), OperandToken::Literal(_)) => false,
        (Token::Literal(text), OperandToken::Literal(input)) => text.eq_ignore_ascii_case(input),
        // Fixed numbers in a pattern (bit numbers, `im` modes, `rst` vectors).
        (Token::Literal(_), OperandToken::Expr(expr)) => {
            match (token.numeric_literal(), expr.literal_value()) {
                (Some(expected), Some(actual)) => expected == actual,
                _ => false,
            }
        }
    }
}

/// `bit 9,a` has the shape of a `bit` variant with the wrong number in it;
/// report that as a range problem instead of an unknown form.
fn bit_index_out_of_range(
    candidates: &[Arc<Variant>],
    operands: &[OperandToken],
) -> Option<RangeError> {
    let mut numbers: BTreeMap<usize, (i64, BTreeSet<i64>)> = BTreeMap::new();

    for variant in candidates.iter().filter(|v| v.pattern.len() == operands.len()) {
        let mut fixed = Vec::new();
        let shape_fits = variant.pattern.iter().zip(operands).enumerate().all(
            |(index, (token, operand))| match (token.numeric_literal(), operand) {
                (Some(expected), OperandToken::Expr(expr)) => match expr.literal_value() {
                    Some(actual) => {
                        fixed.push((index, expected, actual));
                        true
                    }
                    None => false,
                },
                _ => token_matches(token, operand),
            },
        );
        if shape_fits {
            for (index, expected, actual) in fixed {
                numbers
                    .entry(index)
                    .or_insert_with(|| (actual, BTreeSet::new()))
                    .1
                    .insert(expected);
            }
        }
    }

    let (min, max) = PlaceholderKind::BitIndex.bounds();
    numbers.into_values().find_map(|(actual, accepted)| {
        let is_bit_slot = accepted.iter().copied().eq(min..=max);
        (is_bit_slot && !(min..=max).contains(&actual)).then_some(RangeError::Value {
            kind: PlaceholderKind::BitIndex,
            value: actual,
            min,
            max,
        })
    })
}

/// Operands rendered the way they were written, e.g. `a,(ix+5)`.
pub fn shape_of(operands: &[OperandToken]) -> String {
    operands.iter().map(|op| op.to_string()).collect()
}
