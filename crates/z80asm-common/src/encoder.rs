use crate::registry::{PlaceholderKind, TemplateByte, Variant};
use crate::types::RangeError;

/// An evaluated operand expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandValue {
    pub value: i64,
    /// Written as a literal with a leading minus, like `-1`.
    pub signed_literal: bool,
}

impl OperandValue {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            signed_literal: false,
        }
    }
}

impl From<i64> for OperandValue {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

/// Substitutes `values` into the variant's opcode template.
///
/// `values` holds one entry per placeholder slot, in template order.
/// `address` is where the instruction starts; relative offsets are taken
/// from the end of the instruction.
///
/// # Panics
///
/// If the number of values differs from the number of slots.
pub fn encode(
    variant: &Variant,
    values: &[OperandValue],
    address: u16,
) -> Result<Vec<u8>, RangeError> {
    let slots = variant.slots().count();
    assert_eq!(
        slots,
        values.len(),
        "{}: {} operand values for {} slots",
        variant,
        values.len(),
        slots
    );

    let mut bytes = Vec::with_capacity(usize::from(variant.byte_count));
    let mut next = 0;
    for byte in &variant.template {
        match byte {
            TemplateByte::Fixed(b) => bytes.push(*b),
            TemplateByte::Slot(kind) => {
                let operand = values[next];
                next += 1;
                encode_slot(*kind, operand, address, variant.byte_count, &mut bytes)?;
            }
        }
    }

    debug_assert_eq!(bytes.len(), usize::from(variant.byte_count));
    Ok(bytes)
}

fn encode_slot(
    kind: PlaceholderKind,
    operand: OperandValue,
    address: u16,
    byte_count: u8,
    bytes: &mut Vec<u8>,
) -> Result<(), RangeError> {
    let value = operand.value;
    match kind {
        PlaceholderKind::Imm8 => {
            let min = if operand.signed_literal { -128 } else { 0 };
            check(kind, value, min, 0xFF)?;
            bytes.push(value as u8);
        }
        PlaceholderKind::Imm16 => {
            check(kind, value, 0, 0xFFFF)?;
            bytes.extend_from_slice(&(value as u16).to_le_bytes());
        }
        PlaceholderKind::IndexDisplacement => {
            check(kind, value, -128, 127)?;
            bytes.push(value as i8 as u8);
        }
        PlaceholderKind::RelativeOffset => {
            let offset = value - (i64::from(address) + i64::from(byte_count));
            if !(-128..=127).contains(&offset) {
                return Err(RangeError::RelativeJump { offset });
            }
            bytes.push(offset as i8 as u8);
        }
        PlaceholderKind::BitIndex | PlaceholderKind::ConditionCode => {
            let (min, max) = kind.bounds();
            check(kind, value, min, max)?;
            bytes.push(value as u8);
        }
    }
    Ok(())
}

fn check(kind: PlaceholderKind, value: i64, min: i64, max: i64) -> Result<(), RangeError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RangeError::Value {
            kind,
            value,
            min,
            max,
        })
    }
}
