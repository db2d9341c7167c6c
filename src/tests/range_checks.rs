use crate::*;

fn assemble(source: &str) -> Assembly {
    Assembler::new().assemble_source(source)
}

fn range_error(source: &str) -> RangeError {
    let assembly = assemble(source);
    let found = match assembly.diagnostics.errors().next() {
        Some(AssemblerError::Range(err)) => err.clone(),
        other => panic!("expected a range error for `{}`, got {:?}", source, other),
    };
    found
}

#[test]
fn test_imm8_bounds() {
    assert_eq!(assemble("ld a,255").bytes(), Some(vec![0x3E, 0xFF]));
    assert_eq!(assemble("ld a,0").bytes(), Some(vec![0x3E, 0x00]));
    assert_eq!(
        range_error("ld a,256"),
        RangeError::Value {
            kind: PlaceholderKind::Imm8,
            value: 256,
            min: 0,
            max: 255
        }
    );
}

#[test]
fn test_imm8_signed_literal() {
    assert_eq!(assemble("ld a,-1").bytes(), Some(vec![0x3E, 0xFF]));
    assert_eq!(assemble("ld a,-128").bytes(), Some(vec![0x3E, 0x80]));
    assert!(matches!(
        range_error("ld a,-129"),
        RangeError::Value { value: -129, min: -128, .. }
    ));
}

#[test]
fn test_imm8_negative_expression_is_not_a_signed_literal() {
    let assembly = assemble("ONE equ 1\n  ld a,0-ONE");
    assert!(matches!(
        assembly.diagnostics.errors().next(),
        Some(AssemblerError::Range(RangeError::Value { value: -1, min: 0, .. }))
    ));
}

#[test]
fn test_imm16_bounds() {
    assert_eq!(assemble("ld bc,65535").bytes(), Some(vec![0x01, 0xFF, 0xFF]));
    assert!(matches!(
        range_error("ld bc,65536"),
        RangeError::Value { kind: PlaceholderKind::Imm16, .. }
    ));
    assert!(matches!(
        range_error("ld bc,-1"),
        RangeError::Value { kind: PlaceholderKind::Imm16, value: -1, .. }
    ));
}

#[test]
fn test_index_displacement_bounds() {
    assert_eq!(assemble("ld a,(ix+127)").bytes(), Some(vec![0xDD, 0x7E, 0x7F]));
    assert_eq!(assemble("ld a,(ix-128)").bytes(), Some(vec![0xDD, 0x7E, 0x80]));
    assert_eq!(
        range_error("ld a,(ix+128)"),
        RangeError::Value {
            kind: PlaceholderKind::IndexDisplacement,
            value: 128,
            min: -128,
            max: 127
        }
    );
    assert!(matches!(
        range_error("ld a,(iy-129)"),
        RangeError::Value { value: -129, .. }
    ));
}

#[test]
fn test_relative_offset_bounds() {
    // jr at 0x100 is two bytes long, so targets 0x102-128 ..= 0x102+127 are reachable.
    assert_eq!(
        Assembler::new().origin(0x100).assemble_source("jr 0x100+2+127").bytes(),
        Some(vec![0x18, 0x7F])
    );
    assert_eq!(
        Assembler::new().origin(0x100).assemble_source("jr 0x100+2-128").bytes(),
        Some(vec![0x18, 0x80])
    );

    let assembly = Assembler::new().origin(0x100).assemble_source("jr 0x100+2+128");
    let err = assembly.diagnostics.errors().next().unwrap();
    assert_eq!(err, &AssemblerError::Range(RangeError::RelativeJump { offset: 128 }));
    assert!(err.to_string().starts_with("relative jump out of range"));

    let assembly = Assembler::new().origin(0x100).assemble_source("jr 0x100+2-129");
    assert!(matches!(
        assembly.diagnostics.errors().next(),
        Some(AssemblerError::Range(RangeError::RelativeJump { offset: -129 }))
    ));
}

#[test]
fn test_far_forward_jump_fails_but_later_errors_are_reported() {
    let mut source = String::from("  jr far\n");
    for _ in 0..64 {
        source.push_str("  ld hl,0\n");
    }
    source.push_str("far: nop\n  frobnicate a\n  ld a,300\n");

    let assembly = assemble(&source);
    assert_eq!(assembly.outcome, Outcome::Failed);
    assert!(assembly.bytes().is_none());

    let errors: Vec<_> = assembly.diagnostics.errors().cloned().collect();
    eprintln!("errors: {:?}", errors);
    assert_eq!(errors.len(), 3);
    // far = 2 + 64 * 3 = 194, offset = 194 - 2
    assert_eq!(errors[0], AssemblerError::Range(RangeError::RelativeJump { offset: 192 }));
    assert_eq!(errors[1], AssemblerError::UnknownMnemonic("frobnicate".to_string()));
    assert!(matches!(errors[2], AssemblerError::Range(RangeError::Value { value: 300, .. })));
}

#[test]
fn test_bit_index_out_of_range() {
    assert_eq!(
        range_error("bit 8,a"),
        RangeError::Value {
            kind: PlaceholderKind::BitIndex,
            value: 8,
            min: 0,
            max: 7
        }
    );
    assert!(matches!(
        range_error("set -1,(ix+2)"),
        RangeError::Value { kind: PlaceholderKind::BitIndex, value: -1, .. }
    ));
    // Not a bit slot: there is simply no `im 3`.
    assert!(matches!(
        assemble("im 3").diagnostics.errors().next(),
        Some(AssemblerError::UnknownOperandForm { .. })
    ));
}

#[test]
fn test_encoder_directly() {
    let registry = Registry::bundled();
    let variant = match_variant(&registry, "ld", &[
        OperandToken::literal("bc"),
        OperandToken::literal(","),
        OperandToken::number(0),
    ])
    .unwrap();

    assert_eq!(
        encode(&variant, &[OperandValue::new(0x1234)], 0).unwrap(),
        vec![0x01, 0x34, 0x12]
    );
    assert!(encode(&variant, &[OperandValue::new(0x10000)], 0).is_err());
}
