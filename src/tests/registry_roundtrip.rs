use crate::*;

const ORIGIN: u16 = 0x100;
const IMM8: i64 = 0x5A;
const IMM16: i64 = 0x1234;
const DISPLACEMENT: i64 = -3;
const BRANCH: i64 = 0x10;

fn sample_value(kind: PlaceholderKind, variant: &Variant) -> i64 {
    match kind {
        PlaceholderKind::Imm8 => IMM8,
        PlaceholderKind::Imm16 => IMM16,
        PlaceholderKind::IndexDisplacement => DISPLACEMENT,
        PlaceholderKind::RelativeOffset => {
            i64::from(ORIGIN) + i64::from(variant.byte_count) + BRANCH
        }
        PlaceholderKind::BitIndex | PlaceholderKind::ConditionCode => 5,
    }
}

/// The bytes the variant should produce for the sample values.
fn expected_bytes(variant: &Variant) -> Vec<u8> {
    let mut bytes = Vec::new();
    for byte in &variant.template {
        match byte {
            TemplateByte::Fixed(b) => bytes.push(*b),
            TemplateByte::Slot(PlaceholderKind::Imm16) => bytes.extend_from_slice(&[0x34, 0x12]),
            TemplateByte::Slot(PlaceholderKind::Imm8) => bytes.push(0x5A),
            TemplateByte::Slot(PlaceholderKind::IndexDisplacement) => bytes.push(0xFD),
            TemplateByte::Slot(PlaceholderKind::RelativeOffset) => bytes.push(0x10),
            TemplateByte::Slot(_) => bytes.push(5),
        }
    }
    bytes
}

/// Writes the variant as source text, e.g. `ld (ix+-3),90`.
fn source_line(variant: &Variant) -> String {
    let mut line = variant.mnemonic.clone();
    if !variant.pattern.is_empty() {
        line.push(' ');
    }
    let mut last_was_word = false;
    for token in &variant.pattern {
        let text = match token {
            Token::Literal(text) => text.clone(),
            Token::Placeholder(kind) => sample_value(*kind, variant).to_string(),
        };
        // `ld b,set 0,(ix+d)` needs the space between `set` and `0`.
        let is_word = !matches!(text.as_str(), "(" | ")" | "," | "+");
        if last_was_word && is_word {
            line.push(' ');
        }
        line.push_str(&text);
        last_was_word = is_word;
    }
    line
}

#[test]
fn test_every_variant_encodes_its_template() {
    let registry = Registry::bundled();
    assert!(registry.len() > 1600);
    assert_eq!(registry.mnemonic_count(), 68);

    for variant in registry.iter() {
        let operands: Vec<OperandToken> = variant
            .pattern
            .iter()
            .map(|token| match token {
                Token::Literal(text) => match token.numeric_literal() {
                    Some(n) => OperandToken::number(n),
                    None => OperandToken::literal(text),
                },
                Token::Placeholder(kind) => OperandToken::number(sample_value(*kind, variant)),
            })
            .collect();

        let matched = match_variant(&registry, &variant.mnemonic, &operands)
            .unwrap_or_else(|e| panic!("{}: {}", variant, e));
        assert_eq!(matched.template, variant.template, "{}", variant);

        let values: Vec<OperandValue> = variant
            .slots()
            .map(|kind| OperandValue::new(sample_value(kind, variant)))
            .collect();
        let bytes = encode(&matched, &values, ORIGIN).unwrap();
        assert_eq!(bytes, expected_bytes(variant), "{}", variant);
        assert_eq!(bytes.len(), usize::from(variant.byte_count), "{}", variant);
    }
}

#[test]
fn test_every_variant_assembles_from_source() {
    let registry = Registry::bundled();
    let assembler = Assembler::new().origin(ORIGIN);

    for variant in registry.iter() {
        let line = source_line(variant);
        let assembly = assembler.assemble_source(&line);
        assert!(
            assembly.is_success(),
            "`{}`: {:?}",
            line,
            assembly.diagnostics
        );
        assert_eq!(assembly.bytes().unwrap(), expected_bytes(variant), "`{}`", line);
    }
}

#[test]
fn test_flag_strings_round_trip() {
    for variant in Registry::bundled().iter() {
        let text = variant.flags.to_string();
        assert_eq!(FlagEffects::parse(&text), Some(variant.flags), "{}", variant);
    }
}

#[test]
fn test_unconditional_instructions_have_equal_cycles() {
    for variant in Registry::bundled().iter() {
        let conditional = variant.pattern.iter().any(|t| {
            matches!(t, Token::Literal(text) if matches!(text.as_str(), "nz" | "z" | "nc" | "po" | "pe" | "nv" | "v" | "p" | "m"))
                || (matches!(variant.mnemonic.as_str(), "jr" | "jp" | "call" | "ret")
                    && t == &Token::Literal("c".into()))
        });
        let repeating = variant.mnemonic.ends_with('r') && variant.pattern.is_empty();
        if !conditional && !repeating && variant.mnemonic != "djnz" {
            assert_eq!(variant.cycles.taken, variant.cycles.not_taken, "{}", variant);
        }
    }
}
