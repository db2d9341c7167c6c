use crate::*;

const BROKEN: &str = "\
start:
    ld a,(hl
    frob a
    ld q,1
    jr missing
    nop
start:
";

#[test]
fn test_all_errors_reported_in_source_order() {
    let assembly = Assembler::new().assemble_source(BROKEN);
    assert_eq!(assembly.outcome, Outcome::Failed);

    for diagnostic in &assembly.diagnostics {
        eprintln!("{}", diagnostic);
    }
    let lines: Vec<usize> = assembly.diagnostics.iter().map(|d| d.position.line).collect();
    assert_eq!(lines, vec![2, 3, 4, 5, 7]);

    let errors: Vec<_> = assembly.diagnostics.errors().collect();
    assert!(matches!(errors[0], AssemblerError::Syntax(_)));
    assert_eq!(errors[1], &AssemblerError::UnknownMnemonic("frob".to_string()));
    assert!(matches!(errors[2], AssemblerError::UnknownOperandForm { .. }));
    assert_eq!(errors[3], &AssemblerError::UndefinedSymbol("missing".to_string()));
    assert_eq!(errors[4], &AssemblerError::DuplicateLabel("start".to_string()));

    // The independent nop was still encoded.
    assert!(assembly.instructions.iter().any(|i| i.bytes == vec![0x00]));
}

#[test]
fn test_label_on_a_bad_line_still_resolves() {
    let assembly = Assembler::new().assemble_source("loop: ld a,,b\n  jr loop");
    let errors: Vec<_> = assembly.diagnostics.errors().collect();
    eprintln!("errors: {:?}", errors);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], AssemblerError::Syntax(_)));
    assert_eq!(assembly.symbols.value("loop"), Some(0));
}

#[test]
fn test_unknown_operand_form_names_the_shape() {
    let assembly = Assembler::new().assemble_source("  LD (BC),B");
    let diagnostic = assembly.diagnostics.iter().next().unwrap();
    assert_eq!(
        diagnostic.error,
        AssemblerError::UnknownOperandForm {
            mnemonic: "ld".to_string(),
            shape: "(bc),b".to_string()
        }
    );
    assert_eq!(diagnostic.position, SourcePosition::new(1, 3));
    assert_eq!(
        diagnostic.to_string(),
        "1:3: No variant of ld accepts operands `(bc),b`"
    );
}

#[test]
fn test_failed_run_has_no_image() {
    let assembly = Assembler::new().assemble_source("nop\nld a,1000\nnop");
    assert!(!assembly.is_success());
    assert!(assembly.bytes().is_none());
    assert_eq!(assembly.instructions.len(), 2);

    let diagnostics = assembly.into_bytes().unwrap_err();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics.to_string(), "assembly failed with 1 error(s)");
}

#[test]
fn test_diagnostics_keep_insertion_order_on_ties() {
    let mut diagnostics = Diagnostics::new();
    let late = SourcePosition::new(9, 1);
    let early = SourcePosition::new(2, 5);
    diagnostics.record(AssemblerError::UndefinedSymbol("x".to_string()), late);
    diagnostics.record(AssemblerError::Syntax("first".to_string()), early);
    diagnostics.record(AssemblerError::Syntax("second".to_string()), early);

    let recorded: Vec<_> = diagnostics.iter().map(|d| d.error.to_string()).collect();
    assert_eq!(
        recorded,
        vec![
            "Syntax error: first",
            "Syntax error: second",
            "Undefined symbol: x"
        ]
    );
}

#[test]
fn test_assembly_is_idempotent() {
    let source = "\
loop: ld a,(ix+4)
      add a,LIMIT
      jr nc,loop
      bogus
      ld (0x4000),a
LIMIT equ 0x20
";
    let assembler = Assembler::new();
    let first = assembler.assemble_source(source);
    let second = assembler.assemble_source(source);
    assert_eq!(first, second);
    assert_eq!(first.diagnostics.len(), 1);

    let fixed = source.replace("      bogus\n", "");
    let a = assembler.assemble_source(&fixed).into_bytes().unwrap();
    let b = assembler.assemble_source(&fixed).into_bytes().unwrap();
    assert_eq!(hex::encode(&a), hex::encode(&b));
    assert_eq!(hex::encode(&a), "dd7e04c62030f9320040");
}
