use crate::*;

#[test]
fn test_load_immediates() {
    assert_eq!(hex::encode(z80_asm!(["ld a,16"])), "3e10");
    assert_eq!(hex::encode(z80_asm!(["ld bc,0x1234"])), "013412");
    assert_eq!(hex::encode(z80_asm!(["ld (ix+5),0x7F"])), "dd36057f");
}

#[test]
fn test_imm16_is_little_endian() {
    let bytecode = z80_asm!(["ld hl,0x1234", "jp 0xBEEF", "ld (0x8000),a"]);
    assert_eq!(hex::encode(&bytecode), "213412c3efbe320080");
}

#[test]
fn test_register_forms() {
    let bytecode = z80_asm!([
        "nop",
        "ld b,c",
        "ld a,(hl)",
        "ld (de),a",
        "push af",
        "ex af,af'",
        "ex (sp),hl",
        "jp (hl)",
        "halt"
    ]);
    assert_eq!(hex::encode(&bytecode), "00417e12f508e3e976");
}

#[test]
fn test_prefixed_instructions() {
    let bytecode = z80_asm!([
        "bit 7,h",
        "res 0,(hl)",
        "set 3,(iy-2)",
        "ldir",
        "neg",
        "im 1",
        "in a,(c)",
        "out (0xFE),a"
    ]);
    assert_eq!(hex::encode(&bytecode), "cb7ccb86fdcbfedeedb0ed44ed56ed78d3fe");
}

#[test]
fn test_numeric_pattern_literals() {
    let bytecode = z80_asm!(["rst 38h", "rst 0", "im 2", "bit 0,a"]);
    assert_eq!(hex::encode(&bytecode), "ffc7ed5ecb47");
}

#[test]
fn test_mnemonics_ignore_case() {
    let upper = z80_asm!(["LD A,(IX+1)", "DJNZ $"]);
    let lower = z80_asm!(["ld a,(ix+1)", "djnz $"]);
    assert_eq!(upper, lower);
    assert_eq!(hex::encode(&upper), "dd7e0110fe");
}

#[test]
fn test_block_labels() {
    let bytecode = z80_asm!([
        "ld b,3",
        ["again", [
            "dec a",
            "djnz again"
        ]],
        "ret"
    ]);
    // again is at 2; djnz at 3 jumps back by 3 from its end (5).
    assert_eq!(hex::encode(&bytecode), "06033d10fdc9");
}

#[test]
fn test_resolved_instruction_metadata() {
    let assembly = Assembler::new().assemble_source("  jr nz,$\n  add a,b\n  ret");
    assert!(assembly.is_success());

    let jr = &assembly.instructions[0];
    assert_eq!(jr.address, 0);
    assert_eq!(jr.cycles(), CycleCounts { taken: 12, not_taken: 7 });
    assert_eq!(jr.values, vec![0]);

    let add = &assembly.instructions[1];
    assert_eq!(add.address, 2);
    assert_eq!(add.flags().to_string(), "+0V+++");
    assert_eq!(add.flags().get(Flag::Subtract), FlagEffect::Clear);
    assert_eq!(add.flags().get(Flag::ParityOverflow), FlagEffect::Overflow);
    assert_eq!(add.position, SourcePosition::new(2, 3));

    let ret = &assembly.instructions[2];
    assert_eq!(ret.variant.description, "Returns from a subroutine.");
}
