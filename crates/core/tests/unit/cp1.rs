//! CP1 (FPU) tests: CU1 gating, single-precision arithmetic, and the FCR31
//! control register.

use crate::common::{cfc1, ctc1, fpu_add_s, fpu_div_s, lui, mfc1, mtc0, mtc1, nop, ori, TestContext};
use n64_core::cp0::{cause_bits, status_bits};
use pretty_assertions::assert_eq;

/// `LUI $1, 0x2000` then `MTC0 $1, Status` sets `Status.CU1` (bit 29), enabling
/// CP1 instructions without disturbing the rest of the boot program's layout.
fn cu1_enable_prologue() -> Vec<u32> {
    vec![lui(1, 0x2000), mtc0(12, 1), nop(), nop(), nop(), nop()]
}

#[test]
fn fpu_instruction_traps_coprocessor_unusable_until_cu1_is_enabled() {
    let mut ctx = TestContext::new();
    ctx.load_boot_program(&[mtc1(0, 1), nop(), nop(), nop(), nop(), nop()]);
    ctx.run(20);

    assert!(ctx.cpu.cp0.status & status_bits::EXL != 0, "MTC1 with CU1 clear must trap");
    let exc_code = (ctx.cpu.cp0.cause & cause_bits::EXC_CODE_MASK) >> cause_bits::EXC_CODE_SHIFT;
    assert_eq!(exc_code, u64::from(n64_core::Trap::CoprocessorUnusable { unit: 1 }.exc_code()));
}

#[test]
fn fpu_add_computes_single_precision_result_once_cu1_is_enabled() {
    let mut ctx = TestContext::new();
    let mut program = cu1_enable_prologue();
    program.extend_from_slice(&[
        lui(2, 0x3FC0), // 1.5f32
        mtc1(2, 1),
        lui(3, 0x3F80), // 1.0f32
        mtc1(3, 2),
        nop(),
        nop(),
        fpu_add_s(3, 1, 2),
        nop(),
        nop(),
        nop(),
        nop(),
        mfc1(4, 3),
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.load_boot_program(&program);
    ctx.run(60);

    assert!(ctx.cpu.cp0.status & status_bits::EXL == 0, "a clean add must not trap");
    assert_eq!(ctx.cpu.regs[4] as u32, 2.5f32.to_bits());
}

#[test]
fn fpu_div_by_zero_posts_the_flag_but_does_not_trap_when_disabled() {
    let mut ctx = TestContext::new();
    let mut program = cu1_enable_prologue();
    program.extend_from_slice(&[
        lui(2, 0x3F80), // 1.0f32
        mtc1(2, 1),
        nop(),
        nop(),
        fpu_div_s(3, 1, 0), // $f0 is still 0.0: divide by zero
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.load_boot_program(&program);
    ctx.run(60);

    assert!(ctx.cpu.cp0.status & status_bits::EXL == 0, "a masked FP exception must not trap");
    // FCR31's flag field starts at bit 2; DIV_BY_ZERO is exc_bits bit 3.
    assert!(ctx.cpu.cp1.fcr31 & (n64_core::cp1::exc_bits::DIV_BY_ZERO << 2) != 0);
}

#[test]
fn fpu_div_by_zero_traps_with_floating_point_exception_when_enabled() {
    let mut ctx = TestContext::new();
    let mut program = cu1_enable_prologue();
    program.extend_from_slice(&[
        ori(5, 0, 0x400), // enable bit for DIV_BY_ZERO (ENABLE_SHIFT=7, bit 3)
        ctc1(5, 31),
        lui(2, 0x3F80), // 1.0f32
        mtc1(2, 1),
        nop(),
        nop(),
        fpu_div_s(3, 1, 0),
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.load_boot_program(&program);
    ctx.run(60);

    assert!(ctx.cpu.cp0.status & status_bits::EXL != 0, "an unmasked FP exception must trap");
    let exc_code = (ctx.cpu.cp0.cause & cause_bits::EXC_CODE_MASK) >> cause_bits::EXC_CODE_SHIFT;
    assert_eq!(exc_code, u64::from(n64_core::Trap::FloatingPoint.exc_code()));
}

#[test]
fn fcr31_round_trips_through_ctc1_and_cfc1() {
    let mut ctx = TestContext::new();
    let mut program = cu1_enable_prologue();
    program.extend_from_slice(&[
        ori(5, 0, 0b11), // rounding mode: toward negative infinity
        ctc1(5, 31),
        nop(),
        nop(),
        cfc1(6, 31),
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.load_boot_program(&program);
    ctx.run(40);

    assert_eq!(ctx.cpu.regs[6] as u32, 0b11);
    assert_eq!(ctx.cpu.cp1.rounding_mode(), n64_core::cp1::RoundingMode::TowardNegative);
}

#[test]
fn cfc1_reads_fcr0_implementation_revision_identifier() {
    let mut ctx = TestContext::new();
    let mut program = cu1_enable_prologue();
    program.extend_from_slice(&[cfc1(6, 0), nop(), nop(), nop(), nop()]);
    ctx.load_boot_program(&program);
    ctx.run(30);

    assert_eq!(ctx.cpu.regs[6] as u32, n64_core::cp1::FCR0_VALUE);
}
