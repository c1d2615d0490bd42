//! Pipeline property tests: R0 invariance, operand bypass at distance 1 and 2,
//! load-use stalling, and branch delay slots.

use crate::common::{addiu, addu, beq, beql, lui, lw, nop, ori, TestContext};
use n64_core::common::PhysAddr;
use pretty_assertions::assert_eq;

#[test]
fn register_zero_is_never_written() {
    let mut ctx = TestContext::new();
    // ADDIU $0, $0, 5 attempts to write a nonzero value into $0.
    ctx.load_boot_program(&[addiu(0, 0, 5), nop(), nop(), nop(), nop()]);
    ctx.run(20);
    assert_eq!(ctx.cpu.regs[0], 0);
}

#[test]
fn one_ahead_producer_forwards_without_stalling_pipeline_fill() {
    let mut ctx = TestContext::new();
    // $1 = 5; $3 = $1 + $1, consuming $1 the very next instruction.
    ctx.load_boot_program(&[addiu(1, 0, 5), addu(3, 1, 1), nop(), nop(), nop(), nop()]);
    ctx.run(20);
    assert_eq!(ctx.cpu.regs[1], 5);
    assert_eq!(ctx.cpu.regs[3], 10);
}

#[test]
fn two_ahead_producer_forwards_through_an_intervening_instruction() {
    let mut ctx = TestContext::new();
    // $1 = 7; $4 = 1 (unrelated); $3 = $1 + $1. The producer of $1 retires via WB
    // in the very cycle $3's ADDU reaches EX, so EX must see the live register
    // file rather than a one-cycle-stale RF-time snapshot.
    ctx.load_boot_program(&[
        addiu(1, 0, 7),
        addiu(4, 0, 1),
        addu(3, 1, 1),
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.run(20);
    assert_eq!(ctx.cpu.regs[1], 7);
    assert_eq!(ctx.cpu.regs[4], 1);
    assert_eq!(ctx.cpu.regs[3], 14);
}

#[test]
fn load_use_hazard_stalls_one_cycle_and_still_forwards_correctly() {
    let mut ctx = TestContext::new();
    ctx.bus.write_u32(PhysAddr::new(0), 0x2A);

    // $2 = 0x8000_0000 (KSEG0, maps straight to physical 0); $1 = mem[$2];
    // $3 = $1 + $1, immediately dependent on the load.
    ctx.load_boot_program(&[
        lui(2, 0x8000),
        lw(1, 2, 0),
        addu(3, 1, 1),
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.run(30);

    assert_eq!(ctx.cpu.regs[1], 0x2A);
    assert_eq!(ctx.cpu.regs[3], 0x54);
    assert_eq!(ctx.cpu.stats.stalls_load_use, 1);
}

#[test]
fn branch_delay_slot_always_executes() {
    let mut ctx = TestContext::new();
    // BEQ $0, $0, +3 (always taken) with ORI $5, $0, 1 in the delay slot: the
    // delay slot must still execute even though the branch is taken. Target is
    // (branch_pc + 4) + 3*4, landing on the fifth instruction.
    ctx.load_boot_program(&[
        beq(0, 0, 3),
        ori(5, 0, 1),
        ori(6, 0, 99), // skipped by the branch target
        ori(6, 0, 99),
        ori(7, 0, 2), // branch target
        nop(),
        nop(),
        nop(),
    ]);
    ctx.run(30);

    assert_eq!(ctx.cpu.regs[5], 1, "delay slot must execute");
    assert_eq!(ctx.cpu.regs[6], 0, "branch must skip the two slots after the delay slot");
    assert_eq!(ctx.cpu.regs[7], 2, "branch target must execute");
}

#[test]
fn branch_likely_not_taken_nullifies_its_delay_slot() {
    let mut ctx = TestContext::new();
    // BEQL $1, $0, +2 with $1 = 1: the condition is false, so the branch-likely is
    // not taken and its delay slot (ORI $5, $0, 1) must never commit its write.
    ctx.load_boot_program(&[
        addiu(1, 0, 1),
        beql(1, 0, 2),
        ori(5, 0, 1), // delay slot: must be nullified
        ori(6, 0, 2), // skipped, since the branch is not taken
        ori(7, 0, 3), // falls straight through to here
        nop(),
        nop(),
        nop(),
    ]);
    ctx.run(30);

    assert_eq!(ctx.cpu.regs[5], 0, "not-taken branch-likely must nullify its delay slot");
    assert_eq!(ctx.cpu.regs[6], 2, "fallthrough executes the instruction after the delay slot");
    assert_eq!(ctx.cpu.regs[7], 3);
}
