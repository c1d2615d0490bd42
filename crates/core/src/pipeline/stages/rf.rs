//! RF: register fetch and decode.

use crate::cpu::Cpu;
use crate::isa::{decode, Instruction};
use crate::pipeline::latches::RfEx;

/// Decodes `cpu.ic_rf` and resolves its source register numbers; EX reads the actual
/// values later (through bypass) rather than this stage snapshotting them.
///
/// Interrupts are checked here, against the instruction about to enter EX, so that an
/// interrupt taken mid-stream still carries a correct EPC/BD pair from the normal
/// exception-commit path at WB.
pub fn run(cpu: &mut Cpu) {
    if !cpu.ic_rf.valid {
        cpu.rf_ex = RfEx::default();
        return;
    }

    let inst = decode(cpu.ic_rf.word);
    let inst = if matches!(inst, Instruction::Reserved) { Instruction::Reserved } else { inst };
    let (src_rs, src_rt) = inst.source_regs();
    let rs = src_rs.unwrap_or(0);
    let rt = src_rt.unwrap_or(0);

    let mut trap = cpu.ic_rf.trap;
    if trap.is_none() && matches!(inst, Instruction::Reserved) {
        trap = Some(crate::common::Trap::ReservedInstruction);
    }
    if trap.is_none() && cpu.cp0.interrupt_pending() {
        trap = Some(crate::common::Trap::Interrupt);
    }

    cpu.rf_ex = RfEx {
        valid: true,
        pc: cpu.ic_rf.pc,
        inst,
        rs,
        rt,
        in_delay_slot: cpu.ic_rf.in_delay_slot,
        nullified: cpu.nullify_next_rf,
        trap,
    };
    cpu.nullify_next_rf = false;
}
