//! Load-use stall detection and operand bypassing.
//!
//! EX reads an operand as: the value DC is about to produce this cycle, else the
//! value EX itself is about to pass to DC this cycle, else a live register-file read
//! (which, since WB commits earlier in the same `cycle()` call, already reflects
//! anything retiring this cycle). A load's value is only available at the end of DC,
//! so an EX that needs the immediately preceding load's result stalls one cycle
//! instead of reading a stale bypass.

use crate::isa::Instruction;
use crate::pipeline::latches::{DcWb, ExDc, RfEx};

/// `true` if the instruction about to enter EX (`incoming`) needs a register that the
/// instruction currently in EX (`in_ex`) will not produce until the end of DC (i.e.
/// `in_ex` is a load writing a register `incoming` reads).
#[must_use]
pub fn need_load_use_stall(in_ex: &RfEx, incoming: &Instruction) -> bool {
    if !in_ex.valid || !in_ex.inst.is_load() {
        return false;
    }
    let Some(dest) = in_ex.inst.dest_reg() else { return false };
    if dest == 0 {
        return false;
    }
    let (src_rs, src_rt) = incoming.source_regs();
    src_rs == Some(dest) || src_rt == Some(dest)
}

/// Resolves the value of register `reg` as EX should see it this cycle: bypassed from
/// WB or DC if either is about to commit a fresher value, else the register-file value
/// already latched in `RfEx`.
#[must_use]
pub fn bypass(reg: u8, rf_val: u64, ex_dc: &ExDc, dc_wb: &DcWb) -> u64 {
    if reg == 0 {
        return 0;
    }
    if dc_wb.valid && !dc_wb.squashed && dc_wb.dest_reg == Some(reg) {
        return dc_wb.result;
    }
    if ex_dc.valid
        && ex_dc.dest_reg == Some(reg)
        && ex_dc.mem_op == crate::pipeline::latches::MemOp::None
    {
        return ex_dc.alu_result;
    }
    rf_val
}
