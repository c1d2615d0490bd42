//! The four inter-stage latches: IC→RF, RF→EX, EX→DC, DC→WB.
//!
//! Each latch carries `valid`, so pipeline fill (at reset) and squashes (branch
//! misprediction is impossible here since there is no prediction, but exceptions and
//! branch-likely squash the delay slot) are expressed as plain field writes rather than
//! `Option` threading through every stage function.

use crate::common::Trap;
use crate::isa::Instruction;

/// Output of the IC stage, input to RF.
#[derive(Debug, Clone, Copy)]
pub struct IcRf {
    /// `false` only immediately after reset/flush, before the first fetch lands.
    pub valid: bool,
    /// PC of the fetched instruction.
    pub pc: u64,
    /// Raw fetched word (0 decodes as `SLL $zero, $zero, 0`, the canonical MIPS NOP).
    pub word: u32,
    /// `true` if this instruction occupies a branch delay slot.
    pub in_delay_slot: bool,
    /// Carried forward from IC: an instruction bus error, if the fetch faulted.
    pub trap: Option<Trap>,
}

impl Default for IcRf {
    fn default() -> Self {
        Self { valid: false, pc: 0, word: 0, in_delay_slot: false, trap: None }
    }
}

/// Output of the RF stage, input to EX.
#[derive(Debug, Clone, Copy)]
pub struct RfEx {
    /// See [`IcRf::valid`].
    pub valid: bool,
    /// PC of this instruction.
    pub pc: u64,
    /// The decoded instruction.
    pub inst: Instruction,
    /// `rs` source register number; EX reads its value live (through bypass) rather
    /// than carrying a decode-time snapshot here.
    pub rs: u8,
    /// `rt` source register number; see [`Self::rs`].
    pub rt: u8,
    /// `true` if this instruction occupies a branch delay slot.
    pub in_delay_slot: bool,
    /// `true` if a preceding branch-likely resolved not-taken and this (its delay
    /// slot) must execute zero times: no side effects, no trap delivery, no writeback.
    pub nullified: bool,
    /// A trap detected no later than decode (carried from IC, or Reserved Instruction).
    pub trap: Option<Trap>,
}

impl Default for RfEx {
    fn default() -> Self {
        Self {
            valid: false,
            pc: 0,
            inst: Instruction::Reserved,
            rs: 0,
            rt: 0,
            in_delay_slot: false,
            nullified: false,
            trap: None,
        }
    }
}

/// What the DC stage should do with an EX result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    /// No memory access.
    None,
    /// A load of `len` bytes, `signed` selecting sign- vs zero-extension.
    Load { len: u8, signed: bool },
    /// A store of `len` bytes.
    Store { len: u8 },
    /// A CACHE instruction's operation, already resolved to a concrete op at EX.
    Cache { target: crate::isa::CacheTarget, op: crate::isa::CacheOp },
}

/// Output of the EX stage, input to DC.
#[derive(Debug, Clone, Copy)]
pub struct ExDc {
    /// See [`IcRf::valid`].
    pub valid: bool,
    /// PC of this instruction.
    pub pc: u64,
    /// The instruction (needed by WB for stats/retirement bookkeeping).
    pub inst: Instruction,
    /// ALU result, or the computed effective address for a memory op.
    pub alu_result: u64,
    /// Value to store, for a `Store` memory op.
    pub store_value: u64,
    /// What DC should do with `alu_result`/`store_value`.
    pub mem_op: MemOp,
    /// Destination register, if this instruction writes one (GPR write-back path).
    pub dest_reg: Option<u8>,
    /// `true` if this instruction occupies a branch delay slot.
    pub in_delay_slot: bool,
    /// See [`RfEx::nullified`].
    pub nullified: bool,
    /// A trap detected no later than EX (TLB/address errors surface here too, since
    /// they need the computed effective address).
    pub trap: Option<Trap>,
}

impl Default for ExDc {
    fn default() -> Self {
        Self {
            valid: false,
            pc: 0,
            inst: Instruction::Reserved,
            alu_result: 0,
            store_value: 0,
            mem_op: MemOp::None,
            dest_reg: None,
            in_delay_slot: false,
            nullified: false,
            trap: None,
        }
    }
}

/// Output of the DC stage, input to WB.
#[derive(Debug, Clone, Copy)]
pub struct DcWb {
    /// See [`IcRf::valid`].
    pub valid: bool,
    /// PC of this instruction.
    pub pc: u64,
    /// Final value to commit to `dest_reg`.
    pub result: u64,
    /// Destination register, if any.
    pub dest_reg: Option<u8>,
    /// `true` if this instruction occupies a branch delay slot.
    pub in_delay_slot: bool,
    /// A trap carried from any earlier stage, committed (or not) at WB.
    pub trap: Option<Trap>,
    /// `true` if this slot is a branch-likely delay slot whose branch was not taken;
    /// WB discards it without writing back or retiring it as an instruction.
    pub squashed: bool,
}

impl Default for DcWb {
    fn default() -> Self {
        Self {
            valid: false,
            pc: 0,
            result: 0,
            dest_reg: None,
            in_delay_slot: false,
            trap: None,
            squashed: false,
        }
    }
}
