//! EX: ALU, branch/jump resolution, CP0/CP1 dispatch, and effective-address
//! computation for loads, stores, and CACHE instructions.

use crate::common::{Trap, VirtAddr};
use crate::cp0::tlb::{TlbEntry, TlbHalf};
use crate::cpu::Cpu;
use crate::cp1::exc_bits;
use crate::isa::{FpuArithOp, FpuFormat, Instruction};
use crate::pipeline::hazards::bypass;
use crate::pipeline::latches::{ExDc, MemOp};

/// Resolves register `reg`'s EX-time value: bypassed from the DC- or EX-stage latch
/// if either is about to produce it, else a live register-file read.
///
/// A live read (not `rf_ex`'s RF-time snapshot) matters for a two-ahead producer: it
/// retires via `wb::run` earlier in this same `cycle()` call, before this stage runs,
/// so by now `cpu.regs` already reflects it even though `rf_ex.rs_val`/`rt_val` were
/// captured a cycle too early to see it.
fn read_operand(cpu: &Cpu, reg: u8) -> u64 {
    bypass(reg, cpu.regs[reg as usize], &cpu.ex_dc, &cpu.dc_wb)
}

fn sign_extend16(imm: i16) -> u64 {
    imm as i64 as u64
}

/// Advances EX using `cpu.rf_ex`, writing `cpu.ex_dc`. Also resolves branches and
/// jumps, overriding `cpu.pc` and arming the next fetch's delay-slot/nullify flags.
pub fn run(cpu: &mut Cpu) {
    if !cpu.rf_ex.valid {
        cpu.ex_dc = ExDc::default();
        return;
    }
    if cpu.rf_ex.nullified {
        cpu.ex_dc = ExDc {
            valid: true,
            pc: cpu.rf_ex.pc,
            inst: cpu.rf_ex.inst,
            in_delay_slot: cpu.rf_ex.in_delay_slot,
            nullified: true,
            ..ExDc::default()
        };
        return;
    }
    if let Some(trap) = cpu.rf_ex.trap {
        cpu.ex_dc = ExDc {
            valid: true,
            pc: cpu.rf_ex.pc,
            inst: cpu.rf_ex.inst,
            in_delay_slot: cpu.rf_ex.in_delay_slot,
            trap: Some(trap),
            ..ExDc::default()
        };
        return;
    }

    let pc = cpu.rf_ex.pc;
    let rs_val = read_operand(cpu, cpu.rf_ex.rs);
    let rt_val = read_operand(cpu, cpu.rf_ex.rt);
    let inst = cpu.rf_ex.inst;

    let mut out = ExDc {
        valid: true,
        pc,
        inst,
        in_delay_slot: cpu.rf_ex.in_delay_slot,
        ..ExDc::default()
    };

    match inst {
        Instruction::Add { rd, .. } | Instruction::Addi { rt: rd, .. } => {
            let imm = if let Instruction::Addi { imm, .. } = inst { sign_extend16(imm) } else { rt_val };
            match (rs_val as i64).checked_add(imm as i64) {
                Some(sum) => {
                    out.alu_result = sum as u64;
                    out.dest_reg = Some(rd);
                }
                None => out.trap = Some(Trap::Overflow),
            }
        }
        Instruction::Addu { rd, .. } => {
            out.alu_result = rs_val.wrapping_add(rt_val);
            out.dest_reg = Some(rd);
        }
        Instruction::Addiu { rt, imm, .. } => {
            out.alu_result = rs_val.wrapping_add(sign_extend16(imm));
            out.dest_reg = Some(rt);
        }
        Instruction::Sub { rd, .. } => match (rs_val as i64).checked_sub(rt_val as i64) {
            Some(diff) => {
                out.alu_result = diff as u64;
                out.dest_reg = Some(rd);
            }
            None => out.trap = Some(Trap::Overflow),
        },
        Instruction::Subu { rd, .. } => {
            out.alu_result = rs_val.wrapping_sub(rt_val);
            out.dest_reg = Some(rd);
        }
        Instruction::And { rd, .. } => {
            out.alu_result = rs_val & rt_val;
            out.dest_reg = Some(rd);
        }
        Instruction::Andi { rt, imm, .. } => {
            out.alu_result = rs_val & u64::from(imm);
            out.dest_reg = Some(rt);
        }
        Instruction::Or { rd, .. } => {
            out.alu_result = rs_val | rt_val;
            out.dest_reg = Some(rd);
        }
        Instruction::Ori { rt, imm, .. } => {
            out.alu_result = rs_val | u64::from(imm);
            out.dest_reg = Some(rt);
        }
        Instruction::Xor { rd, .. } => {
            out.alu_result = rs_val ^ rt_val;
            out.dest_reg = Some(rd);
        }
        Instruction::Xori { rt, imm, .. } => {
            out.alu_result = rs_val ^ u64::from(imm);
            out.dest_reg = Some(rt);
        }
        Instruction::Nor { rd, .. } => {
            out.alu_result = !(rs_val | rt_val);
            out.dest_reg = Some(rd);
        }
        Instruction::Slt { rd, .. } => {
            out.alu_result = u64::from((rs_val as i64) < (rt_val as i64));
            out.dest_reg = Some(rd);
        }
        Instruction::Sltu { rd, .. } => {
            out.alu_result = u64::from(rs_val < rt_val);
            out.dest_reg = Some(rd);
        }
        Instruction::Slti { rt, imm, .. } => {
            out.alu_result = u64::from((rs_val as i64) < (imm as i64));
            out.dest_reg = Some(rt);
        }
        Instruction::Sltiu { rt, imm, .. } => {
            out.alu_result = u64::from(rs_val < sign_extend16(imm));
            out.dest_reg = Some(rt);
        }
        Instruction::Sll { rd, sa, .. } => {
            out.alu_result = (((rt_val as u32) << sa) as i32) as i64 as u64;
            out.dest_reg = Some(rd);
        }
        Instruction::Srl { rd, sa, .. } => {
            out.alu_result = (((rt_val as u32) >> sa) as i32) as i64 as u64;
            out.dest_reg = Some(rd);
        }
        Instruction::Sra { rd, sa, .. } => {
            out.alu_result = ((rt_val as i32) >> sa) as i64 as u64;
            out.dest_reg = Some(rd);
        }
        Instruction::Sllv { rd, .. } => {
            let sa = (rs_val & 0x1F) as u32;
            out.alu_result = (((rt_val as u32) << sa) as i32) as i64 as u64;
            out.dest_reg = Some(rd);
        }
        Instruction::Srlv { rd, .. } => {
            let sa = (rs_val & 0x1F) as u32;
            out.alu_result = (((rt_val as u32) >> sa) as i32) as i64 as u64;
            out.dest_reg = Some(rd);
        }
        Instruction::Srav { rd, .. } => {
            let sa = (rs_val & 0x1F) as u32;
            out.alu_result = ((rt_val as i32) >> sa) as i64 as u64;
            out.dest_reg = Some(rd);
        }
        Instruction::Lui { rt, imm } => {
            out.alu_result = (u64::from(imm)) << 16;
            out.dest_reg = Some(rt);
        }

        Instruction::Mult { .. } | Instruction::Multu { .. } => {
            let (hi, lo) = if matches!(inst, Instruction::Mult { .. }) {
                let prod = (rs_val as i64 as i128) * (rt_val as i64 as i128);
                ((prod >> 64) as u64, prod as u64)
            } else {
                let prod = u128::from(rs_val) * u128::from(rt_val);
                ((prod >> 64) as u64, prod as u64)
            };
            cpu.hi = hi;
            cpu.lo = lo;
            cpu.stall_cycles = cpu.stall_cycles.max(4);
        }
        Instruction::Div { .. } | Instruction::Divu { .. } => {
            if matches!(inst, Instruction::Div { .. }) {
                let (n, d) = (rs_val as i64, rt_val as i64);
                if d == 0 {
                    cpu.lo = if n >= 0 { u64::MAX } else { 1 };
                    cpu.hi = n as u64;
                } else {
                    cpu.lo = n.wrapping_div(d) as u64;
                    cpu.hi = n.wrapping_rem(d) as u64;
                }
            } else {
                let (n, d) = (rs_val, rt_val);
                if d == 0 {
                    cpu.lo = u64::MAX;
                    cpu.hi = n;
                } else {
                    cpu.lo = n / d;
                    cpu.hi = n % d;
                }
            }
            cpu.stall_cycles = cpu.stall_cycles.max(35);
        }
        Instruction::Mfhi { rd } => {
            out.alu_result = cpu.hi;
            out.dest_reg = Some(rd);
        }
        Instruction::Mflo { rd } => {
            out.alu_result = cpu.lo;
            out.dest_reg = Some(rd);
        }
        Instruction::Mthi { .. } => cpu.hi = rs_val,
        Instruction::Mtlo { .. } => cpu.lo = rs_val,

        Instruction::Lb { rt, base, offset }
        | Instruction::Lbu { rt, base, offset }
        | Instruction::Lh { rt, base, offset }
        | Instruction::Lhu { rt, base, offset }
        | Instruction::Lw { rt, base, offset }
        | Instruction::Lwu { rt, base, offset }
        | Instruction::Ld { rt, base, offset } => {
            let _ = base;
            let base_val = rs_val;
            let vaddr = VirtAddr::new(base_val.wrapping_add(sign_extend16(offset)));
            let (len, signed) = match inst {
                Instruction::Lb { .. } => (1, true),
                Instruction::Lbu { .. } => (1, false),
                Instruction::Lh { .. } => (2, true),
                Instruction::Lhu { .. } => (2, false),
                Instruction::Lw { .. } => (4, true),
                Instruction::Lwu { .. } => (4, false),
                _ => (8, false),
            };
            if vaddr.val() % (len as u64) != 0 {
                out.trap = Some(Trap::AddressError { vaddr, is_store: false });
            } else {
                match cpu.translate(vaddr, false) {
                    Ok(t) => {
                        out.alu_result = t.paddr.val() | u64::from(t.uncached) << 32;
                        out.dest_reg = Some(rt);
                        out.mem_op = MemOp::Load { len, signed };
                    }
                    Err(trap) => out.trap = Some(trap),
                }
            }
        }
        Instruction::Sb { rt, base, offset }
        | Instruction::Sh { rt, base, offset }
        | Instruction::Sw { rt, base, offset }
        | Instruction::Sd { rt, base, offset } => {
            let _ = base;
            let base_val = rs_val;
            let vaddr = VirtAddr::new(base_val.wrapping_add(sign_extend16(offset)));
            let len = match inst {
                Instruction::Sb { .. } => 1,
                Instruction::Sh { .. } => 2,
                Instruction::Sw { .. } => 4,
                _ => 8,
            };
            if vaddr.val() % (len as u64) != 0 {
                out.trap = Some(Trap::AddressError { vaddr, is_store: true });
            } else {
                match cpu.translate(vaddr, true) {
                    Ok(t) => {
                        out.alu_result = t.paddr.val() | u64::from(t.uncached) << 32;
                        out.store_value = rt_val;
                        out.mem_op = MemOp::Store { len };
                    }
                    Err(trap) => out.trap = Some(trap),
                }
            }
        }
        Instruction::Cache { target, op, base, offset } => {
            let _ = base;
            let vaddr = VirtAddr::new(rs_val.wrapping_add(sign_extend16(offset)));
            match cpu.translate(vaddr, false) {
                Ok(t) => {
                    out.alu_result = t.paddr.val();
                    out.mem_op = MemOp::Cache { target, op };
                }
                Err(trap) => out.trap = Some(trap),
            }
        }

        Instruction::Beq { offset, .. } => branch(cpu, pc, offset, rs_val == rt_val, false),
        Instruction::Bne { offset, .. } => branch(cpu, pc, offset, rs_val != rt_val, false),
        Instruction::Blez { offset, .. } => branch(cpu, pc, offset, (rs_val as i64) <= 0, false),
        Instruction::Bgtz { offset, .. } => branch(cpu, pc, offset, (rs_val as i64) > 0, false),
        Instruction::Beql { offset, .. } => branch(cpu, pc, offset, rs_val == rt_val, true),
        Instruction::Bnel { offset, .. } => branch(cpu, pc, offset, rs_val != rt_val, true),
        Instruction::Blezl { offset, .. } => branch(cpu, pc, offset, (rs_val as i64) <= 0, true),
        Instruction::Bgtzl { offset, .. } => branch(cpu, pc, offset, (rs_val as i64) > 0, true),
        Instruction::J { target } | Instruction::Jal { target } => {
            let dest = (pc & 0xFFFF_FFFF_F000_0000) | (u64::from(target) << 2);
            jump(cpu, dest);
            if let Instruction::Jal { .. } = inst {
                out.alu_result = pc.wrapping_add(8);
                out.dest_reg = Some(31);
            }
        }
        Instruction::Jr { .. } => jump(cpu, rs_val),
        Instruction::Jalr { rd, .. } => {
            jump(cpu, rs_val);
            out.alu_result = pc.wrapping_add(8);
            out.dest_reg = Some(rd);
        }

        Instruction::Mfc0 { rt, rd } => {
            out.alu_result = cpu.cp0.read(rd as usize);
            out.dest_reg = Some(rt);
        }
        Instruction::Mtc0 { rd, .. } => cpu.cp0.write(rd as usize, rs_val),
        Instruction::Tlbr => {
            let idx = (cpu.cp0.index & 0x3F) as usize;
            let e = cpu.cp0.tlb.read_index(idx);
            cpu.cp0.page_mask = e.page_mask;
            cpu.cp0.entry_hi = (e.vpn2 << 13) | u64::from(e.asid);
            cpu.cp0.entry_lo0 = encode_lo(e.lo0, e.global);
            cpu.cp0.entry_lo1 = encode_lo(e.lo1, e.global);
        }
        Instruction::Tlbwi | Instruction::Tlbwr => {
            let idx = if matches!(inst, Instruction::Tlbwi) {
                (cpu.cp0.index & 0x3F) as usize
            } else {
                (cpu.cp0.random as usize) % cpu.cp0.tlb.len().max(1)
            };
            let entry = decode_tlb_entry(cpu);
            cpu.cp0.tlb.write_index(idx, entry);
            cpu.stats.tlb_refills += 1;
        }
        Instruction::Tlbp => {
            let vpn2 = cpu.cp0.entry_hi >> 13;
            match cpu.cp0.tlb.probe(vpn2, cpu.asid()) {
                Some(idx) => cpu.cp0.index = idx as u64,
                None => cpu.cp0.index = 1 << 31,
            }
        }
        Instruction::Eret => {
            // ERET has no delay slot: discard whatever IC already fetched off the old PC.
            let target = cpu.cp0.exception_return();
            cpu.pc = target;
            cpu.nullify_next_rf = false;
            cpu.next_in_delay_slot = false;
            cpu.ic_rf = crate::pipeline::latches::IcRf::default();
        }

        Instruction::Syscall => out.trap = Some(Trap::Syscall),
        Instruction::Break => out.trap = Some(Trap::Breakpoint),

        Instruction::Mfc1 { rt, fs } => {
            if !cu1_enabled(cpu) {
                out.trap = Some(Trap::CoprocessorUnusable { unit: 1 });
            } else {
                out.alu_result = (cpu.cp1.regs[fs as usize] as u32) as i32 as i64 as u64;
                out.dest_reg = Some(rt);
            }
        }
        Instruction::Mtc1 { rt, fs } => {
            if !cu1_enabled(cpu) {
                out.trap = Some(Trap::CoprocessorUnusable { unit: 1 });
            } else {
                let _ = rt;
                let val = rs_val as u32;
                cpu.cp1.regs[fs as usize] =
                    (cpu.cp1.regs[fs as usize] & 0xFFFF_FFFF_0000_0000) | u64::from(val);
            }
        }
        Instruction::Cfc1 { rt, fs } => {
            if !cu1_enabled(cpu) {
                out.trap = Some(Trap::CoprocessorUnusable { unit: 1 });
            } else {
                out.alu_result = u64::from(cpu.cp1.read_control(fs as usize));
                out.dest_reg = Some(rt);
            }
        }
        Instruction::Ctc1 { rt, fs } => {
            if !cu1_enabled(cpu) {
                out.trap = Some(Trap::CoprocessorUnusable { unit: 1 });
            } else {
                let _ = rt;
                cpu.cp1.write_control(fs as usize, rs_val as u32);
            }
        }
        Instruction::Bc1t { offset } => {
            let cond = cpu.cp1.fcr31 & (1 << 23) != 0;
            branch(cpu, pc, offset, cond, false);
        }
        Instruction::Bc1f { offset } => {
            let cond = cpu.cp1.fcr31 & (1 << 23) == 0;
            branch(cpu, pc, offset, cond, false);
        }
        Instruction::FpuArith { op, fmt, fd, fs, ft } => {
            if !cu1_enabled(cpu) {
                out.trap = Some(Trap::CoprocessorUnusable { unit: 1 });
            } else {
                if fpu_arith(cpu, op, fmt, fd, fs, ft) {
                    out.trap = Some(Trap::FloatingPoint);
                }
                cpu.stall_cycles = cpu.stall_cycles.max(if matches!(op, FpuArithOp::Div) { 28 } else { 3 });
            }
        }

        Instruction::Reserved => out.trap = Some(Trap::ReservedInstruction),
    }

    cpu.ex_dc = out;
}

fn cu1_enabled(cpu: &Cpu) -> bool {
    cpu.cp0.status & (1 << (crate::cp0::status_bits::CU_SHIFT + 1)) != 0
}

fn encode_lo(half: TlbHalf, global: bool) -> u64 {
    (half.pfn << 6) | (u64::from(half.c) << 3) | (u64::from(half.d) << 2) | (u64::from(half.v) << 1)
        | u64::from(global)
}

fn decode_lo(raw: u64) -> TlbHalf {
    TlbHalf {
        pfn: raw >> 6,
        c: ((raw >> 3) & 0b111) as u8,
        d: raw & 0b100 != 0,
        v: raw & 0b10 != 0,
    }
}

fn decode_tlb_entry(cpu: &Cpu) -> TlbEntry {
    TlbEntry {
        vpn2: cpu.cp0.entry_hi >> 13,
        page_mask: cpu.cp0.page_mask,
        asid: (cpu.cp0.entry_hi & 0xFF) as u8,
        global: cpu.cp0.entry_lo0 & 1 != 0 && cpu.cp0.entry_lo1 & 1 != 0,
        lo0: decode_lo(cpu.cp0.entry_lo0),
        lo1: decode_lo(cpu.cp0.entry_lo1),
    }
}

/// Resolves a conditional branch: sets up the delay slot flag for the next fetch, and
/// for a branch-likely not-taken arms nullification of that delay slot.
fn branch(cpu: &mut Cpu, pc: u64, offset: i16, taken: bool, likely: bool) {
    cpu.next_in_delay_slot = true;
    if taken {
        cpu.pc = pc.wrapping_add(4).wrapping_add((i64::from(offset) << 2) as u64);
    } else if likely {
        cpu.nullify_next_rf = true;
    }
}

fn jump(cpu: &mut Cpu, target: u64) {
    cpu.next_in_delay_slot = true;
    cpu.pc = target;
}

#[allow(clippy::cast_possible_truncation)]
fn fpu_arith(cpu: &mut Cpu, op: FpuArithOp, fmt: FpuFormat, fd: u8, fs: u8, ft: u8) -> bool {
    let mut flags = 0u32;
    match fmt {
        FpuFormat::Single => {
            let a = f32::from_bits(cpu.cp1.regs[fs as usize] as u32);
            let b = f32::from_bits(cpu.cp1.regs[ft as usize] as u32);
            if matches!(op, FpuArithOp::Div) && b == 0.0 {
                flags |= exc_bits::DIV_BY_ZERO;
            }
            let r = match op {
                FpuArithOp::Add => a + b,
                FpuArithOp::Sub => a - b,
                FpuArithOp::Mul => a * b,
                FpuArithOp::Div => a / b,
            };
            if r.is_nan() {
                flags |= exc_bits::INVALID;
            }
            cpu.cp1.regs[fd as usize] = u64::from(r.to_bits());
        }
        FpuFormat::Double => {
            let a = f64::from_bits(cpu.cp1.regs[fs as usize]);
            let b = f64::from_bits(cpu.cp1.regs[ft as usize]);
            if matches!(op, FpuArithOp::Div) && b == 0.0 {
                flags |= exc_bits::DIV_BY_ZERO;
            }
            let r = match op {
                FpuArithOp::Add => a + b,
                FpuArithOp::Sub => a - b,
                FpuArithOp::Mul => a * b,
                FpuArithOp::Div => a / b,
            };
            if r.is_nan() {
                flags |= exc_bits::INVALID;
            }
            cpu.cp1.regs[fd as usize] = r.to_bits();
        }
    }
    cpu.cp1.post_exceptions(flags)
}
