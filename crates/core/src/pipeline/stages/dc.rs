//! DC: data memory access and CACHE instruction execution.

use crate::common::PhysAddr;
use crate::cpu::Cpu;
use crate::isa::{CacheOp, CacheTarget};
use crate::pipeline::latches::{DcWb, MemOp};
use crate::soc::Bus;

const UNCACHED_BIT: u64 = 1 << 32;

fn sign_extend(raw: u64, len: u8, signed: bool) -> u64 {
    if !signed || len == 8 {
        return raw;
    }
    let bits = len * 8;
    let shift = 64 - u32::from(bits);
    ((raw << shift) as i64 >> shift) as u64
}

fn read_bus(bus: &mut Bus, paddr: PhysAddr, len: u8) -> u64 {
    match len {
        1 => u64::from(bus.read_u8(paddr)),
        2 => u64::from(bus.read_u16(paddr)),
        4 => u64::from(bus.read_u32(paddr)),
        _ => bus.read_u64(paddr),
    }
}

fn write_bus(bus: &mut Bus, paddr: PhysAddr, len: u8, value: u64) {
    match len {
        1 => bus.write_u8(paddr, value as u8),
        2 => bus.write_u16(paddr, value as u16),
        4 => bus.write_u32(paddr, value as u32),
        _ => bus.write_u64(paddr, value),
    }
}

/// Runs the DC stage on `cpu.ex_dc`, writing `cpu.dc_wb`. Returns `Some(stall)` on a
/// cache-fill miss; the caller freezes the whole pipeline for that many cycles.
pub fn run(cpu: &mut Cpu, bus: &mut Bus) -> Option<u64> {
    if !cpu.ex_dc.valid {
        cpu.dc_wb = DcWb::default();
        return None;
    }
    if cpu.ex_dc.nullified {
        cpu.dc_wb = DcWb {
            valid: true,
            pc: cpu.ex_dc.pc,
            in_delay_slot: cpu.ex_dc.in_delay_slot,
            squashed: true,
            ..DcWb::default()
        };
        return None;
    }
    if let Some(trap) = cpu.ex_dc.trap {
        cpu.dc_wb = DcWb {
            valid: true,
            pc: cpu.ex_dc.pc,
            in_delay_slot: cpu.ex_dc.in_delay_slot,
            trap: Some(trap),
            ..DcWb::default()
        };
        return None;
    }

    let pc = cpu.ex_dc.pc;
    let in_delay_slot = cpu.ex_dc.in_delay_slot;
    let dest_reg = cpu.ex_dc.dest_reg;
    let mem_op = cpu.ex_dc.mem_op;

    let (result, stall) = match mem_op {
        MemOp::None => (cpu.ex_dc.alu_result, 0),
        MemOp::Load { len, signed } => {
            let paddr = PhysAddr::new(cpu.ex_dc.alu_result & 0xFFFF_FFFF);
            let uncached = cpu.ex_dc.alu_result & UNCACHED_BIT != 0;
            let (raw, stall) = if uncached {
                (read_bus(bus, paddr, len), 0)
            } else {
                cpu.dcache.read(paddr, len as usize, bus)
            };
            if stall > 0 {
                cpu.stats.dcache_misses += 1;
            } else if !uncached {
                cpu.stats.dcache_hits += 1;
            }
            (sign_extend(raw, len, signed), stall)
        }
        MemOp::Store { len } => {
            let paddr = PhysAddr::new(cpu.ex_dc.alu_result & 0xFFFF_FFFF);
            let uncached = cpu.ex_dc.alu_result & UNCACHED_BIT != 0;
            let stall = if uncached {
                write_bus(bus, paddr, len, cpu.ex_dc.store_value);
                0
            } else {
                let stall = cpu.dcache.write(paddr, len as usize, cpu.ex_dc.store_value, bus);
                if stall > 0 {
                    cpu.stats.dcache_misses += 1;
                } else {
                    cpu.stats.dcache_hits += 1;
                }
                stall
            };
            (0, stall)
        }
        MemOp::Cache { target, op } => {
            let paddr = PhysAddr::new(cpu.ex_dc.alu_result);
            run_cache_op(cpu, target, op, paddr, bus);
            (0, 0)
        }
    };

    cpu.dc_wb = DcWb { valid: true, pc, result, dest_reg, in_delay_slot, trap: None, squashed: false };

    if stall > 0 {
        Some(stall)
    } else {
        None
    }
}

fn run_cache_op(cpu: &mut Cpu, target: CacheTarget, op: CacheOp, paddr: PhysAddr, bus: &mut Bus) {
    match target {
        CacheTarget::Instruction => match op {
            CacheOp::IndexInvalidate | CacheOp::IndexWritebackInvalidate => {
                cpu.icache.index_invalidate(paddr);
            }
            CacheOp::HitInvalidate | CacheOp::HitWritebackInvalidate => {
                cpu.icache.hit_invalidate(paddr);
            }
            CacheOp::HitWriteback => {}
            CacheOp::IndexLoadTag => {
                let (tag, valid) = cpu.icache.load_tag(paddr);
                cpu.cp0.tag_lo = tag;
                cpu.cp0.tag_hi = u64::from(valid);
            }
            CacheOp::IndexStoreTag => {
                let valid = cpu.cp0.tag_hi & 1 != 0;
                cpu.icache.store_tag(paddr, cpu.cp0.tag_lo, valid);
            }
            CacheOp::Fill => cpu.icache.fill_allocate(paddr),
        },
        CacheTarget::Data => match op {
            CacheOp::IndexInvalidate => cpu.dcache.index_invalidate(paddr),
            CacheOp::IndexWritebackInvalidate => cpu.dcache.index_writeback_invalidate(paddr, bus),
            CacheOp::HitInvalidate => cpu.dcache.hit_invalidate(paddr),
            CacheOp::HitWritebackInvalidate => cpu.dcache.hit_writeback_invalidate(paddr, bus),
            CacheOp::HitWriteback => cpu.dcache.hit_writeback(paddr, bus),
            CacheOp::IndexLoadTag => {
                let (tag, valid, dirty) = cpu.dcache.load_tag(paddr);
                cpu.cp0.tag_lo = tag;
                cpu.cp0.tag_hi = u64::from(valid) | (u64::from(dirty) << 1);
            }
            CacheOp::IndexStoreTag => {
                let valid = cpu.cp0.tag_hi & 1 != 0;
                let dirty = cpu.cp0.tag_hi & 0b10 != 0;
                cpu.dcache.store_tag(paddr, cpu.cp0.tag_lo, valid, dirty);
            }
            CacheOp::Fill => cpu.dcache.fill_allocate(paddr, bus),
        },
    }
}
