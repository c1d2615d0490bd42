//! IC: instruction cache fetch.

use crate::common::{Trap, VirtAddr};
use crate::cpu::Cpu;
use crate::pipeline::latches::IcRf;
use crate::soc::Bus;

/// Fetches the instruction at `cpu.pc`, advancing `pc` by 4 (branches/jumps override
/// `pc` from the EX stage before this runs, so a plain sequential advance here is
/// always correct — the architectural delay slot is what makes that true).
pub fn run(cpu: &mut Cpu, bus: &mut Bus) {
    let pc = cpu.pc;
    let vaddr = VirtAddr::new(pc);

    if pc % 4 != 0 {
        cpu.ic_rf = IcRf {
            valid: true,
            pc,
            word: 0,
            in_delay_slot: cpu.next_in_delay_slot,
            trap: Some(Trap::AddressError { vaddr, is_store: false }),
        };
        cpu.next_in_delay_slot = false;
        cpu.pc = pc.wrapping_add(4);
        return;
    }

    match cpu.translate(vaddr, false) {
        Ok(t) => {
            let (word, stall) = if t.uncached {
                (bus.read_u32(t.paddr), 0)
            } else {
                cpu.icache.fetch(pc, t.paddr, bus)
            };
            if stall > 0 {
                cpu.stall_cycles = stall;
                cpu.stats.icache_misses += 1;
            } else {
                cpu.stats.icache_hits += 1;
            }
            cpu.ic_rf = IcRf {
                valid: true,
                pc,
                word,
                in_delay_slot: cpu.next_in_delay_slot,
                trap: None,
            };
        }
        Err(trap) => {
            cpu.ic_rf = IcRf {
                valid: true,
                pc,
                word: 0,
                in_delay_slot: cpu.next_in_delay_slot,
                trap: Some(trap),
            };
        }
    }
    cpu.next_in_delay_slot = false;
    cpu.pc = pc.wrapping_add(4);
}
