//! Coprocessor 0: system control — Count/Compare timer, Status/Cause, exception
//! vectors, and the TLB.

pub mod tlb;

pub use tlb::{Tlb, TlbEntry};

use crate::common::Trap;

/// Register numbers for CP0, in the order the architecture manual assigns them.
pub mod reg {
    /// TLB index for TLBR/TLBWI.
    pub const INDEX: usize = 0;
    /// Pseudo-random TLB index for TLBWR.
    pub const RANDOM: usize = 1;
    /// Low half of a TLB entry, even page.
    pub const ENTRY_LO0: usize = 2;
    /// Low half of a TLB entry, odd page.
    pub const ENTRY_LO1: usize = 3;
    /// Pointer into the page table for a TLB miss handler.
    pub const CONTEXT: usize = 4;
    /// Page size mask of a TLB entry.
    pub const PAGE_MASK: usize = 5;
    /// Number of TLB entries exempt from random replacement.
    pub const WIRED: usize = 6;
    /// Virtual address that caused the last address error.
    pub const BAD_V_ADDR: usize = 8;
    /// Incrementing cycle counter.
    pub const COUNT: usize = 9;
    /// High half of a TLB entry (VPN2 + ASID).
    pub const ENTRY_HI: usize = 10;
    /// Timer compare value.
    pub const COMPARE: usize = 11;
    /// Operating mode, interrupt mask, and exception level flags.
    pub const STATUS: usize = 12;
    /// Exception cause code and pending interrupt bits.
    pub const CAUSE: usize = 13;
    /// Exception program counter.
    pub const EPC: usize = 14;
    /// Processor revision identifier (read-only).
    pub const PR_ID: usize = 15;
    /// Configuration register (cache mode, endianness).
    pub const CONFIG: usize = 16;
    /// Load-linked address, for LL/SC.
    pub const LL_ADDR: usize = 17;
    /// Watchpoint address/mask, low.
    pub const WATCH_LO: usize = 18;
    /// Watchpoint address/mask, high.
    pub const WATCH_HI: usize = 19;
    /// 64-bit addressing context register.
    pub const X_CONTEXT: usize = 20;
    /// Parity error register.
    pub const PARITY_ERROR: usize = 26;
    /// Cache error register.
    pub const CACHE_ERR: usize = 27;
    /// Cache tag, low.
    pub const TAG_LO: usize = 28;
    /// Cache tag, high.
    pub const TAG_HI: usize = 29;
    /// Exception PC saved on an error (double-fault-like) exception.
    pub const ERROR_EPC: usize = 30;
}

/// Bit layout of the `Status` register.
pub mod status_bits {
    /// Global interrupt enable.
    pub const IE: u64 = 1 << 0;
    /// Exception level: set on exception entry, blocks re-entrancy.
    pub const EXL: u64 = 1 << 1;
    /// Error level: set on a reset/NMI/cache error.
    pub const ERL: u64 = 1 << 2;
    /// Kernel/supervisor/user mode field, bits 3-4.
    pub const KSU_SHIFT: u32 = 3;
    /// Mask for the KSU field.
    pub const KSU_MASK: u64 = 0b11 << KSU_SHIFT;
    /// 8-bit interrupt mask field, bits 8-15 (software IP0/IP1 then hardware IP2-IP7).
    pub const IM_SHIFT: u32 = 8;
    /// Mask for the full interrupt-mask field.
    pub const IM_MASK: u64 = 0xFF << IM_SHIFT;
    /// 64-bit addressing enabled in user mode.
    pub const UX: u64 = 1 << 5;
    /// 64-bit addressing enabled in supervisor mode.
    pub const SX: u64 = 1 << 6;
    /// 64-bit addressing enabled in kernel mode.
    pub const KX: u64 = 1 << 7;
    /// Bootstrap exception vectors selected.
    pub const BEV: u64 = 1 << 22;
    /// Coprocessor usable bits, 0-3, bits 28-31.
    pub const CU_SHIFT: u32 = 28;
}

/// Bit layout of the `Cause` register.
pub mod cause_bits {
    /// Exception code field, bits 2-6.
    pub const EXC_CODE_SHIFT: u32 = 2;
    /// Mask for the exception code field.
    pub const EXC_CODE_MASK: u64 = 0b1_1111 << EXC_CODE_SHIFT;
    /// Pending interrupt bits, bits 8-15, OR'd with `Status.IM` to gate delivery.
    pub const IP_SHIFT: u32 = 8;
    /// Mask for the pending-interrupt field.
    pub const IP_MASK: u64 = 0xFF << IP_SHIFT;
    /// Branch-delay-slot flag: set when the excepting instruction sat in a delay slot.
    pub const BD: u64 = 1 << 31;
    /// Software-writable bit for IP2, the MI (external device) line.
    pub const IP2: u64 = 1 << (IP_SHIFT + 2);
    /// Bit for IP7, the Count/Compare timer line.
    pub const IP7: u64 = 1 << (IP_SHIFT + 7);
}

const NORMAL_VECTOR: u64 = 0x8000_0180;
const BOOTSTRAP_VECTOR: u64 = 0xBFC0_0380;
const NORMAL_REFILL_VECTOR: u64 = 0x8000_0000;
const BOOTSTRAP_REFILL_VECTOR: u64 = 0xBFC0_0200;

/// System control coprocessor state.
///
/// Registers are stored under their architectural names rather than in a flat array,
/// mirroring how a CSR file is commonly modeled when most accesses are by fixed name
/// (`Status`, `Cause`, `EPC`) and only `MTC0`/`MFC0` need numeric addressing.
#[derive(Debug, Clone)]
pub struct Cp0 {
    /// `Index`: selects a TLB entry for TLBR/TLBWI; bit 31 set by TLBP on a miss.
    pub index: u64,
    /// `Random`: decrementing pseudo-random TLB victim index for TLBWR.
    pub random: u64,
    /// `EntryLo0`/`EntryLo1`: staging registers for TLB writes/reads.
    pub entry_lo0: u64,
    /// See [`Self::entry_lo0`].
    pub entry_lo1: u64,
    /// `Context`: page-table-walker hint register, updated on TLB miss.
    pub context: u64,
    /// `PageMask`: staging register for a TLB entry's page size.
    pub page_mask: u64,
    /// `Wired`: entries below this index are exempt from TLBWR.
    pub wired: u64,
    /// `BadVAddr`: the virtual address of the last address/TLB exception.
    pub bad_vaddr: u64,
    /// `Count`: free-running cycle counter, incremented every [`defaults::COUNT_DIVIDER`]
    /// cycles.
    ///
    /// [`defaults::COUNT_DIVIDER`]: crate::config::defaults::COUNT_DIVIDER
    pub count: u64,
    /// `EntryHi`: staging register (VPN2 + ASID) for TLB writes/reads.
    pub entry_hi: u64,
    /// `Compare`: writing this register also clears the pending timer interrupt.
    pub compare: u64,
    /// `Status`: global mode and interrupt-mask register.
    pub status: u64,
    /// `Cause`: pending-interrupt and exception-cause register.
    pub cause: u64,
    /// `EPC`: return address for ERET.
    pub epc: u64,
    /// `PRId`: processor revision identifier, read-only.
    pub pr_id: u64,
    /// `Config`: cache mode and endianness configuration.
    pub config: u64,
    /// `LLAddr`: address of the last Load-Linked.
    pub ll_addr: u64,
    /// `WatchLo`/`WatchHi`: watchpoint trigger address and mask.
    pub watch_lo: u64,
    /// See [`Self::watch_lo`].
    pub watch_hi: u64,
    /// `XContext`: 64-bit addressing page-table-walker hint.
    pub x_context: u64,
    /// `ParityError`: diagnostic register, unused by this simulator's device model.
    pub parity_error: u64,
    /// `CacheErr`: diagnostic register for cache parity errors.
    pub cache_err: u64,
    /// `TagLo`/`TagHi`: staging registers for Index Load/Store Tag CACHE ops.
    pub tag_lo: u64,
    /// See [`Self::tag_lo`].
    pub tag_hi: u64,
    /// `ErrorEPC`: return address for a reset/NMI/cache-error exception.
    pub error_epc: u64,
    /// The 48-entry software-managed TLB.
    pub tlb: Tlb,
}

impl Cp0 {
    /// Builds CP0 state at cold reset: `Status.BEV=1`, `Status.ERL=1`, `Random` at its
    /// maximum index, and an empty TLB.
    #[must_use]
    pub fn reset(tlb_entries: usize) -> Self {
        Self {
            index: 0,
            random: (tlb_entries as u64).saturating_sub(1),
            entry_lo0: 0,
            entry_lo1: 0,
            context: 0,
            page_mask: 0,
            wired: 0,
            bad_vaddr: 0,
            count: 0,
            entry_hi: 0,
            compare: 0,
            status: status_bits::BEV | status_bits::ERL,
            cause: 0,
            epc: 0,
            pr_id: 0x0B00,
            config: 0,
            ll_addr: 0,
            watch_lo: 0,
            watch_hi: 0,
            x_context: 0,
            parity_error: 0,
            cache_err: 0,
            tag_lo: 0,
            tag_hi: 0,
            error_epc: 0,
            tlb: Tlb::new(tlb_entries),
        }
    }

    /// Reads a CP0 register by architectural number, for `MFC0`.
    #[must_use]
    pub fn read(&self, index: usize) -> u64 {
        match index {
            reg::INDEX => self.index,
            reg::RANDOM => self.random,
            reg::ENTRY_LO0 => self.entry_lo0,
            reg::ENTRY_LO1 => self.entry_lo1,
            reg::CONTEXT => self.context,
            reg::PAGE_MASK => self.page_mask,
            reg::WIRED => self.wired,
            reg::BAD_V_ADDR => self.bad_vaddr,
            reg::COUNT => self.count,
            reg::ENTRY_HI => self.entry_hi,
            reg::COMPARE => self.compare,
            reg::STATUS => self.status,
            reg::CAUSE => self.cause,
            reg::EPC => self.epc,
            reg::PR_ID => self.pr_id,
            reg::CONFIG => self.config,
            reg::LL_ADDR => self.ll_addr,
            reg::WATCH_LO => self.watch_lo,
            reg::WATCH_HI => self.watch_hi,
            reg::X_CONTEXT => self.x_context,
            reg::PARITY_ERROR => self.parity_error,
            reg::CACHE_ERR => self.cache_err,
            reg::TAG_LO => self.tag_lo,
            reg::TAG_HI => self.tag_hi,
            reg::ERROR_EPC => self.error_epc,
            _ => 0,
        }
    }

    /// Writes a CP0 register by architectural number, for `MTC0`.
    ///
    /// Writing `Compare` clears the pending timer interrupt (`Cause.IP7`), as required by
    /// the R4300 manual.
    pub fn write(&mut self, index: usize, value: u64) {
        match index {
            reg::INDEX => self.index = value,
            reg::RANDOM => {}
            reg::ENTRY_LO0 => self.entry_lo0 = value,
            reg::ENTRY_LO1 => self.entry_lo1 = value,
            reg::CONTEXT => self.context = value,
            reg::PAGE_MASK => self.page_mask = value,
            reg::WIRED => self.wired = value,
            reg::BAD_V_ADDR => self.bad_vaddr = value,
            reg::COUNT => self.count = value,
            reg::ENTRY_HI => self.entry_hi = value,
            reg::COMPARE => {
                self.compare = value;
                self.cause &= !cause_bits::IP7;
            }
            reg::STATUS => self.status = value,
            reg::CAUSE => {
                // Only the software interrupt bits (IP0/IP1) are writable.
                let writable = cause_bits::EXC_CODE_MASK | (0b11 << cause_bits::IP_SHIFT);
                self.cause = (self.cause & !writable) | (value & writable);
            }
            reg::EPC => self.epc = value,
            reg::PR_ID => {}
            reg::CONFIG => self.config = value,
            reg::LL_ADDR => self.ll_addr = value,
            reg::WATCH_LO => self.watch_lo = value,
            reg::WATCH_HI => self.watch_hi = value,
            reg::X_CONTEXT => self.x_context = value,
            reg::PARITY_ERROR => self.parity_error = value,
            reg::CACHE_ERR => self.cache_err = value,
            reg::TAG_LO => self.tag_lo = value,
            reg::TAG_HI => self.tag_hi = value,
            reg::ERROR_EPC => self.error_epc = value,
            _ => {}
        }
    }

    /// Advances `Count` by one tick of the divided clock, latching `Cause.IP7` when it
    /// reaches `Compare`.
    pub fn tick_count(&mut self, divider_counter: &mut u64, divider: u64) {
        *divider_counter += 1;
        if *divider_counter >= divider {
            *divider_counter = 0;
            self.count = self.count.wrapping_add(1) & 0xFFFF_FFFF;
            if self.count == self.compare {
                self.cause |= cause_bits::IP7;
            }
        }
    }

    /// `true` if an interrupt is currently deliverable:
    /// `IE && !EXL && !ERL && (Cause.IP & Status.IM) != 0`.
    #[must_use]
    pub fn interrupt_pending(&self) -> bool {
        let ie = self.status & status_bits::IE != 0;
        let exl = self.status & status_bits::EXL != 0;
        let erl = self.status & status_bits::ERL != 0;
        let ip = (self.cause & cause_bits::IP_MASK) >> cause_bits::IP_SHIFT;
        let im = (self.status & status_bits::IM_MASK) >> status_bits::IM_SHIFT;
        ie && !exl && !erl && (ip & im) != 0
    }

    /// Sets or clears the MI-aggregated external interrupt line (`Cause.IP2`).
    pub fn set_external_interrupt(&mut self, asserted: bool) {
        if asserted {
            self.cause |= cause_bits::IP2;
        } else {
            self.cause &= !cause_bits::IP2;
        }
    }

    /// Commits delivery of `trap` at the given faulting PC, returning the vector to jump
    /// to. `in_delay_slot` selects whether `EPC` is backed up one instruction and
    /// `Cause.BD` is set.
    pub fn enter_exception(&mut self, trap: Trap, pc: u64, in_delay_slot: bool) -> u64 {
        let was_exl = self.status & status_bits::EXL != 0;
        if !was_exl {
            self.epc = if in_delay_slot { pc.wrapping_sub(4) } else { pc };
            if in_delay_slot {
                self.cause |= cause_bits::BD;
            } else {
                self.cause &= !cause_bits::BD;
            }
        }
        self.cause = (self.cause & !cause_bits::EXC_CODE_MASK)
            | (u64::from(trap.exc_code()) << cause_bits::EXC_CODE_SHIFT);
        self.status |= status_bits::EXL;

        let bev = self.status & status_bits::BEV != 0;
        match (trap.uses_refill_vector() && !was_exl, bev) {
            (true, false) => NORMAL_REFILL_VECTOR,
            (true, true) => BOOTSTRAP_REFILL_VECTOR,
            (false, false) => NORMAL_VECTOR,
            (false, true) => BOOTSTRAP_VECTOR,
        }
    }

    /// Returns the PC to resume at for `ERET`, clearing `Status.EXL`.
    pub fn exception_return(&mut self) -> u64 {
        self.status &= !status_bits::EXL;
        self.epc
    }
}
