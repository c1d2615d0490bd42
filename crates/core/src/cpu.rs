//! The CPU: register file, coprocessors, caches, and the pipeline that ties them
//! together one cycle at a time.

use crate::common::{PhysAddr, Trap, VirtAddr};
use crate::config::Config;
use crate::cp0::Cp0;
use crate::cp1::Cp1;
use crate::cache::{DCache, ICache};
use crate::pipeline::latches::{DcWb, ExDc, IcRf, RfEx};
use crate::pipeline::stages::{dc, ex, ic, rf, wb};
use crate::soc::Bus;
use crate::stats::Stats;

/// Outcome of translating a virtual address for a memory access.
pub struct Translated {
    /// The resulting physical address.
    pub paddr: PhysAddr,
    /// `true` if the access should bypass the cache (KSEG1, or a TLB entry marked
    /// uncached).
    pub uncached: bool,
}

/// Signals checked once per cycle at the top of the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    /// Set by the driver to make the next `cycle()` call a no-op and report back.
    pub force_exit: bool,
    /// Set by the driver to request a synchronous cold reset before the next cycle.
    pub cold_reset: bool,
}

/// The MIPS R4300 CPU core: register file, HI/LO, PC, CP0, CP1, caches, and the
/// in-flight pipeline latches.
pub struct Cpu {
    /// General-purpose registers; `regs[0]` is always forced to zero after every
    /// cycle.
    pub regs: [u64; 32],
    /// Multiply/divide high result register.
    pub hi: u64,
    /// Multiply/divide low result register.
    pub lo: u64,
    /// Program counter of the next instruction to fetch.
    pub pc: u64,

    /// System control coprocessor.
    pub cp0: Cp0,
    /// Floating-point coprocessor.
    pub cp1: Cp1,
    /// Instruction cache.
    pub icache: ICache,
    /// Data cache.
    pub dcache: DCache,

    pub(crate) ic_rf: IcRf,
    pub(crate) rf_ex: RfEx,
    pub(crate) ex_dc: ExDc,
    pub(crate) dc_wb: DcWb,

    /// Cycles remaining before the pipeline may advance again (cache fill or a
    /// multi-cycle functional unit).
    pub stall_cycles: u64,
    /// Internal divider counter feeding `Cp0::tick_count`.
    pub(crate) count_divider: u64,
    /// Set by the EX stage when a branch-likely resolves not-taken; consumed by the
    /// RF stage in the same cycle to nullify the delay slot it produces.
    pub(crate) nullify_next_rf: bool,
    /// `true` if the instruction currently entering RF sits in a branch delay slot.
    pub(crate) next_in_delay_slot: bool,

    /// Configuration (cache geometry, TLB size, timing) this CPU was built with.
    pub config: Config,
    /// Execution statistics.
    pub stats: Stats,
    /// Host-controlled signals checked once per cycle.
    pub signals: Signals,
}

impl Cpu {
    /// Builds a CPU at cold reset with the given configuration.
    #[must_use]
    pub fn reset(config: Config) -> Self {
        Self {
            regs: [0; 32],
            hi: 0,
            lo: 0,
            pc: crate::config::defaults::RESET_PC,
            cp0: Cp0::reset(config.tlb_entries),
            cp1: Cp1::reset(),
            icache: ICache::new(&config.icache),
            dcache: DCache::new(&config.dcache),
            ic_rf: IcRf::default(),
            rf_ex: RfEx::default(),
            ex_dc: ExDc::default(),
            dc_wb: DcWb::default(),
            stall_cycles: 0,
            count_divider: 0,
            nullify_next_rf: false,
            next_in_delay_slot: false,
            config,
            stats: Stats::default(),
            signals: Signals::default(),
        }
    }

    /// Current ASID, from `EntryHi`'s low 8 bits.
    #[must_use]
    pub fn asid(&self) -> u8 {
        (self.cp0.entry_hi & 0xFF) as u8
    }

    /// Translates `vaddr` for the given access kind, consulting the TLB only for
    /// mapped segments; KSEG0/KSEG1 translate straight to physical with fixed
    /// cacheability.
    ///
    /// # Errors
    ///
    /// Returns the appropriate [`Trap`] (`AddressError`, `TlbRefill`, `TlbInvalid`,
    /// `TlbModified`) on failure.
    pub fn translate(&mut self, vaddr: VirtAddr, is_store: bool) -> Result<Translated, Trap> {
        if vaddr.in_kseg0() {
            return Ok(Translated { paddr: PhysAddr::new(vaddr.val() - 0x8000_0000), uncached: false });
        }
        if vaddr.in_kseg1() {
            return Ok(Translated { paddr: PhysAddr::new(vaddr.val() - 0xA000_0000), uncached: true });
        }
        match self.cp0.tlb.translate(vaddr, self.asid(), is_store) {
            Ok(t) => Ok(Translated { paddr: t.paddr, uncached: !t.cacheable }),
            Err(crate::cp0::tlb::LookupError::Miss) => {
                self.cp0.bad_vaddr = vaddr.val();
                Err(Trap::TlbRefill { vaddr, is_store })
            }
            Err(crate::cp0::tlb::LookupError::Invalid) => {
                self.cp0.bad_vaddr = vaddr.val();
                Err(Trap::TlbInvalid { vaddr, is_store })
            }
            Err(crate::cp0::tlb::LookupError::Modified) => {
                self.cp0.bad_vaddr = vaddr.val();
                Err(Trap::TlbModified { vaddr })
            }
        }
    }

    /// Commits `trap`, flushing every pipeline latch and redirecting `pc` to the
    /// appropriate exception vector.
    pub(crate) fn take_exception(&mut self, trap: Trap, in_delay_slot: bool, faulting_pc: u64) {
        tracing::event!(tracing::Level::DEBUG, ?trap, pc = faulting_pc, "exception taken");
        let vector = self.cp0.enter_exception(trap, faulting_pc, in_delay_slot);
        self.pc = vector;
        self.ic_rf = IcRf::default();
        self.rf_ex = RfEx::default();
        self.ex_dc = ExDc::default();
        self.dc_wb = DcWb::default();
        self.nullify_next_rf = false;
        self.next_in_delay_slot = false;
        self.stats.exceptions_taken += 1;
    }

    /// Advances the CPU by exactly one clock cycle: Count/Compare, then the pipeline.
    ///
    /// `external_irq` is the OR-reduced, mask-gated MI signal the scheduler computed
    /// for this cycle; it is latched into `Cause.IP2` before interrupts are checked.
    pub fn cycle(&mut self, bus: &mut Bus, external_irq: bool) {
        if self.signals.cold_reset {
            *self = Self::reset(self.config.clone());
            return;
        }
        if self.signals.force_exit {
            return;
        }
        self.regs[0] = 0;

        self.cp0.tick_count(&mut self.count_divider, self.config.count_divider);
        self.cp0.set_external_interrupt(external_irq);
        self.stats.cycles += 1;

        if self.stall_cycles > 0 {
            self.stall_cycles -= 1;
            return;
        }

        if wb::run(self) {
            return;
        }

        if let Some(stall) = dc::run(self, bus) {
            self.stall_cycles = stall;
            return;
        }

        ex::run(self);

        let hazard = self.rf_ex.valid
            && self.rf_ex.inst.is_load()
            && self.ic_rf.valid
            && crate::pipeline::hazards::need_load_use_stall(
                &self.rf_ex,
                &crate::isa::decode(self.ic_rf.word),
            );

        if hazard {
            self.stats.stalls_load_use += 1;
            // The load has already been dispatched into ex_dc above; rf_ex must not
            // linger as the same load or the next cycle's ex::run would redispatch it
            // and this same check would fire forever. Bubble it so ic_rf (the
            // dependent instruction) stays frozen for exactly one cycle.
            self.rf_ex = RfEx::default();
            return;
        }

        rf::run(self);
        ic::run(self, bus);
    }
}
