//! Instruction encoders and a small test harness wrapping a `Cpu` + `Bus`.

use n64_core::common::PhysAddr;
use n64_core::config::Config;
use n64_core::soc::bus::map;
use n64_core::soc::memory::Memory;
use n64_core::soc::mi::intr_bits;
use n64_core::{Bus, Cpu};

/// Encodes an R-type (`SPECIAL`-opcode) word.
#[must_use]
pub fn r_type(rs: u8, rt: u8, rd: u8, sa: u8, funct: u32) -> u32 {
    ((u32::from(rs)) << 21) | ((u32::from(rt)) << 16) | ((u32::from(rd)) << 11) | ((u32::from(sa)) << 6) | funct
}

/// Encodes an I-type word for the given major opcode.
#[must_use]
pub fn i_type(opcode: u32, rs: u8, rt: u8, imm: u16) -> u32 {
    (opcode << 26) | ((u32::from(rs)) << 21) | ((u32::from(rt)) << 16) | u32::from(imm)
}

#[must_use]
pub fn addu(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0x21)
}

#[must_use]
pub fn add(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0x20)
}

#[must_use]
pub fn addiu(rt: u8, rs: u8, imm: i16) -> u32 {
    i_type(0x09, rs, rt, imm as u16)
}

#[must_use]
pub fn ori(rt: u8, rs: u8, imm: u16) -> u32 {
    i_type(0x0D, rs, rt, imm)
}

#[must_use]
pub fn lui(rt: u8, imm: u16) -> u32 {
    i_type(0x0F, 0, rt, imm)
}

#[must_use]
pub fn lw(rt: u8, base: u8, offset: i16) -> u32 {
    i_type(0x23, base, rt, offset as u16)
}

#[must_use]
pub fn ld(rt: u8, base: u8, offset: i16) -> u32 {
    i_type(0x37, base, rt, offset as u16)
}

#[must_use]
pub fn sw(rt: u8, base: u8, offset: i16) -> u32 {
    i_type(0x2B, base, rt, offset as u16)
}

#[must_use]
pub fn beq(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0x04, rs, rt, offset as u16)
}

#[must_use]
pub fn beql(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0x14, rs, rt, offset as u16)
}

#[must_use]
pub fn jr(rs: u8) -> u32 {
    r_type(rs, 0, 0, 0, 0x08)
}

/// Encodes `MTC0 rt, <cp0_reg>`.
#[must_use]
pub fn mtc0(cp0_reg: u8, rt: u8) -> u32 {
    (0x10 << 26) | (0x04 << 21) | ((u32::from(rt)) << 16) | ((u32::from(cp0_reg)) << 11)
}

#[must_use]
pub const fn tlbwi() -> u32 {
    (0x10 << 26) | (0x10 << 21) | 0x02
}

#[must_use]
pub const fn tlbr() -> u32 {
    (0x10 << 26) | (0x10 << 21) | 0x01
}

/// Encodes a `CACHE op, offset(base)` word. `data` selects the D-cache over the
/// I-cache; `op_code` is the raw 3-bit CACHE operation field.
#[must_use]
pub fn cache(data: bool, op_code: u8, base: u8, offset: i16) -> u32 {
    let cache_sel: u32 = if data { 1 } else { 0 };
    let field = cache_sel | (u32::from(op_code) << 2);
    (0x2F << 26) | ((u32::from(base)) << 21) | (field << 16) | (offset as u16 as u32)
}

#[must_use]
pub const fn nop() -> u32 {
    0
}

#[must_use]
pub fn mfc1(rt: u8, fs: u8) -> u32 {
    (0x11 << 26) | ((u32::from(fs)) << 11)
        | ((u32::from(rt)) << 16)
}

#[must_use]
pub fn mtc1(rt: u8, fs: u8) -> u32 {
    (0x11 << 26) | (0x04 << 21) | ((u32::from(rt)) << 16) | ((u32::from(fs)) << 11)
}

#[must_use]
pub fn cfc1(rt: u8, fs: u8) -> u32 {
    (0x11 << 26) | (0x02 << 21) | ((u32::from(rt)) << 16) | ((u32::from(fs)) << 11)
}

#[must_use]
pub fn ctc1(rt: u8, fs: u8) -> u32 {
    (0x11 << 26) | (0x06 << 21) | ((u32::from(rt)) << 16) | ((u32::from(fs)) << 11)
}

/// Encodes a single-precision `FpuArith` (`funct`: 0=add, 1=sub, 2=mul, 3=div).
#[must_use]
pub fn fpu_add_s(fd: u8, fs: u8, ft: u8) -> u32 {
    fpu_arith_s(0x00, fd, fs, ft)
}

#[must_use]
pub fn fpu_div_s(fd: u8, fs: u8, ft: u8) -> u32 {
    fpu_arith_s(0x03, fd, fs, ft)
}

fn fpu_arith_s(funct: u32, fd: u8, fs: u8, ft: u8) -> u32 {
    (0x11 << 26)
        | (0x10 << 21)
        | ((u32::from(ft)) << 16)
        | ((u32::from(fd)) << 11)
        | ((u32::from(fs)) << 6)
        | funct
}

/// Minimal RDRAM size used by tests; large enough for any test program plus its
/// data area, small enough to keep `Memory::new` allocation trivial.
const TEST_RDRAM_SIZE: usize = 64 * 1024;

/// A `Cpu` wired to a `Bus` with RDRAM at physical `0` and a boot ROM window at
/// `PIF_BASE` (`KSEG1`-mapped from the reset PC with no TLB involvement), for
/// tests that need a real pipeline run rather than a single stage in isolation.
pub struct TestContext {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl TestContext {
    /// Builds a fresh reset `Cpu` over a `Bus` with RDRAM and a boot ROM window.
    #[must_use]
    pub fn new() -> Self {
        let config = Config::default();
        let mut bus = Bus::new(map::MI_BASE);
        bus.add_device(Box::new(Memory::new(map::RDRAM_BASE, TEST_RDRAM_SIZE)))
            .expect("RDRAM must not overlap MI");
        bus.add_device(Box::new(Memory::new(map::PIF_BASE, 4096)))
            .expect("boot ROM window must not overlap MI or RDRAM");
        let cpu = Cpu::reset(config);
        Self { cpu, bus }
    }

    /// Writes `words` starting at the reset vector's physical address
    /// (`PIF_BASE`, since `RESET_PC` is a `KSEG1` address that translates
    /// straight there).
    pub fn load_boot_program(&mut self, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            let addr = map::PIF_BASE + (i as u64) * 4;
            self.bus.write_u32(PhysAddr::new(addr), *word);
        }
    }

    /// Writes `words` into RDRAM at physical `addr`.
    pub fn load_rdram(&mut self, addr: u64, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.bus.write_u32(PhysAddr::new(addr + (i as u64) * 4), *word);
        }
    }

    /// Advances the simulated system by one cycle: tick devices, latch the VI
    /// beacon (if registered) into MI, fold MI's signal into the CPU, then step
    /// the pipeline. Mirrors [`n64_core::Simulator::step`].
    pub fn step(&mut self) {
        let asserted = self.bus.tick_devices();
        if let Some(i) = self.bus.device_index_of("VI") {
            if asserted & (1 << i) != 0 {
                self.bus.mi.raise(intr_bits::VI);
            }
        }
        let irq = self.bus.mi.signal();
        self.cpu.cycle(&mut self.bus, irq);
    }

    /// Runs `cycles` cycles.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.step();
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
