//! Simulator: owns the CPU and the bus side-by-side, and ticks the devices that the
//! CPU itself cannot own (they are shared MMIO state, not pipeline state).

use crate::cpu::Cpu;
use crate::soc::bus::map;
use crate::soc::mi::intr_bits;
use crate::soc::{Bus, Vi};

/// Top-level simulator: CPU architectural state + system bus.
///
/// Each [`Self::step`] advances the bus's devices by one tick, latches any
/// interrupt-asserting device into MI, then advances the CPU by exactly one cycle
/// with MI's OR-reduced signal as the external interrupt input.
pub struct Simulator {
    /// CPU architectural state, pipeline latches, and stats.
    pub cpu: Cpu,
    /// System bus: RDRAM/ROM/devices, plus the MI interrupt register.
    pub bus: Bus,
    vi_device_index: Option<usize>,
}

impl Simulator {
    /// Creates a simulator from an already-reset `Cpu` and a `Bus` with its devices
    /// registered. Registers the built-in VI beacon at [`map::VI_BASE`] if the caller
    /// has not already registered a device named `"VI"`.
    pub fn new(cpu: Cpu, mut bus: Bus) -> Self {
        if bus.device_index_of("VI").is_none() {
            let period = cpu.config.vi_interrupt_period;
            bus.add_device(Box::new(Vi::new(map::VI_BASE, period)))
                .expect("VI_BASE must not overlap a caller-registered device");
        }
        let vi_device_index = bus.device_index_of("VI");
        Self { cpu, bus, vi_device_index }
    }

    /// Advances the simulator by exactly one clock cycle.
    pub fn step(&mut self) {
        let asserted = self.bus.tick_devices();
        if let Some(i) = self.vi_device_index {
            if asserted & (1 << i) != 0 {
                self.bus.mi.raise(intr_bits::VI);
            }
        }
        let irq = self.bus.mi.signal();
        self.cpu.cycle(&mut self.bus, irq);
    }

    /// Advances the simulator by `n` clock cycles.
    pub fn run_cycles(&mut self, n: u64) {
        for _ in 0..n {
            if self.cpu.signals.force_exit {
                break;
            }
            self.step();
        }
    }
}
