//! System interconnect routing physical addresses to devices.
//!
//! Mirrors the shape of a sorted-by-base-address device list with a last-device
//! lookup hint: devices are registered once at setup time, then looked up by
//! address on every CPU or DMA access.

use super::mi::Mi;
use super::traits::Device;
use crate::common::{PhysAddr, SimError, SimResult};

/// N64 physical bus address map, per the external interfaces section of the design.
pub mod map {
    /// RDRAM, 0 to ~4 MiB (console-dependent).
    pub const RDRAM_BASE: u64 = 0x0000_0000;
    /// SP (RSP) register window.
    pub const SP_BASE: u64 = 0x0404_0000;
    /// DP (RDP) command register window.
    pub const DP_CMD_BASE: u64 = 0x0410_0000;
    /// MI, the CPU-facing interrupt register block.
    pub const MI_BASE: u64 = 0x0430_0000;
    /// VI, the video interface register window.
    pub const VI_BASE: u64 = 0x0440_0000;
    /// AI, the audio interface register window.
    pub const AI_BASE: u64 = 0x0450_0000;
    /// PI, the peripheral interface register window.
    pub const PI_BASE: u64 = 0x0460_0000;
    /// RI, the RDRAM interface register window.
    pub const RI_BASE: u64 = 0x0470_0000;
    /// SI, the serial interface register window.
    pub const SI_BASE: u64 = 0x0480_0000;
    /// Cartridge domain (ROM).
    pub const CART_BASE: u64 = 0x1000_0000;
    /// PIF ROM/RAM.
    pub const PIF_BASE: u64 = 0x1FC0_0000;
}

/// The system bus: an ordered set of devices, each owning a disjoint physical
/// address window, plus the MI interrupt register as a dedicated first-class field
/// (rather than one more boxed [`Device`]) since the CPU's scheduler needs to call
/// its `raise`/`signal` directly, not just route MMIO through it.
pub struct Bus {
    devices: Vec<Box<dyn Device>>,
    last_device_idx: usize,
    /// The CPU-facing interrupt aggregator. Public so the scheduler can `raise`/
    /// `clear` device lines and read `signal()` without a trait-object downcast.
    pub mi: Mi,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").field("devices", &self.devices.len()).finish()
    }
}

impl Bus {
    /// Creates an empty bus with the MI register at `mi_base`.
    #[must_use]
    pub fn new(mi_base: u64) -> Self {
        Self { devices: Vec::new(), last_device_idx: 0, mi: Mi::new(mi_base) }
    }

    /// Registers a device, rejecting a window that overlaps one already registered.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ConfigError`] if the new device's address range intersects
    /// an existing one.
    pub fn add_device(&mut self, dev: Box<dyn Device>) -> SimResult<()> {
        let (new_base, new_size) = dev.address_range();
        let ranges = std::iter::once(self.mi.address_range())
            .chain(self.devices.iter().map(|d| d.address_range()));
        for (base, size) in ranges {
            let overlaps = new_base < base + size && base < new_base + new_size;
            if overlaps {
                return Err(SimError::ConfigError(format!(
                    "device '{}' at {new_base:#010x} overlaps an existing window at {base:#010x}",
                    dev.name(),
                )));
            }
        }
        self.devices.push(dev);
        self.devices.sort_by_key(|d| d.address_range().0);
        self.last_device_idx = 0;
        Ok(())
    }

    /// Loads a raw binary blob into the device claiming `addr`, falling back to
    /// byte-by-byte writes if no single device can hold it (or none claims it).
    pub fn load_binary_at(&mut self, data: &[u8], addr: u64) {
        if let Some((dev, offset)) = self.find_device(addr) {
            let (_, size) = dev.address_range();
            if offset + data.len() as u64 <= size {
                dev.write_bytes(offset, data);
                return;
            }
        }
        for (i, byte) in data.iter().enumerate() {
            self.write_u8(PhysAddr::new(addr + i as u64), *byte);
        }
    }

    /// `true` if `paddr` falls within some registered device's window.
    #[must_use]
    pub fn is_valid_address(&self, paddr: PhysAddr) -> bool {
        let paddr = paddr.val();
        let (mi_base, mi_size) = self.mi.address_range();
        (paddr >= mi_base && paddr < mi_base + mi_size)
            || self.devices.iter().any(|d| {
                let (base, size) = d.address_range();
                paddr >= base && paddr < base + size
            })
    }

    /// Advances every device by one scheduler step, returning the OR'd set of
    /// interrupt-asserting device indices (by registration order) as a bitmap, for the
    /// caller (normally the MI device) to latch.
    pub fn tick_devices(&mut self) -> u32 {
        let mut asserted = 0u32;
        for (i, dev) in self.devices.iter_mut().enumerate() {
            if dev.tick() && i < 32 {
                asserted |= 1 << i;
            }
        }
        asserted
    }

    /// Registration-order index of the device named `name`, for callers that need to
    /// correlate [`Self::tick_devices`]'s bitmap back to a specific device (e.g. the
    /// scheduler wiring VI's tick to the MI interrupt line).
    #[must_use]
    pub fn device_index_of(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name() == name)
    }

    fn find_device(&mut self, paddr: u64) -> Option<(&mut Box<dyn Device>, u64)> {
        if let Some(dev) = self.devices.get(self.last_device_idx) {
            let (base, size) = dev.address_range();
            if paddr >= base && paddr < base + size {
                return Some((&mut self.devices[self.last_device_idx], paddr - base));
            }
        }
        for (i, dev) in self.devices.iter_mut().enumerate() {
            let (base, size) = dev.address_range();
            if paddr >= base && paddr < base + size {
                self.last_device_idx = i;
                return Some((dev, paddr - base));
            }
        }
        None
    }

    fn mi_offset(&self, paddr: u64) -> Option<u64> {
        let (base, size) = self.mi.address_range();
        (paddr >= base && paddr < base + size).then_some(paddr - base)
    }

    /// Reads one byte; returns 0 if no device claims the address.
    pub fn read_u8(&mut self, paddr: PhysAddr) -> u8 {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.read_u8(o);
        }
        self.find_device(paddr.val()).map_or(0, |(d, o)| d.read_u8(o))
    }
    /// Reads a half-word; returns 0 if unclaimed.
    pub fn read_u16(&mut self, paddr: PhysAddr) -> u16 {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.read_u16(o);
        }
        self.find_device(paddr.val()).map_or(0, |(d, o)| d.read_u16(o))
    }
    /// Reads a word; returns 0 if unclaimed.
    pub fn read_u32(&mut self, paddr: PhysAddr) -> u32 {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.read_u32(o);
        }
        self.find_device(paddr.val()).map_or(0, |(d, o)| d.read_u32(o))
    }
    /// Reads a double-word; returns 0 if unclaimed.
    pub fn read_u64(&mut self, paddr: PhysAddr) -> u64 {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.read_u64(o);
        }
        self.find_device(paddr.val()).map_or(0, |(d, o)| d.read_u64(o))
    }
    /// Writes one byte; no-op if unclaimed.
    pub fn write_u8(&mut self, paddr: PhysAddr, val: u8) {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.write_u8(o, val);
        }
        if let Some((d, o)) = self.find_device(paddr.val()) {
            d.write_u8(o, val);
        }
    }
    /// Writes a half-word; no-op if unclaimed.
    pub fn write_u16(&mut self, paddr: PhysAddr, val: u16) {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.write_u16(o, val);
        }
        if let Some((d, o)) = self.find_device(paddr.val()) {
            d.write_u16(o, val);
        }
    }
    /// Writes a word; no-op if unclaimed.
    pub fn write_u32(&mut self, paddr: PhysAddr, val: u32) {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.write_u32(o, val);
        }
        if let Some((d, o)) = self.find_device(paddr.val()) {
            d.write_u32(o, val);
        }
    }
    /// Writes a double-word; no-op if unclaimed.
    pub fn write_u64(&mut self, paddr: PhysAddr, val: u64) {
        if let Some(o) = self.mi_offset(paddr.val()) {
            return self.mi.write_u64(o, val);
        }
        if let Some((d, o)) = self.find_device(paddr.val()) {
            d.write_u64(o, val);
        }
    }

    /// Performs a masked word write: `reg = (reg & !mask) | (value & mask)`, read back
    /// through the same device.
    pub fn write_u32_masked(&mut self, paddr: PhysAddr, value: u32, mask: u32) {
        let current = self.read_u32(paddr);
        self.write_u32(paddr, (current & !mask) | (value & mask));
    }
}
