//! Backing-store devices: plain RDRAM and a read-only cartridge ROM image.
//!
//! The R4300 is wired to the N64 bus big-endian; both devices store and fetch bytes
//! in that order, unlike the little-endian convention of smaller host memories.

use super::traits::Device;

/// A flat RAM device, used for RDRAM and the PIF RAM/ROM window.
#[derive(Debug, Clone)]
pub struct Memory {
    base: u64,
    bytes: Vec<u8>,
}

impl Memory {
    /// Creates a zero-filled RAM device of `size` bytes at `base`.
    #[must_use]
    pub fn new(base: u64, size: usize) -> Self {
        Self { base, bytes: vec![0; size] }
    }

    /// Copies `data` into the buffer starting at byte `offset`, truncating at the end
    /// of the buffer.
    pub fn load(&mut self, offset: usize, data: &[u8]) {
        let end = (offset + data.len()).min(self.bytes.len());
        if offset < end {
            self.bytes[offset..end].copy_from_slice(&data[..end - offset]);
        }
    }
}

impl Device for Memory {
    fn name(&self) -> &str {
        "RDRAM"
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base, self.bytes.len() as u64)
    }

    fn read_u8(&mut self, offset: u64) -> u8 {
        self.bytes.get(offset as usize).copied().unwrap_or(0)
    }

    fn read_u16(&mut self, offset: u64) -> u16 {
        let i = offset as usize;
        self.bytes.get(i..i + 2).map_or(0, |s| u16::from_be_bytes([s[0], s[1]]))
    }

    fn read_u32(&mut self, offset: u64) -> u32 {
        let i = offset as usize;
        self.bytes
            .get(i..i + 4)
            .map_or(0, |s| u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from(self.read_u32(offset)) << 32 | u64::from(self.read_u32(offset + 4))
    }

    fn write_u8(&mut self, offset: u64, val: u8) {
        if let Some(slot) = self.bytes.get_mut(offset as usize) {
            *slot = val;
        }
    }

    fn write_u16(&mut self, offset: u64, val: u16) {
        self.load(offset as usize, &val.to_be_bytes());
    }

    fn write_u32(&mut self, offset: u64, val: u32) {
        self.load(offset as usize, &val.to_be_bytes());
    }

    fn write_u64(&mut self, offset: u64, val: u64) {
        self.load(offset as usize, &val.to_be_bytes());
    }

    fn write_bytes(&mut self, offset: u64, data: &[u8]) {
        self.load(offset as usize, data);
    }
}

/// A read-only cartridge ROM image.
#[derive(Debug, Clone)]
pub struct Rom {
    base: u64,
    bytes: Vec<u8>,
}

impl Rom {
    /// Wraps `data` as a ROM device mapped at `base`.
    #[must_use]
    pub fn new(base: u64, data: Vec<u8>) -> Self {
        Self { base, bytes: data }
    }
}

impl Device for Rom {
    fn name(&self) -> &str {
        "Cart ROM"
    }

    fn address_range(&self) -> (u64, u64) {
        (self.base, self.bytes.len() as u64)
    }

    fn read_u8(&mut self, offset: u64) -> u8 {
        self.bytes.get(offset as usize).copied().unwrap_or(0)
    }

    fn read_u16(&mut self, offset: u64) -> u16 {
        let i = offset as usize;
        self.bytes.get(i..i + 2).map_or(0, |s| u16::from_be_bytes([s[0], s[1]]))
    }

    fn read_u32(&mut self, offset: u64) -> u32 {
        let i = offset as usize;
        self.bytes
            .get(i..i + 4)
            .map_or(0, |s| u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn read_u64(&mut self, offset: u64) -> u64 {
        u64::from(self.read_u32(offset)) << 32 | u64::from(self.read_u32(offset + 4))
    }

    fn write_u8(&mut self, _offset: u64, _val: u8) {}
    fn write_u16(&mut self, _offset: u64, _val: u16) {}
    fn write_u32(&mut self, _offset: u64, _val: u32) {}
    fn write_u64(&mut self, _offset: u64, _val: u64) {}
}
