//! The `Device` trait implemented by every bus-attached peripheral.

/// A memory-mapped peripheral reachable through the [`super::bus::Bus`].
///
/// All N64 MMIO is word-granular (see the bus address map), but the trait keeps
/// narrower accessors so cache line fills and byte-level RDRAM access share one
/// dispatch surface.
pub trait Device {
    /// A short, human-readable device name, used in diagnostics.
    fn name(&self) -> &str;

    /// `(base, size)` of this device's physical address window.
    fn address_range(&self) -> (u64, u64);

    /// Reads one byte at `offset` from this device's base.
    fn read_u8(&mut self, offset: u64) -> u8;
    /// Reads a two-byte value at `offset`, in whatever order this device stores it
    /// (N64 backing-store devices are big-endian; see [`super::memory`]).
    fn read_u16(&mut self, offset: u64) -> u16;
    /// Reads a four-byte value at `offset`; see [`Self::read_u16`].
    fn read_u32(&mut self, offset: u64) -> u32;
    /// Reads an eight-byte value at `offset`; see [`Self::read_u16`].
    fn read_u64(&mut self, offset: u64) -> u64;

    /// Writes one byte at `offset`.
    fn write_u8(&mut self, offset: u64, val: u8);
    /// Writes a two-byte value at `offset`; see [`Self::read_u16`].
    fn write_u16(&mut self, offset: u64, val: u16);
    /// Writes a four-byte value at `offset`; see [`Self::read_u16`].
    fn write_u32(&mut self, offset: u64, val: u32);
    /// Writes an eight-byte value at `offset`; see [`Self::read_u16`].
    fn write_u64(&mut self, offset: u64, val: u64);

    /// Writes a raw byte slice starting at `offset`; the default implementation calls
    /// [`Self::write_u8`] per byte, which devices backed by a contiguous buffer should
    /// override for bulk ROM/RAM loads.
    fn write_bytes(&mut self, offset: u64, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_u8(offset + i as u64, *byte);
        }
    }

    /// Advances this device by one scheduler step, returning `true` if it is currently
    /// asserting its interrupt line. The default is a no-op, non-asserting device.
    fn tick(&mut self) -> bool {
        false
    }
}
