//! Address newtypes distinguishing virtual from physical addressing.

use std::fmt;

/// A 64-bit virtual address as seen by the pipeline before TLB translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(pub u64);

impl VirtAddr {
    /// Wraps a raw value as a virtual address.
    #[must_use]
    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    /// Returns the raw 64-bit value.
    #[must_use]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Returns the offset within a 4 KiB page.
    #[must_use]
    pub const fn page_offset(self) -> u64 {
        self.0 & 0xFFF
    }

    /// `true` if this address lies in KSEG0 (cached, unmapped, kernel).
    #[must_use]
    pub const fn in_kseg0(self) -> bool {
        self.0 >= 0x8000_0000 && self.0 < 0xA000_0000
    }

    /// `true` if this address lies in KSEG1 (uncached, unmapped, kernel).
    #[must_use]
    pub const fn in_kseg1(self) -> bool {
        self.0 >= 0xA000_0000 && self.0 < 0xC000_0000
    }

    /// `true` if this address lies in a mapped segment (KSEG2/KSSEG or USEG) requiring TLB lookup.
    #[must_use]
    pub const fn requires_tlb(self) -> bool {
        !self.in_kseg0() && !self.in_kseg1()
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// A 32-bit physical address on the system bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub u64);

impl PhysAddr {
    /// Wraps a raw value as a physical address.
    #[must_use]
    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    /// Returns the raw value, masked to 32 significant bits.
    #[must_use]
    pub const fn val(self) -> u64 {
        self.0 & 0xFFFF_FFFF
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.val())
    }
}
