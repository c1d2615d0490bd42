//! The software-managed, fully-associative TLB.

use crate::common::{PhysAddr, VirtAddr};

/// One half of a TLB entry (the even- or odd-page physical mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlbHalf {
    /// Physical frame number.
    pub pfn: u64,
    /// Cache coherency attribute (cacheable/uncached), as the raw 3-bit `C` field.
    pub c: u8,
    /// Dirty (writable) bit.
    pub d: bool,
    /// Valid bit.
    pub v: bool,
}

/// A single TLB entry as written by `TLBWI`/`TLBWR` and read by `TLBR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlbEntry {
    /// Virtual page number, shifted right by the page-size-dependent amount (bit 12
    /// upward; the low VPN bit that selects even/odd is not stored here).
    pub vpn2: u64,
    /// Page mask, widening the matched VPN2 range for large pages.
    pub page_mask: u64,
    /// Address space identifier; ignored when `global` is set.
    pub asid: u8,
    /// Global bit: matches regardless of ASID.
    pub global: bool,
    /// Even-page physical mapping.
    pub lo0: TlbHalf,
    /// Odd-page physical mapping.
    pub lo1: TlbHalf,
}

/// Outcome of a successful TLB lookup.
#[derive(Debug, Clone, Copy)]
pub struct Translation {
    /// The resulting physical address.
    pub paddr: PhysAddr,
    /// `true` if the matched half is cacheable (`C != 2`, the R4300 uncached encoding).
    pub cacheable: bool,
    /// `true` if the matched half's dirty bit is set (the page is writable).
    pub dirty: bool,
}

/// The 48-entry (by default) software-managed TLB.
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
}

/// Outcome of probing the TLB for a virtual address.
pub enum LookupError {
    /// No entry's VPN2/ASID/global combination matched.
    Miss,
    /// An entry matched but the selected half's valid bit was clear.
    Invalid,
    /// A store matched a valid but non-dirty (read-only) half.
    Modified,
}

impl Tlb {
    /// Creates an empty TLB with `entries` slots, all zeroed (invalid) until written.
    #[must_use]
    pub fn new(entries: usize) -> Self {
        Self { entries: vec![TlbEntry::default(); entries] }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the TLB has no entries (degenerate configuration).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes `entry` at `index` (`TLBWI`/`TLBWR`).
    pub fn write_index(&mut self, index: usize, entry: TlbEntry) {
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = entry;
        }
    }

    /// Reads the entry at `index` (`TLBR`).
    #[must_use]
    pub fn read_index(&self, index: usize) -> TlbEntry {
        self.entries.get(index).copied().unwrap_or_default()
    }

    /// Finds the index of the entry matching `vpn2`/`asid` (`TLBP`), honoring the
    /// global bit.
    #[must_use]
    pub fn probe(&self, vpn2: u64, asid: u8) -> Option<usize> {
        self.entries.iter().position(|e| {
            let vpn_mask = !e.page_mask;
            (e.vpn2 & vpn_mask) == (vpn2 & vpn_mask) && (e.global || e.asid == asid)
        })
    }

    /// Translates a virtual address with the given ASID, distinguishing a miss, an
    /// invalid mapping, and a write to a read-only page.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] describing why translation did not produce an address.
    pub fn translate(
        &self,
        vaddr: VirtAddr,
        asid: u8,
        is_store: bool,
    ) -> Result<Translation, LookupError> {
        let raw = vaddr.val();
        let page_bit = 1u64 << 12;
        for entry in &self.entries {
            let vpn_mask = !(entry.page_mask | (page_bit - 1) | page_bit);
            let entry_vpn = entry.vpn2 & vpn_mask;
            let query_vpn = raw & vpn_mask;
            if entry_vpn != query_vpn || !(entry.global || entry.asid == asid) {
                continue;
            }
            let select_odd = raw & page_bit != 0;
            let half = if select_odd { entry.lo1 } else { entry.lo0 };
            if !half.v {
                return Err(LookupError::Invalid);
            }
            if is_store && !half.d {
                return Err(LookupError::Modified);
            }
            let offset = raw & (page_bit - 1);
            let paddr = (half.pfn << 12) | offset;
            return Ok(Translation {
                paddr: PhysAddr::new(paddr),
                cacheable: half.c != 2,
                dirty: half.d,
            });
        }
        Err(LookupError::Miss)
    }

    /// Invalidates every entry (used on a cold/soft reset).
    pub fn flush(&mut self) {
        for entry in &mut self.entries {
            *entry = TlbEntry::default();
        }
    }
}
