//! TLB unit tests: round-trip translation, permission faults, and global entries.

use crate::common::{mtc0, nop, ori, tlbr, tlbwi, TestContext};
use n64_core::common::VirtAddr;
use n64_core::cp0::reg;
use n64_core::cp0::tlb::{LookupError, Tlb, TlbEntry, TlbHalf};
use pretty_assertions::assert_eq;

fn entry(vpn2: u64, asid: u8, global: bool, lo0: TlbHalf, lo1: TlbHalf) -> TlbEntry {
    TlbEntry { vpn2, page_mask: 0, asid, global, lo0, lo1 }
}

#[test]
fn even_page_translates_through_lo0() {
    let mut tlb = Tlb::new(4);
    let even = VirtAddr::new(0x1000_2000); // bit 12 clear: even page
    let lo0 = TlbHalf { pfn: 0x5, c: 0, d: true, v: true };
    tlb.write_index(0, entry(even.val(), 3, false, lo0, TlbHalf::default()));

    let t = tlb.translate(even, 3, false).expect("even page must hit");
    assert_eq!(t.paddr.val(), 0x5000);
    assert!(t.cacheable);
    assert!(t.dirty);
}

#[test]
fn odd_page_translates_through_lo1() {
    let mut tlb = Tlb::new(4);
    let even = VirtAddr::new(0x1000_2000);
    let odd = VirtAddr::new(0x1000_3000); // bit 12 set: odd page
    let lo1 = TlbHalf { pfn: 0x7, c: 0, d: false, v: true };
    tlb.write_index(0, entry(even.val(), 3, false, TlbHalf::default(), lo1));

    let t = tlb.translate(odd, 3, false).expect("odd page must hit");
    assert_eq!(t.paddr.val(), 0x7000);
    assert!(!t.dirty);
}

#[test]
fn store_to_clean_page_is_modified_fault() {
    let mut tlb = Tlb::new(4);
    let vaddr = VirtAddr::new(0x2000_0000);
    let lo0 = TlbHalf { pfn: 1, c: 0, d: false, v: true };
    tlb.write_index(0, entry(vaddr.val(), 0, false, lo0, TlbHalf::default()));

    match tlb.translate(vaddr, 0, true) {
        Err(LookupError::Modified) => {}
        other => panic!("expected Modified, got {}", matches_label(other)),
    }
}

#[test]
fn invalid_half_is_invalid_fault() {
    let mut tlb = Tlb::new(4);
    let vaddr = VirtAddr::new(0x2000_0000);
    tlb.write_index(0, entry(vaddr.val(), 0, false, TlbHalf::default(), TlbHalf::default()));

    match tlb.translate(vaddr, 0, false) {
        Err(LookupError::Invalid) => {}
        other => panic!("expected Invalid, got {}", matches_label(other)),
    }
}

#[test]
fn no_matching_entry_is_miss() {
    let tlb = Tlb::new(4);
    let vaddr = VirtAddr::new(0x3000_0000);
    match tlb.translate(vaddr, 0, false) {
        Err(LookupError::Miss) => {}
        other => panic!("expected Miss, got {}", matches_label(other)),
    }
}

#[test]
fn asid_mismatch_misses_unless_global() {
    let mut tlb = Tlb::new(4);
    let vaddr = VirtAddr::new(0x4000_0000);
    let lo0 = TlbHalf { pfn: 9, c: 0, d: true, v: true };
    tlb.write_index(0, entry(vaddr.val(), 1, false, lo0, TlbHalf::default()));

    assert!(matches!(tlb.translate(vaddr, 2, false), Err(LookupError::Miss)));

    tlb.write_index(0, entry(vaddr.val(), 1, true, lo0, TlbHalf::default()));
    assert!(tlb.translate(vaddr, 2, false).is_ok());
}

#[test]
fn probe_finds_matching_entry_index() {
    let mut tlb = Tlb::new(4);
    let vpn2 = 0x5000_0000;
    tlb.write_index(2, entry(vpn2, 7, false, TlbHalf::default(), TlbHalf::default()));

    assert_eq!(tlb.probe(vpn2, 7), Some(2));
    assert_eq!(tlb.probe(vpn2, 8), None);
}

#[test]
fn flush_invalidates_every_entry() {
    let mut tlb = Tlb::new(2);
    let vaddr = VirtAddr::new(0x1000_0000);
    let lo0 = TlbHalf { pfn: 1, c: 0, d: true, v: true };
    tlb.write_index(0, entry(vaddr.val(), 0, false, lo0, TlbHalf::default()));
    tlb.flush();
    assert!(matches!(tlb.translate(vaddr, 0, false), Err(LookupError::Miss)));
}

/// `TLBWI` then `TLBR` through actual instruction dispatch must round-trip
/// `EntryHi`/`EntryLo0`/`EntryLo1`/`PageMask` exactly, not just the `Tlb` struct
/// tested directly above.
#[test]
fn tlbwi_then_tlbr_round_trips_through_cpu_instruction_dispatch() {
    let mut ctx = TestContext::new();
    ctx.load_boot_program(&[
        ori(1, 0, 0x2007), // EntryHi: vpn2 = 1, asid = 7
        mtc0(reg::ENTRY_HI as u8, 1),
        ori(2, 0, 0x146), // EntryLo0: pfn=5, c=0, d=1, v=1, g=0
        mtc0(reg::ENTRY_LO0 as u8, 2),
        ori(3, 0, 0x1C2), // EntryLo1: pfn=7, c=0, d=0, v=1, g=0
        mtc0(reg::ENTRY_LO1 as u8, 3),
        mtc0(reg::INDEX as u8, 0),
        nop(),
        nop(),
        tlbwi(),
        nop(),
        nop(),
        nop(),
        nop(),
        mtc0(reg::ENTRY_HI as u8, 0),
        mtc0(reg::ENTRY_LO0 as u8, 0),
        mtc0(reg::ENTRY_LO1 as u8, 0),
        mtc0(reg::PAGE_MASK as u8, 0),
        nop(),
        nop(),
        nop(),
        nop(),
        tlbr(),
        nop(),
        nop(),
        nop(),
        nop(),
    ]);
    ctx.run(60);

    assert_eq!(ctx.cpu.cp0.entry_hi, 0x2007);
    assert_eq!(ctx.cpu.cp0.entry_lo0, 0x146);
    assert_eq!(ctx.cpu.cp0.entry_lo1, 0x1C2);
    assert_eq!(ctx.cpu.cp0.page_mask, 0);
}

fn matches_label(r: Result<n64_core::cp0::tlb::Translation, LookupError>) -> &'static str {
    match r {
        Ok(_) => "Ok",
        Err(LookupError::Miss) => "Miss",
        Err(LookupError::Invalid) => "Invalid",
        Err(LookupError::Modified) => "Modified",
    }
}
