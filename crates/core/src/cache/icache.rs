//! The instruction cache: virtually indexed, physically tagged, holding real line
//! data rather than timing information only.

use crate::common::PhysAddr;
use crate::config::CacheConfig;
use crate::soc::Bus;

#[derive(Debug, Clone)]
struct Line {
    tag: u64,
    valid: bool,
    data: Vec<u8>,
    last_used: u64,
}

/// The I-cache.
#[derive(Debug, Clone)]
pub struct ICache {
    lines: Vec<Line>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    fill_cycles_per_word: u64,
    access_counter: u64,
}

fn log2_usize(n: usize) -> u32 {
    n.trailing_zeros()
}

impl ICache {
    /// Builds an empty (all-invalid) I-cache from `config`.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let num_sets = config.num_sets();
        let line_bytes = config.line_bytes;
        let lines = (0..num_sets * config.ways)
            .map(|_| Line { tag: 0, valid: false, data: vec![0; line_bytes], last_used: 0 })
            .collect();
        Self {
            lines,
            num_sets,
            ways: config.ways,
            line_bytes,
            fill_cycles_per_word: config.fill_cycles_per_word,
            access_counter: 0,
        }
    }

    fn set_index(&self, vaddr: u64) -> usize {
        let line_bits = log2_usize(self.line_bytes);
        ((vaddr >> line_bits) as usize) & (self.num_sets - 1)
    }

    fn tag_of(&self, paddr: u64) -> u64 {
        paddr >> log2_usize(self.line_bytes)
    }

    /// Fetches the 4-byte word at `(vaddr, paddr)`, filling the line from `bus` on a
    /// miss. Returns `(word, stall_cycles)`, where `stall_cycles` is nonzero only on a
    /// miss.
    pub fn fetch(&mut self, vaddr: u64, paddr: PhysAddr, bus: &mut Bus) -> (u32, u64) {
        self.access_counter += 1;
        let set = self.set_index(vaddr);
        let tag = self.tag_of(paddr.val());
        let base = set * self.ways;

        for way in 0..self.ways {
            let idx = base + way;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                self.lines[idx].last_used = self.access_counter;
                let offset = (paddr.val() as usize) & (self.line_bytes - 1);
                let word = be_word(&self.lines[idx].data, offset);
                return (word, 0);
            }
        }

        let victim = (0..self.ways)
            .map(|w| base + w)
            .min_by_key(|&idx| self.lines[idx].last_used)
            .unwrap_or(base);

        let line_base_paddr = paddr.val() & !((self.line_bytes as u64) - 1);
        let mut data = vec![0u8; self.line_bytes];
        for (i, chunk) in data.chunks_mut(4).enumerate() {
            let word = bus.read_u32(PhysAddr::new(line_base_paddr + (i as u64) * 4));
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        self.lines[victim] = Line { tag, valid: true, data, last_used: self.access_counter };

        let offset = (paddr.val() as usize) & (self.line_bytes - 1);
        let word = be_word(&self.lines[victim].data, offset);
        let words_per_line = (self.line_bytes / 4) as u64;
        (word, words_per_line * self.fill_cycles_per_word)
    }

    /// Invalidates the line at the index selected by `paddr`, regardless of tag match
    /// (`Index Invalidate` / `Index Writeback Invalidate`, which is identical for an
    /// I-cache line since it is never dirty).
    pub fn index_invalidate(&mut self, paddr: PhysAddr) {
        let set = self.set_index(paddr.val());
        for way in 0..self.ways {
            self.lines[set * self.ways + way].valid = false;
        }
    }

    /// Invalidates the line matching `paddr`'s tag, if present (`Hit Invalidate`).
    pub fn hit_invalidate(&mut self, paddr: PhysAddr) {
        let set = self.set_index(paddr.val());
        let tag = self.tag_of(paddr.val());
        for way in 0..self.ways {
            let idx = set * self.ways + way;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                self.lines[idx].valid = false;
            }
        }
    }

    /// Reads the tag and valid bit at the line index selected by `paddr`, for
    /// `Index Load Tag`.
    #[must_use]
    pub fn load_tag(&self, paddr: PhysAddr) -> (u64, bool) {
        let set = self.set_index(paddr.val());
        let line = &self.lines[set * self.ways];
        (line.tag, line.valid)
    }

    /// Overwrites the tag and valid bit at the line index selected by `paddr`, for
    /// `Index Store Tag`.
    pub fn store_tag(&mut self, paddr: PhysAddr, tag: u64, valid: bool) {
        let set = self.set_index(paddr.val());
        let line = &mut self.lines[set * self.ways];
        line.tag = tag;
        line.valid = valid;
    }

    /// `Fill`: allocates the line covering `paddr` without loading data from memory.
    pub fn fill_allocate(&mut self, paddr: PhysAddr) {
        let set = self.set_index(paddr.val());
        let tag = self.tag_of(paddr.val());
        let base = set * self.ways;
        let victim = (0..self.ways)
            .map(|w| base + w)
            .min_by_key(|&idx| self.lines[idx].last_used)
            .unwrap_or(base);
        self.access_counter += 1;
        self.lines[victim] =
            Line { tag, valid: true, data: vec![0; self.line_bytes], last_used: self.access_counter };
    }

    /// Invalidates every line (used on reset and on `Fill`-adjacent maintenance).
    pub fn flush(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
        }
    }
}

fn be_word(data: &[u8], offset: usize) -> u32 {
    let b = &data[offset..offset + 4];
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}
