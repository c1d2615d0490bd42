//! The data cache: physically indexed and tagged, with a dirty bit and
//! write-allocate-with-writeback semantics.

use crate::common::PhysAddr;
use crate::config::CacheConfig;
use crate::soc::Bus;

#[derive(Debug, Clone)]
struct Line {
    tag: u64,
    valid: bool,
    dirty: bool,
    data: Vec<u8>,
    last_used: u64,
}

/// The D-cache.
#[derive(Debug, Clone)]
pub struct DCache {
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

impl DCache {
    /// Builds an empty D-cache from `config`.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let num_sets = config.num_sets();
        let line_bytes = config.line_bytes;
        let lines = (0..num_sets * config.ways)
            .map(|_| Line {
                tag: 0,
                valid: false,
                dirty: false,
                data: vec![0; line_bytes],
                last_used: 0,
            })
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

    fn set_index(&self, paddr: u64) -> usize {
        let line_bits = log2_usize(self.line_bytes);
        ((paddr >> line_bits) as usize) & (self.num_sets - 1)
    }

    fn tag_of(&self, paddr: u64) -> u64 {
        paddr >> log2_usize(self.line_bytes)
    }

    fn writeback(&self, idx: usize, bus: &mut Bus) {
        let line = &self.lines[idx];
        if !(line.valid && line.dirty) {
            return;
        }
        let line_base = line.tag << log2_usize(self.line_bytes);
        for (i, chunk) in line.data.chunks(4).enumerate() {
            let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            bus.write_u32(PhysAddr::new(line_base + (i as u64) * 4), word);
        }
    }

    fn find_or_fill(&mut self, paddr: u64, bus: &mut Bus) -> (usize, u64) {
        self.access_counter += 1;
        let set = self.set_index(paddr);
        let tag = self.tag_of(paddr);
        let base = set * self.ways;

        for way in 0..self.ways {
            let idx = base + way;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                self.lines[idx].last_used = self.access_counter;
                return (idx, 0);
            }
        }

        let victim = (0..self.ways)
            .map(|w| base + w)
            .min_by_key(|&idx| self.lines[idx].last_used)
            .unwrap_or(base);
        self.writeback(victim, bus);

        let line_base_paddr = paddr & !((self.line_bytes as u64) - 1);
        let mut data = vec![0u8; self.line_bytes];
        for (i, chunk) in data.chunks_mut(4).enumerate() {
            let word = bus.read_u32(PhysAddr::new(line_base_paddr + (i as u64) * 4));
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        self.lines[victim] =
            Line { tag, valid: true, dirty: false, data, last_used: self.access_counter };

        let words_per_line = (self.line_bytes / 4) as u64;
        (victim, words_per_line * self.fill_cycles_per_word)
    }

    /// Reads `len` bytes (1, 2, 4, or 8) at `paddr`, filling the line on a miss.
    /// Returns `(bytes, stall_cycles)`.
    pub fn read(&mut self, paddr: PhysAddr, len: usize, bus: &mut Bus) -> (u64, u64) {
        let (idx, stall) = self.find_or_fill(paddr.val(), bus);
        let offset = (paddr.val() as usize) & (self.line_bytes - 1);
        let mut value = 0u64;
        for b in &self.lines[idx].data[offset..offset + len] {
            value = (value << 8) | u64::from(*b);
        }
        (value, stall)
    }

    /// Writes `len` bytes (1, 2, 4, or 8) of `value` (big-endian) at `paddr`,
    /// write-allocating and marking the line dirty. Returns the fill stall.
    pub fn write(&mut self, paddr: PhysAddr, len: usize, value: u64, bus: &mut Bus) -> u64 {
        let (idx, stall) = self.find_or_fill(paddr.val(), bus);
        let offset = (paddr.val() as usize) & (self.line_bytes - 1);
        for i in 0..len {
            let shift = 8 * (len - 1 - i);
            self.lines[idx].data[offset + i] = ((value >> shift) & 0xFF) as u8;
        }
        self.lines[idx].dirty = true;
        stall
    }

    /// `Index Writeback Invalidate`: writes back the line at the selected index if
    /// dirty, then invalidates it, regardless of tag.
    pub fn index_writeback_invalidate(&mut self, paddr: PhysAddr, bus: &mut Bus) {
        let set = self.set_index(paddr.val());
        for way in 0..self.ways {
            let idx = set * self.ways + way;
            self.writeback(idx, bus);
            self.lines[idx].valid = false;
            self.lines[idx].dirty = false;
        }
    }

    /// `Index Invalidate`: invalidates the line at the selected index without writing
    /// back, discarding any dirty data.
    pub fn index_invalidate(&mut self, paddr: PhysAddr) {
        let set = self.set_index(paddr.val());
        for way in 0..self.ways {
            let idx = set * self.ways + way;
            self.lines[idx].valid = false;
            self.lines[idx].dirty = false;
        }
    }

    /// `Hit Invalidate`: invalidates the line matching `paddr`'s tag, if present,
    /// discarding dirty data.
    pub fn hit_invalidate(&mut self, paddr: PhysAddr) {
        let set = self.set_index(paddr.val());
        let tag = self.tag_of(paddr.val());
        for way in 0..self.ways {
            let idx = set * self.ways + way;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                self.lines[idx].valid = false;
                self.lines[idx].dirty = false;
            }
        }
    }

    /// `Hit Writeback Invalidate`: writes back if dirty, then invalidates, only if the
    /// line matches `paddr`'s tag.
    pub fn hit_writeback_invalidate(&mut self, paddr: PhysAddr, bus: &mut Bus) {
        let set = self.set_index(paddr.val());
        let tag = self.tag_of(paddr.val());
        for way in 0..self.ways {
            let idx = set * self.ways + way;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                self.writeback(idx, bus);
                self.lines[idx].valid = false;
                self.lines[idx].dirty = false;
            }
        }
    }

    /// `Hit Writeback`: writes back if dirty and matching, but leaves the line valid.
    pub fn hit_writeback(&mut self, paddr: PhysAddr, bus: &mut Bus) {
        let set = self.set_index(paddr.val());
        let tag = self.tag_of(paddr.val());
        for way in 0..self.ways {
            let idx = set * self.ways + way;
            if self.lines[idx].valid && self.lines[idx].tag == tag {
                self.writeback(idx, bus);
                self.lines[idx].dirty = false;
            }
        }
    }

    /// `Index Load Tag`: reads the tag/valid/dirty state at the selected index.
    #[must_use]
    pub fn load_tag(&self, paddr: PhysAddr) -> (u64, bool, bool) {
        let set = self.set_index(paddr.val());
        let line = &self.lines[set * self.ways];
        (line.tag, line.valid, line.dirty)
    }

    /// `Index Store Tag`: overwrites the tag/valid/dirty state at the selected index.
    pub fn store_tag(&mut self, paddr: PhysAddr, tag: u64, valid: bool, dirty: bool) {
        let set = self.set_index(paddr.val());
        let line = &mut self.lines[set * self.ways];
        line.tag = tag;
        line.valid = valid;
        line.dirty = dirty;
    }

    /// `Fill`: allocates (without loading data from memory, per the CACHE Fill
    /// semantics) the line covering `paddr`, evicting and writing back as needed.
    pub fn fill_allocate(&mut self, paddr: PhysAddr, bus: &mut Bus) {
        let set = self.set_index(paddr.val());
        let tag = self.tag_of(paddr.val());
        let base = set * self.ways;
        let victim = (0..self.ways)
            .map(|w| base + w)
            .min_by_key(|&idx| self.lines[idx].last_used)
            .unwrap_or(base);
        self.writeback(victim, bus);
        self.access_counter += 1;
        self.lines[victim] = Line {
            tag,
            valid: true,
            dirty: false,
            data: vec![0; self.line_bytes],
            last_used: self.access_counter,
        };
    }

    /// Writes back every dirty line (used on reset/teardown).
    pub fn flush(&mut self, bus: &mut Bus) {
        for idx in 0..self.lines.len() {
            self.writeback(idx, bus);
            self.lines[idx].valid = false;
            self.lines[idx].dirty = false;
        }
    }
}
