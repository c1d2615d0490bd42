//! Simulator configuration: cache geometry, TLB size, and bus timing.
//!
//! [`Config::default()`] reproduces the architectural R4300/N64 defaults used by the
//! testable properties; overriding fields is for experimentation and does not change
//! architectural behavior that the R4300 manual fixes (e.g. TLB entry count).

use serde::Deserialize;

/// Named architectural constants, kept in one place the way magic numbers elsewhere
/// in the crate should not be.
pub mod defaults {
    /// Reset program counter, in the boot-exception (`BEV=1`) vector region.
    pub const RESET_PC: u64 = 0xBFC0_0000;
    /// Number of hardware TLB entries (fixed by the R4300 architecture).
    pub const TLB_ENTRIES: usize = 48;
    /// I-cache size in bytes.
    pub const ICACHE_SIZE: usize = 16 * 1024;
    /// I-cache line size in bytes.
    pub const ICACHE_LINE: usize = 32;
    /// I-cache associativity (R4300 is configurable between direct-mapped and 2-way).
    pub const ICACHE_WAYS: usize = 2;
    /// D-cache size in bytes.
    pub const DCACHE_SIZE: usize = 8 * 1024;
    /// D-cache line size in bytes.
    pub const DCACHE_LINE: usize = 16;
    /// D-cache associativity.
    pub const DCACHE_WAYS: usize = 2;
    /// Cycles to fill one cache line from the bus, per word transferred.
    pub const CACHE_FILL_CYCLES_PER_WORD: u64 = 1;
    /// Bus width in bytes (all N64 MMIO is word-granular).
    pub const BUS_WIDTH_BYTES: u64 = 4;
    /// Divider between master CPU cycles and the Count register's increment rate.
    pub const COUNT_DIVIDER: u64 = 2;
    /// CPU cycles between consecutive VI (vertical-blank) interrupts, fixed at ~60 Hz
    /// against the nominal 62.5 MHz system clock. Kept as an integer constant rather
    /// than derived from a float (see design notes).
    pub const VI_INTERRUPT_PERIOD: u64 = 1_041_667;
}

/// Cache geometry for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Total capacity in bytes.
    pub size_bytes: usize,
    /// Line size in bytes.
    pub line_bytes: usize,
    /// Number of ways (associativity).
    pub ways: usize,
    /// Cycles charged per word transferred on a line fill.
    pub fill_cycles_per_word: u64,
}

impl CacheConfig {
    const fn icache_default() -> Self {
        Self {
            size_bytes: defaults::ICACHE_SIZE,
            line_bytes: defaults::ICACHE_LINE,
            ways: defaults::ICACHE_WAYS,
            fill_cycles_per_word: defaults::CACHE_FILL_CYCLES_PER_WORD,
        }
    }

    const fn dcache_default() -> Self {
        Self {
            size_bytes: defaults::DCACHE_SIZE,
            line_bytes: defaults::DCACHE_LINE,
            ways: defaults::DCACHE_WAYS,
            fill_cycles_per_word: defaults::CACHE_FILL_CYCLES_PER_WORD,
        }
    }

    /// Number of sets, derived from size/line/ways.
    #[must_use]
    pub const fn num_sets(&self) -> usize {
        self.size_bytes / self.line_bytes / self.ways
    }
}

/// Top-level simulator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Instruction cache geometry.
    pub icache: CacheConfig,
    /// Data cache geometry.
    pub dcache: CacheConfig,
    /// Number of TLB entries.
    pub tlb_entries: usize,
    /// Bus width in bytes.
    pub bus_width_bytes: u64,
    /// Count register increment divider.
    pub count_divider: u64,
    /// CPU cycles between VI interrupts.
    pub vi_interrupt_period: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            icache: CacheConfig::icache_default(),
            dcache: CacheConfig::dcache_default(),
            tlb_entries: defaults::TLB_ENTRIES,
            bus_width_bytes: defaults::BUS_WIDTH_BYTES,
            count_divider: defaults::COUNT_DIVIDER,
            vi_interrupt_period: defaults::VI_INTERRUPT_PERIOD,
        }
    }
}

impl Config {
    /// Validates the configuration, rejecting geometries the cache/TLB implementation
    /// cannot represent (non-power-of-two set counts, zero-sized lines, etc.).
    ///
    /// # Errors
    ///
    /// Returns [`crate::common::SimError::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> crate::common::SimResult<()> {
        for (name, cache) in [("icache", &self.icache), ("dcache", &self.dcache)] {
            if cache.line_bytes == 0 || !cache.line_bytes.is_power_of_two() {
                return Err(crate::common::SimError::ConfigError(format!(
                    "{name}.line_bytes must be a nonzero power of two, got {}",
                    cache.line_bytes
                )));
            }
            if cache.num_sets() == 0 || !cache.num_sets().is_power_of_two() {
                return Err(crate::common::SimError::ConfigError(format!(
                    "{name} must have a nonzero power-of-two set count"
                )));
            }
        }
        if self.tlb_entries == 0 {
            return Err(crate::common::SimError::ConfigError(
                "tlb_entries must be nonzero".to_owned(),
            ));
        }
        Ok(())
    }
}
