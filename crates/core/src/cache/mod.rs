//! Functional instruction and data caches: both hold real line data, not just
//! hit/miss timing, since the CACHE instruction and writeback semantics depend on it.

pub mod dcache;
pub mod icache;

pub use dcache::DCache;
pub use icache::ICache;
