//! Shared leaf types used across the core: addresses and the two error planes.

pub mod addr;
pub mod error;

pub use addr::{PhysAddr, VirtAddr};
pub use error::{SimError, SimResult, Trap};
