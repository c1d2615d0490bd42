//! The five-stage pipeline engine: latches, hazard detection, and the per-stage
//! logic that [`crate::cpu::Cpu::cycle`] drives once per clock.

pub mod hazards;
pub mod latches;
pub mod stages;

pub use latches::{DcWb, ExDc, IcRf, MemOp, RfEx};
