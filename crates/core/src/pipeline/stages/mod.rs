//! Per-stage logic, one module per pipeline stage, run in reverse order
//! (WB, DC, EX, RF, IC) each cycle so every stage reads the prior cycle's latch
//! before it is overwritten.

pub mod dc;
pub mod ex;
pub mod ic;
pub mod rf;
pub mod wb;
