//! Unit and scenario tests, one module per component area.

/// R0 invariance, branch delay slots, load-use stalls, and operand bypassing.
pub mod pipeline;


/// TLB round-trip translation.
pub mod tlb;

/// CU1 gating, single-precision arithmetic, and the FCR31 control register.
pub mod cp1;


/// Bus address routing, masked writes, and MI interrupt aggregation.
pub mod bus;
