//! Instruction decoding: a tagged [`Instruction`] enum plus a single decode table,
//! rather than re-deriving opcode meaning at every pipeline stage.

pub mod decode;
pub mod instruction;

pub use decode::decode;
pub use instruction::{CacheOp, CacheTarget, FpuArithOp, FpuFormat, Instruction};
