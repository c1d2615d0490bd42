//! Two error planes: architectural [`Trap`]s (ordinary emulated control flow)
//! and host-side [`SimError`]s (misconfiguration, I/O, emulator bugs).

use std::fmt;

use crate::common::addr::VirtAddr;

/// An architectural exception as defined by the R4300 exception model.
///
/// A `Trap` is not a Rust error in the usual sense — it is normal behavior of
/// the emulated machine, carried inside a pipeline latch until it is
/// committed at writeback (see the pipeline engine's exception-commit rule).
/// It implements [`std::error::Error`] only so it composes with `?` inside
/// stage functions that also need to report host-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// A pending, enabled, unmasked interrupt was taken.
    Interrupt,
    /// TLB lookup for a mapped segment found no matching entry, `Status.EXL` was clear.
    TlbRefill {
        /// The virtual address that missed translation.
        vaddr: VirtAddr,
        /// `true` if the access was a store.
        is_store: bool,
    },
    /// TLB lookup found a matching entry with the valid bit clear.
    TlbInvalid {
        /// The virtual address whose entry was invalid.
        vaddr: VirtAddr,
        /// `true` if the access was a store.
        is_store: bool,
    },
    /// A store hit a TLB entry with the dirty bit clear.
    TlbModified {
        /// The virtual address whose entry was not writable.
        vaddr: VirtAddr,
    },
    /// A load, store, or fetch used a misaligned or privilege-violating address.
    AddressError {
        /// The offending virtual address.
        vaddr: VirtAddr,
        /// `true` if the access was a store.
        is_store: bool,
    },
    /// A bus transaction reported failure during fetch.
    InstructionBusError,
    /// A bus transaction reported failure during a load or store.
    DataBusError,
    /// A `syscall` instruction executed.
    Syscall,
    /// A `break` instruction executed.
    Breakpoint,
    /// The decoder could not classify an opcode, or the opcode is architecturally reserved.
    ReservedInstruction,
    /// An instruction addressed a coprocessor whose `Status.CU` bit is clear.
    CoprocessorUnusable {
        /// Coprocessor number (0-3) that was unusable.
        unit: u8,
    },
    /// A signed arithmetic operation (ADD/ADDI/SUB) overflowed.
    Overflow,
    /// A `teq`/`tne`/`tlt`/... trap instruction's condition was met.
    Trap,
    /// An FPU operation raised an unmasked IEEE-754 exception.
    FloatingPoint,
    /// A load or store matched an active watchpoint.
    Watch,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt"),
            Self::TlbRefill { vaddr, is_store } => {
                write!(f, "TLB refill ({}) at {vaddr}", if *is_store { "store" } else { "load" })
            }
            Self::TlbInvalid { vaddr, is_store } => {
                write!(f, "TLB invalid ({}) at {vaddr}", if *is_store { "store" } else { "load" })
            }
            Self::TlbModified { vaddr } => write!(f, "TLB modified at {vaddr}"),
            Self::AddressError { vaddr, is_store } => write!(
                f,
                "address error ({}) at {vaddr}",
                if *is_store { "store" } else { "load" }
            ),
            Self::InstructionBusError => write!(f, "instruction bus error"),
            Self::DataBusError => write!(f, "data bus error"),
            Self::Syscall => write!(f, "syscall"),
            Self::Breakpoint => write!(f, "breakpoint"),
            Self::ReservedInstruction => write!(f, "reserved instruction"),
            Self::CoprocessorUnusable { unit } => write!(f, "coprocessor {unit} unusable"),
            Self::Overflow => write!(f, "integer overflow"),
            Self::Trap => write!(f, "trap"),
            Self::FloatingPoint => write!(f, "floating-point exception"),
            Self::Watch => write!(f, "watch"),
        }
    }
}

impl std::error::Error for Trap {}

impl Trap {
    /// Returns the `ExcCode` field value stored into `Cause` for this trap, per the R4300
    /// exception code table.
    #[must_use]
    pub const fn exc_code(self) -> u32 {
        match self {
            Self::Interrupt => 0,
            Self::TlbModified { .. } => 1,
            Self::TlbRefill { is_store: false, .. } | Self::TlbInvalid { is_store: false, .. } => 2,
            Self::TlbRefill { is_store: true, .. } | Self::TlbInvalid { is_store: true, .. } => 3,
            Self::AddressError { is_store: false, .. } => 4,
            Self::AddressError { is_store: true, .. } => 5,
            Self::InstructionBusError => 6,
            Self::DataBusError => 7,
            Self::Syscall => 8,
            Self::Breakpoint => 9,
            Self::ReservedInstruction => 10,
            Self::CoprocessorUnusable { .. } => 11,
            Self::Overflow => 12,
            Self::Trap => 13,
            Self::FloatingPoint => 15,
            Self::Watch => 23,
        }
    }

    /// `true` if this trap uses the dedicated TLB-refill vector rather than the general one.
    #[must_use]
    pub const fn uses_refill_vector(self) -> bool {
        matches!(self, Self::TlbRefill { .. })
    }
}

/// Host-side errors: configuration mistakes, I/O failures, or emulator-internal bugs.
///
/// Unlike [`Trap`], these are not part of the emulated machine's behavior and are always
/// returned up to the driver rather than delivered through the exception pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A device registration, config value, or TLB/cache geometry was invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Loading a ROM image or save-state failed at the filesystem boundary.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The caller asked for a capability this build does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An internal invariant was violated — this indicates a bug in the simulator itself,
    /// not in the guest program, and callers should treat it as fatal.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(String),
}

/// Result alias for host-side fallible operations.
pub type SimResult<T> = Result<T, SimError>;
