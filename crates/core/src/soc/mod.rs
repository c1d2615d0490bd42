//! Bus, devices, and the interrupt register that the CPU core talks to.

pub mod bus;
pub mod memory;
pub mod mi;
pub mod traits;
pub mod vi;

pub use bus::Bus;
pub use mi::Mi;
pub use traits::Device;
pub use vi::Vi;
