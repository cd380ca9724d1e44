//! Hardware Abstraction Layer
//!
//! The primitives every diagnostic is built from.
//!
//! # Modules
//!
//! - [`bus`]: width-typed register access with bus-fault reporting
//! - [`critical`]: nestable interrupt masking
//! - [`privilege`]: supervisor-state elevation
//! - [`timer`]: tick source and bounded waits
//! - [`window`]: indirect access to WD33C93 registers
//!
//! # Host Integration
//!
//! The host supplies three capabilities: a `critical-section`
//! implementation, a [`Privilege`] implementation and a [`TickSource`].
//! Fixed delays use `embedded_hal::delay::DelayNs` directly.

pub mod bus;
pub mod critical;
pub mod privilege;
pub mod timer;
pub mod window;

// Re-export commonly used types
pub use bus::{MmioBus, RegisterBus, RegisterIo, signal_bus_fault};
pub use critical::InterruptGuard;
pub use privilege::{Privilege, Supervisor};
pub use timer::{Deadline, TickSource, Timeout};
pub use window::{ExtAccess, IndexPort, ProtocolAnomaly, Window};
