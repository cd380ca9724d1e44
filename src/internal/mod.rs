//! Internal implementation details
//!
//! Raw register maps and shared constants. Nothing here is part of the
//! public API; selected items are re-exported through [`crate::registers`]
//! and [`crate::constants`].

pub mod constants;
pub mod register;
