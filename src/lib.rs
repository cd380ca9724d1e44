//! Amiga 3000 SCSI Controller Diagnostics
//!
//! A `no_std`, `no_alloc` diagnostic library for the A3000 mainboard SCSI
//! path: the Ramsey memory controller, the SDMAC DMA engine and the WD33C93
//! SCSI controller that sits behind the SDMAC's indirect register window.
//!
//! # Architecture
//!
//! The crate is organized into three layers:
//!
//! 1. **HAL Layer** ([`hal`]): width-typed register bus, the indirect
//!    WD33C93 window, privilege elevation, tick-based deadlines
//! 2. **Chip Layer** ([`chip`]): revision identification for all three parts
//! 3. **Diagnostic Layer** ([`diag`]): clock calibration, the register test
//!    battery, the SCSI bus probe and the run controller [`Diagnostics`]
//!
//! Status and command codes are turned into text by [`decode`].
//!
//! # Host Capabilities
//!
//! The host provides:
//! - a [`RegisterIo`] implementation ([`MmioBus`] on real hardware)
//! - a [`Privilege`] implementation for supervisor-only registers
//! - a [`TickSource`] (the CIA EClock timer on real hardware)
//! - a `critical-section` implementation
//!
//! # Features
//!
//! - `defmt`: Log through defmt and derive `defmt::Format` on public types
//! - `log`: Log through the `log` facade
//!
//! # Example
//!
//! ```ignore
//! use a3000_sdmac::{DiagConfig, Diagnostics, LogReporter, MmioBus, RegisterBus};
//!
//! let io = unsafe { MmioBus::new() };
//! let bus = RegisterBus::new(io, supervisor);
//! let mut diag = Diagnostics::new(bus, eclock, DiagConfig::default());
//!
//! let ctx = diag.initialize()?;
//! let report = diag.run_battery(&ctx, &mut LogReporter)?;
//! let devices = diag.probe(&mut LogReporter, &mut || break_pressed())?;
//! devices.completed()?;
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

// =============================================================================
// Modules
// =============================================================================

// Logging shims; must come first so the macros are visible below
#[macro_use]
mod fmt;

pub mod chip;
pub mod decode;
pub mod diag;
pub mod error;
pub mod hal;

// Internal implementation details (pub(crate) only)
mod internal;

// Simulated hardware (only available during testing)
#[cfg(test)]
mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use chip::{ChipIdentity, DmacRevision, RamseyConfig, RamseyRevision, WdIdentity, WdModel};
pub use decode::{StatusClass, StatusDecode, command_name, decode_status};
pub use diag::{
    BatteryReport, BatteryRun, CalibrationConfig, ClockEstimate, DiagConfig, DiagContext,
    Diagnostics, LogReporter, ProbeConfig, ProbeOutcome, ProbeReport, RawDump, Reporter,
    WdTiming,
};
pub use error::{
    AccessError, AccessResult, DetectError, DetectResult, Error, IoError, IoResult, Result,
};
pub use hal::{MmioBus, Privilege, RegisterBus, RegisterIo, TickSource, Timeout, Window};

/// Register maps for direct access.
///
/// Most users should go through [`Diagnostics`]. These are exposed for
/// host tools that want to poke individual registers through a
/// [`RegisterBus`] or [`Window`].
pub mod registers {
    pub use crate::internal::register::{Access, Register, SHADOW_OFFSET, Width, ramsey, sdmac, wd};
}

/// Shared diagnostic constants.
///
/// Test patterns, timing constants and the defaults behind [`DiagConfig`].
pub mod constants {
    pub use crate::internal::constants::{
        // Clock
        DEFAULT_FSEL_DIV,
        INCLK_NTSC_KHZ,
        INCLK_PAL_KHZ,
        LATENCY_WD33C93_US,
        LATENCY_WD33C93A_US,
        LATENCY_WD33C93B_US,
        TPERIOD_SCALE,
        // Defaults
        DEFAULT_BYTE_TIMEOUT_TICKS,
        DEFAULT_CAL_LUN,
        DEFAULT_CAL_TARGET,
        DEFAULT_CAL_TPERIOD,
        DEFAULT_CMD_TIMEOUT_TICKS,
        DEFAULT_FLOOD_LIMIT,
        DEFAULT_OWN_ID,
        DEFAULT_POLL_BUDGET,
        DEFAULT_PROBE_TPERIOD,
        DEFAULT_SELECT_TIMEOUT_TICKS,
        HARD_RESET_SETTLE_US,
        MAX_SYNC_OFFSET,
        MICROCODE_MARKINGS,
        PROBE_BUFFER_LEN,
        // Patterns
        QUETAG_PATTERNS,
        TEST_PATTERNS,
    };
}
