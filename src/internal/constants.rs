//! Centralized Constants
//!
//! Single source of truth for the magic numbers used by the diagnostics.
//!
//! Hardware register bit definitions remain in their respective modules
//! (`register/sdmac.rs`, `register/wd.rs`, ...) as they are specific to
//! those chips.

// =============================================================================
// Test Patterns
// =============================================================================

/// Adversarial bit patterns written by every read/write test
pub const TEST_PATTERNS: [u32; 20] = [
    0x0000_0000,
    0xFFFF_FFFF,
    0xA5A5_A5A5,
    0x5A5A_5A5A,
    0xC3C3_C3C3,
    0x3C3C_3C3C,
    0xD2D2_D2D2,
    0x2D2D_2D2D,
    0x4B4B_4B4B,
    0xB4B4_B4B4,
    0xE1E1_E1E1,
    0x1E1E_1E1E,
    0x8787_8787,
    0x7878_7878,
    0xFFFF_0000,
    0x0000_FFFF,
    0xFF00_FF00,
    0x00FF_00FF,
    0xF0F0_F0F0,
    0x0F0F_0F0F,
];

/// Queue tag patterns used to tell the WD33C93B apart
pub const QUETAG_PATTERNS: [u8; 4] = [0x00, 0xFF, 0xA5, 0x5A];

// =============================================================================
// WD33C93 Timing
// =============================================================================

/// Timeout register scale: `ms = tperiod * 80 / clock_MHz`
pub const TPERIOD_SCALE: u32 = 80;

/// Input clock on NTSC machines (28.63636 MHz / 2), in kHz
pub const INCLK_NTSC_KHZ: u32 = 28_636 / 2;

/// Input clock on PAL machines (28.37516 MHz / 2), in kHz
pub const INCLK_PAL_KHZ: u32 = 28_375 / 2;

/// Frequency select divisor assumed for 12-15 MHz parts
pub const DEFAULT_FSEL_DIV: u32 = 3;

/// Largest synchronous offset the chip supports
pub const MAX_SYNC_OFFSET: u8 = 12;

/// Select/command dispatch latency of the WD33C93, in microseconds
pub const LATENCY_WD33C93_US: u32 = 40;

/// Select/command dispatch latency of the WD33C93A, in microseconds
pub const LATENCY_WD33C93A_US: u32 = 25;

/// Select/command dispatch latency of the WD33C93B, in microseconds
pub const LATENCY_WD33C93B_US: u32 = 15;

/// Microcode revision bytes with a known silicon marking
pub const MICROCODE_MARKINGS: [(u8, &str); 3] = [(0x09, "00-02"), (0x0B, "00-03"), (0x0D, "00-04")];

// =============================================================================
// Default Configuration
// =============================================================================

/// Default poll budget for a single wait
pub const DEFAULT_POLL_BUDGET: u32 = 100_000;

/// Default tick budget for command-in-progress / interrupt waits (about 100 ms)
pub const DEFAULT_CMD_TIMEOUT_TICKS: u32 = 70_938;

/// Default tick budget for a selection attempt (about 500 ms)
pub const DEFAULT_SELECT_TIMEOUT_TICKS: u32 = 354_690;

/// Default tick budget for one data byte (about 10 ms)
pub const DEFAULT_BYTE_TIMEOUT_TICKS: u32 = 7_094;

/// Consecutive mismatches before a test gives up
pub const DEFAULT_FLOOD_LIMIT: u32 = 8;

/// TPERIOD written for calibration (about 20 ms at 14 MHz)
pub const DEFAULT_CAL_TPERIOD: u8 = 4;

/// Target ID used to provoke a selection timeout
pub const DEFAULT_CAL_TARGET: u8 = 6;

/// LUN used to provoke a selection timeout
pub const DEFAULT_CAL_LUN: u8 = 7;

/// TPERIOD written for each probed target (about 250 ms at 14 MHz)
pub const DEFAULT_PROBE_TPERIOD: u8 = 44;

/// Initiator ID of the A3000 host adapter
pub const DEFAULT_OWN_ID: u8 = 7;

/// Settle time after a peripheral reset strobe
pub const HARD_RESET_SETTLE_US: u32 = 100;

/// Data phase buffer size for the probe
pub const PROBE_BUFFER_LEN: usize = 32;
