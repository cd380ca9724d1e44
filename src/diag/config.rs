//! Diagnostic run configuration
//!
//! Every field has a default suitable for an NTSC A3000 with the stock
//! EClock tick source; override with the `with_*` builder methods.

use crate::hal::timer::Timeout;
use crate::hal::window::IndexPort;
use crate::internal::constants::{
    DEFAULT_BYTE_TIMEOUT_TICKS, DEFAULT_CAL_LUN, DEFAULT_CAL_TARGET, DEFAULT_CAL_TPERIOD,
    DEFAULT_CMD_TIMEOUT_TICKS, DEFAULT_FLOOD_LIMIT, DEFAULT_FSEL_DIV, DEFAULT_OWN_ID,
    DEFAULT_POLL_BUDGET, DEFAULT_PROBE_TPERIOD, DEFAULT_SELECT_TIMEOUT_TICKS,
    HARD_RESET_SETTLE_US,
};

// =============================================================================
// Calibration
// =============================================================================

/// Clock calibration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationConfig {
    /// TPERIOD value loaded before the deliberate select
    pub tperiod: u8,
    /// Target ID that must not answer
    pub target: u8,
    /// LUN sent with the select
    pub lun: u8,
    /// Budget for the selection timeout to fire
    pub timeout: Timeout,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            tperiod: DEFAULT_CAL_TPERIOD,
            target: DEFAULT_CAL_TARGET,
            lun: DEFAULT_CAL_LUN,
            timeout: Timeout::new(DEFAULT_SELECT_TIMEOUT_TICKS, DEFAULT_POLL_BUDGET),
        }
    }
}

// =============================================================================
// Probe
// =============================================================================

/// SCSI bus probe parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProbeConfig {
    /// Host adapter ID, never probed
    pub own_id: u8,
    /// First target ID probed
    pub first_target: u8,
    /// Last target ID probed
    pub last_target: u8,
    /// LUN placed in the IDENTIFY message
    pub lun: u8,
    /// TPERIOD value loaded for each selection
    pub tperiod: u8,
    /// Budget for a selection to resolve
    pub select_timeout: Timeout,
    /// Budget for each data byte
    pub byte_timeout: Timeout,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            own_id: DEFAULT_OWN_ID,
            first_target: 0,
            last_target: 6,
            lun: 0,
            tperiod: DEFAULT_PROBE_TPERIOD,
            select_timeout: Timeout::new(DEFAULT_SELECT_TIMEOUT_TICKS, DEFAULT_POLL_BUDGET),
            byte_timeout: Timeout::new(DEFAULT_BYTE_TIMEOUT_TICKS, DEFAULT_POLL_BUDGET),
        }
    }
}

impl ProbeConfig {
    /// Target IDs to probe, skipping the host adapter
    pub fn targets(&self) -> impl Iterator<Item = u8> + use<> {
        let own_id = self.own_id;
        (self.first_target..=self.last_target.min(7)).filter(move |&id| id != own_id)
    }
}

// =============================================================================
// DiagConfig
// =============================================================================

/// Configuration for a diagnostic session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiagConfig {
    /// SDMAC port used to select WD33C93 registers
    pub index_port: IndexPort,
    /// Budget for command-in-progress and interrupt waits
    pub command_timeout: Timeout,
    /// Consecutive mismatches before a battery test gives up
    pub flood_limit: u32,
    /// WD33C93 frequency select divisor
    pub fsel_div: u32,
    /// Settle time after a peripheral reset strobe, in microseconds
    pub reset_settle_us: u32,
    /// Clock calibration
    pub calibration: CalibrationConfig,
    /// Bus probe
    pub probe: ProbeConfig,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            index_port: IndexPort::Byte,
            command_timeout: Timeout::new(DEFAULT_CMD_TIMEOUT_TICKS, DEFAULT_POLL_BUDGET),
            flood_limit: DEFAULT_FLOOD_LIMIT,
            fsel_div: DEFAULT_FSEL_DIV,
            reset_settle_us: HARD_RESET_SETTLE_US,
            calibration: CalibrationConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl DiagConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the index port
    #[must_use]
    pub fn with_index_port(mut self, port: IndexPort) -> Self {
        self.index_port = port;
        self
    }

    /// Set the command timeout
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Timeout) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the battery flood limit (minimum 1)
    #[must_use]
    pub fn with_flood_limit(mut self, limit: u32) -> Self {
        self.flood_limit = limit.max(1);
        self
    }

    /// Set the frequency select divisor
    #[must_use]
    pub fn with_fsel_div(mut self, div: u32) -> Self {
        self.fsel_div = div;
        self
    }

    /// Set the hard reset settle time
    #[must_use]
    pub fn with_reset_settle_us(mut self, us: u32) -> Self {
        self.reset_settle_us = us;
        self
    }

    /// Set the calibration parameters
    #[must_use]
    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    /// Set the probe parameters
    #[must_use]
    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }
}
