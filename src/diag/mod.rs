//! Diagnostic run controller
//!
//! [`Diagnostics`] owns the register window and the tick source and runs
//! the individual diagnostics in the order a session needs them:
//!
//! 1. [`Diagnostics::initialize`] identifies the chips and calibrates the
//!    WD33C93 clock, producing a [`DiagContext`] that is read-only
//!    afterwards and passed to everything that needs it.
//! 2. [`Diagnostics::run_battery`], [`Diagnostics::probe`],
//!    [`Diagnostics::timing`] and friends consume that context.
//!
//! Every step that clobbers WD33C93 configuration runs under a
//! [`SnapshotGuard`].

use embedded_hal::delay::DelayNs;

pub mod battery;
pub mod clock;
pub mod config;
pub mod dump;
pub mod probe;
pub mod report;
pub mod snapshot;
pub mod timing;

pub use battery::{BatteryReport, Mismatch, MismatchKind, Subtest, SubtestResult};
pub use clock::ClockEstimate;
pub use config::{CalibrationConfig, DiagConfig, ProbeConfig};
pub use dump::RawDump;
pub use probe::{AbortSignal, ProbeOutcome, ProbeReport};
pub use report::{LogReporter, Reporter};
pub use snapshot::SnapshotGuard;
pub use timing::{BusMode, SyncMode, WdTiming};

use crate::chip::wd33c93::{self, WdModel};
use crate::chip::{ChipIdentity, RamseyConfig, ramsey, sdmac};
use crate::error::{Error, Result};
use crate::hal::bus::{RegisterBus, RegisterIo};
use crate::hal::privilege::Privilege;
use crate::hal::timer::TickSource;
use crate::hal::window::{ExtAccess, Window};
use crate::internal::register::{self, wd};

/// Everything initialization learned, read-only for the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiagContext {
    /// Chip revisions
    pub identity: ChipIdentity,
    /// WD33C93 input clock
    pub clock: ClockEstimate,
    /// Ramsey control register, if the revision was recognized
    pub ramsey_config: Option<RamseyConfig>,
}

/// Result of [`Diagnostics::run_battery_until_failure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryRun {
    /// Passes completed, including a failing last one
    pub passes: u32,
    /// Report of the last pass
    pub last: BatteryReport,
}

/// Diagnostic session over one SDMAC / WD33C93 pair
#[derive(Debug)]
pub struct Diagnostics<IO, P, T> {
    window: Window<IO, P>,
    ticks: T,
    config: DiagConfig,
}

impl<IO, P, T> Diagnostics<IO, P, T>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource,
{
    /// Create a session
    ///
    /// The window's index port is taken from `config`.
    pub fn new(bus: RegisterBus<IO, P>, ticks: T, config: DiagConfig) -> Self {
        Self {
            window: Window::new(bus, config.index_port),
            ticks,
            config,
        }
    }

    /// Session configuration
    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    /// Direct access to the register window
    pub fn window(&mut self) -> &mut Window<IO, P> {
        &mut self.window
    }

    /// Release the window and tick source
    pub fn into_parts(self) -> (Window<IO, P>, T) {
        (self.window, self.ticks)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Identify the chips and calibrate the WD33C93 clock
    ///
    /// Unrecognized Ramsey or SDMAC revisions are logged and left as
    /// `None`. A WD33C93 that never completes a reset is identified as
    /// [`WdModel::Unknown`] and left uncalibrated. Bus faults end
    /// initialization.
    pub fn initialize(&mut self) -> Result<DiagContext> {
        let bus = self.window.bus();
        let ramsey = detected(ramsey::read_revision(bus))?;
        let ramsey_config = match ramsey {
            Some(rev) => Some(ramsey::read_config(bus, rev)?),
            None => None,
        };
        let dmac = detected(sdmac::probe_revision(bus))?;

        let command_timeout = self.config.command_timeout;
        let calibration = self.config.calibration;
        let mut snap = SnapshotGuard::save(&mut self.window)?;
        let wd = wd33c93::identify(&mut *snap, &mut self.ticks, command_timeout)?;
        let clock = if wd.model == WdModel::Unknown {
            ClockEstimate::INVALID
        } else {
            clock::calibrate(&mut *snap, &mut self.ticks, wd.model, &calibration, command_timeout)?
        };
        snap.restore()?;

        Ok(DiagContext {
            identity: ChipIdentity { ramsey, dmac, wd },
            clock,
            ramsey_config,
        })
    }

    /// Re-run the clock calibration
    pub fn calibrate(&mut self, ctx: &DiagContext) -> Result<ClockEstimate> {
        let command_timeout = self.config.command_timeout;
        let calibration = self.config.calibration;
        let mut snap = SnapshotGuard::save(&mut self.window)?;
        let clock = clock::calibrate(
            &mut *snap,
            &mut self.ticks,
            ctx.identity.wd.model,
            &calibration,
            command_timeout,
        )?;
        snap.restore()?;
        Ok(clock)
    }

    // =========================================================================
    // Tests
    // =========================================================================

    /// Run the register battery once
    pub fn run_battery<R: Reporter + ?Sized>(
        &mut self,
        ctx: &DiagContext,
        reporter: &mut R,
    ) -> Result<BatteryReport> {
        battery::run(&mut self.window, ctx.identity.dmac, self.config.flood_limit, reporter)
    }

    /// Repeat the battery until a pass fails or `limit` passes complete
    pub fn run_battery_until_failure<R: Reporter + ?Sized>(
        &mut self,
        ctx: &DiagContext,
        limit: u32,
        reporter: &mut R,
    ) -> Result<BatteryRun> {
        let mut passes = 0;
        loop {
            let last = self.run_battery(ctx, reporter)?;
            passes += 1;
            if !last.passed() || passes >= limit {
                if !last.passed() {
                    warn!("battery failed on pass {}", passes);
                }
                return Ok(BatteryRun { passes, last });
            }
        }
    }

    /// Probe the SCSI bus
    ///
    /// Cancellation returns the targets probed so far with
    /// [`ProbeReport::cancelled`] set; [`ProbeReport::completed`] turns it
    /// into [`IoError::Cancelled`](crate::IoError::Cancelled).
    pub fn probe<R, A>(&mut self, reporter: &mut R, abort: &mut A) -> Result<ProbeReport>
    where
        R: Reporter + ?Sized,
        A: AbortSignal + ?Sized,
    {
        let command_timeout = self.config.command_timeout;
        let probe_config = self.config.probe;
        let mut snap = SnapshotGuard::save(&mut self.window)?;
        let report = probe::probe(
            &mut *snap,
            &mut self.ticks,
            &probe_config,
            command_timeout,
            reporter,
            abort,
        );
        let restored = snap.restore();
        let report = report?;
        restored?;
        Ok(report)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Interpret the current WD33C93 timing registers
    ///
    /// `None` without a valid clock estimate.
    pub fn timing(&mut self, ctx: &DiagContext) -> Result<Option<WdTiming>> {
        let control = self.window.get(wd::CONTROL)?;
        let tperiod = self.window.get(wd::TPERIOD)?;
        let sync_tx = self.window.get(wd::SYNC_TX)?;
        Ok(WdTiming::derive(
            control,
            tperiod,
            sync_tx,
            ctx.clock,
            ctx.identity.wd.model,
            self.config.fsel_div,
        ))
    }

    /// Capture the SDMAC register block
    pub fn dump(&mut self) -> Result<RawDump> {
        Ok(RawDump::capture(&mut self.window)?)
    }

    /// Read a WD33C93 register, including extended ordinals
    pub fn get_register<R: Reporter + ?Sized>(
        &mut self,
        ordinal: u8,
        reporter: &mut R,
    ) -> Result<ExtAccess> {
        let timeout = self.config.command_timeout;
        let access = self.window.get_ext(&mut self.ticks, timeout, ordinal)?;
        if let Some(anomaly) = &access.anomaly {
            reporter.anomaly(anomaly);
        }
        Ok(access)
    }

    /// Write a WD33C93 register, including extended ordinals
    pub fn set_register<R: Reporter + ?Sized>(
        &mut self,
        ordinal: u8,
        value: u8,
        reporter: &mut R,
    ) -> Result<ExtAccess> {
        let timeout = self.config.command_timeout;
        let access = self.window.set_ext(&mut self.ticks, timeout, ordinal, value)?;
        if let Some(anomaly) = &access.anomaly {
            reporter.anomaly(anomaly);
        }
        Ok(access)
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Strobe the SDMAC peripheral reset line and wait for the WD33C93
    ///
    /// Returns the reset status, which also clears the reset interrupt.
    /// Configuration registers are restored afterwards.
    pub fn hard_reset<D: DelayNs>(&mut self, mut delay: D) -> Result<u8> {
        let command_timeout = self.config.command_timeout;
        let settle_us = self.config.reset_settle_us;
        let mut snap = SnapshotGuard::save(&mut self.window)?;

        let bus = snap.bus();
        let contr = bus.read_u8(register::sdmac::CONTR)? & !register::sdmac::CONTR_RESET;
        bus.write(register::sdmac::CONTR, (contr | register::sdmac::CONTR_RESET) as u32)?;
        bus.write(register::sdmac::CONTR, contr as u32)?;
        delay.delay_us(settle_us);

        snap.wait_aux(&mut self.ticks, command_timeout, |aux| aux & wd::AUX_INT != 0)?;
        let status = snap.get(wd::SCSI_STAT)?;
        info!("hard reset status {:#04x}", status);
        snap.restore()?;
        Ok(status)
    }
}

/// Treat an identification mismatch as "not recognized" but keep bus faults
fn detected<R>(result: Result<R>) -> Result<Option<R>> {
    match result {
        Ok(r) => Ok(Some(r)),
        Err(Error::Detect(e)) => {
            warn!("{}", e.as_str());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
