//! Clock Calibrator
//!
//! The WD33C93 input clock is not readable, but its selection timeout is
//! `TPERIOD * 80` input clocks (in thousands). Selecting a target that
//! cannot answer and timing the timeout against the host tick source gives
//! the clock:
//!
//! ```text
//! clock_kHz = TPERIOD * 80 * tick_rate / (elapsed_ticks - latency_ticks)
//! ```
//!
//! `latency_ticks` is the microcode dispatch latency of the identified
//! model.

use crate::chip::WdModel;
use crate::chip::wd33c93::soft_reset;
use crate::diag::config::CalibrationConfig;
use crate::error::{Error, IoError, Result};
use crate::hal::bus::RegisterIo;
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::Privilege;
use crate::hal::timer::{Deadline, TickSource, Timeout};
use crate::hal::window::Window;
use crate::internal::constants::TPERIOD_SCALE;
use crate::internal::register::{sdmac, wd};

/// WD33C93 input clock estimate in kHz; zero means not available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockEstimate(u32);

impl ClockEstimate {
    /// No estimate
    pub const INVALID: Self = Self(0);

    /// Wrap a known frequency
    pub const fn from_khz(khz: u32) -> Self {
        Self(khz)
    }

    /// Frequency, if calibration succeeded
    pub const fn khz(self) -> Option<u32> {
        if self.0 == 0 { None } else { Some(self.0) }
    }

    /// Whether calibration succeeded
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Estimate the WD33C93 input clock
///
/// Issues soft resets and a select; the caller must hold a register
/// snapshot. Everything between the first and last reset runs with
/// interrupts masked. Missing interrupts, a bus-fault status or a target
/// that answers all yield [`ClockEstimate::INVALID`]; only register access
/// failures are errors.
pub fn calibrate<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    model: WdModel,
    config: &CalibrationConfig,
    command_timeout: Timeout,
) -> Result<ClockEstimate>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    let _cs = InterruptGuard::acquire();

    match soft_reset(window, ticks, command_timeout) {
        Ok(0xFF) => {
            warn!("calibration: reset status reads as bus fault");
            return Ok(ClockEstimate::INVALID);
        }
        Ok(_) => {}
        Err(Error::Io(IoError::Timeout { last_status })) => {
            warn!("calibration: reset timed out, aux {:#04x}", last_status);
            return Ok(ClockEstimate::INVALID);
        }
        Err(e) => return Err(e),
    }

    let measured = measure(window, ticks, config);
    let settled = soft_reset(window, ticks, command_timeout);
    let elapsed = measured?;
    match settled {
        Ok(_) => {}
        Err(Error::Io(IoError::Timeout { last_status })) => {
            warn!("calibration: settling reset timed out, aux {:#04x}", last_status);
            return Ok(ClockEstimate::INVALID);
        }
        Err(e) => return Err(e),
    }

    let Some(elapsed) = elapsed else {
        return Ok(ClockEstimate::INVALID);
    };
    let latency = ticks.us_to_ticks(model.latency_us());
    let elapsed = elapsed.saturating_sub(latency);
    if elapsed == 0 {
        return Ok(ClockEstimate::INVALID);
    }
    let khz = config.tperiod as u64 * TPERIOD_SCALE as u64 * ticks.rate_hz() as u64 / elapsed as u64;
    let estimate = ClockEstimate(u32::try_from(khz).unwrap_or(u32::MAX));
    info!("WD33C93 clock {} kHz ({} ticks)", estimate.0, elapsed);
    Ok(estimate)
}

/// Time one deliberately failing selection; `None` if it did not time out
fn measure<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &CalibrationConfig,
) -> Result<Option<u32>>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    window.set(wd::SYNC_TX, 0)?;
    window.set(wd::TPERIOD, config.tperiod)?;
    window.set(wd::DST_ID, config.target & wd::OWN_ID_MASK)?;
    window.set(wd::LUN, config.lun & wd::LUN_MASK)?;

    let start = ticks.now();
    window.command(wd::CMD_SELECT_ATN)?;
    let mut deadline = Deadline::start(ticks, config.timeout);
    loop {
        let istr = window.bus().read_u8(sdmac::ISTR)?;
        if istr & sdmac::ISTR_INT_S != 0 {
            break;
        }
        if deadline.expired(ticks) {
            warn!("calibration: no interrupt, istr {:#04x}", istr);
            return Ok(None);
        }
    }
    let elapsed = ticks.now().wrapping_sub(start);

    let status = window.get(wd::SCSI_STAT)?;
    if status != wd::STAT_SEL_TIMEOUT {
        warn!("calibration: target {} answered, status {:#04x}", config.target, status);
        return Ok(None);
    }
    Ok(Some(elapsed))
}
