//! WD33C93 model identification
//!
//! Four families share the register map: WD33C93, WD33C93A (and the
//! AM33C93A), and WD33C93B. The sequence is:
//!
//! 1. Baseline invariants every family satisfies. Any failure means no
//!    recognizable chip is present and the remaining steps are skipped.
//! 2. Soft reset with EAF set in OWN_ID. Only the enhanced parts report
//!    status 0x01 ("reset with advanced features").
//! 3. On enhanced parts, QUETAG only holds all four test patterns on the
//!    WD33C93B, and CONTROL must not move while it is exercised.
//! 4. On enhanced parts, a reset with EAF and RAF leaves the microcode
//!    revision in CDB1.
//!
//! OWN_ID and QUETAG are restored here; the caller's register snapshot
//! covers the rest of the state a reset clobbers.

use crate::error::{Error, IoError, Result};
use crate::hal::bus::RegisterIo;
use crate::hal::privilege::Privilege;
use crate::hal::timer::{TickSource, Timeout};
use crate::hal::window::Window;
use crate::internal::constants::{
    LATENCY_WD33C93A_US, LATENCY_WD33C93B_US, LATENCY_WD33C93_US, MICROCODE_MARKINGS,
    QUETAG_PATTERNS,
};
use crate::internal::register::wd;

// =============================================================================
// Types
// =============================================================================

/// SCSI controller family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WdModel {
    /// No known signature matched
    Unknown,
    /// Original WD33C93
    Wd33c93,
    /// WD33C93A or AM33C93A
    Wd33c93a,
    /// WD33C93B
    Wd33c93b,
}

impl WdModel {
    /// Part name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Wd33c93 => "WD33C93",
            Self::Wd33c93a => "WD33C93A",
            Self::Wd33c93b => "WD33C93B",
        }
    }

    /// Parts that accept the advanced feature bits
    pub const fn is_enhanced(self) -> bool {
        matches!(self, Self::Wd33c93a | Self::Wd33c93b)
    }

    /// Parts that implement QUETAG and the extended register commands
    pub const fn has_extended_registers(self) -> bool {
        matches!(self, Self::Wd33c93b)
    }

    /// Microcode dispatch latency for a select command
    pub const fn latency_us(self) -> u32 {
        match self {
            Self::Unknown | Self::Wd33c93 => LATENCY_WD33C93_US,
            Self::Wd33c93a => LATENCY_WD33C93A_US,
            Self::Wd33c93b => LATENCY_WD33C93B_US,
        }
    }
}

/// Microcode revision byte reported after a fully advanced reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Microcode {
    /// Byte read from CDB1
    pub raw: u8,
    /// Silicon marking, only for bytes seen on real parts
    pub marking: Option<&'static str>,
}

impl Microcode {
    /// Interpret the CDB1 byte; zero means the part did not report one
    pub fn from_raw(raw: u8) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        let marking = MICROCODE_MARKINGS
            .iter()
            .find(|(code, _)| *code == raw)
            .map(|(_, marking)| *marking);
        Some(Self { raw, marking })
    }
}

/// Identification checks that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DetectFailures(u16);

impl DetectFailures {
    /// Register 0x1E did not read 0xFF
    pub const INVALID_REG: Self = Self(1 << 0);
    /// AUXST reserved bits set
    pub const AUX_RESERVED: Self = Self(1 << 1);
    /// LUN reserved bits set
    pub const LUN_RESERVED: Self = Self(1 << 2);
    /// Command phase not a legal value
    pub const CMD_PHASE: Self = Self(1 << 3);
    /// SCSI status class not a legal value
    pub const STATUS_CLASS: Self = Self(1 << 4);
    /// Register 0x1E accepted a write
    pub const INVALID_WRITABLE: Self = Self(1 << 5);
    /// AUXST accepted a write
    pub const AUX_WRITABLE: Self = Self(1 << 6);
    /// AUXST changed across an unrelated register write
    pub const AUX_MIRROR: Self = Self(1 << 7);
    /// Soft reset never raised its interrupt
    pub const RESET_TIMEOUT: Self = Self(1 << 8);
    /// Soft reset reported an unexpected status
    pub const RESET_STATUS: Self = Self(1 << 9);

    const NAMES: [(Self, &'static str); 10] = [
        (Self::INVALID_REG, "INVALID"),
        (Self::AUX_RESERVED, "AUXST"),
        (Self::LUN_RESERVED, "LUN"),
        (Self::CMD_PHASE, "CMDPHASE"),
        (Self::STATUS_CLASS, "STAT"),
        (Self::INVALID_WRITABLE, "INVALID-WRITABLE"),
        (Self::AUX_WRITABLE, "AUXST-WRITABLE"),
        (Self::AUX_MIRROR, "AUXST-MIRROR"),
        (Self::RESET_TIMEOUT, "RESET-TIMEOUT"),
        (Self::RESET_STATUS, "RESET-STATUS"),
    ];

    /// No failures
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True if no check failed
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Record `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Short names of the failed checks
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl core::ops::BitOr for DetectFailures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of WD33C93 identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WdIdentity {
    /// Family
    pub model: WdModel,
    /// Microcode revision, enhanced parts only
    pub microcode: Option<Microcode>,
    /// Checks that failed; non-empty only for [`WdModel::Unknown`]
    pub failures: DetectFailures,
}

impl WdIdentity {
    const fn unknown(failures: DetectFailures) -> Self {
        Self {
            model: WdModel::Unknown,
            microcode: None,
            failures,
        }
    }

    const fn model(model: WdModel) -> Self {
        Self {
            model,
            microcode: None,
            failures: DetectFailures::empty(),
        }
    }
}

// =============================================================================
// Soft reset
// =============================================================================

/// Issue a soft reset and return the resulting status
///
/// Reading the status clears the reset interrupt.
pub fn soft_reset<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    timeout: Timeout,
) -> Result<u8>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    window.command(wd::CMD_RESET)?;
    window.wait_aux(ticks, timeout, |aux| aux & wd::AUX_INT != 0)?;
    Ok(window.get(wd::SCSI_STAT)?)
}

// =============================================================================
// Identification
// =============================================================================

/// Check the invariants every WD33C93 family member satisfies
pub fn check_baseline<IO: RegisterIo, P: Privilege>(
    window: &mut Window<IO, P>,
) -> Result<DetectFailures> {
    let mut failures = DetectFailures::empty();

    if window.get(wd::INVALID)? != wd::INVALID_SENTINEL {
        failures.insert(DetectFailures::INVALID_REG);
    }
    window.set(wd::INVALID, 0xA5)?;
    if window.get(wd::INVALID)? != wd::INVALID_SENTINEL {
        failures.insert(DetectFailures::INVALID_WRITABLE);
    }

    let aux = window.aux_status()?;
    if aux & wd::AUX_RESERVED != 0 {
        failures.insert(DetectFailures::AUX_RESERVED);
    }
    window.set(wd::AUXST, !aux)?;
    if window.aux_status()? != aux {
        failures.insert(DetectFailures::AUX_WRITABLE);
    }
    let laddr0 = window.get(wd::LADDR0)?;
    window.set(wd::LADDR0, !laddr0)?;
    let mirrored = window.aux_status()?;
    window.set(wd::LADDR0, laddr0)?;
    if mirrored != aux {
        failures.insert(DetectFailures::AUX_MIRROR);
    }

    if window.get(wd::LUN)? & wd::LUN_RESERVED != 0 {
        failures.insert(DetectFailures::LUN_RESERVED);
    }
    let phase = window.get(wd::CMDPHASE)?;
    if !wd::VALID_CMD_PHASES.contains(&phase) {
        failures.insert(DetectFailures::CMD_PHASE);
    }
    if !matches!(window.get(wd::SCSI_STAT)? >> 4, 0 | 1 | 2 | 4 | 8) {
        failures.insert(DetectFailures::STATUS_CLASS);
    }
    Ok(failures)
}

/// Identify the WD33C93 family member and its microcode revision
///
/// Soft resets are issued; the caller must hold a register snapshot.
/// OWN_ID is restored and a final plain reset is issued before returning.
/// A reset that never raises its interrupt, including the final one,
/// classifies the chip as [`WdModel::Unknown`] with `RESET_TIMEOUT` set.
pub fn identify<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    timeout: Timeout,
) -> Result<WdIdentity>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    let failures = check_baseline(window)?;
    if !failures.is_empty() {
        warn!("WD33C93 not detected, failed checks {:#06x}", failures.bits());
        return Ok(WdIdentity::unknown(failures));
    }

    let own_id = window.get(wd::OWN_ID)?;
    let identity = classify(window, ticks, timeout, own_id);
    let restored = window
        .set(wd::OWN_ID, own_id)
        .map_err(Error::from)
        .and_then(|()| reset_status(window, ticks, timeout));
    let mut identity = identity?;
    if let Err(failure) = restored? {
        identity = WdIdentity::unknown(identity.failures | failure);
    }
    if identity.model == WdModel::Unknown {
        warn!("WD33C93 not identified, failed checks {:#06x}", identity.failures.bits());
        return Ok(identity);
    }

    match identity.microcode {
        Some(m) => info!("{} microcode {:#04x}", identity.model.name(), m.raw),
        None => info!("{}", identity.model.name()),
    }
    Ok(identity)
}

fn classify<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    timeout: Timeout,
    own_id: u8,
) -> Result<WdIdentity>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    let base = own_id & !(wd::OWN_ID_EAF | wd::OWN_ID_RAF);

    window.set(wd::OWN_ID, base | wd::OWN_ID_EAF)?;
    let status = match reset_status(window, ticks, timeout)? {
        Ok(status) => status,
        Err(failure) => return Ok(WdIdentity::unknown(failure)),
    };
    match status {
        wd::STAT_RESET_EAF => {}
        wd::STAT_RESET => return Ok(WdIdentity::model(WdModel::Wd33c93)),
        other => {
            warn!("reset with EAF returned status {:#04x}", other);
            return Ok(WdIdentity::unknown(DetectFailures::RESET_STATUS));
        }
    }

    let model = if quetag_persists(window)? {
        WdModel::Wd33c93b
    } else {
        WdModel::Wd33c93a
    };

    window.set(wd::OWN_ID, base | wd::OWN_ID_EAF | wd::OWN_ID_RAF)?;
    let microcode = match reset_status(window, ticks, timeout)? {
        Ok(wd::STAT_RESET_EAF) => Microcode::from_raw(window.get(wd::CDB1)?),
        Ok(other) => {
            debug!("fully advanced reset returned status {:#04x}", other);
            None
        }
        Err(_) => None,
    };

    Ok(WdIdentity {
        model,
        microcode,
        failures: DetectFailures::empty(),
    })
}

/// Soft reset where a missing interrupt is a detection failure, not an error
fn reset_status<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    timeout: Timeout,
) -> Result<core::result::Result<u8, DetectFailures>>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    match soft_reset(window, ticks, timeout) {
        Ok(status) => Ok(Ok(status)),
        Err(Error::Io(IoError::Timeout { last_status })) => {
            warn!("soft reset timed out, aux {:#04x}", last_status);
            Ok(Err(DetectFailures::RESET_TIMEOUT))
        }
        Err(e) => Err(e),
    }
}

/// True if QUETAG holds every pattern while CONTROL stays put
fn quetag_persists<IO: RegisterIo, P: Privilege>(window: &mut Window<IO, P>) -> Result<bool> {
    let control = window.get(wd::CONTROL)?;
    let saved = window.get(wd::QUETAG)?;

    let mut persists = true;
    for pattern in QUETAG_PATTERNS {
        window.set(wd::QUETAG, pattern)?;
        let read = window.get(wd::QUETAG)?;
        if window.get(wd::CONTROL)? != control || read != pattern {
            persists = false;
            break;
        }
    }
    window.set(wd::QUETAG, saved)?;
    Ok(persists)
}
