//! Ramsey memory controller identification and configuration decode

use crate::error::{DetectError, DetectResult, Result};
use crate::hal::bus::{RegisterBus, RegisterIo};
use crate::hal::privilege::Privilege;
use crate::internal::register::ramsey;

/// Ramsey revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamseyRevision {
    /// Ramsey-01
    Rev1,
    /// Ramsey-04
    Rev4,
    /// Ramsey-07
    Rev7,
}

impl RamseyRevision {
    /// Map the version register to a revision
    pub const fn from_version(raw: u8) -> DetectResult<Self> {
        match raw {
            ramsey::VERSION_REV1 => Ok(Self::Rev1),
            ramsey::VERSION_REV4 => Ok(Self::Rev4),
            ramsey::VERSION_REV7 => Ok(Self::Rev7),
            _ => Err(DetectError::Unrecognized { raw }),
        }
    }

    /// Revision number as printed on the part
    pub const fn number(self) -> u8 {
        match self {
            Self::Rev1 => 1,
            Self::Rev4 => 4,
            Self::Rev7 => 7,
        }
    }
}

/// DRAM organisation selected in the control register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DramType {
    /// 1M x 4
    Dram1Mx4,
    /// 256K x 4; `skip` is only reported by Ramsey-07
    Dram256Kx4 {
        /// Skip mode
        skip: bool,
    },
    /// 1M x 1
    Dram1Mx1,
}

/// DRAM refresh interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Refresh {
    /// Every 154 clocks
    Clocks154,
    /// Every 238 clocks
    Clocks238,
    /// Every 380 clocks
    Clocks380,
    /// Refresh disabled
    Disabled,
}

impl Refresh {
    /// Interval in clocks, `None` when disabled
    pub const fn clocks(self) -> Option<u16> {
        match self {
            Self::Clocks154 => Some(154),
            Self::Clocks238 => Some(238),
            Self::Clocks380 => Some(380),
            Self::Disabled => None,
        }
    }
}

/// Decoded Ramsey control register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RamseyConfig {
    /// Raw register value
    pub raw: u8,
    /// Page mode
    pub page_mode: bool,
    /// Burst mode
    pub burst_mode: bool,
    /// Wrap
    pub wrap: bool,
    /// DRAM organisation
    pub dram: DramType,
    /// Refresh interval
    pub refresh: Refresh,
}

impl RamseyConfig {
    /// Decode a control register value for the given revision
    pub const fn decode(raw: u8, revision: RamseyRevision) -> Self {
        let dram = if raw & ramsey::CTRL_1MX4 != 0 {
            DramType::Dram1Mx4
        } else if matches!(revision, RamseyRevision::Rev7) {
            DramType::Dram256Kx4 {
                skip: raw & ramsey::CTRL_256K_SKIP != 0,
            }
        } else if raw & ramsey::CTRL_256K_SKIP != 0 {
            DramType::Dram256Kx4 { skip: false }
        } else {
            DramType::Dram1Mx1
        };
        let refresh = match (raw >> ramsey::CTRL_REFRESH_SHIFT) & ramsey::CTRL_REFRESH_MASK {
            0 => Refresh::Clocks154,
            1 => Refresh::Clocks238,
            2 => Refresh::Clocks380,
            _ => Refresh::Disabled,
        };
        Self {
            raw,
            page_mode: raw & ramsey::CTRL_PAGE != 0,
            burst_mode: raw & ramsey::CTRL_BURST != 0,
            wrap: raw & ramsey::CTRL_WRAP != 0,
            dram,
            refresh,
        }
    }

    /// Page and burst mode only work with static column DRAM
    pub const fn static_column_required(&self) -> bool {
        self.page_mode || self.burst_mode
    }
}

/// Read and classify the Ramsey version register
pub fn read_revision<IO: RegisterIo, P: Privilege>(
    bus: &mut RegisterBus<IO, P>,
) -> Result<RamseyRevision> {
    let raw = bus.read_u8(ramsey::VERSION)?;
    let revision = RamseyRevision::from_version(raw)?;
    info!("Ramsey-0{} ({:#04x})", revision.number(), raw);
    Ok(revision)
}

/// Read and decode the Ramsey control register
pub fn read_config<IO: RegisterIo, P: Privilege>(
    bus: &mut RegisterBus<IO, P>,
    revision: RamseyRevision,
) -> Result<RamseyConfig> {
    let raw = bus.read_u8(ramsey::CTRL)?;
    debug!("Ramsey control {:#04x}", raw);
    Ok(RamseyConfig::decode(raw, revision))
}
