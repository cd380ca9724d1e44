//! WD33C93 timing interpretation
//!
//! Turns CONTROL, TPERIOD and SYNC_TX into human units. Everything here
//! depends on the calibrated input clock and is withheld without one.

use crate::chip::WdModel;
use crate::diag::clock::ClockEstimate;
use crate::internal::constants::{MAX_SYNC_OFFSET, TPERIOD_SCALE};
use crate::internal::register::wd;

/// Data transfer mode, CONTROL bits 7:5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusMode {
    /// Polled I/O through the data register
    Polled,
    /// Burst DMA
    Burst,
    /// WD bus mode
    WdBus,
    /// Single byte DMA
    Dma,
    /// Reserved encoding
    Unknown(u8),
}

impl BusMode {
    /// Decode CONTROL
    pub const fn from_control(control: u8) -> Self {
        match control >> wd::CONTROL_DM_SHIFT {
            0 => Self::Polled,
            1 => Self::Burst,
            2 => Self::WdBus,
            4 => Self::Dma,
            other => Self::Unknown(other),
        }
    }

    /// Mode name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Polled => "Polled Mode",
            Self::Burst => "Burst Mode",
            Self::WdBus => "WD Bus Mode",
            Self::Dma => "DMA Mode",
            Self::Unknown(_) => "Unknown Bus Mode",
        }
    }
}

/// Negotiated transfer mode from SYNC_TX
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncMode {
    /// Offset zero
    Async,
    /// Synchronous transfers
    Sync {
        /// REQ/ACK offset
        offset: u8,
        /// False when the offset exceeds what the chip supports
        offset_valid: bool,
        /// Transfer frequency in kHz
        khz: u32,
    },
}

/// Interpreted WD33C93 timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WdTiming {
    /// Data transfer mode
    pub bus_mode: BusMode,
    /// Selection timeout in milliseconds
    pub select_timeout_ms: u32,
    /// Transfer mode
    pub sync: SyncMode,
}

impl WdTiming {
    /// Interpret raw register values
    ///
    /// Returns `None` if `clock` is not a valid estimate.
    pub fn derive(
        control: u8,
        tperiod: u8,
        sync_tx: u8,
        clock: ClockEstimate,
        model: WdModel,
        fsel_div: u32,
    ) -> Option<Self> {
        let clock_khz = clock.khz()?;
        let select_timeout_ms = tperiod as u32 * TPERIOD_SCALE * 1000 / clock_khz;

        let offset = sync_tx & wd::SYNC_OFFSET_MASK;
        let sync = if offset == 0 {
            SyncMode::Async
        } else {
            let tcycles = match (sync_tx >> wd::SYNC_PERIOD_SHIFT) & 0x7 {
                0 | 1 => 8,
                n => n as u32,
            };
            let (mul, div) = if model == WdModel::Wd33c93b && fsel_div == 4 {
                (1 + u32::from(sync_tx & wd::SYNC_FSS != 0), 2)
            } else {
                (2, fsel_div.max(1))
            };
            SyncMode::Sync {
                offset,
                offset_valid: offset <= MAX_SYNC_OFFSET,
                khz: mul * clock_khz / div / tcycles,
            }
        };

        Some(Self {
            bus_mode: BusMode::from_control(control),
            select_timeout_ms,
            sync,
        })
    }
}
