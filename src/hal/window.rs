//! Indirect Register Window
//!
//! The WD33C93 is reached through two SDMAC ports: SASR selects a register
//! ordinal and SCMD carries its data. The selected ordinal is shared state
//! (the SCSI interrupt handler uses it too), so every access saves the
//! current index, selects the target, performs the data access and puts the
//! index back, all with interrupts masked.
//!
//! The WD33C93 auto-increments the selected ordinal after each data access
//! (except for AUXST, CMD and DATA), which [`Window::set24`] relies on.
//!
//! Ordinals at and above 0x40 live inside the chip and are only reachable
//! with the GET/SET REGISTER pseudo commands; see [`Window::get_ext`].

use crate::error::{AccessResult, IoError, Result};
use crate::hal::bus::{RegisterBus, RegisterIo};
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::Privilege;
use crate::hal::timer::{Deadline, TickSource, Timeout};
use crate::internal::register::{sdmac, wd};

// =============================================================================
// Types
// =============================================================================

/// SDMAC port used to write the WD33C93 index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndexPort {
    /// Byte write at SASR_B2
    #[default]
    Byte,
    /// Longword write at SASRW, for 68040 cards that cannot issue byte
    /// cycles to the SDMAC
    Long,
}

/// Extended register access whose completion status was not the command echo
///
/// The value returned alongside is best effort; the chip may be in an
/// indeterminate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolAnomaly {
    /// Extended ordinal being accessed
    pub ordinal: u8,
    /// Status the command should have produced
    pub expected: u8,
    /// Status actually read
    pub status: u8,
    /// The command never raised its interrupt within budget
    pub timed_out: bool,
}

/// Result of an extended register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtAccess {
    /// Register value (read) or value written (set)
    pub value: u8,
    /// Set when the chip did not confirm the command
    pub anomaly: Option<ProtocolAnomaly>,
}

impl ExtAccess {
    /// Whether the chip confirmed the command
    pub const fn is_clean(&self) -> bool {
        self.anomaly.is_none()
    }
}

// =============================================================================
// Window
// =============================================================================

/// Access to WD33C93 registers through the SDMAC
#[derive(Debug)]
pub struct Window<IO, P> {
    bus: RegisterBus<IO, P>,
    port: IndexPort,
    snapshot_active: bool,
}

impl<IO: RegisterIo, P: Privilege> Window<IO, P> {
    /// Create a window over the register bus
    pub fn new(bus: RegisterBus<IO, P>, port: IndexPort) -> Self {
        Self {
            bus,
            port,
            snapshot_active: false,
        }
    }

    /// Currently selected WD33C93 ordinal
    pub fn index(&mut self) -> AccessResult<u8> {
        self.bus.read_u8(sdmac::SASR_B)
    }

    fn select(bus: &mut RegisterBus<IO, P>, port: IndexPort, ordinal: u8) -> AccessResult<()> {
        match port {
            IndexPort::Byte => bus.write(sdmac::SASR_B2, ordinal as u32),
            IndexPort::Long => bus.write(sdmac::SASRW, ordinal as u32),
        }
    }

    /// Select `ordinal` without saving the previous index
    pub fn select_index(&mut self, ordinal: u8) -> AccessResult<()> {
        Self::select(&mut self.bus, self.port, ordinal)
    }

    /// Save the index, select `ordinal`, run `f`, restore the index
    fn with_index<R>(
        &mut self,
        ordinal: u8,
        f: impl FnOnce(&mut RegisterBus<IO, P>) -> AccessResult<R>,
    ) -> AccessResult<R> {
        let _cs = InterruptGuard::acquire();
        let saved = self.bus.read_u8(sdmac::SASR_B)?;
        Self::select(&mut self.bus, self.port, ordinal)?;
        let result = f(&mut self.bus);
        let restored = Self::select(&mut self.bus, self.port, saved);
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Read a directly addressable register
    pub fn get(&mut self, ordinal: u8) -> AccessResult<u8> {
        self.with_index(ordinal, |bus| bus.read_u8(sdmac::SCMD))
    }

    /// Write a directly addressable register
    pub fn set(&mut self, ordinal: u8, value: u8) -> AccessResult<()> {
        self.with_index(ordinal, |bus| bus.write(sdmac::SCMD, value as u32))
    }

    /// Write a 24-bit value MSB first into three consecutive registers
    pub fn set24(&mut self, ordinal: u8, value: u32) -> AccessResult<()> {
        self.with_index(ordinal, |bus| {
            bus.write(sdmac::SCMD, (value >> 16) & 0xFF)?;
            bus.write(sdmac::SCMD, (value >> 8) & 0xFF)?;
            bus.write(sdmac::SCMD, value & 0xFF)
        })
    }

    /// Read a 24-bit value MSB first from three consecutive registers
    pub fn get24(&mut self, ordinal: u8) -> AccessResult<u32> {
        self.with_index(ordinal, |bus| {
            let high = bus.read_u8(sdmac::SCMD)?;
            let mid = bus.read_u8(sdmac::SCMD)?;
            let low = bus.read_u8(sdmac::SCMD)?;
            Ok(u32::from_be_bytes([0, high, mid, low]))
        })
    }

    /// Write a sequence of bytes into consecutive registers
    pub fn set_block(&mut self, ordinal: u8, values: &[u8]) -> AccessResult<()> {
        self.with_index(ordinal, |bus| {
            values
                .iter()
                .try_for_each(|&v| bus.write(sdmac::SCMD, v as u32))
        })
    }

    /// Auxiliary status
    pub fn aux_status(&mut self) -> AccessResult<u8> {
        self.get(wd::AUXST)
    }

    /// Issue a WD33C93 command
    pub fn command(&mut self, cmd: u8) -> AccessResult<()> {
        self.set(wd::CMD, cmd)
    }

    /// Poll AUXST until `done` accepts it
    ///
    /// On expiry returns [`IoError::Timeout`] carrying the last status seen.
    pub fn wait_aux<T: TickSource + ?Sized>(
        &mut self,
        ticks: &mut T,
        timeout: Timeout,
        done: impl Fn(u8) -> bool,
    ) -> Result<u8> {
        let mut deadline = Deadline::start(ticks, timeout);
        loop {
            let aux = self.aux_status()?;
            if done(aux) {
                return Ok(aux);
            }
            if deadline.expired(ticks) {
                return Err(IoError::Timeout { last_status: aux }.into());
            }
        }
    }

    // =========================================================================
    // Extended registers
    // =========================================================================

    /// Read an internal register
    ///
    /// Ordinals up to 0x1F are read directly. Higher ordinals are copied into
    /// CDB2 by the GET REGISTER command; CDB1 and CDB2 are restored after.
    pub fn get_ext<T: TickSource + ?Sized>(
        &mut self,
        ticks: &mut T,
        timeout: Timeout,
        ordinal: u8,
    ) -> AccessResult<ExtAccess> {
        if ordinal <= wd::LAST_DIRECT {
            return self.get(ordinal).map(|value| ExtAccess { value, anomaly: None });
        }
        self.ext_command(ticks, timeout, wd::CMD_GET_REGISTER, ordinal, None)
    }

    /// Write an internal register
    ///
    /// Ordinals up to 0x1F are written directly. Higher ordinals are loaded
    /// from CDB2 by the SET REGISTER command; CDB1 and CDB2 are restored after.
    pub fn set_ext<T: TickSource + ?Sized>(
        &mut self,
        ticks: &mut T,
        timeout: Timeout,
        ordinal: u8,
        value: u8,
    ) -> AccessResult<ExtAccess> {
        if ordinal <= wd::LAST_DIRECT {
            return self.set(ordinal, value).map(|()| ExtAccess { value, anomaly: None });
        }
        self.ext_command(ticks, timeout, wd::CMD_SET_REGISTER, ordinal, Some(value))
    }

    fn ext_command<T: TickSource + ?Sized>(
        &mut self,
        ticks: &mut T,
        timeout: Timeout,
        opcode: u8,
        ordinal: u8,
        value: Option<u8>,
    ) -> AccessResult<ExtAccess> {
        let _cs = InterruptGuard::acquire();
        let cdb1 = self.get(wd::CDB1)?;
        let cdb2 = self.get(wd::CDB2)?;

        let outcome = self.run_ext(ticks, timeout, opcode, ordinal, value);

        let restore1 = self.set(wd::CDB1, cdb1);
        let restore2 = self.set(wd::CDB2, cdb2);
        let (result, status, completed) = outcome?;
        restore1?;
        restore2?;

        let anomaly = (!completed || status != opcode).then_some(ProtocolAnomaly {
            ordinal,
            expected: opcode,
            status,
            timed_out: !completed,
        });
        if let Some(a) = anomaly {
            warn!(
                "extended register {:#04x}: status {:#04x}, expected {:#04x}",
                a.ordinal,
                a.status,
                a.expected
            );
        }
        Ok(ExtAccess {
            value: result,
            anomaly,
        })
    }

    /// Returns (value, status, interrupt seen)
    fn run_ext<T: TickSource + ?Sized>(
        &mut self,
        ticks: &mut T,
        timeout: Timeout,
        opcode: u8,
        ordinal: u8,
        value: Option<u8>,
    ) -> AccessResult<(u8, u8, bool)> {
        self.set(wd::CDB1, ordinal)?;
        if let Some(v) = value {
            self.set(wd::CDB2, v)?;
        }
        self.command(opcode)?;

        let completed = match self.wait_aux(ticks, timeout, |aux| aux & wd::AUX_INT != 0) {
            Ok(_) => true,
            Err(crate::error::Error::Access(e)) => return Err(e),
            Err(_) => false,
        };
        let status = self.get(wd::SCSI_STAT)?;
        let result = match value {
            Some(v) => v,
            None => self.get(wd::CDB2)?,
        };
        Ok((result, status, completed))
    }

    // =========================================================================
    // Snapshot bookkeeping
    // =========================================================================

    /// Mark a snapshot outstanding; false if one already is
    pub(crate) fn claim_snapshot(&mut self) -> bool {
        !core::mem::replace(&mut self.snapshot_active, true)
    }

    pub(crate) fn release_snapshot(&mut self) {
        self.snapshot_active = false;
    }

    /// Whether a register snapshot is outstanding
    pub fn snapshot_active(&self) -> bool {
        self.snapshot_active
    }

    /// Underlying register bus
    pub fn bus(&mut self) -> &mut RegisterBus<IO, P> {
        &mut self.bus
    }

    /// Index port in use
    pub fn port(&self) -> IndexPort {
        self.port
    }

    /// Release the register bus
    pub fn into_bus(self) -> RegisterBus<IO, P> {
        self.bus
    }
}
