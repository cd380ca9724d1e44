//! SDMAC revision probe
//!
//! SDMAC-02 implements all 24 bits of the word transfer count; on SDMAC-04
//! bit 2 is hard-wired to zero. Writes go through the WTC shadow to avoid
//! the 68030 write-allocate errata, and each write is followed by a bus
//! flush before the read-back.

use crate::error::{DetectError, Result};
use crate::hal::bus::{RegisterBus, RegisterIo};
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::Privilege;
use crate::internal::register::sdmac;

/// SDMAC revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmacRevision {
    /// SDMAC-02: WTC fully writable
    Sdmac02,
    /// SDMAC-04: WTC bit 2 read-only, SSPB registers present
    Sdmac04,
}

impl DmacRevision {
    /// Revision number as printed on the part
    pub const fn number(self) -> u8 {
        match self {
            Self::Sdmac02 => 2,
            Self::Sdmac04 => 4,
        }
    }

    /// Whether a WTC read-back of `written` is what this revision produces
    pub const fn wtc_consistent(self, written: u32, read: u32) -> bool {
        match self {
            Self::Sdmac02 => read == written,
            Self::Sdmac04 => read & sdmac::WTC_PROBE_BIT == 0,
        }
    }
}

/// Patterns used to cross-check the bit 2 verdict
const CROSS_CHECK: [u32; 2] = [0, sdmac::WTC_MASK];

/// Determine the SDMAC revision
///
/// Refuses to touch WTC while ISTR shows anything but an empty FIFO, since
/// pending status belongs to the SCSI interrupt handler. WTC is restored
/// before returning, on error paths too.
pub fn probe_revision<IO: RegisterIo, P: Privilege>(
    bus: &mut RegisterBus<IO, P>,
) -> Result<DmacRevision> {
    let istr = bus.read_u8(sdmac::ISTR)?;
    if istr != sdmac::ISTR_FIFOE {
        return Err(DetectError::ControllerBusy { istr }.into());
    }

    let _cs = InterruptGuard::acquire();
    let original = bus.read(sdmac::WTC)?;
    let verdict = classify(bus, original);
    let restored = bus.write(sdmac::WTC_ALT, original).and_then(|()| bus.flush());
    let revision = verdict?;
    restored?;

    info!("SDMAC-0{}", revision.number());
    Ok(revision)
}

fn classify<IO: RegisterIo, P: Privilege>(
    bus: &mut RegisterBus<IO, P>,
    original: u32,
) -> Result<DmacRevision> {
    let probe = (original | sdmac::WTC_PROBE_BIT) & sdmac::WTC_MASK;
    let read = write_and_read(bus, probe)?;
    let revision = if read & sdmac::WTC_PROBE_BIT != 0 {
        DmacRevision::Sdmac02
    } else {
        DmacRevision::Sdmac04
    };

    for written in CROSS_CHECK {
        let read = write_and_read(bus, written)?;
        if !revision.wtc_consistent(written, read) {
            warn!("SDMAC WTC wrote {:#010x} read {:#010x}", written, read);
            return Err(DetectError::Inconsistent { written, read }.into());
        }
    }
    Ok(revision)
}

fn write_and_read<IO: RegisterIo, P: Privilege>(
    bus: &mut RegisterBus<IO, P>,
    value: u32,
) -> Result<u32> {
    bus.write(sdmac::WTC_ALT, value)?;
    bus.flush()?;
    Ok(bus.read(sdmac::WTC)? & sdmac::WTC_MASK)
}
