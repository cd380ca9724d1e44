//! Chip Revision Identification
//!
//! None of the three chips carries a version register that tells the whole
//! story, so revisions are inferred from behaviour:
//!
//! - [`ramsey`]: the memory controller, from its version register
//! - [`sdmac`]: the DMA engine, from whether WTC bit 2 is writable
//! - [`wd33c93`]: the SCSI controller, from reset status codes, register
//!   persistence and the microcode byte left behind by a reset
//!
//! Identification runs once per session and produces a [`ChipIdentity`]
//! that is read-only afterwards.

pub mod ramsey;
pub mod sdmac;
pub mod wd33c93;

pub use ramsey::{DramType, RamseyConfig, RamseyRevision, Refresh};
pub use sdmac::DmacRevision;
pub use wd33c93::{DetectFailures, Microcode, WdIdentity, WdModel};

/// Everything identification learned about the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipIdentity {
    /// Memory controller revision, if recognized
    pub ramsey: Option<RamseyRevision>,
    /// DMA engine revision, if the probe was conclusive
    pub dmac: Option<DmacRevision>,
    /// SCSI controller model
    pub wd: WdIdentity,
}
