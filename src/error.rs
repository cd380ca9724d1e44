//! Error types for the SDMAC / WD33C93 diagnostics
//!
//! Errors are organized by domain for better diagnostics:
//! - [`AccessError`]: register bus faults and access-mode misuse
//! - [`IoError`]: bounded waits, protocol failures and cancellation
//! - [`DetectError`]: chip signatures that match no known revision
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by the diagnostic runner.
//!
//! Verification mismatches and extended-register anomalies are not errors:
//! they are counted or returned alongside the best-effort value.

// =============================================================================
// Access Errors
// =============================================================================

/// Register access errors
///
/// Raised by the register bus for a single read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessError {
    /// The bus cycle did not complete (no device decoded the address)
    BusFault {
        /// Physical address of the faulting access
        addr: u32,
    },
    /// Write attempted to a read-only register
    ReadOnly,
    /// Read attempted from a write-only register
    WriteOnly,
    /// A register snapshot is already outstanding
    SnapshotActive,
}

impl core::fmt::Display for AccessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccessError::BusFault { addr } => write!(f, "{} at {addr:#010x}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl AccessError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessError::BusFault { .. } => "bus fault",
            AccessError::ReadOnly => "register is read-only",
            AccessError::WriteOnly => "register is write-only",
            AccessError::SnapshotActive => "register snapshot already active",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime errors from polled chip operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// A bounded wait ran out of ticks or polls
    Timeout {
        /// Last auxiliary status observed before giving up
        last_status: u8,
    },
    /// The operator asked the run to stop
    Cancelled,
    /// The controller reported an interrupt or ignored a command mid-transfer
    Protocol {
        /// SCSI status register at the point of failure
        status: u8,
    },
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IoError::Timeout { last_status } => {
                write!(f, "{} (aux status {last_status:#04x})", self.as_str())
            }
            IoError::Protocol { status } => {
                write!(f, "{} (scsi status {status:#04x})", self.as_str())
            }
            IoError::Cancelled => f.write_str(self.as_str()),
        }
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout { .. } => "operation timed out",
            IoError::Cancelled => "cancelled by operator",
            IoError::Protocol { .. } => "SCSI protocol error",
        }
    }

    /// Returns `true` for the timeout variant
    pub const fn is_timeout(&self) -> bool {
        matches!(self, IoError::Timeout { .. })
    }
}

// =============================================================================
// Detection Errors
// =============================================================================

/// Chip identification failures
///
/// These are distinct from "not this revision": the probe observed something
/// no known part produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectError {
    /// The DMA engine has pending status that belongs to the SCSI ISR
    ControllerBusy {
        /// Interrupt status register value
        istr: u8,
    },
    /// A read-back matched neither known revision
    Inconsistent {
        /// Value written through the shadow alias
        written: u32,
        /// Value read back from the real register
        read: u32,
    },
    /// A version register held an unlisted value
    Unrecognized {
        /// Raw register value
        raw: u8,
    },
}

impl core::fmt::Display for DetectError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DetectError::ControllerBusy { istr } => write!(f, "{} (istr {istr:#04x})", self.as_str()),
            DetectError::Inconsistent { written, read } => {
                write!(f, "{}: wrote {written:#010x} read {read:#010x}", self.as_str())
            }
            DetectError::Unrecognized { raw } => write!(f, "{} ({raw:#04x})", self.as_str()),
        }
    }
}

impl DetectError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DetectError::ControllerBusy { .. } => "controller busy",
            DetectError::Inconsistent { .. } => "inconsistent revision signature",
            DetectError::Unrecognized { .. } => "unrecognized version",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Access(AccessError::BusFault { addr })) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout { last_status })) => { /* ... */ }
///     Err(Error::Detect(DetectError::ControllerBusy { .. })) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Register access error
    Access(AccessError),
    /// I/O error
    Io(IoError),
    /// Identification error
    Detect(DetectError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Access(e) => write!(f, "access: {e}"),
            Error::Io(e) => write!(f, "io: {e}"),
            Error::Detect(e) => write!(f, "detect: {e}"),
        }
    }
}

impl Error {
    /// Returns a human-readable description of the inner error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::Access(e) => e.as_str(),
            Error::Io(e) => e.as_str(),
            Error::Detect(e) => e.as_str(),
        }
    }

    /// Returns `true` if the error came from a faulting bus cycle
    pub const fn is_bus_fault(&self) -> bool {
        matches!(self, Error::Access(AccessError::BusFault { .. }))
    }
}

// From impls for automatic conversion
impl From<AccessError> for Error {
    fn from(e: AccessError) -> Self {
        Error::Access(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<DetectError> for Error {
    fn from(e: DetectError) -> Self {
        Error::Detect(e)
    }
}

/// Result type alias for diagnostic operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for single register accesses
pub type AccessResult<T> = core::result::Result<T, AccessError>;

/// Result type alias for polled operations
pub type IoResult<T> = core::result::Result<T, IoError>;

/// Result type alias for identification probes
pub type DetectResult<T> = core::result::Result<T, DetectError>;
