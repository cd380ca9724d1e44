//! Memory-mapped register definitions for the A3000 SCSI subsystem
//!
//! Every register is described by a [`Register`] value: a physical address,
//! a bus width, an access direction and whether the CPU must be in
//! supervisor state for the read to be reliable. The descriptors are
//! constants; nothing here touches hardware except the volatile helpers at
//! the bottom.

pub mod ramsey;
pub mod sdmac;
pub mod wd;

// =============================================================================
// Register Descriptors
// =============================================================================

/// Offset between a register and its shadow (write-alias) address
///
/// Writing through the shadow dodges the 68030 write-allocate cache errata.
pub const SHADOW_OFFSET: u32 = 0x80;

/// Bus width of a register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    /// 8-bit access
    Byte,
    /// 16-bit access
    Word,
    /// 32-bit access
    Long,
}

impl Width {
    /// Number of bytes moved by one access
    pub const fn bytes(self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::Long => 4,
        }
    }

    /// Mask of the bits an access of this width can carry
    pub const fn mask(self) -> u32 {
        match self {
            Width::Byte => 0xFF,
            Width::Word => 0xFFFF,
            Width::Long => 0xFFFF_FFFF,
        }
    }
}

/// Access direction of a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Read only; writes are rejected by the bus layer
    ReadOnly,
    /// Write only (including strobes); reads are rejected
    WriteOnly,
    /// Read and write
    ReadWrite,
}

impl Access {
    /// Whether reads are permitted
    pub const fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Whether writes are permitted
    pub const fn writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// A fixed hardware register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register {
    /// Physical byte address
    pub addr: u32,
    /// Access width
    pub width: Width,
    /// Access direction
    pub access: Access,
    /// Requires supervisor state
    pub privileged: bool,
}

impl Register {
    /// Describe an unprivileged register
    pub const fn new(addr: u32, width: Width, access: Access) -> Self {
        Self {
            addr,
            width,
            access,
            privileged: false,
        }
    }

    /// Mark the register as requiring supervisor state
    pub const fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// The shadow alias of this register
    pub const fn shadow(self) -> Self {
        Self {
            addr: self.addr + SHADOW_OFFSET,
            ..self
        }
    }
}

// =============================================================================
// Volatile Access
// =============================================================================

/// Read a register of the given width at the given address
///
/// # Safety
/// The caller must ensure the address is decoded by hardware and aligned
/// for the width.
#[inline(always)]
pub unsafe fn read_reg(addr: u32, width: Width) -> u32 {
    let addr = addr as usize;
    // SAFETY: caller guarantees address validity
    unsafe {
        match width {
            Width::Byte => core::ptr::read_volatile(addr as *const u8) as u32,
            Width::Word => core::ptr::read_volatile(addr as *const u16) as u32,
            Width::Long => core::ptr::read_volatile(addr as *const u32),
        }
    }
}

/// Write a register of the given width at the given address
///
/// # Safety
/// The caller must ensure the address is decoded by hardware and aligned
/// for the width.
#[inline(always)]
pub unsafe fn write_reg(addr: u32, width: Width, value: u32) {
    let addr = addr as usize;
    // SAFETY: caller guarantees address validity
    unsafe {
        match width {
            Width::Byte => core::ptr::write_volatile(addr as *mut u8, value as u8),
            Width::Word => core::ptr::write_volatile(addr as *mut u16, value as u16),
            Width::Long => core::ptr::write_volatile(addr as *mut u32, value),
        }
    }
}
