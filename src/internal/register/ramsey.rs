//! Ramsey memory controller registers
//!
//! Ramsey-07 only answers reliably when the CPU is in supervisor state, so
//! its control and version registers are flagged privileged.

use super::{Access, Register, Width};

/// Control register (page/burst/wrap, DRAM size, refresh)
pub const CTRL: Register = Register::new(0x00DE_0003, Width::Byte, Access::ReadWrite).privileged();

/// Version register
pub const VERSION: Register = Register::new(0x00DE_0043, Width::Byte, Access::ReadOnly).privileged();

/// DMA address register, mapped in the SDMAC register block
pub const ACR: Register = Register::new(0x00DD_000C, Width::Long, Access::ReadWrite).privileged();

/// ACR shadow used for writes
pub const ACR_ALT: Register = ACR.shadow();

/// ACR bits that hold data (bits 1:0 are hard-wired)
pub const ACR_MASK: u32 = 0xFFFF_FFFC;

// Version register values
/// Ramsey-01
pub const VERSION_REV1: u8 = 0x7F;
/// Ramsey-04
pub const VERSION_REV4: u8 = 0x0D;
/// Ramsey-07
pub const VERSION_REV7: u8 = 0x0F;

// Control register bits
/// Page mode enabled
pub const CTRL_PAGE: u8 = 1 << 0;
/// Burst mode enabled
pub const CTRL_BURST: u8 = 1 << 1;
/// Wrap enabled
pub const CTRL_WRAP: u8 = 1 << 2;
/// 1Mx4 DRAM
pub const CTRL_1MX4: u8 = 1 << 3;
/// 256Kx4 DRAM on early revisions, "skip" on Ramsey-07
pub const CTRL_256K_SKIP: u8 = 1 << 4;
/// Refresh rate field shift
pub const CTRL_REFRESH_SHIFT: u8 = 5;
/// Refresh rate field mask (after shift)
pub const CTRL_REFRESH_MASK: u8 = 0x3;
