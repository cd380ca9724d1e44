//! SDMAC (SCSI DMA controller) registers
//!
//! The SDMAC occupies 0x80 bytes at 0x00DD0000. The WD33C93 is reached
//! through its SASR (index) and SCMD (data) ports.

use super::{Access, Register, Width};

/// SDMAC register block base address
pub const BASE: u32 = 0x00DD_0000;

/// Size of the SDMAC register block
pub const BLOCK_LEN: u32 = 0x80;

/// DACK width register
pub const DAWR: Register = Register::new(BASE + 0x03, Width::Byte, Access::WriteOnly);
/// Word transfer count (SDMAC-02 only)
pub const WTC: Register = Register::new(BASE + 0x04, Width::Long, Access::ReadWrite);
/// WTC shadow used for writes
pub const WTC_ALT: Register = WTC.shadow();
/// Control register
pub const CONTR: Register = Register::new(BASE + 0x0B, Width::Byte, Access::ReadWrite);
/// Strobe: start DMA
pub const ST_DMA: Register = Register::new(BASE + 0x13, Width::Byte, Access::WriteOnly);
/// Strobe: flush DMA FIFO
pub const FLUSH: Register = Register::new(BASE + 0x17, Width::Byte, Access::WriteOnly);
/// Strobe: clear interrupts
pub const CLR_INT: Register = Register::new(BASE + 0x1B, Width::Byte, Access::WriteOnly);
/// Interrupt status register
pub const ISTR: Register = Register::new(BASE + 0x1F, Width::Byte, Access::ReadOnly);
/// Strobe: stop DMA
pub const SP_DMA: Register = Register::new(BASE + 0x3F, Width::Byte, Access::WriteOnly);
/// WD33C93 index, longword write port (obsolete)
pub const SASR_L: Register = Register::new(BASE + 0x40, Width::Long, Access::WriteOnly);
/// WD33C93 index, byte read port
pub const SASR_B: Register = Register::new(BASE + 0x41, Width::Byte, Access::ReadOnly);
/// WD33C93 data port for the selected register
pub const SCMD: Register = Register::new(BASE + 0x43, Width::Byte, Access::ReadWrite);
/// WD33C93 data port alias
pub const SCMD_B: Register = Register::new(BASE + 0x47, Width::Byte, Access::ReadWrite);
/// WD33C93 index, longword write port
pub const SASRW: Register = Register::new(BASE + 0x48, Width::Long, Access::WriteOnly);
/// WD33C93 index, byte write port
pub const SASR_B2: Register = Register::new(BASE + 0x49, Width::Byte, Access::ReadWrite);
/// Coprocessor interface
pub const CI: Register = Register::new(BASE + 0x50, Width::Long, Access::ReadWrite);
/// Coprocessor interface data direction
pub const CIDDR: Register = Register::new(BASE + 0x54, Width::Long, Access::ReadWrite);
/// Synchronous serial peripheral bus data (SDMAC-04)
pub const SSPBDAT: Register = Register::new(BASE + 0x58, Width::Long, Access::ReadWrite);
/// Synchronous serial peripheral bus control
pub const SSPBCTL: Register = Register::new(BASE + 0x5C, Width::Long, Access::ReadWrite);

/// Data bits of WTC
pub const WTC_MASK: u32 = 0x00FF_FFFF;
/// WTC bit that is writable on SDMAC-02 and hard-wired on SDMAC-04
pub const WTC_PROBE_BIT: u32 = 1 << 2;
/// Data bits of SSPBDAT
pub const SSPBDAT_MASK: u32 = 0xFF;

// =============================================================================
// ISTR - Interrupt Status Register
// =============================================================================

/// FIFO empty
pub const ISTR_FIFOE: u8 = 0x01;
/// FIFO full
pub const ISTR_FIFOF: u8 = 0x02;
/// Enabled interrupt pending
pub const ISTR_INT_P: u8 = 0x10;
/// DMA done (end of process)
pub const ISTR_INT_E: u8 = 0x20;
/// SCSI peripheral interrupt
pub const ISTR_INT_S: u8 = 0x40;
/// Interrupt follow
pub const ISTR_INT_F: u8 = 0x80;

// =============================================================================
// CONTR - Control Register
// =============================================================================

/// Reserved, reads zero
pub const CONTR_IODX: u8 = 0x01;
/// DMA direction (set = write to the SCSI bus)
pub const CONTR_DMADIR: u8 = 0x02;
/// Interrupt enable
pub const CONTR_INTEN: u8 = 0x04;
/// Peripheral mode
pub const CONTR_PMODE: u8 = 0x08;
/// Peripheral reset strobe
pub const CONTR_RESET: u8 = 0x10;
/// Terminal count enable
pub const CONTR_TCE: u8 = 0x20;
/// DMA enabled
pub const CONTR_DMAENA: u8 = 0x80;
