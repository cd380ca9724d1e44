//! WD33C93 SCSI bus interface controller registers
//!
//! These are ordinals for the indirect window, not bus addresses. Ordinals
//! 0x00..=0x1F are directly addressable; the WD33C93B also keeps internal
//! registers at 0x40 and above that only the get/set-register pseudo
//! commands can reach.

/// Own ID (CDB size after a reset)
pub const OWN_ID: u8 = 0x00;
/// Control
pub const CONTROL: u8 = 0x01;
/// Timeout period
pub const TPERIOD: u8 = 0x02;
/// Total sectors / CDB byte 1
pub const CDB1: u8 = 0x03;
/// Total heads / CDB byte 2
pub const CDB2: u8 = 0x04;
/// Total cylinders MSB / CDB byte 3
pub const CYLS_H: u8 = 0x05;
/// Total cylinders LSB / CDB byte 4
pub const CYLS_L: u8 = 0x06;
/// Logical address MSB
pub const LADDR3: u8 = 0x07;
/// Logical address 2nd
pub const LADDR2: u8 = 0x08;
/// Logical address 3rd
pub const LADDR1: u8 = 0x09;
/// Logical address LSB
pub const LADDR0: u8 = 0x0A;
/// Sector number
pub const SECTOR: u8 = 0x0B;
/// Head number
pub const HEAD: u8 = 0x0C;
/// Cylinder number MSB
pub const CYL_H: u8 = 0x0D;
/// Cylinder number LSB
pub const CYL_L: u8 = 0x0E;
/// Target LUN
pub const LUN: u8 = 0x0F;
/// Command phase
pub const CMDPHASE: u8 = 0x10;
/// Synchronous transfer
pub const SYNC_TX: u8 = 0x11;
/// Transfer count MSB (set24 writes 0x12..=0x14)
pub const TCOUNT2: u8 = 0x12;
/// Transfer count 2nd
pub const TCOUNT1: u8 = 0x13;
/// Transfer count LSB
pub const TCOUNT0: u8 = 0x14;
/// Destination ID
pub const DST_ID: u8 = 0x15;
/// Source ID
pub const SRC_ID: u8 = 0x16;
/// SCSI status (read only, reading clears INT)
pub const SCSI_STAT: u8 = 0x17;
/// Command
pub const CMD: u8 = 0x18;
/// Data
pub const DATA: u8 = 0x19;
/// Queue tag (WD33C93B only)
pub const QUETAG: u8 = 0x1A;
/// Not implemented by any part, reads 0xFF
pub const INVALID: u8 = 0x1E;
/// Auxiliary status (read only)
pub const AUXST: u8 = 0x1F;

/// Highest directly addressable ordinal
pub const LAST_DIRECT: u8 = 0x1F;
/// First ordinal of the extended register space
pub const FIRST_EXTENDED: u8 = 0x40;
/// CDB length of a six byte command
pub const CDB_LEN: usize = 6;

/// Value of every unimplemented register
pub const INVALID_SENTINEL: u8 = 0xFF;

/// Legal command-phase register values
pub const VALID_CMD_PHASES: [u8; 29] = [
    0x00, 0x10, 0x20, 0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B,
    0x3C, 0x3D, 0x3E, 0x3F, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x50, 0x60, 0x61,
];

// =============================================================================
// AUXST - Auxiliary Status
// =============================================================================

/// Data buffer ready
pub const AUX_DBR: u8 = 0x01;
/// Parity error
pub const AUX_PE: u8 = 0x02;
/// Reserved bits, always zero
pub const AUX_RESERVED: u8 = 0x0C;
/// Command in progress
pub const AUX_CIP: u8 = 0x10;
/// Busy (level II command executing)
pub const AUX_BSY: u8 = 0x20;
/// Last command ignored
pub const AUX_LCI: u8 = 0x40;
/// Interrupt pending
pub const AUX_INT: u8 = 0x80;

// =============================================================================
// OWN_ID
// =============================================================================

/// Own SCSI ID field
pub const OWN_ID_MASK: u8 = 0x07;
/// Enable advanced features
pub const OWN_ID_EAF: u8 = 0x08;
/// Enable host parity
pub const OWN_ID_EHP: u8 = 0x10;
/// Really advanced features (33C93B), enable immediate halt (33C93A)
pub const OWN_ID_RAF: u8 = 0x20;
/// Frequency select field shift
pub const OWN_ID_FS_SHIFT: u8 = 6;

// =============================================================================
// CONTROL
// =============================================================================

/// Bus mode field shift (bits 7:5)
pub const CONTROL_DM_SHIFT: u8 = 5;
/// Halt on host parity error
pub const CONTROL_HHP: u8 = 0x10;
/// Ending disconnect interrupt
pub const CONTROL_EDI: u8 = 0x08;
/// Intermediate disconnect interrupt
pub const CONTROL_IDI: u8 = 0x04;
/// Halt on attention
pub const CONTROL_HA: u8 = 0x02;
/// Halt on SCSI parity error
pub const CONTROL_HSP: u8 = 0x01;
/// Polled bus mode, no interrupt suppression
pub const CONTROL_POLLED: u8 = 0x00;

// =============================================================================
// LUN / SYNC_TX
// =============================================================================

/// LUN reserved bits (5:3), always zero
pub const LUN_RESERVED: u8 = 0x38;
/// LUN field
pub const LUN_MASK: u8 = 0x07;
/// Synchronous offset field
pub const SYNC_OFFSET_MASK: u8 = 0x0F;
/// Transfer period field shift
pub const SYNC_PERIOD_SHIFT: u8 = 4;
/// Fast synchronous select (33C93B)
pub const SYNC_FSS: u8 = 0x80;

// =============================================================================
// Commands
// =============================================================================

/// Soft reset
pub const CMD_RESET: u8 = 0x00;
/// Abort
pub const CMD_ABORT: u8 = 0x01;
/// Assert ATN
pub const CMD_ASSERT_ATN: u8 = 0x02;
/// Negate ACK
pub const CMD_NEGATE_ACK: u8 = 0x03;
/// Disconnect
pub const CMD_DISCONNECT: u8 = 0x04;
/// Select with ATN
pub const CMD_SELECT_ATN: u8 = 0x06;
/// Select without ATN
pub const CMD_SELECT: u8 = 0x07;
/// Copy an internal register into CDB2 (33C93B)
pub const CMD_GET_REGISTER: u8 = 0x1C;
/// Load an internal register from CDB2 (33C93B)
pub const CMD_SET_REGISTER: u8 = 0x1D;
/// Transfer info
pub const CMD_TRANSFER_INFO: u8 = 0x20;

/// SCSI IDENTIFY message base
pub const MSG_IDENTIFY: u8 = 0x80;

// =============================================================================
// SCSI Status Codes
// =============================================================================

/// Reset complete
pub const STAT_RESET: u8 = 0x00;
/// Reset complete with advanced features enabled
pub const STAT_RESET_EAF: u8 = 0x01;
/// Select complete
pub const STAT_SELECTED: u8 = 0x11;
/// Transfer info complete, low bits hold the new phase
pub const STAT_XFER_DONE: u8 = 0x18;
/// Transfer paused with ACK asserted (message in received)
pub const STAT_PAUSED_ACK: u8 = 0x20;
/// Invalid command
pub const STAT_INVALID_CMD: u8 = 0x40;
/// Unexpected disconnect
pub const STAT_UNEXPECTED_DISC: u8 = 0x41;
/// Selection timeout
pub const STAT_SEL_TIMEOUT: u8 = 0x42;
/// Target disconnected
pub const STAT_DISCONNECT: u8 = 0x85;
/// Target requested a new phase, low bits hold it
pub const STAT_REQ: u8 = 0x88;

/// Status bit that marks the low three bits as a phase
pub const STAT_PHASE_VALID: u8 = 0x08;
/// Phase field of the status byte
pub const STAT_PHASE_MASK: u8 = 0x07;

// =============================================================================
// SCSI Bus Phases
// =============================================================================

/// SCSI information transfer phase (MSG/C/D/I/O bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    /// Data out (initiator to target)
    DataOut = 0,
    /// Data in
    DataIn = 1,
    /// Command
    Command = 2,
    /// Status
    Status = 3,
    /// Unspecified info out
    UnspecifiedOut = 4,
    /// Unspecified info in
    UnspecifiedIn = 5,
    /// Message out
    MessageOut = 6,
    /// Message in
    MessageIn = 7,
}

impl Phase {
    /// Decode the low three bits of a status byte
    pub const fn from_bits(bits: u8) -> Self {
        match bits & STAT_PHASE_MASK {
            0 => Phase::DataOut,
            1 => Phase::DataIn,
            2 => Phase::Command,
            3 => Phase::Status,
            4 => Phase::UnspecifiedOut,
            5 => Phase::UnspecifiedIn,
            6 => Phase::MessageOut,
            _ => Phase::MessageIn,
        }
    }

    /// Phase carried by a status byte, if its phase bit is set
    pub const fn from_status(status: u8) -> Option<Self> {
        if status & STAT_PHASE_VALID != 0 {
            Some(Self::from_bits(status))
        } else {
            None
        }
    }

    /// True when data flows from the target to the initiator
    pub const fn is_inbound(self) -> bool {
        (self as u8) & 1 != 0
    }
}
