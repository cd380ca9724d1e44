//! Presentation tables
//!
//! Maps WD33C93 status bytes, command opcodes and bus phases to text. Pure
//! lookups; nothing here touches hardware. The core reports numeric codes
//! and reporters decide whether to decode them.

use crate::internal::register::wd::{self, Phase};

// =============================================================================
// Status
// =============================================================================

/// Coarse outcome class, the high nibble of the SCSI status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusClass {
    /// 0x0_: reset state
    Reset,
    /// 0x1_: command completed
    Complete,
    /// 0x2_: command paused or aborted
    Paused,
    /// 0x4_: command terminated with an error
    Error,
    /// 0x8_: bus service required
    ServiceRequired,
    /// Any other high nibble
    Unknown,
}

impl StatusClass {
    /// Classify a status byte
    pub const fn of(status: u8) -> Self {
        match status >> 4 {
            0x0 => Self::Reset,
            0x1 => Self::Complete,
            0x2 => Self::Paused,
            0x4 => Self::Error,
            0x8 => Self::ServiceRequired,
            _ => Self::Unknown,
        }
    }

    /// Class description
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "Reset state",
            Self::Complete => "Command complete",
            Self::Paused => "Command paused/aborted",
            Self::Error => "Command error",
            Self::ServiceRequired => "Bus Svc Required",
            Self::Unknown => "Unknown status",
        }
    }
}

/// Decoded SCSI status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusDecode {
    /// Outcome class
    pub class: StatusClass,
    /// Specific cause
    pub detail: &'static str,
    /// Bus phase, for codes that carry one
    pub phase: Option<Phase>,
}

/// Decode a SCSI status byte
pub const fn decode_status(status: u8) -> StatusDecode {
    let class = StatusClass::of(status);
    let code = status & 0x0F;
    // Phase bits only mean something for the codes that say so
    let phase = match class {
        StatusClass::Complete | StatusClass::Error | StatusClass::ServiceRequired
            if code & wd::STAT_PHASE_VALID != 0 =>
        {
            Some(Phase::from_bits(code))
        }
        _ => None,
    };

    let detail = match (class, code) {
        (StatusClass::Reset, 0x0) => "Reset",
        (StatusClass::Reset, 0x1) => "Reset with Advanced features",

        (StatusClass::Complete, 0x0) => "Reselect as target success",
        (StatusClass::Complete, 0x1) => "Reselect as initiator success",
        (StatusClass::Complete, 0x3) => "Success, no ATN",
        (StatusClass::Complete, 0x4) => "Success, ATN",
        (StatusClass::Complete, 0x5) => "Translate Address success",
        (StatusClass::Complete, 0x6) => "Select-and-Transfer success",
        (StatusClass::Complete, c) if c & 0x8 != 0 => "Transfer Info success",

        (StatusClass::Paused, 0x0) => "Transfer Info, ACK",
        (StatusClass::Paused, 0x1) => "Save-Data-Pointer during Select-and-Transfer",
        (StatusClass::Paused, 0x2) => "Select, Reselect, or Wait-for-Select aborted",
        (StatusClass::Paused, 0x3) => "Receive or Send aborted, or Wait-for-select error",
        (StatusClass::Paused, 0x4) => "Command aborted, ATN",
        (StatusClass::Paused, 0x5) => "Transfer Aborted, protocol violation",
        (StatusClass::Paused, 0x6) => "Queue Tag mismatch, ACK",
        (StatusClass::Paused, 0x7) => "Reselect source != Dest ID/LUN, ACK",

        (StatusClass::Error, 0x0) => "Invalid command",
        (StatusClass::Error, 0x1) => "Unexpected disconnect",
        (StatusClass::Error, 0x2) => "Timeout during Select or Reselect",
        (StatusClass::Error, 0x3) => "Parity error, no ATN",
        (StatusClass::Error, 0x4) => "Parity error, ATN",
        (StatusClass::Error, 0x5) => "Translate Address > disk boundary",
        (StatusClass::Error, 0x6) => "Select-and-Transfer reselect Target != Dest",
        (StatusClass::Error, 0x7) => "Status parity error during Select-and-Transfer",
        (StatusClass::Error, _) => "Unexpected change requested",

        (StatusClass::ServiceRequired, 0x0) => "WDC reselected as initiator",
        (StatusClass::ServiceRequired, 0x1) => "WDC reselected in advanced mode, ACK",
        (StatusClass::ServiceRequired, 0x2) => "WDC selected as target, no ATN",
        (StatusClass::ServiceRequired, 0x3) => "WDC selected as target, ATN",
        (StatusClass::ServiceRequired, 0x4) => "ATN",
        (StatusClass::ServiceRequired, 0x5) => "Target disconnected",
        (StatusClass::ServiceRequired, 0x7) => "Wait-for-Select paused, unknown target command",
        (StatusClass::ServiceRequired, c) if c & 0x8 != 0 => "REQ during WDC idle initiator",

        (StatusClass::Unknown, _) => "Unknown status",
        _ => "Unknown code",
    };
    StatusDecode { class, detail, phase }
}

// =============================================================================
// Commands
// =============================================================================

const COMMAND_NAMES: [&str; 0x19] = [
    "Reset",
    "Abort",
    "Assert ATN",
    "Negate ACK",
    "Disconnect",
    "Reselect",
    "Select-with-ATN",
    "Select-without-ATN",
    "Select-with-ATN-and-Transfer",
    "Select-without-ATN-and-Transfer",
    "Reselect-and-Receive-Data",
    "Reselect-and-Send-Data",
    "Wait-for-Select-and-Receive",
    "Send-Status-and-Command-Complete",
    "Send-Disconnect-Message",
    "Set IDI",
    "Receive Command",
    "Receive Data",
    "Receive Message Out",
    "Receive Unspecified Info Out",
    "Send Status",
    "Send Data",
    "Send Message In",
    "Send Unspecified Info In",
    "Translate Address",
];

/// Name of a WD33C93 command opcode
///
/// The single-byte-transfer bit (0x80) is ignored.
pub fn command_name(cmd: u8) -> Option<&'static str> {
    match cmd & 0x7F {
        wd::CMD_GET_REGISTER => Some("Get Register"),
        wd::CMD_SET_REGISTER => Some("Set Register"),
        wd::CMD_TRANSFER_INFO => Some("Transfer Info"),
        c => COMMAND_NAMES.get(c as usize).copied(),
    }
}

// =============================================================================
// Phases
// =============================================================================

/// Name of a SCSI bus phase
pub const fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::DataOut => "Data Out",
        Phase::DataIn => "Data In",
        Phase::Command => "Command",
        Phase::Status => "Status",
        Phase::UnspecifiedOut => "Unspecified Info Out",
        Phase::UnspecifiedIn => "Unspecified Info In",
        Phase::MessageOut => "Message Out",
        Phase::MessageIn => "Message In",
    }
}
