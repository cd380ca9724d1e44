//! Testing utilities and simulated hardware
//!
//! [`SimBus`] is a behavioural model of the A3000 SCSI register space:
//! Ramsey, the SDMAC and a WD33C93 behind the indirect window, with a
//! simulated SCSI bus. Every bus access advances a virtual tick counter by
//! one; chip events (reset completion, selection timeout, phase changes)
//! fire once their tick is reached.
//!
//! Handles created from one `SimBus` ([`SimPrivilege`], [`SimTicks`],
//! [`MockDelay`]) share its state, so tests can inspect the chip after
//! handing the bus to the code under test.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::diag::battery::{Mismatch, SubtestResult};
use crate::diag::probe::ProbeOutcome;
use crate::diag::report::Reporter;
use crate::error::{AccessError, AccessResult};
use crate::hal::bus::RegisterIo;
use crate::hal::privilege::Privilege;
use crate::hal::timer::{TickSource, us_to_ticks};
use crate::hal::window::ProtocolAnomaly;
use crate::internal::constants::{
    LATENCY_WD33C93A_US, LATENCY_WD33C93B_US, LATENCY_WD33C93_US, TPERIOD_SCALE,
};
use crate::internal::register::wd::{self, Phase};
use crate::internal::register::{Width, ramsey, sdmac};

// Bus addresses the simulator decodes
const RAMSEY_CTRL: u32 = ramsey::CTRL.addr;
const RAMSEY_VERSION: u32 = ramsey::VERSION.addr;
const ACR: u32 = ramsey::ACR.addr;
const ACR_ALT: u32 = ramsey::ACR_ALT.addr;
const WTC: u32 = sdmac::WTC.addr;
const WTC_ALT: u32 = sdmac::WTC_ALT.addr;
const CONTR: u32 = sdmac::CONTR.addr;
const ISTR: u32 = sdmac::ISTR.addr;
const SASR_L: u32 = sdmac::SASR_L.addr;
const SASR_B: u32 = sdmac::SASR_B.addr;
const SCMD: u32 = sdmac::SCMD.addr;
const SCMD_B: u32 = sdmac::SCMD_B.addr;
const SASRW: u32 = sdmac::SASRW.addr;
const SASR_B2: u32 = sdmac::SASR_B2.addr;
const SSPBDAT: u32 = sdmac::SSPBDAT.addr;

/// Ticks from a command to its completion interrupt
const COMMAND_TICKS: u32 = 5;
/// Ticks from select to "selected" when a target answers
const SELECT_TICKS: u32 = 20;
/// Ticks between phase changes on the simulated bus
const PHASE_TICKS: u32 = 2;
/// Ticks CIP stays set after a command is accepted
const CIP_TICKS: u32 = 2;

// =============================================================================
// Chip variants
// =============================================================================

/// Simulated WD33C93 family member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WdVariant {
    Wd33c93,
    Wd33c93a { microcode: u8 },
    Wd33c93b { microcode: u8 },
}

impl WdVariant {
    fn enhanced(self) -> bool {
        !matches!(self, Self::Wd33c93)
    }

    fn is_b(self) -> bool {
        matches!(self, Self::Wd33c93b { .. })
    }

    fn microcode(self) -> u8 {
        match self {
            Self::Wd33c93 => 0,
            Self::Wd33c93a { microcode } | Self::Wd33c93b { microcode } => microcode,
        }
    }

    fn latency_us(self) -> u32 {
        match self {
            Self::Wd33c93 => LATENCY_WD33C93_US,
            Self::Wd33c93a { .. } => LATENCY_WD33C93A_US,
            Self::Wd33c93b { .. } => LATENCY_WD33C93B_US,
        }
    }
}

/// Simulated SDMAC revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmacVariant {
    /// All 24 WTC bits writable
    Sdmac02,
    /// WTC bit 2 hard-wired to zero
    Sdmac04,
    /// Broken part: these WTC bits always read one
    Stuck(u32),
}

impl DmacVariant {
    fn store_wtc(self, value: u32) -> u32 {
        let value = value & sdmac::WTC_MASK;
        match self {
            Self::Sdmac02 => value,
            Self::Sdmac04 => value & !sdmac::WTC_PROBE_BIT,
            Self::Stuck(bits) => value | bits,
        }
    }
}

// =============================================================================
// Simulated SCSI target
// =============================================================================

/// A device on the simulated SCSI bus
///
/// Each phase lists the bytes the target sends (inbound phases) or how
/// many bytes it expects (outbound phases).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimDevice {
    phases: Vec<(Phase, Vec<u8>)>,
    silent: bool,
    received: Vec<u8>,
}

impl SimDevice {
    /// Answers TEST UNIT READY with GOOD status
    pub fn ready() -> Self {
        Self::with_status(0x00)
    }

    /// Answers with the given SCSI status byte
    pub fn with_status(status: u8) -> Self {
        Self {
            phases: vec![
                (Phase::MessageOut, vec![0]),
                (Phase::Command, vec![0; wd::CDB_LEN]),
                (Phase::Status, vec![status]),
                (Phase::MessageIn, vec![0x00]),
            ],
            silent: false,
            received: Vec::new(),
        }
    }

    /// Answers selection and then never requests a phase
    pub fn silent() -> Self {
        Self {
            phases: Vec::new(),
            silent: true,
            received: Vec::new(),
        }
    }

    /// Insert a data-in phase after the command phase
    pub fn with_data_in(mut self, data: &[u8]) -> Self {
        self.phases.insert(2, (Phase::DataIn, data.to_vec()));
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    target: usize,
    step: usize,
    offset: usize,
    awaiting_ack: bool,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    at: u32,
    status: u8,
}

// =============================================================================
// Simulator state
// =============================================================================

#[derive(Debug)]
struct SimState {
    // host
    tick: u32,
    supervisor: bool,
    elevations: u32,
    faults: Vec<u32>,
    read_faults: Option<(u32, u32)>,

    // Ramsey
    ramsey_version: u8,
    ramsey_ctrl: u8,
    acr: u32,

    // SDMAC
    dmac: DmacVariant,
    wtc: u32,
    contr: u8,
    istr_extra: u8,
    sspbdat: u32,

    // WD33C93
    wd: WdVariant,
    index: u8,
    regs: [u8; 32],
    ext: [u8; 256],
    writes: HashMap<u8, Vec<u8>>,
    int: bool,
    lci: bool,
    status: u8,
    pending: Option<Pending>,
    queued: Option<u8>,
    cip_until: u32,
    commands: Vec<u8>,

    // fault injection
    mute: bool,
    mute_after: Option<usize>,
    absent: bool,
    aux_writable: bool,
    aux_latch: Option<u8>,
    invalid_echoes: bool,
    acr_reserved: u32,
    control_drift_on: Option<u8>,
    laddr0_stuck: Option<u8>,

    // SCSI bus
    devices: [Option<SimDevice>; 8],
    conn: Option<Connection>,
    xfer: Option<u32>,
}

impl SimState {
    fn new(wd: WdVariant, dmac: DmacVariant) -> Self {
        Self {
            tick: 0,
            supervisor: false,
            elevations: 0,
            faults: Vec::new(),
            read_faults: None,
            ramsey_version: ramsey::VERSION_REV7,
            ramsey_ctrl: 0,
            acr: 0,
            dmac,
            wtc: 0,
            contr: 0,
            istr_extra: 0,
            sspbdat: 0,
            wd,
            index: 0,
            regs: [0; 32],
            ext: [0; 256],
            writes: HashMap::new(),
            int: false,
            lci: false,
            status: 0,
            pending: None,
            queued: None,
            cip_until: 0,
            commands: Vec::new(),
            mute: false,
            mute_after: None,
            absent: false,
            aux_writable: false,
            aux_latch: None,
            invalid_echoes: false,
            acr_reserved: 0,
            control_drift_on: None,
            laddr0_stuck: None,
            devices: Default::default(),
            conn: None,
            xfer: None,
        }
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    fn advance(&mut self, ticks: u32) {
        self.tick = self.tick.wrapping_add(ticks);
        if let Some(p) = self.pending {
            if self.tick >= p.at {
                self.pending = None;
                self.status = p.status;
                self.int = true;
            }
        }
    }

    fn schedule(&mut self, delay: u32, status: u8) {
        self.pending = Some(Pending {
            at: self.tick + delay,
            status,
        });
    }

    fn select_timeout_ticks(&self) -> u32 {
        let tperiod = self.regs[wd::TPERIOD as usize] as u64;
        let base = tperiod * TPERIOD_SCALE as u64 * SimBus::TICK_RATE_HZ as u64
            / SimBus::CLOCK_KHZ as u64;
        let latency = us_to_ticks(SimBus::TICK_RATE_HZ, self.wd.latency_us());
        (base as u32 + latency).max(1)
    }

    // -------------------------------------------------------------------------
    // Faults
    // -------------------------------------------------------------------------

    fn check_fault(&mut self, addr: u32, read: bool) -> AccessResult<()> {
        if self.faults.contains(&addr) {
            return Err(AccessError::BusFault { addr });
        }
        if read {
            if let Some((fault_addr, left)) = self.read_faults.as_mut() {
                if *fault_addr == addr {
                    if *left == 0 {
                        return Err(AccessError::BusFault { addr });
                    }
                    *left -= 1;
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Bus decode
    // -------------------------------------------------------------------------

    fn read(&mut self, addr: u32, width: Width) -> AccessResult<u32> {
        self.advance(1);
        self.check_fault(addr, true)?;
        let value = match addr {
            RAMSEY_VERSION if self.supervisor => self.ramsey_version as u32,
            RAMSEY_VERSION => 0,
            RAMSEY_CTRL => self.ramsey_ctrl as u32,
            ACR | ACR_ALT => self.acr | self.acr_reserved,
            WTC | WTC_ALT => self.wtc,
            CONTR => self.contr as u32,
            ISTR => self.istr() as u32,
            SASR_B | SASR_B2 => self.index as u32,
            SCMD | SCMD_B => self.wd_read() as u32,
            SSPBDAT => self.sspbdat,
            _ => 0,
        };
        Ok(value & width.mask())
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) -> AccessResult<()> {
        self.advance(1);
        self.check_fault(addr, false)?;
        let value = value & width.mask();
        match addr {
            RAMSEY_CTRL => self.ramsey_ctrl = value as u8,
            ACR | ACR_ALT => self.acr = value & ramsey::ACR_MASK,
            WTC | WTC_ALT => self.wtc = self.dmac.store_wtc(value),
            CONTR => {
                if value as u8 & sdmac::CONTR_RESET != 0 {
                    self.hard_reset();
                }
                self.contr = value as u8 & !sdmac::CONTR_RESET;
            }
            SASR_L | SASRW | SASR_B2 => self.index = value as u8,
            SCMD | SCMD_B => self.wd_write(value as u8),
            SSPBDAT => self.sspbdat = value & sdmac::SSPBDAT_MASK,
            _ => {}
        }
        Ok(())
    }

    fn istr(&self) -> u8 {
        let int = if self.int {
            sdmac::ISTR_INT_S | sdmac::ISTR_INT_P
        } else {
            0
        };
        sdmac::ISTR_FIFOE | self.istr_extra | int
    }

    // -------------------------------------------------------------------------
    // WD33C93 register file
    // -------------------------------------------------------------------------

    fn aux(&self) -> u8 {
        let mut aux = 0;
        if self.int {
            aux |= wd::AUX_INT;
        }
        if self.lci {
            aux |= wd::AUX_LCI;
        }
        if self.tick < self.cip_until {
            aux |= wd::AUX_CIP;
        }
        if !self.int && self.xfer.is_some_and(|count| count > 0) {
            aux |= wd::AUX_DBR;
        }
        aux
    }

    fn auto_increment(&mut self, ordinal: u8) {
        if !matches!(ordinal, wd::AUXST | wd::CMD | wd::DATA) {
            self.index = (ordinal + 1) & wd::LAST_DIRECT;
        }
    }

    fn wd_read(&mut self) -> u8 {
        let ordinal = self.index & wd::LAST_DIRECT;
        let value = if self.absent {
            0xFF
        } else {
            match ordinal {
                wd::INVALID if self.invalid_echoes => self.regs[wd::INVALID as usize],
                wd::INVALID => wd::INVALID_SENTINEL,
                wd::AUXST => self.aux_latch.unwrap_or_else(|| self.aux()),
                wd::SCSI_STAT => self.read_status(),
                wd::DATA => self.data_byte(None),
                wd::LADDR0 if self.laddr0_stuck.is_some() => self.laddr0_stuck.unwrap_or(0),
                o => self.regs[o as usize],
            }
        };
        self.auto_increment(ordinal);
        value
    }

    fn wd_write(&mut self, value: u8) {
        let ordinal = self.index & wd::LAST_DIRECT;
        self.writes.entry(ordinal).or_default().push(value);
        if self.control_drift_on == Some(ordinal) {
            self.regs[wd::CONTROL as usize] ^= 0x01;
        }
        match ordinal {
            wd::INVALID if self.invalid_echoes => self.regs[wd::INVALID as usize] = value,
            wd::AUXST if self.aux_writable => self.aux_latch = Some(value),
            wd::INVALID | wd::AUXST | wd::SCSI_STAT => {}
            wd::CMD => {
                self.regs[wd::CMD as usize] = value;
                self.command(value);
            }
            wd::DATA => {
                self.data_byte(Some(value));
            }
            wd::QUETAG => {
                if self.wd.is_b() {
                    self.regs[wd::QUETAG as usize] = value;
                }
            }
            o => self.regs[o as usize] = value,
        }
        self.auto_increment(ordinal);
    }

    fn read_status(&mut self) -> u8 {
        self.int = false;
        self.lci = false;
        if let Some(status) = self.queued.take() {
            self.schedule(PHASE_TICKS + 1, status);
        }
        self.status
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    fn command(&mut self, cmd: u8) {
        self.commands.push(cmd);
        if self.mute || self.mute_after.is_some_and(|n| self.commands.len() > n) {
            return;
        }
        if cmd == wd::CMD_RESET {
            self.soft_reset();
            return;
        }
        if self.int {
            self.lci = true;
            return;
        }
        self.cip_until = self.tick + CIP_TICKS;
        match cmd {
            wd::CMD_ABORT => {
                self.conn = None;
                self.xfer = None;
                self.pending = None;
                self.queued = None;
            }
            wd::CMD_SELECT_ATN | wd::CMD_SELECT => self.select(cmd == wd::CMD_SELECT_ATN),
            wd::CMD_NEGATE_ACK => self.negate_ack(),
            wd::CMD_TRANSFER_INFO => self.transfer_info(),
            wd::CMD_GET_REGISTER | wd::CMD_SET_REGISTER if self.wd.is_b() => {
                let ordinal = self.regs[wd::CDB1 as usize] as usize;
                if cmd == wd::CMD_GET_REGISTER {
                    self.regs[wd::CDB2 as usize] = self.ext[ordinal];
                } else {
                    self.ext[ordinal] = self.regs[wd::CDB2 as usize];
                }
                self.schedule(COMMAND_TICKS, cmd);
            }
            _ => self.schedule(COMMAND_TICKS, wd::STAT_INVALID_CMD),
        }
    }

    fn clear_bus(&mut self) {
        self.conn = None;
        self.xfer = None;
        self.pending = None;
        self.queued = None;
        self.int = false;
        self.lci = false;
    }

    fn soft_reset(&mut self) {
        self.clear_bus();
        self.cip_until = self.tick + CIP_TICKS;
        for reg in &mut self.regs[wd::CONTROL as usize..=wd::SRC_ID as usize] {
            *reg = 0;
        }
        let own_id = self.regs[wd::OWN_ID as usize];
        let eaf = self.wd.enhanced() && own_id & wd::OWN_ID_EAF != 0;
        if eaf && own_id & wd::OWN_ID_RAF != 0 {
            self.regs[wd::CDB1 as usize] = self.wd.microcode();
        }
        let status = if eaf {
            wd::STAT_RESET_EAF
        } else {
            wd::STAT_RESET
        };
        self.schedule(COMMAND_TICKS, status);
    }

    fn hard_reset(&mut self) {
        self.regs[wd::OWN_ID as usize] = 0;
        self.soft_reset();
    }

    fn phase_request(phase: Phase) -> u8 {
        wd::STAT_REQ | phase as u8
    }

    fn select(&mut self, atn: bool) {
        let target = (self.regs[wd::DST_ID as usize] & wd::OWN_ID_MASK) as usize;
        let Some(device) = self.devices[target].as_ref() else {
            let ticks = self.select_timeout_ticks();
            self.schedule(ticks, wd::STAT_SEL_TIMEOUT);
            return;
        };
        // without ATN the target skips message out
        let step = usize::from(!atn && device.phases.first().is_some_and(|p| p.0 == Phase::MessageOut));
        let first = device.phases.get(step).map(|p| p.0);
        let silent = device.silent;
        self.conn = Some(Connection {
            target,
            step,
            offset: 0,
            awaiting_ack: false,
        });
        self.schedule(SELECT_TICKS, wd::STAT_SELECTED);
        if let (false, Some(phase)) = (silent, first) {
            self.queued = Some(Self::phase_request(phase));
        }
    }

    fn transfer_info(&mut self) {
        if self.conn.is_none() {
            self.schedule(COMMAND_TICKS, wd::STAT_INVALID_CMD);
            return;
        }
        let count = u32::from_be_bytes([
            0,
            self.regs[wd::TCOUNT2 as usize],
            self.regs[wd::TCOUNT1 as usize],
            self.regs[wd::TCOUNT0 as usize],
        ]);
        self.xfer = Some(count);
    }

    fn store_count(&mut self, count: u32) {
        let [_, high, mid, low] = count.to_be_bytes();
        self.regs[wd::TCOUNT2 as usize] = high;
        self.regs[wd::TCOUNT1 as usize] = mid;
        self.regs[wd::TCOUNT0 as usize] = low;
    }

    fn negate_ack(&mut self) {
        let Some(mut conn) = self.conn.filter(|c| c.awaiting_ack) else {
            self.schedule(COMMAND_TICKS, wd::STAT_INVALID_CMD);
            return;
        };
        conn.awaiting_ack = false;
        conn.step += 1;
        conn.offset = 0;
        let next = self.devices[conn.target]
            .as_ref()
            .and_then(|d| d.phases.get(conn.step))
            .map(|p| p.0);
        match next {
            Some(phase) => {
                self.conn = Some(conn);
                self.schedule(PHASE_TICKS, Self::phase_request(phase));
            }
            None => {
                self.conn = None;
                self.schedule(PHASE_TICKS, wd::STAT_DISCONNECT);
            }
        }
    }

    /// Move one byte through the data register
    fn data_byte(&mut self, written: Option<u8>) -> u8 {
        let (Some(count), Some(mut conn)) = (self.xfer, self.conn) else {
            return 0;
        };
        if count == 0 || self.int {
            return 0;
        }
        let Some(device) = self.devices[conn.target].as_mut() else {
            return 0;
        };
        let Some((phase, bytes)) = device.phases.get(conn.step) else {
            return 0;
        };
        let phase = *phase;
        let len = bytes.len();
        let value = if phase.is_inbound() {
            bytes.get(conn.offset).copied().unwrap_or(0)
        } else {
            device.received.push(written.unwrap_or(0));
            0
        };
        let next = device.phases.get(conn.step + 1).map(|p| p.0);

        conn.offset += 1;
        let count = count - 1;
        self.store_count(count);
        if conn.offset >= len {
            self.xfer = None;
            if phase == Phase::MessageIn {
                conn.awaiting_ack = true;
                self.schedule(PHASE_TICKS, wd::STAT_PAUSED_ACK);
            } else {
                conn.step += 1;
                conn.offset = 0;
                // 0x48: target changed phase before the count ran out
                let next = next.map_or(wd::STAT_UNEXPECTED_DISC, |p| {
                    if count == 0 { wd::STAT_XFER_DONE | p as u8 } else { 0x48 | p as u8 }
                });
                self.schedule(PHASE_TICKS, next);
            }
        } else if count == 0 {
            self.xfer = None;
            self.schedule(PHASE_TICKS, wd::STAT_XFER_DONE | phase as u8);
        } else {
            self.xfer = Some(count);
        }
        self.conn = Some(conn);
        value
    }
}

// =============================================================================
// SimBus
// =============================================================================

/// Simulated A3000 SCSI register space
#[derive(Debug, Clone)]
pub struct SimBus {
    state: Rc<RefCell<SimState>>,
}

impl SimBus {
    /// Tick source rate (NTSC EClock)
    pub const TICK_RATE_HZ: u32 = 709_379;
    /// WD33C93 input clock
    pub const CLOCK_KHZ: u32 = 14_318;

    /// Ramsey-07, SDMAC-02 and a WD33C93A
    pub fn new() -> Self {
        Self::build(WdVariant::Wd33c93a { microcode: 0x09 }, DmacVariant::Sdmac02)
    }

    pub fn with_wd(wd: WdVariant) -> Self {
        Self::build(wd, DmacVariant::Sdmac02)
    }

    pub fn with_dmac(dmac: DmacVariant) -> Self {
        Self::build(WdVariant::Wd33c93a { microcode: 0x09 }, dmac)
    }

    fn build(wd: WdVariant, dmac: DmacVariant) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::new(wd, dmac))),
        }
    }

    /// Supervisor-state primitive sharing this bus's state
    pub fn privilege(&self) -> SimPrivilege {
        SimPrivilege {
            state: Rc::clone(&self.state),
        }
    }

    /// Tick source sharing this bus's clock
    pub fn ticks(&self) -> SimTicks {
        SimTicks::new(self)
    }

    // --- host ---------------------------------------------------------------

    pub fn elevations(&self) -> u32 {
        self.state.borrow().elevations
    }

    pub fn in_supervisor(&self) -> bool {
        self.state.borrow().supervisor
    }

    /// Every access to `addr` faults
    pub fn fault_at(&self, addr: u32) {
        self.state.borrow_mut().faults.push(addr);
    }

    /// The next `reads` reads of `addr` succeed, later ones fault
    pub fn fault_reads_after(&self, addr: u32, reads: u32) {
        self.state.borrow_mut().read_faults = Some((addr, reads));
    }

    pub fn clear_faults(&self) {
        let mut s = self.state.borrow_mut();
        s.faults.clear();
        s.read_faults = None;
    }

    // --- Ramsey / SDMAC -----------------------------------------------------

    pub fn set_ramsey_ctrl(&self, value: u8) {
        self.state.borrow_mut().ramsey_ctrl = value;
    }

    pub fn set_acr(&self, value: u32) {
        self.state.borrow_mut().acr = value;
    }

    /// Reserved ACR bits that read back set
    pub fn set_acr_reserved(&self, bits: u32) {
        self.state.borrow_mut().acr_reserved = bits;
    }

    pub fn acr(&self) -> u32 {
        self.state.borrow().acr
    }

    pub fn set_wtc(&self, value: u32) {
        self.state.borrow_mut().wtc = value;
    }

    pub fn wtc(&self) -> u32 {
        self.state.borrow().wtc
    }

    pub fn contr(&self) -> u8 {
        self.state.borrow().contr
    }

    /// Extra ISTR bits, as if the SDMAC had pending status
    pub fn set_istr_extra(&self, bits: u8) {
        self.state.borrow_mut().istr_extra = bits;
    }

    // --- WD33C93 ------------------------------------------------------------

    pub fn set_index(&self, index: u8) {
        self.state.borrow_mut().index = index;
    }

    /// Register contents, bypassing read side effects
    pub fn wd_reg(&self, ordinal: u8) -> u8 {
        self.state.borrow().regs[(ordinal & wd::LAST_DIRECT) as usize]
    }

    /// Every value written to `ordinal`, oldest first
    pub fn wd_writes(&self, ordinal: u8) -> Vec<u8> {
        self.state
            .borrow()
            .writes
            .get(&ordinal)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_ext(&self, ordinal: u8, value: u8) {
        self.state.borrow_mut().ext[ordinal as usize] = value;
    }

    pub fn ext(&self, ordinal: u8) -> u8 {
        self.state.borrow().ext[ordinal as usize]
    }

    /// Accept commands but never act on them
    pub fn set_mute_commands(&self, mute: bool) {
        self.state.borrow_mut().mute = mute;
    }

    /// Act on the next `n` commands, then behave as muted
    pub fn set_mute_after(&self, n: usize) {
        let mut s = self.state.borrow_mut();
        s.mute_after = Some(s.commands.len() + n);
    }

    pub fn commands_issued(&self) -> usize {
        self.state.borrow().commands.len()
    }

    /// How often `cmd` was issued
    pub fn commands(&self, cmd: u8) -> usize {
        self.state.borrow().commands.iter().filter(|&&c| c == cmd).count()
    }

    /// Every SCMD read returns 0xFF
    pub fn set_absent(&self, absent: bool) {
        self.state.borrow_mut().absent = absent;
    }

    /// AUXST latches whatever is written to it
    pub fn set_aux_writable(&self, writable: bool) {
        self.state.borrow_mut().aux_writable = writable;
    }

    /// Register 0x1E stores writes instead of reading 0xFF
    pub fn set_invalid_echoes(&self, echoes: bool) {
        self.state.borrow_mut().invalid_echoes = echoes;
    }

    /// Writes to QUETAG toggle a CONTROL bit
    pub fn set_quetag_disturbs_control(&self, disturb: bool) {
        self.state.borrow_mut().control_drift_on = disturb.then_some(wd::QUETAG);
    }

    /// Writes to `ordinal` toggle a CONTROL bit
    pub fn set_control_drift_on(&self, ordinal: u8) {
        self.state.borrow_mut().control_drift_on = Some(ordinal);
    }

    /// LADDR0 always reads `value`
    pub fn set_laddr0_stuck(&self, value: Option<u8>) {
        self.state.borrow_mut().laddr0_stuck = value;
    }

    // --- SCSI bus -----------------------------------------------------------

    pub fn attach(&self, target: u8, device: SimDevice) {
        self.state.borrow_mut().devices[target as usize] = Some(device);
    }

    /// Bytes the target received in outbound phases
    pub fn device_received(&self, target: u8) -> Vec<u8> {
        self.state.borrow().devices[target as usize]
            .as_ref()
            .map(|d| d.received.clone())
            .unwrap_or_default()
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for SimBus {
    fn read(&mut self, addr: u32, width: Width) -> AccessResult<u32> {
        self.state.borrow_mut().read(addr, width)
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) -> AccessResult<()> {
        self.state.borrow_mut().write(addr, width, value)
    }
}

// =============================================================================
// Host capabilities
// =============================================================================

/// Supervisor-state primitive that records elevations
#[derive(Debug, Clone)]
pub struct SimPrivilege {
    state: Rc<RefCell<SimState>>,
}

impl Privilege for SimPrivilege {
    type Token = bool;

    fn elevate(&mut self) -> bool {
        let mut s = self.state.borrow_mut();
        s.elevations += 1;
        core::mem::replace(&mut s.supervisor, true)
    }

    fn restore(&mut self, token: bool) {
        self.state.borrow_mut().supervisor = token;
    }
}

/// Tick source reading the simulator's clock
#[derive(Debug, Clone)]
pub struct SimTicks {
    state: Rc<RefCell<SimState>>,
}

impl SimTicks {
    pub fn new(sim: &SimBus) -> Self {
        Self {
            state: Rc::clone(&sim.state),
        }
    }
}

impl TickSource for SimTicks {
    fn now(&mut self) -> u32 {
        self.state.borrow().tick
    }

    fn rate_hz(&self) -> u32 {
        SimBus::TICK_RATE_HZ
    }
}

/// Delay that advances the simulator's clock
#[derive(Debug)]
pub struct MockDelay {
    state: Rc<RefCell<SimState>>,
    total_ns: u64,
}

impl MockDelay {
    pub fn new(sim: &SimBus) -> Self {
        Self {
            state: Rc::clone(&sim.state),
            total_ns: 0,
        }
    }

    /// Total requested delay
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
        let ticks = us_to_ticks(SimBus::TICK_RATE_HZ, ns / 1_000);
        self.state.borrow_mut().advance(ticks);
    }
}

// =============================================================================
// Recording reporter
// =============================================================================

/// Reporter that keeps everything it is told
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub mismatches: Vec<Mismatch>,
    pub done: Vec<SubtestResult>,
    pub anomalies: Vec<ProtocolAnomaly>,
    pub probes: Vec<(u8, ProbeOutcome)>,
}

impl Reporter for RecordingReporter {
    fn mismatch(&mut self, mismatch: &Mismatch) {
        self.mismatches.push(*mismatch);
    }

    fn subtest_done(&mut self, result: &SubtestResult) {
        self.done.push(*result);
    }

    fn anomaly(&mut self, anomaly: &ProtocolAnomaly) {
        self.anomalies.push(*anomaly);
    }

    fn probe_result(&mut self, target: u8, outcome: &ProbeOutcome) {
        self.probes.push((target, *outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reports_advanced_features_only_on_enhanced_parts() {
        for (variant, expected) in [
            (WdVariant::Wd33c93, wd::STAT_RESET),
            (WdVariant::Wd33c93a { microcode: 1 }, wd::STAT_RESET_EAF),
        ] {
            let mut s = SimState::new(variant, DmacVariant::Sdmac02);
            s.regs[wd::OWN_ID as usize] = wd::OWN_ID_EAF;
            s.command(wd::CMD_RESET);
            s.advance(COMMAND_TICKS);
            assert!(s.int);
            assert_eq!(s.read_status(), expected);
            assert!(!s.int);
        }
    }

    #[test]
    fn command_during_pending_interrupt_is_ignored() {
        let mut s = SimState::new(WdVariant::Wd33c93b { microcode: 1 }, DmacVariant::Sdmac02);
        s.int = true;
        s.command(wd::CMD_ABORT);
        assert_ne!(s.aux() & wd::AUX_LCI, 0);
    }

    #[test]
    fn selection_timeout_scales_with_tperiod() {
        let mut s = SimState::new(WdVariant::Wd33c93, DmacVariant::Sdmac02);
        s.regs[wd::TPERIOD as usize] = 4;
        let short = s.select_timeout_ticks();
        s.regs[wd::TPERIOD as usize] = 8;
        let long = s.select_timeout_ticks();
        let latency = us_to_ticks(SimBus::TICK_RATE_HZ, LATENCY_WD33C93_US);
        assert_eq!(long - latency, 2 * (short - latency));
    }
}
