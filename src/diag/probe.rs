//! SCSI Initiator Probe
//!
//! Selects each candidate target in turn and walks it through a polled
//! TEST UNIT READY:
//!
//! ```text
//! Idle -> CommandSetup -> Selecting -+-> SelectTimeout ------------+
//!                                    +-> BusError -----------------+
//!                                    +-> Connected -> PhaseTransfer+-> Abort + Reset -> Idle
//! ```
//!
//! Every wait is bounded. Inbound transfers run until the WD33C93 transfer
//! count reaches zero. Each target ends with ABORT and a soft reset so
//! nothing carries over to the next one. The abort signal is polled between
//! targets only.

use crate::chip::wd33c93::soft_reset;
use crate::diag::config::ProbeConfig;
use crate::diag::report::Reporter;
use crate::error::{Error, IoError, IoResult, Result};
use crate::hal::bus::RegisterIo;
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::Privilege;
use crate::hal::timer::{TickSource, Timeout};
use crate::hal::window::Window;
use crate::internal::constants::PROBE_BUFFER_LEN;
use crate::internal::register::wd::{self, Phase};
use crate::internal::register::sdmac;

/// TEST UNIT READY
const PROBE_CDB: [u8; wd::CDB_LEN] = [0; wd::CDB_LEN];

/// Interrupts handled per target before giving up on a chatty device
const MAX_PHASE_STEPS: usize = 16;

// =============================================================================
// Types
// =============================================================================

/// Cooperative cancellation, polled once per target
pub trait AbortSignal {
    /// True if the operator asked to stop
    fn should_abort(&mut self) -> bool;
}

impl<F: FnMut() -> bool> AbortSignal for F {
    fn should_abort(&mut self) -> bool {
        self()
    }
}

/// What happened when a target was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeOutcome {
    /// The target answered the selection
    Responded {
        /// Status byte from the status phase, if one was reached
        scsi_status: Option<u8>,
        /// Failure after the target connected
        transfer_error: Option<IoError>,
    },
    /// Selection timed out or the select was ignored
    NoResponse,
    /// The probe itself failed
    BusError(Error),
}

impl ProbeOutcome {
    /// Whether a device is present
    pub const fn responded(&self) -> bool {
        matches!(self, Self::Responded { .. })
    }
}

/// Outcomes indexed by target ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProbeReport {
    /// `None` for IDs that were not probed
    pub outcomes: [Option<ProbeOutcome>; 8],
    /// The operator stopped the probe before every target was tried
    pub cancelled: bool,
}

impl ProbeReport {
    /// [`IoError::Cancelled`] if the operator stopped the probe
    pub const fn completed(&self) -> IoResult<()> {
        if self.cancelled {
            Err(IoError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Outcome for one target ID
    pub fn get(&self, target: u8) -> Option<&ProbeOutcome> {
        self.outcomes.get(target as usize)?.as_ref()
    }

    /// IDs of targets that answered
    pub fn responders(&self) -> impl Iterator<Item = u8> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_some_and(|o| o.responded()))
            .map(|(id, _)| id as u8)
    }
}

// =============================================================================
// Probe
// =============================================================================

/// Probe every configured target
///
/// Outcomes are streamed to `reporter` as each target finishes. If `abort`
/// fires, the SDMAC control register is restored and the outcomes gathered
/// so far are returned with [`ProbeReport::cancelled`] set.
pub fn probe<IO, P, T, R, A>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &ProbeConfig,
    command_timeout: Timeout,
    reporter: &mut R,
    abort: &mut A,
) -> Result<ProbeReport>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
    R: Reporter + ?Sized,
    A: AbortSignal + ?Sized,
{
    let contr = window.bus().read_u8(sdmac::CONTR)?;
    let mut report = ProbeReport::default();
    let result = probe_targets(window, ticks, config, command_timeout, reporter, abort, &mut report);
    let restored = window.bus().write(sdmac::CONTR, contr as u32);
    result?;
    restored?;
    Ok(report)
}

fn probe_targets<IO, P, T, R, A>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &ProbeConfig,
    command_timeout: Timeout,
    reporter: &mut R,
    abort: &mut A,
    report: &mut ProbeReport,
) -> Result<()>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
    R: Reporter + ?Sized,
    A: AbortSignal + ?Sized,
{
    for target in config.targets() {
        if abort.should_abort() {
            info!("probe cancelled before target {}", target);
            report.cancelled = true;
            return Ok(());
        }
        let outcome = probe_target(window, ticks, config, command_timeout, target);
        reporter.probe_result(target, &outcome);
        report.outcomes[target as usize] = Some(outcome);
    }
    Ok(())
}

fn probe_target<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &ProbeConfig,
    command_timeout: Timeout,
    target: u8,
) -> ProbeOutcome
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    let _cs = InterruptGuard::acquire();
    let outcome = select(window, ticks, config, command_timeout, target)
        .unwrap_or_else(ProbeOutcome::BusError);

    // Abort and reset even after a failure; the first error wins
    match (outcome, reset_target(window, ticks, command_timeout)) {
        (ProbeOutcome::BusError(_), _) | (_, Ok(())) => outcome,
        (_, Err(e)) => ProbeOutcome::BusError(e),
    }
}

fn setup<IO: RegisterIo, P: Privilege>(
    window: &mut Window<IO, P>,
    config: &ProbeConfig,
    target: u8,
) -> Result<()> {
    let bus = window.bus();
    let contr = bus.read_u8(sdmac::CONTR)?;
    bus.write(sdmac::CONTR, (contr & !sdmac::CONTR_DMAENA) as u32)?;

    window.set(wd::CONTROL, wd::CONTROL_POLLED)?;
    window.set(wd::SYNC_TX, 0)?;
    window.set_block(wd::CDB1, &PROBE_CDB)?;
    window.set24(wd::TCOUNT2, 0)?;
    window.set(wd::DST_ID, target)?;
    window.set(wd::TPERIOD, config.tperiod)?;
    window.set(wd::LUN, config.lun & wd::LUN_MASK)?;
    Ok(())
}

fn select<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &ProbeConfig,
    command_timeout: Timeout,
    target: u8,
) -> Result<ProbeOutcome>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    setup(window, config, target)?;
    window.command(wd::CMD_SELECT_ATN)?;
    window.wait_aux(ticks, command_timeout, |aux| aux & wd::AUX_CIP == 0)?;
    let aux = window.wait_aux(ticks, config.select_timeout, |aux| {
        aux & (wd::AUX_LCI | wd::AUX_INT) != 0
    })?;
    let status = window.get(wd::SCSI_STAT)?;

    if aux & wd::AUX_INT == 0 {
        debug!("target {}: select ignored, status {:#04x}", target, status);
        return Ok(ProbeOutcome::NoResponse);
    }
    if status == wd::STAT_SEL_TIMEOUT {
        return Ok(ProbeOutcome::NoResponse);
    }

    let mut scsi_status = None;
    let transfer_error = match converse(window, ticks, config, command_timeout, status, &mut scsi_status) {
        Ok(()) => None,
        Err(Error::Io(e)) => Some(e),
        Err(e) => return Err(e),
    };
    Ok(ProbeOutcome::Responded {
        scsi_status,
        transfer_error,
    })
}

/// Follow the target's phase requests until it disconnects
fn converse<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &ProbeConfig,
    command_timeout: Timeout,
    mut status: u8,
    scsi_status: &mut Option<u8>,
) -> Result<()>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    for _ in 0..MAX_PHASE_STEPS {
        match status {
            wd::STAT_SELECTED => {}
            wd::STAT_PAUSED_ACK => window.command(wd::CMD_NEGATE_ACK)?,
            wd::STAT_DISCONNECT => return Ok(()),
            s => match Phase::from_status(s) {
                Some(phase) => transfer_phase(window, ticks, config, phase, scsi_status)?,
                None => return Err(IoError::Protocol { status: s }.into()),
            },
        }
        window.wait_aux(ticks, command_timeout, |aux| aux & wd::AUX_INT != 0)?;
        status = window.get(wd::SCSI_STAT)?;
        trace!("probe status {:#04x}", status);
    }
    Err(IoError::Protocol { status }.into())
}

fn transfer_phase<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    config: &ProbeConfig,
    phase: Phase,
    scsi_status: &mut Option<u8>,
) -> Result<()>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    let mut buf = [0u8; PROBE_BUFFER_LEN];
    let len = match phase {
        Phase::MessageOut => {
            buf[0] = wd::MSG_IDENTIFY | (config.lun & wd::LUN_MASK);
            1
        }
        Phase::Command => {
            buf[..wd::CDB_LEN].copy_from_slice(&PROBE_CDB);
            wd::CDB_LEN
        }
        Phase::Status | Phase::MessageIn => 1,
        _ => PROBE_BUFFER_LEN,
    };

    let bus = window.bus();
    let contr = bus.read_u8(sdmac::CONTR)?;
    let contr = if phase.is_inbound() {
        contr & !sdmac::CONTR_DMADIR
    } else {
        contr | sdmac::CONTR_DMADIR
    };
    bus.write(sdmac::CONTR, contr as u32)?;

    window.set24(wd::TCOUNT2, len as u32)?;
    window.command(wd::CMD_TRANSFER_INFO)?;
    transfer_bytes(window, ticks, config.byte_timeout, phase, &mut buf[..len])?;

    match phase {
        Phase::Status => *scsi_status = Some(buf[0]),
        Phase::MessageIn => trace!("message in {:#04x}", buf[0]),
        _ => {}
    }
    Ok(())
}

/// Move bytes through the data register, one DBR at a time
///
/// Outbound phases send all of `buf`. Inbound phases read until TCOUNT
/// reaches zero; a count that outruns `buf` is a protocol error.
fn transfer_bytes<IO, P, T>(
    window: &mut Window<IO, P>,
    ticks: &mut T,
    timeout: Timeout,
    phase: Phase,
    buf: &mut [u8],
) -> Result<()>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    if !phase.is_inbound() {
        for &byte in buf.iter() {
            wait_data_ready(window, ticks, timeout)?;
            window.set(wd::DATA, byte)?;
        }
        return Ok(());
    }

    let mut received = 0;
    while window.get24(wd::TCOUNT2)? > 0 {
        let Some(slot) = buf.get_mut(received) else {
            let status = window.get(wd::SCSI_STAT)?;
            warn!("transfer count did not run down, status {:#04x}", status);
            return Err(IoError::Protocol { status }.into());
        };
        wait_data_ready(window, ticks, timeout)?;
        *slot = window.get(wd::DATA)?;
        received += 1;
    }
    Ok(())
}

/// Wait for DBR; an interrupt or ignored command first is a protocol error
fn wait_data_ready<IO, P, T>(window: &mut Window<IO, P>, ticks: &mut T, timeout: Timeout) -> Result<()>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    let aux = window.wait_aux(ticks, timeout, |aux| {
        aux & (wd::AUX_DBR | wd::AUX_INT | wd::AUX_LCI) != 0
    })?;
    if aux & wd::AUX_DBR == 0 {
        let status = window.get(wd::SCSI_STAT)?;
        warn!("transfer aborted, aux {:#04x} status {:#04x}", aux, status);
        return Err(IoError::Protocol { status }.into());
    }
    Ok(())
}

fn reset_target<IO, P, T>(window: &mut Window<IO, P>, ticks: &mut T, timeout: Timeout) -> Result<()>
where
    IO: RegisterIo,
    P: Privilege,
    T: TickSource + ?Sized,
{
    window.command(wd::CMD_ABORT)?;
    window.wait_aux(ticks, timeout, |aux| aux & wd::AUX_CIP == 0)?;
    soft_reset(window, ticks, timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;
    use crate::hal::bus::RegisterBus;
    use crate::hal::window::IndexPort;
    use crate::test_utils::{RecordingReporter, SimBus, SimDevice, SimPrivilege, SimTicks};

    const CMD: Timeout = Timeout::new(10_000, 10_000);

    fn window(sim: &SimBus) -> Window<SimBus, SimPrivilege> {
        Window::new(RegisterBus::new(sim.clone(), sim.privilege()), IndexPort::Byte)
    }

    fn fast() -> ProbeConfig {
        ProbeConfig {
            tperiod: 4,
            ..ProbeConfig::default()
        }
    }

    fn run(sim: &SimBus, config: &ProbeConfig) -> (Result<ProbeReport>, RecordingReporter) {
        let mut w = window(sim);
        let mut t = sim.ticks();
        let mut rep = RecordingReporter::default();
        let r = probe(&mut w, &mut t, config, CMD, &mut rep, &mut || false);
        (r, rep)
    }

    #[test]
    fn empty_bus_has_no_responders() {
        let sim = SimBus::new();
        let (report, rep) = run(&sim, &fast());
        let report = report.unwrap();
        assert_eq!(report.responders().count(), 0);
        for id in 0..7 {
            assert_eq!(report.get(id), Some(&ProbeOutcome::NoResponse));
        }
        assert_eq!(report.get(7), None);
        assert_eq!(rep.probes.len(), 7);
        // no transfer was attempted on an empty bus
        assert_eq!(sim.commands(wd::CMD_TRANSFER_INFO), 0);
    }

    #[test]
    fn ready_device_completes_test_unit_ready() {
        let sim = SimBus::new();
        sim.attach(2, SimDevice::ready());
        sim.attach(5, SimDevice::with_status(0x02));
        let (report, _) = run(&sim, &fast());
        let report = report.unwrap();
        assert_eq!(
            report.get(2),
            Some(&ProbeOutcome::Responded {
                scsi_status: Some(0x00),
                transfer_error: None
            })
        );
        assert_eq!(
            report.get(5),
            Some(&ProbeOutcome::Responded {
                scsi_status: Some(0x02),
                transfer_error: None
            })
        );
        assert_eq!(report.responders().collect::<Vec<_>>(), [2, 5]);

        let mut expected = std::vec![wd::MSG_IDENTIFY];
        expected.extend_from_slice(&PROBE_CDB);
        assert_eq!(sim.device_received(2), expected);
    }

    #[test]
    fn early_phase_change_is_a_protocol_error() {
        let sim = SimBus::new();
        sim.attach(1, SimDevice::ready().with_data_in(&[1, 2, 3, 4]));
        let (report, _) = run(&sim, &fast());
        match report.unwrap().get(1) {
            Some(ProbeOutcome::Responded {
                scsi_status: None,
                transfer_error: Some(IoError::Protocol { status }),
            }) => assert_eq!(*status & 0xF0, 0x40),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn silent_target_times_out_but_is_present() {
        let sim = SimBus::new();
        sim.attach(0, SimDevice::silent());
        let (report, _) = run(&sim, &fast());
        let outcome = *report.unwrap().get(0).unwrap();
        assert!(outcome.responded());
        assert!(matches!(
            outcome,
            ProbeOutcome::Responded {
                transfer_error: Some(IoError::Timeout { .. }),
                ..
            }
        ));
    }

    #[test]
    fn own_id_is_skipped() {
        let sim = SimBus::new();
        let cfg = ProbeConfig {
            own_id: 3,
            ..fast()
        };
        let (report, _) = run(&sim, &cfg);
        assert_eq!(report.unwrap().get(3), None);
    }

    #[test]
    fn cancellation_keeps_earlier_outcomes() {
        let sim = SimBus::new();
        sim.attach(1, SimDevice::ready());
        let mut w = window(&sim);
        w.bus().write(sdmac::CONTR, (sdmac::CONTR_DMAENA | sdmac::CONTR_INTEN) as u32).unwrap();
        let mut t = sim.ticks();
        let mut rep = RecordingReporter::default();
        let mut polls = 0;
        let mut abort = || {
            polls += 1;
            polls > 2
        };
        let report = probe(&mut w, &mut t, &fast(), CMD, &mut rep, &mut abort).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.completed(), Err(IoError::Cancelled));
        assert_eq!(report.get(0), Some(&ProbeOutcome::NoResponse));
        assert!(report.get(1).is_some_and(ProbeOutcome::responded));
        assert_eq!(report.get(2), None);
        assert_eq!(rep.probes.len(), 2);
        assert_eq!(sim.contr(), sdmac::CONTR_DMAENA | sdmac::CONTR_INTEN);
    }

    fn next_status(w: &mut Window<SimBus, SimPrivilege>, t: &mut SimTicks) -> u8 {
        w.wait_aux(t, CMD, |aux| aux & wd::AUX_INT != 0).unwrap();
        w.get(wd::SCSI_STAT).unwrap()
    }

    #[test]
    fn inbound_transfer_stops_when_count_runs_out() {
        let sim = SimBus::new();
        sim.attach(3, SimDevice::ready().with_data_in(&[0x11, 0x22, 0x33]));
        let cfg = fast();
        let mut w = window(&sim);
        let mut t = sim.ticks();

        w.set(wd::DST_ID, 3).unwrap();
        w.command(wd::CMD_SELECT_ATN).unwrap();
        assert_eq!(next_status(&mut w, &mut t), wd::STAT_SELECTED);
        for (phase, len) in [(Phase::MessageOut, 1), (Phase::Command, wd::CDB_LEN)] {
            assert_eq!(Phase::from_status(next_status(&mut w, &mut t)), Some(phase));
            let mut out = [0u8; wd::CDB_LEN];
            w.set24(wd::TCOUNT2, len as u32).unwrap();
            w.command(wd::CMD_TRANSFER_INFO).unwrap();
            transfer_bytes(&mut w, &mut t, cfg.byte_timeout, phase, &mut out[..len]).unwrap();
        }
        assert_eq!(Phase::from_status(next_status(&mut w, &mut t)), Some(Phase::DataIn));

        // the target offers three bytes, the count allows two
        let mut buf = [0u8; 4];
        w.set24(wd::TCOUNT2, 2).unwrap();
        w.command(wd::CMD_TRANSFER_INFO).unwrap();
        transfer_bytes(&mut w, &mut t, cfg.byte_timeout, Phase::DataIn, &mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x22, 0x00, 0x00]);
        assert_eq!(w.get24(wd::TCOUNT2).unwrap(), 0);
    }

    #[test]
    fn bus_fault_is_reported_per_target() {
        let sim = SimBus::new();
        sim.fault_at(sdmac::SASR_B2.addr);
        let (report, _) = run(&sim, &fast());
        let report = report.unwrap();
        assert!(matches!(report.get(0), Some(ProbeOutcome::BusError(e)) if e.is_bus_fault()));
    }
}
