//! Reporting collaborator
//!
//! Diagnostics push individual findings to a [`Reporter`] as they happen, so
//! output does not wait for a test to finish and survives a cancelled run.
//! [`LogReporter`] forwards everything to the crate's log backend, using the
//! [`crate::decode`] tables for human-readable status text.

use crate::decode;
use crate::diag::battery::{Mismatch, SubtestResult};
use crate::diag::probe::ProbeOutcome;
use crate::hal::window::ProtocolAnomaly;

/// Receives diagnostic findings
pub trait Reporter {
    /// A battery check read back something unexpected
    fn mismatch(&mut self, mismatch: &Mismatch);

    /// A battery sub-test finished
    fn subtest_done(&mut self, _result: &SubtestResult) {}

    /// An extended register command was not confirmed
    fn anomaly(&mut self, _anomaly: &ProtocolAnomaly) {}

    /// A probe target finished
    fn probe_result(&mut self, _target: u8, _outcome: &ProbeOutcome) {}
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn mismatch(&mut self, mismatch: &Mismatch) {
        (**self).mismatch(mismatch);
    }

    fn subtest_done(&mut self, result: &SubtestResult) {
        (**self).subtest_done(result);
    }

    fn anomaly(&mut self, anomaly: &ProtocolAnomaly) {
        (**self).anomaly(anomaly);
    }

    fn probe_result(&mut self, target: u8, outcome: &ProbeOutcome) {
        (**self).probe_result(target, outcome);
    }
}

/// Forwards findings to the log backend
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn mismatch(&mut self, m: &Mismatch) {
        warn!(
            "{} {}: read {:#010x} expected {:#010x} (wrote {:#010x})",
            m.subtest.name(),
            m.kind.as_str(),
            m.actual,
            m.expected,
            m.written
        );
    }

    fn subtest_done(&mut self, r: &SubtestResult) {
        if r.passed() {
            info!("{}: PASS", r.subtest.name());
        } else {
            warn!("{}: FAIL, {} errors", r.subtest.name(), r.errors);
        }
    }

    fn anomaly(&mut self, a: &ProtocolAnomaly) {
        warn!(
            "extended register {:#04x}: {}",
            a.ordinal,
            decode::decode_status(a.status).detail
        );
    }

    fn probe_result(&mut self, target: u8, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Responded {
                scsi_status,
                transfer_error,
            } => {
                info!("target {}: responded, status {:#04x}", target, scsi_status.unwrap_or(0xFF));
                if let Some(e) = transfer_error {
                    warn!("target {}: {}", target, e.as_str());
                }
            }
            ProbeOutcome::NoResponse => debug!("target {}: no response", target),
            ProbeOutcome::BusError(e) => error!("target {}: {}", target, e.as_str()),
        }
    }
}
