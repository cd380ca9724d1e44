//! Register Correctness Test Battery
//!
//! Each sub-test writes the twenty adversarial patterns to one register,
//! flushes the bus, and checks what comes back:
//!
//! | Sub-test        | Register       | Expectation                       |
//! |-----------------|----------------|-----------------------------------|
//! | Ramsey ACR      | ACR via shadow | reads back, bits 1:0 read as zero |
//! | SDMAC WTC       | WTC via shadow | reads back, 24 bits (SDMAC-02)    |
//! | SDMAC SSPBDAT   | SSPBDAT        | reads back, 8 bits (SDMAC-04)     |
//! | WDC LADDR0      | 0x0A           | reads back                        |
//! | WDC AUXST       | 0x1F           | never changes (read only)         |
//! | WDC invalid     | 0x1E           | always 0xFF                       |
//!
//! WD33C93 sub-tests also re-read CONTROL after every pattern. A change is
//! charged to the register under test. A sub-test gives up after
//! `flood_limit` consecutive mismatches; the battery moves on regardless.

use crate::chip::DmacRevision;
use crate::diag::report::Reporter;
use crate::error::Result;
use crate::hal::bus::RegisterIo;
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::Privilege;
use crate::hal::window::Window;
use crate::internal::constants::TEST_PATTERNS;
use crate::internal::register::{Register, ramsey, sdmac, wd};

// =============================================================================
// Types
// =============================================================================

/// Battery sub-tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Subtest {
    /// Ramsey DMA address register
    RamseyAcr,
    /// SDMAC word transfer count
    SdmacWtc,
    /// SDMAC serial peripheral data
    SdmacSspbdat,
    /// WD33C93 logical address LSB
    WdLaddr0,
    /// WD33C93 auxiliary status
    WdAuxStatus,
    /// WD33C93 unimplemented register
    WdInvalid,
}

impl Subtest {
    /// Short register name
    pub const fn name(self) -> &'static str {
        match self {
            Self::RamseyAcr => "Ramsey ACR",
            Self::SdmacWtc => "SDMAC WTC",
            Self::SdmacSspbdat => "SDMAC SSPBDAT",
            Self::WdLaddr0 => "WDC LADDR0",
            Self::WdAuxStatus => "WDC AUXST",
            Self::WdInvalid => "WDC reg 0x1e",
        }
    }
}

/// What kind of check a mismatch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MismatchKind {
    /// Read-after-write differed from the pattern
    ReadBack,
    /// Read-only register changed after a write
    ReadOnlyChanged,
    /// Unimplemented register did not read its sentinel
    Sentinel,
    /// CONTROL moved while the register under test was written
    ControlDrift,
}

impl MismatchKind {
    /// Short description
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadBack => "read-back",
            Self::ReadOnlyChanged => "read-only changed",
            Self::Sentinel => "sentinel",
            Self::ControlDrift => "CONTROL drift",
        }
    }
}

/// One expected-versus-actual divergence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mismatch {
    /// Sub-test the mismatch is charged to
    pub subtest: Subtest,
    /// Check that failed
    pub kind: MismatchKind,
    /// Pattern written (already masked)
    pub written: u32,
    /// Value that should have been read
    pub expected: u32,
    /// Value actually read
    pub actual: u32,
}

/// Outcome of one sub-test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubtestResult {
    /// Sub-test
    pub subtest: Subtest,
    /// Mismatches recorded
    pub errors: u32,
    /// Gave up after too many consecutive mismatches
    pub aborted: bool,
}

impl SubtestResult {
    /// No mismatches
    pub const fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// Outcome of a full battery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReport {
    /// Ramsey ACR
    pub ramsey: SubtestResult,
    /// SDMAC register for the detected revision; `None` if unknown
    pub sdmac: Option<SubtestResult>,
    /// WD33C93 LADDR0, AUXST and invalid register
    pub wd: [SubtestResult; 3],
}

impl BatteryReport {
    /// All sub-test results in run order
    pub fn results(&self) -> impl Iterator<Item = &SubtestResult> {
        core::iter::once(&self.ramsey)
            .chain(self.sdmac.as_ref())
            .chain(self.wd.iter())
    }

    /// Total mismatches
    pub fn errors(&self) -> u32 {
        self.results().map(|r| r.errors).sum()
    }

    /// Every sub-test passed
    pub fn passed(&self) -> bool {
        self.errors() == 0
    }
}

// =============================================================================
// Tally
// =============================================================================

struct Tally<'r, R: Reporter + ?Sized> {
    subtest: Subtest,
    reporter: &'r mut R,
    errors: u32,
    consecutive: u32,
    limit: u32,
    aborted: bool,
}

impl<'r, R: Reporter + ?Sized> Tally<'r, R> {
    fn new(subtest: Subtest, reporter: &'r mut R, limit: u32) -> Self {
        Self {
            subtest,
            reporter,
            errors: 0,
            consecutive: 0,
            limit,
            aborted: false,
        }
    }

    fn check(&mut self, kind: MismatchKind, written: u32, expected: u32, actual: u32) -> bool {
        if expected == actual {
            return true;
        }
        self.errors += 1;
        self.consecutive += 1;
        self.reporter.mismatch(&Mismatch {
            subtest: self.subtest,
            kind,
            written,
            expected,
            actual,
        });
        false
    }

    /// Close out one pattern; false once the flood limit is reached
    fn next_pattern(&mut self, clean: bool) -> bool {
        if clean {
            self.consecutive = 0;
        } else if self.consecutive >= self.limit {
            warn!("{}: giving up after {} consecutive errors", self.subtest.name(), self.consecutive);
            self.aborted = true;
            return false;
        }
        true
    }

    fn finish(self) -> SubtestResult {
        let result = SubtestResult {
            subtest: self.subtest,
            errors: self.errors,
            aborted: self.aborted,
        };
        self.reporter.subtest_done(&result);
        result
    }
}

// =============================================================================
// Battery
// =============================================================================

/// Run every sub-test once
pub fn run<IO, P, R>(
    window: &mut Window<IO, P>,
    dmac: Option<DmacRevision>,
    flood_limit: u32,
    reporter: &mut R,
) -> Result<BatteryReport>
where
    IO: RegisterIo,
    P: Privilege,
    R: Reporter + ?Sized,
{
    let ramsey = test_bus_register(
        window,
        Subtest::RamseyAcr,
        ramsey::ACR,
        ramsey::ACR_ALT,
        ramsey::ACR_MASK,
        u32::MAX,
        flood_limit,
        reporter,
    )?;
    let sdmac = match dmac {
        Some(DmacRevision::Sdmac02) => Some(test_bus_register(
            window,
            Subtest::SdmacWtc,
            sdmac::WTC,
            sdmac::WTC_ALT,
            sdmac::WTC_MASK,
            sdmac::WTC_MASK,
            flood_limit,
            reporter,
        )?),
        Some(DmacRevision::Sdmac04) => Some(test_bus_register(
            window,
            Subtest::SdmacSspbdat,
            sdmac::SSPBDAT,
            sdmac::SSPBDAT,
            sdmac::SSPBDAT_MASK,
            sdmac::SSPBDAT_MASK,
            flood_limit,
            reporter,
        )?),
        None => None,
    };
    let wd = [
        test_wd_register(window, Subtest::WdLaddr0, flood_limit, reporter)?,
        test_wd_register(window, Subtest::WdAuxStatus, flood_limit, reporter)?,
        test_wd_register(window, Subtest::WdInvalid, flood_limit, reporter)?,
    ];
    Ok(BatteryReport { ramsey, sdmac, wd })
}

/// Read/write test of a Ramsey or SDMAC register, written through `write_reg`
///
/// Patterns are limited to `mask` before writing; only bits in `read_mask`
/// are compared.
fn test_bus_register<IO, P, R>(
    window: &mut Window<IO, P>,
    subtest: Subtest,
    read_reg: Register,
    write_reg: Register,
    mask: u32,
    read_mask: u32,
    flood_limit: u32,
    reporter: &mut R,
) -> Result<SubtestResult>
where
    IO: RegisterIo,
    P: Privilege,
    R: Reporter + ?Sized,
{
    let bus = window.bus();
    let _cs = InterruptGuard::acquire();
    let mut original = bus.read(read_reg)?;
    let mut tally = Tally::new(subtest, reporter, flood_limit);

    for pattern in TEST_PATTERNS {
        let written = pattern & mask;
        bus.write(write_reg, written)?;
        bus.flush()?;
        let actual = bus.read(read_reg)? & read_mask;
        let clean = tally.check(MismatchKind::ReadBack, written, written, actual);
        if !clean {
            // Put the register back before carrying on, then re-sample it
            bus.write(write_reg, original)?;
            original = bus.read(read_reg)?;
        }
        if !tally.next_pattern(clean) {
            break;
        }
    }
    bus.write(write_reg, original)?;
    bus.flush()?;
    Ok(tally.finish())
}

/// WD33C93 register test with the CONTROL stability check
fn test_wd_register<IO, P, R>(
    window: &mut Window<IO, P>,
    subtest: Subtest,
    flood_limit: u32,
    reporter: &mut R,
) -> Result<SubtestResult>
where
    IO: RegisterIo,
    P: Privilege,
    R: Reporter + ?Sized,
{
    let ordinal = match subtest {
        Subtest::WdAuxStatus => wd::AUXST,
        Subtest::WdInvalid => wd::INVALID,
        _ => wd::LADDR0,
    };

    let _cs = InterruptGuard::acquire();
    let control = window.get(wd::CONTROL)?;
    let mut original = window.get(ordinal)?;
    let mut tally = Tally::new(subtest, reporter, flood_limit);

    for pattern in TEST_PATTERNS {
        let written = pattern as u8;
        window.set(ordinal, written)?;
        window.bus().flush()?;

        let drift = window.get(wd::CONTROL)?;
        let mut clean = tally.check(
            MismatchKind::ControlDrift,
            written as u32,
            control as u32,
            drift as u32,
        );

        let actual = window.get(ordinal)?;
        let (kind, expected) = match subtest {
            Subtest::WdAuxStatus => (MismatchKind::ReadOnlyChanged, original),
            Subtest::WdInvalid => (MismatchKind::Sentinel, wd::INVALID_SENTINEL),
            _ => (MismatchKind::ReadBack, written),
        };
        if !tally.check(kind, written as u32, expected as u32, actual as u32) {
            clean = false;
            window.set(ordinal, original)?;
            original = window.get(ordinal)?;
        }
        if !tally.next_pattern(clean) {
            break;
        }
    }
    window.set(ordinal, original)?;
    Ok(tally.finish())
}
