//! Tick source and bounded waits
//!
//! Every hardware wait in the crate is bounded twice: by elapsed ticks of a
//! free-running counter and by a poll count, so a stopped counter cannot
//! hang the loop either. On the A3000 the tick source is typically a CIA
//! timer or the EClock (709 379 Hz NTSC).

// =============================================================================
// TickSource Trait
// =============================================================================

/// Free-running hardware counter
pub trait TickSource {
    /// Current counter value; wraps at `u32::MAX`
    fn now(&mut self) -> u32;

    /// Counter rate in Hz
    fn rate_hz(&self) -> u32;

    /// Convert microseconds to ticks at this source's rate
    fn us_to_ticks(&self, us: u32) -> u32 {
        us_to_ticks(self.rate_hz(), us)
    }
}

impl<T: TickSource + ?Sized> TickSource for &mut T {
    fn now(&mut self) -> u32 {
        (**self).now()
    }

    fn rate_hz(&self) -> u32 {
        (**self).rate_hz()
    }
}

/// Convert microseconds to ticks at `rate_hz`
pub const fn us_to_ticks(rate_hz: u32, us: u32) -> u32 {
    ((rate_hz as u64 * us as u64) / 1_000_000) as u32
}

// =============================================================================
// Timeout
// =============================================================================

/// Budget for one bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    /// Maximum elapsed ticks
    pub ticks: u32,
    /// Maximum number of polls
    pub polls: u32,
}

impl Timeout {
    /// Create a timeout budget
    pub const fn new(ticks: u32, polls: u32) -> Self {
        Self { ticks, polls }
    }
}

/// A running bounded wait
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: u32,
    limit: u32,
    polls_left: u32,
}

impl Deadline {
    /// Start the wait now
    pub fn start<T: TickSource + ?Sized>(ticks: &mut T, timeout: Timeout) -> Self {
        Self {
            start: ticks.now(),
            limit: timeout.ticks,
            polls_left: timeout.polls,
        }
    }

    /// Consume one poll and report whether either budget is exhausted
    pub fn expired<T: TickSource + ?Sized>(&mut self, ticks: &mut T) -> bool {
        if self.polls_left == 0 {
            return true;
        }
        self.polls_left -= 1;
        ticks.now().wrapping_sub(self.start) >= self.limit
    }
}

/// Poll `probe` until it yields a value or the budget runs out
///
/// Returns `Ok(None)` on expiry. Errors from `probe` end the wait at once.
pub fn poll_until<T, R, E>(
    ticks: &mut T,
    timeout: Timeout,
    mut probe: impl FnMut() -> Result<Option<R>, E>,
) -> Result<Option<R>, E>
where
    T: TickSource + ?Sized,
{
    let mut deadline = Deadline::start(ticks, timeout);
    loop {
        if let Some(value) = probe()? {
            return Ok(Some(value));
        }
        if deadline.expired(ticks) {
            return Ok(None);
        }
    }
}
