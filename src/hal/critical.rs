//! Nestable interrupt masking
//!
//! [`InterruptGuard`] is an RAII wrapper over the host's `critical-section`
//! implementation. Guards may be nested freely; interrupts come back only
//! when the outermost guard is dropped. Guards are `!Send`, and scoping
//! forces release in reverse order of acquisition.
//!
//! The host must link a `critical-section` implementation (on AmigaOS this
//! is `Disable()`/`Enable()`; host tests use the crate's `std` feature).

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::RestoreState;

/// Nesting depth; only modified while a section is held.
static DEPTH: AtomicU8 = AtomicU8::new(0);

// =============================================================================
// InterruptGuard
// =============================================================================

/// Interrupts stay masked while this guard is alive
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct InterruptGuard {
    state: RestoreState,
    _not_send: PhantomData<*mut ()>,
}

impl InterruptGuard {
    /// Mask interrupts (or join the section already held)
    pub fn acquire() -> Self {
        // SAFETY: the matching release happens in Drop, and a guard cannot
        // outlive the scope that created it out of order because it is !Send
        // and not Clone.
        let state = unsafe { critical_section::acquire() };
        DEPTH.store(DEPTH.load(Ordering::Relaxed).saturating_add(1), Ordering::Relaxed);
        Self {
            state,
            _not_send: PhantomData,
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        DEPTH.store(DEPTH.load(Ordering::Relaxed).saturating_sub(1), Ordering::Relaxed);
        // SAFETY: `state` came from the acquire in `InterruptGuard::acquire`
        unsafe { critical_section::release(self.state) };
    }
}

impl core::fmt::Debug for InterruptGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InterruptGuard")
            .field("depth", &depth())
            .finish()
    }
}

/// Run `f` with interrupts masked
pub fn with<R>(f: impl FnOnce() -> R) -> R {
    let _guard = InterruptGuard::acquire();
    f()
}

/// Current nesting depth
///
/// Only meaningful while the caller itself holds a guard.
pub fn depth() -> u8 {
    DEPTH.load(Ordering::Relaxed)
}
