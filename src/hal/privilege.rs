//! Supervisor-state elevation
//!
//! Some Ramsey registers only read back reliably in supervisor state. The
//! host supplies the elevation primitive (on AmigaOS, `SuperState()` /
//! `UserState()`); the register bus enters it only around accesses to
//! registers flagged privileged.

// =============================================================================
// Privilege Trait
// =============================================================================

/// Host primitive for entering and leaving supervisor state
pub trait Privilege {
    /// Whatever the host needs to return to the previous state
    type Token;

    /// Enter supervisor state
    fn elevate(&mut self) -> Self::Token;

    /// Return to the state captured by `token`
    fn restore(&mut self, token: Self::Token);
}

impl<T: Privilege + ?Sized> Privilege for &mut T {
    type Token = T::Token;

    fn elevate(&mut self) -> Self::Token {
        (**self).elevate()
    }

    fn restore(&mut self, token: Self::Token) {
        (**self).restore(token);
    }
}

/// Already running in supervisor state; elevation is a no-op
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Supervisor;

impl Privilege for Supervisor {
    type Token = ();

    fn elevate(&mut self) -> Self::Token {}

    fn restore(&mut self, _token: Self::Token) {}
}

/// Run `f` in supervisor state, restoring the previous state afterwards
pub fn elevated<P: Privilege, R>(privilege: &mut P, f: impl FnOnce() -> R) -> R {
    let token = privilege.elevate();
    let result = f();
    privilege.restore(token);
    result
}
