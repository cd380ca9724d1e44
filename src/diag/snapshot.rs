//! Saved Register Snapshot
//!
//! Destructive steps (soft resets, calibration selects, bus probing) run
//! under a [`SnapshotGuard`]. The guard captures the WD33C93 configuration
//! registers when created and writes them back when dropped or explicitly
//! restored. Only one snapshot may be outstanding per window; a second
//! attempt fails with [`AccessError::SnapshotActive`] instead of nesting.

use core::ops::{Deref, DerefMut};

use crate::error::{AccessError, AccessResult};
use crate::hal::bus::RegisterIo;
use crate::hal::privilege::Privilege;
use crate::hal::window::Window;
use crate::internal::register::wd;

/// Registers captured by a snapshot, in restore order
pub const SNAPSHOT_REGISTERS: [u8; 7] = [
    wd::OWN_ID,
    wd::CONTROL,
    wd::TPERIOD,
    wd::SYNC_TX,
    wd::DST_ID,
    wd::SRC_ID,
    wd::LUN,
];

/// Scoped save/restore of the WD33C93 configuration registers
///
/// Dereferences to the [`Window`] so work can continue through the guard.
#[derive(Debug)]
pub struct SnapshotGuard<'a, IO: RegisterIo, P: Privilege> {
    window: &'a mut Window<IO, P>,
    saved: [u8; SNAPSHOT_REGISTERS.len()],
    restored: bool,
}

impl<'a, IO: RegisterIo, P: Privilege> SnapshotGuard<'a, IO, P> {
    /// Capture the registers
    pub fn save(window: &'a mut Window<IO, P>) -> AccessResult<Self> {
        if !window.claim_snapshot() {
            return Err(AccessError::SnapshotActive);
        }
        let mut saved = [0; SNAPSHOT_REGISTERS.len()];
        for (slot, &ordinal) in saved.iter_mut().zip(SNAPSHOT_REGISTERS.iter()) {
            match window.get(ordinal) {
                Ok(value) => *slot = value,
                Err(e) => {
                    window.release_snapshot();
                    return Err(e);
                }
            }
        }
        trace!("snapshot saved");
        Ok(Self {
            window,
            saved,
            restored: false,
        })
    }

    /// Values captured at save time
    pub fn saved(&self) -> &[u8; SNAPSHOT_REGISTERS.len()] {
        &self.saved
    }

    /// Write the captured values back and end the snapshot
    pub fn restore(mut self) -> AccessResult<()> {
        self.write_back()
    }

    fn write_back(&mut self) -> AccessResult<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let mut result = Ok(());
        for (&ordinal, &value) in SNAPSHOT_REGISTERS.iter().zip(self.saved.iter()) {
            if let Err(e) = self.window.set(ordinal, value) {
                result = result.and(Err(e));
            }
        }
        self.window.release_snapshot();
        trace!("snapshot restored");
        result
    }
}

impl<IO: RegisterIo, P: Privilege> Deref for SnapshotGuard<'_, IO, P> {
    type Target = Window<IO, P>;

    fn deref(&self) -> &Self::Target {
        self.window
    }
}

impl<IO: RegisterIo, P: Privilege> DerefMut for SnapshotGuard<'_, IO, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.window
    }
}

impl<IO: RegisterIo, P: Privilege> Drop for SnapshotGuard<'_, IO, P> {
    fn drop(&mut self) {
        if let Err(e) = self.write_back() {
            error!("snapshot restore failed: {}", e.as_str());
        }
    }
}
