//! Register Bus
//!
//! Width-typed, ordered access to fixed physical addresses. Every access
//! runs with interrupts masked and, for registers flagged privileged, in
//! supervisor state. A bus fault is returned to the caller; nothing at this
//! layer retries.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{AccessError, AccessResult};
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::{Privilege, elevated};
use crate::internal::register::{self, Register, Width, ramsey};

// =============================================================================
// RegisterIo Trait
// =============================================================================

/// Raw access to the physical address space
///
/// Implemented by [`MmioBus`] on hardware and by the simulator in tests.
pub trait RegisterIo {
    /// Read `width` bytes at `addr`
    fn read(&mut self, addr: u32, width: Width) -> AccessResult<u32>;

    /// Write `width` bytes at `addr`
    fn write(&mut self, addr: u32, width: Width, value: u32) -> AccessResult<()>;
}

impl<T: RegisterIo + ?Sized> RegisterIo for &mut T {
    fn read(&mut self, addr: u32, width: Width) -> AccessResult<u32> {
        (**self).read(addr, width)
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) -> AccessResult<()> {
        (**self).write(addr, width, value)
    }
}

// =============================================================================
// MmioBus
// =============================================================================

/// Set by the host's bus error exception handler
static BUS_FAULT: AtomicBool = AtomicBool::new(false);

/// Record that the current access faulted
///
/// Call this from the bus error handler after arranging for the faulting
/// instruction to be skipped. The next [`MmioBus`] access check picks it up.
pub fn signal_bus_fault() {
    BUS_FAULT.store(true, Ordering::Release);
}

/// Volatile access to the real A3000 address space
#[derive(Debug)]
pub struct MmioBus {
    _private: (),
}

impl MmioBus {
    /// Create the bus
    ///
    /// # Safety
    /// Must only be used on an A3000 (or compatible) where the Ramsey and
    /// SDMAC blocks are decoded, with a bus error handler that calls
    /// [`signal_bus_fault`] and resumes after the faulting access.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn check(addr: u32) -> AccessResult<()> {
        if BUS_FAULT.swap(false, Ordering::AcqRel) {
            Err(AccessError::BusFault { addr })
        } else {
            Ok(())
        }
    }
}

impl RegisterIo for MmioBus {
    fn read(&mut self, addr: u32, width: Width) -> AccessResult<u32> {
        BUS_FAULT.store(false, Ordering::Release);
        // SAFETY: MmioBus::new requires the address map to be decoded
        let value = unsafe { register::read_reg(addr, width) };
        Self::check(addr)?;
        Ok(value)
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) -> AccessResult<()> {
        BUS_FAULT.store(false, Ordering::Release);
        // SAFETY: MmioBus::new requires the address map to be decoded
        unsafe { register::write_reg(addr, width, value) };
        Self::check(addr)
    }
}

// =============================================================================
// RegisterBus
// =============================================================================

/// Checked register access with interrupt masking and privilege elevation
#[derive(Debug)]
pub struct RegisterBus<IO, P> {
    io: IO,
    privilege: P,
}

impl<IO: RegisterIo, P: Privilege> RegisterBus<IO, P> {
    /// Wrap a raw bus and the host privilege primitive
    pub fn new(io: IO, privilege: P) -> Self {
        Self { io, privilege }
    }

    /// Read a register
    ///
    /// Returns [`AccessError::WriteOnly`] for write-only registers.
    pub fn read(&mut self, reg: Register) -> AccessResult<u32> {
        if !reg.access.readable() {
            return Err(AccessError::WriteOnly);
        }
        let _cs = InterruptGuard::acquire();
        if reg.privileged {
            let io = &mut self.io;
            elevated(&mut self.privilege, || io.read(reg.addr, reg.width))
        } else {
            self.io.read(reg.addr, reg.width)
        }
    }

    /// Write a register
    ///
    /// Returns [`AccessError::ReadOnly`] for read-only registers.
    pub fn write(&mut self, reg: Register, value: u32) -> AccessResult<()> {
        if !reg.access.writable() {
            return Err(AccessError::ReadOnly);
        }
        let value = value & reg.width.mask();
        let _cs = InterruptGuard::acquire();
        if reg.privileged {
            let io = &mut self.io;
            elevated(&mut self.privilege, || io.write(reg.addr, reg.width, value))
        } else {
            self.io.write(reg.addr, reg.width, value)
        }
    }

    /// Read a byte register
    pub fn read_u8(&mut self, reg: Register) -> AccessResult<u8> {
        self.read(reg).map(|v| v as u8)
    }

    /// Read an arbitrary address without access-mode checks
    pub fn read_raw(&mut self, addr: u32, width: Width) -> AccessResult<u32> {
        let _cs = InterruptGuard::acquire();
        self.io.read(addr, width)
    }

    /// Write an arbitrary address without access-mode checks
    ///
    /// Used by the battery to prove that read-only registers ignore writes.
    pub fn write_raw(&mut self, addr: u32, width: Width, value: u32) -> AccessResult<()> {
        let _cs = InterruptGuard::acquire();
        self.io.write(addr, width, value & width.mask())
    }

    /// Force posted writes to complete
    ///
    /// Reads an unrelated Ramsey address; the value is discarded, so no
    /// elevation is needed.
    pub fn flush(&mut self) -> AccessResult<()> {
        self.read_raw(ramsey::CTRL.addr, Width::Byte).map(|_| ())
    }

    /// Access the raw bus
    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Release the raw bus and privilege primitive
    pub fn into_parts(self) -> (IO, P) {
        (self.io, self.privilege)
    }
}
