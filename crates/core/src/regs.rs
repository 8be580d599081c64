//! Register access.
//!
//! Every driver talks to the chip through [`Registers`]: the simulated
//! [`crate::Pic18`], a volatile [`Mmio`] window on real hardware, or
//! [`crate::Mcu`] which wraps either one together with the interrupt
//! dispatcher.

use crate::error::{Error, Result};
use crate::sfr::Field;

/// Upper bound on status-bit polling loops.
pub const POLL_LIMIT: u32 = 100_000;

/// Byte-wide access to the data space.
///
/// `read` takes `&mut self` because some registers change state when read
/// (reading SSPBUF clears BF).
pub trait Registers {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);

    /// Read-modify-write.
    #[inline]
    fn modify<F: FnOnce(u8) -> u8>(&mut self, addr: u16, f: F) {
        let v = self.read(addr);
        self.write(addr, f(v));
    }

    #[inline]
    fn set_bits(&mut self, addr: u16, mask: u8) {
        self.modify(addr, |v| v | mask);
    }

    #[inline]
    fn clear_bits(&mut self, addr: u16, mask: u8) {
        self.modify(addr, |v| v & !mask);
    }

    #[inline]
    fn write_bit(&mut self, addr: u16, mask: u8, set: bool) {
        if set {
            self.set_bits(addr, mask);
        } else {
            self.clear_bits(addr, mask);
        }
    }

    #[inline]
    fn read_bit(&mut self, addr: u16, mask: u8) -> bool {
        self.read(addr) & mask != 0
    }

    /// Replace one field, leaving the other bits of the register alone.
    #[inline]
    fn write_field(&mut self, addr: u16, field: Field, value: u8) {
        self.modify(addr, |v| (v & !field.mask) | ((value << field.shift) & field.mask));
    }

    #[inline]
    fn read_field(&mut self, addr: u16, field: Field) -> u8 {
        field.get(self.read(addr))
    }

    /// Busy-wait until `mask` in `addr` reads as `set`.
    fn poll_bit(&mut self, addr: u16, mask: u8, set: bool) -> Result<()> {
        for _ in 0..POLL_LIMIT {
            if self.read_bit(addr, mask) == set {
                return Ok(());
            }
        }
        log::warn!("poll timeout: 0x{:03X} mask 0x{:02X} want {}", addr, mask, set);
        Err(Error::Timeout)
    }
}

impl<T: Registers> Registers for &mut T {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        (**self).write(addr, value)
    }
}

/// Volatile access to a memory-mapped register window.
pub struct Mmio {
    base: *mut u8,
    origin: u16,
    len: usize,
}

impl Mmio {
    /// Map `len` bytes at `base`, where `base` corresponds to data address `origin`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for volatile reads and writes for the
    /// lifetime of the returned value, and nothing else may alias it.
    pub unsafe fn from_ptr(base: *mut u8, origin: u16, len: usize) -> Self {
        Mmio { base, origin, len }
    }

    #[inline]
    fn offset(&self, addr: u16) -> Option<usize> {
        let off = addr.checked_sub(self.origin)? as usize;
        (off < self.len).then_some(off)
    }
}

impl Registers for Mmio {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        match self.offset(addr) {
            // SAFETY: offset is inside the window promised by `from_ptr`.
            Some(off) => unsafe { core::ptr::read_volatile(self.base.add(off)) },
            None => 0,
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        if let Some(off) = self.offset(addr) {
            // SAFETY: offset is inside the window promised by `from_ptr`.
            unsafe { core::ptr::write_volatile(self.base.add(off), value) }
        }
    }
}
