//! Single-owner admission for a device instance.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::error::{Error, Result};

const FREE: i32 = 1;
const HELD: i32 = 0;

/// Admits at most one session at a time.
///
/// The counter only ever moves between `FREE` and `HELD` through a compare-and-swap,
/// so a refused attempt leaves nothing to undo and the value stays within {0, 1}.
#[derive(Debug)]
pub struct AdmissionGate {
    counter: AtomicI32,
}

impl AdmissionGate {
    pub const fn new() -> Self {
        Self { counter: AtomicI32::new(FREE) }
    }

    /// Take the gate, or fail with `DeviceBusy` if another session holds it. Never
    /// waits; retrying is up to the caller.
    pub fn try_acquire(&self) -> Result<AdmissionToken<'_>> {
        match self.counter.compare_exchange(FREE, HELD, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Ok(AdmissionToken { gate: self }),
            Err(_) => {
                warn!("device is used by another session");
                Err(Error::DeviceBusy)
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.counter.load(Ordering::Acquire) != FREE
    }

    /// Raw counter, 1 when free.
    pub fn value(&self) -> i32 {
        self.counter.load(Ordering::Acquire)
    }

    fn release(&self) {
        // Never pushes the counter past FREE.
        let _ = self.counter.compare_exchange(HELD, FREE, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of exclusive use. Dropping it reopens the gate, so a session that errors out
/// or unwinds still gives the device back.
#[must_use = "dropping the token releases the device immediately"]
#[derive(Debug)]
pub struct AdmissionToken<'a> {
    gate: &'a AdmissionGate,
}

impl AdmissionToken<'_> {
    pub fn release(self) {}
}

impl Drop for AdmissionToken<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
