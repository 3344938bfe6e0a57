//! Character-device surface: the file operations a session dispatcher calls into,
//! and the three board devices built on top of the driver core.

use crate::{
    admission::{AdmissionGate, AdmissionToken},
    error::Result,
};

mod blink;
mod key;
mod output;

pub use blink::BlinkDevice;
pub use key::KeyDevice;
pub use output::OutputDevice;

pub const TIMER_IOC_MAGIC: u8 = 0xEF;

/// Encode a command without a data transfer, the `_IO(type, nr)` layout.
pub const fn io(ty: u8, nr: u8) -> u32 {
    ((ty as u32) << 8) | nr as u32
}

pub const CLOSE_CMD: u32 = io(TIMER_IOC_MAGIC, 0x1);
pub const OPEN_CMD: u32 = io(TIMER_IOC_MAGIC, 0x2);
pub const SETPERIOD_CMD: u32 = io(TIMER_IOC_MAGIC, 0x3);

/// Write payload that switches an output on.
pub const OUTPUT_ON: u8 = 1;
pub const OUTPUT_OFF: u8 = 0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoctlCommand {
    CloseTimer,
    OpenTimer,
    /// New period in milliseconds.
    SetPeriod(u32),
}

impl IoctlCommand {
    pub fn decode(cmd: u32, arg: u32) -> Option<Self> {
        match cmd {
            CLOSE_CMD => Some(IoctlCommand::CloseTimer),
            OPEN_CMD => Some(IoctlCommand::OpenTimer),
            SETPERIOD_CMD => Some(IoctlCommand::SetPeriod(arg)),
            _ => None,
        }
    }
}

/// An open file on one of the devices. Holds the device's admission for as long as it
/// lives.
#[derive(Debug)]
pub struct Session<'a> {
    _token: AdmissionToken<'a>,
}

/// What a device does for each file operation. Everything but `gate` has a
/// do-nothing default.
pub trait FileOperations {
    fn gate(&self) -> &AdmissionGate;

    /// Fails with `DeviceBusy` without side effects if a session is already open.
    fn open(&self) -> Result<Session<'_>> {
        let token = self.gate().try_acquire()?;
        Ok(Session { _token: token })
    }

    fn read(&self, _session: &Session<'_>, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&self, _session: &Session<'_>, payload: &[u8]) -> Result<usize> {
        Ok(payload.len())
    }

    /// Unrecognized commands are accepted and ignored.
    fn ioctl(&self, _session: &Session<'_>, _cmd: u32, _arg: u32) -> Result<()> {
        Ok(())
    }

    fn release(&self, session: Session<'_>) {
        drop(session);
    }
}
