use core::cell::RefCell;

use critical_section::Mutex;

use super::{FileOperations, Session, OUTPUT_OFF, OUTPUT_ON};
use crate::{
    admission::AdmissionGate,
    error::{Error, Result},
    line::{Line, LineId, LinePin, LineRegistry, Polarity},
};

/// A single on/off output such as the LED or the beeper, opened by one session at a
/// time.
pub struct OutputDevice<P: LinePin> {
    name: &'static str,
    gate: AdmissionGate,
    line: Mutex<RefCell<Line<P>>>,
}

impl<P: LinePin> OutputDevice<P> {
    /// Claim the line and drive it inactive.
    pub fn load(
        name: &'static str,
        registry: &'static LineRegistry,
        id: LineId,
        pin: P,
        polarity: Polarity,
    ) -> Result<Self> {
        let mut line = Line::claim(registry, id, pin, polarity)?;
        line.configure_as_output(!polarity.active_level())?;
        info!("{}: loaded on line {}", name, id.0);
        Ok(Self { name, gate: AdmissionGate::new(), line: Mutex::new(RefCell::new(line)) })
    }

    pub fn is_active(&self) -> Result<bool> {
        critical_section::with(|cs| self.line.borrow(cs).borrow_mut().is_active())
    }

    /// Raw electrical level of the line.
    pub fn level(&self) -> Result<bool> {
        critical_section::with(|cs| self.line.borrow(cs).borrow_mut().get_level())
    }

    fn set_active(&self, active: bool) -> Result<()> {
        critical_section::with(|cs| self.line.borrow(cs).borrow_mut().set_active(active))
    }
}

impl<P: LinePin> FileOperations for OutputDevice<P> {
    fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// `1` switches the output on, `0` switches it off, any other byte is ignored.
    fn write(&self, _session: &Session<'_>, payload: &[u8]) -> Result<usize> {
        match payload.first() {
            Some(&OUTPUT_ON) => self.set_active(true)?,
            Some(&OUTPUT_OFF) => self.set_active(false)?,
            Some(other) => debug!("{}: ignoring write of {}", self.name, other),
            None => {
                warn!("{}: {}", self.name, Error::InvalidPayload);
                return Ok(0);
            }
        }
        Ok(payload.len())
    }
}

impl<P: LinePin> Drop for OutputDevice<P> {
    fn drop(&mut self) {
        // Leave the output off; the claim goes with the line.
        if self.set_active(false).is_err() {
            warn!("{}: could not switch off on unload", self.name);
        }
        info!("{}: unloaded", self.name);
    }
}
