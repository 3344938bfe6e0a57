use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin, StatefulOutputPin};
use fugit::MillisDurationU32;
use keyirq::{Direction, DriverConfig, LinePin, Polarity};

/// Simulated GPIO pad shared between the driver and the test.
#[derive(Clone, Default)]
pub struct Pad {
    level: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl Pad {
    pub fn high() -> Self {
        let pad = Self::default();
        pad.set(true);
        pad
    }

    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

impl ErrorType for Pad {
    type Error = ErrorKind;
}

impl InputPin for Pad {
    fn is_high(&mut self) -> Result<bool, ErrorKind> {
        Ok(self.get())
    }

    fn is_low(&mut self) -> Result<bool, ErrorKind> {
        Ok(!self.get())
    }
}

impl OutputPin for Pad {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.set(true);
        Ok(())
    }
}

impl StatefulOutputPin for Pad {
    fn is_set_high(&mut self) -> Result<bool, ErrorKind> {
        Ok(self.get())
    }

    fn is_set_low(&mut self) -> Result<bool, ErrorKind> {
        Ok(!self.get())
    }
}

impl LinePin for Pad {
    fn set_direction(&mut self, _direction: Direction) -> Result<(), ErrorKind> {
        Ok(())
    }
}

#[allow(dead_code)]
pub fn settle_config(settle_ms: u32) -> DriverConfig {
    DriverConfig {
        settle_delay: MillisDurationU32::from_ticks(settle_ms),
        polarity: Polarity::ActiveLow,
    }
}
