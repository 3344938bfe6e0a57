//! Binary digital I/O lines.
//!
//! A [`Line`] owns one pin for as long as it is alive. Ownership is tracked in a
//! [`LineRegistry`] so two drivers can never drive the same line; the claim is
//! dropped together with the `Line`.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::digital::{InputPin, StatefulOutputPin};

use crate::error::{Error, Result};

/// Board-wide GPIO number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

/// Which electrical level counts as "active" (LED lit, key pressed).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    pub fn active_level(self) -> bool {
        matches!(self, Polarity::ActiveHigh)
    }

    pub fn is_active(self, level: bool) -> bool {
        level == self.active_level()
    }
}

/// A pin whose direction can be switched at runtime, the way a GPIO bank exposes
/// its pads.
pub trait LinePin: InputPin + StatefulOutputPin {
    fn set_direction(&mut self, direction: Direction) -> core::result::Result<(), Self::Error>;
}

const REGISTRY_WORDS: usize = 8;

/// Tracks which line numbers are currently owned. Supports line numbers below 256.
pub struct LineRegistry {
    claimed: [AtomicU32; REGISTRY_WORDS],
}

impl LineRegistry {
    #[allow(clippy::declare_interior_mutable_const)]
    pub const fn new() -> Self {
        const FREE: AtomicU32 = AtomicU32::new(0);
        Self { claimed: [FREE; REGISTRY_WORDS] }
    }

    pub fn is_claimed(&self, id: LineId) -> bool {
        match Self::slot(id) {
            Some((word, mask)) => self.claimed[word].load(Ordering::Acquire) & mask != 0,
            None => false,
        }
    }

    fn claim(&self, id: LineId) -> Result<()> {
        let (word, mask) = Self::slot(id).ok_or(Error::HardwareUnavailable)?;
        let previous = self.claimed[word].fetch_or(mask, Ordering::AcqRel);
        if previous & mask != 0 {
            warn!("line {} is already claimed", id.0);
            return Err(Error::HardwareUnavailable);
        }
        Ok(())
    }

    fn release(&self, id: LineId) {
        if let Some((word, mask)) = Self::slot(id) {
            self.claimed[word].fetch_and(!mask, Ordering::AcqRel);
        }
    }

    fn slot(id: LineId) -> Option<(usize, u32)> {
        let word = (id.0 / 32) as usize;
        if word >= REGISTRY_WORDS {
            return None;
        }
        Some((word, 1 << (id.0 % 32)))
    }
}

impl Default for LineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Line<P> {
    id: LineId,
    pin: P,
    polarity: Polarity,
    direction: Option<Direction>,
    registry: &'static LineRegistry,
}

impl<P: LinePin> Line<P> {
    /// Take ownership of line `id`. Fails with `HardwareUnavailable` if someone
    /// else holds it.
    pub fn claim(
        registry: &'static LineRegistry,
        id: LineId,
        pin: P,
        polarity: Polarity,
    ) -> Result<Self> {
        registry.claim(id)?;
        debug!("claimed line {}", id.0);
        Ok(Self { id, pin, polarity, direction: None, registry })
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn configure_as_output(&mut self, initial_level: bool) -> Result<()> {
        self.pin.set_direction(Direction::Output).map_err(|_| Error::HardwareUnavailable)?;
        self.direction = Some(Direction::Output);
        self.set_level(initial_level)
    }

    pub fn configure_as_input(&mut self) -> Result<()> {
        self.pin.set_direction(Direction::Input).map_err(|_| Error::HardwareUnavailable)?;
        self.direction = Some(Direction::Input);
        Ok(())
    }

    /// Drive the raw electrical level. Never blocks.
    pub fn set_level(&mut self, high: bool) -> Result<()> {
        let result = if high { self.pin.set_high() } else { self.pin.set_low() };
        result.map_err(|_| Error::HardwareUnavailable)
    }

    /// Sample the raw electrical level. Output lines report what they drive.
    pub fn get_level(&mut self) -> Result<bool> {
        let result = match self.direction {
            Some(Direction::Output) => self.pin.is_set_high(),
            _ => self.pin.is_high(),
        };
        result.map_err(|_| Error::HardwareUnavailable)
    }

    pub fn set_active(&mut self, active: bool) -> Result<()> {
        let active_level = self.polarity.active_level();
        self.set_level(if active { active_level } else { !active_level })
    }

    pub fn is_active(&mut self) -> Result<bool> {
        Ok(self.polarity.is_active(self.get_level()?))
    }
}

impl<P> Drop for Line<P> {
    fn drop(&mut self) {
        self.registry.release(self.id);
        debug!("released line {}", self.id.0);
    }
}

impl<P> core::fmt::Debug for Line<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Line")
            .field("id", &self.id)
            .field("polarity", &self.polarity)
            .field("direction", &self.direction)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin, StatefulOutputPin};

    use super::{Direction, LinePin};

    /// A pin whose level is shared with the test so it can play the part of a
    /// bouncing contact.
    #[derive(Clone, Default)]
    pub struct MockPin {
        pub level: Arc<AtomicBool>,
        pub broken: Arc<AtomicBool>,
        pub refuse_config: Arc<AtomicBool>,
    }

    impl MockPin {
        pub fn with_level(high: bool) -> Self {
            let pin = Self::default();
            pin.level.store(high, Ordering::SeqCst);
            pin
        }

        pub fn set(&self, high: bool) {
            self.level.store(high, Ordering::SeqCst);
        }

        pub fn get(&self) -> bool {
            self.level.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), ErrorKind> {
            if self.broken.load(Ordering::SeqCst) {
                Err(ErrorKind::Other)
            } else {
                Ok(())
            }
        }
    }

    impl ErrorType for MockPin {
        type Error = ErrorKind;
    }

    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, ErrorKind> {
            self.check()?;
            Ok(self.get())
        }

        fn is_low(&mut self) -> Result<bool, ErrorKind> {
            Ok(!self.is_high()?)
        }
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), ErrorKind> {
            self.check()?;
            self.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), ErrorKind> {
            self.check()?;
            self.set(true);
            Ok(())
        }
    }

    impl StatefulOutputPin for MockPin {
        fn is_set_high(&mut self) -> Result<bool, ErrorKind> {
            self.is_high()
        }

        fn is_set_low(&mut self) -> Result<bool, ErrorKind> {
            self.is_low()
        }
    }

    impl LinePin for MockPin {
        fn set_direction(&mut self, _direction: Direction) -> Result<(), ErrorKind> {
            if self.refuse_config.load(Ordering::SeqCst) {
                return Err(ErrorKind::Other);
            }
            Ok(())
        }
    }
}
