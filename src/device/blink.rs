use core::cell::{Cell, RefCell};
use std::sync::Arc;

use critical_section::Mutex;
use fugit::MillisDurationU32;

use super::{FileOperations, IoctlCommand, Session};
use crate::{
    admission::AdmissionGate,
    config::DEFAULT_PERIOD_MS,
    error::Result,
    line::{Line, LineId, LinePin, LineRegistry, Polarity},
    timer::{DeadlineTimer, TimerHandle},
};

/// Shortest gap between two flips once blinking, so a zero period cannot spin the
/// timer context.
const MIN_TICK_MS: u32 = 1;

struct Blinker<P> {
    period_ms: Mutex<Cell<u32>>,
    led: Mutex<RefCell<Option<Line<P>>>>,
}

impl<P: LinePin> Blinker<P> {
    fn period(&self) -> MillisDurationU32 {
        MillisDurationU32::from_ticks(critical_section::with(|cs| self.period_ms.borrow(cs).get()))
    }

    /// Timer context: flip the LED and schedule the next flip.
    fn tick(&self, timer: &TimerHandle) {
        let toggled = critical_section::with(|cs| {
            let mut led = self.led.borrow(cs).borrow_mut();
            let led = led.as_mut()?;
            Some(led.get_level().and_then(|level| led.set_level(!level)))
        });
        match toggled {
            Some(Ok(())) => trace!("blink"),
            Some(Err(_)) => warn!("blink: LED did not respond"),
            None => return,
        }
        let period = self.period().to_millis().max(MIN_TICK_MS);
        timer.arm(MillisDurationU32::from_ticks(period));
    }
}

/// LED blinking on a kernel-style timer, driven through ioctl.
pub struct BlinkDevice<P: LinePin> {
    gate: AdmissionGate,
    blinker: Arc<Blinker<P>>,
    timer: DeadlineTimer,
}

impl<P> BlinkDevice<P>
where
    P: LinePin + Send + 'static,
{
    /// Claim the LED line, switch it off and set up the timer. The timer stays idle
    /// until the first `OPEN_CMD` or `SETPERIOD_CMD`.
    pub fn load(
        registry: &'static LineRegistry,
        id: LineId,
        pin: P,
        polarity: Polarity,
    ) -> Result<Self> {
        let mut led = Line::claim(registry, id, pin, polarity)?;
        led.configure_as_output(!polarity.active_level())?;

        let blinker = Arc::new(Blinker {
            period_ms: Mutex::new(Cell::new(DEFAULT_PERIOD_MS)),
            led: Mutex::new(RefCell::new(Some(led))),
        });
        let context = Arc::clone(&blinker);
        let timer = DeadlineTimer::new("blink", move |timer: &TimerHandle| context.tick(timer))?;

        info!("blink: loaded on line {}", id.0);
        Ok(Self { gate: AdmissionGate::new(), blinker, timer })
    }

    pub fn period(&self) -> MillisDurationU32 {
        self.blinker.period()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_pending()
    }

    /// Completed LED flips since load.
    pub fn toggles(&self) -> u32 {
        self.timer.fired()
    }

    pub fn is_lit(&self) -> Result<bool> {
        critical_section::with(|cs| match self.blinker.led.borrow(cs).borrow_mut().as_mut() {
            Some(led) => led.is_active(),
            None => Ok(false),
        })
    }
}

impl<P> FileOperations for BlinkDevice<P>
where
    P: LinePin + Send + 'static,
{
    fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    fn ioctl(&self, _session: &Session<'_>, cmd: u32, arg: u32) -> Result<()> {
        match IoctlCommand::decode(cmd, arg) {
            Some(IoctlCommand::CloseTimer) => {
                self.timer.cancel_sync();
                info!("blink: stopped");
            }
            Some(IoctlCommand::OpenTimer) => {
                let period = self.blinker.period();
                info!("blink: period = {} ms", period.to_millis());
                self.timer.arm(period);
            }
            Some(IoctlCommand::SetPeriod(period_ms)) => {
                critical_section::with(|cs| self.blinker.period_ms.borrow(cs).set(period_ms));
                info!("blink: set period = {} ms", period_ms);
                self.timer.arm(MillisDurationU32::from_ticks(period_ms));
            }
            None => warn!("blink: ignoring unknown command {:#x}", cmd),
        }
        Ok(())
    }
}

impl<P: LinePin> Drop for BlinkDevice<P> {
    fn drop(&mut self) {
        self.timer.cancel_sync();
        let led = critical_section::with(|cs| self.blinker.led.borrow(cs).borrow_mut().take());
        if let Some(mut led) = led {
            if led.set_active(false).is_err() {
                warn!("blink: could not switch LED off on unload");
            }
        }
        info!("blink: unloaded");
    }
}
