//! Interrupt-driven key debouncer.
//!
//! # Algorithm
//! An edge on a key line does not sample the line; it only arms that line's settle
//! timer. Every further edge before expiry pushes the same timer out again, so a burst
//! of contact bounce collapses into one expiry. When the timer finally fires the line
//! is sampled once and the key is classified as pressed or released.
//!
//! Intermediate levels inside the settle window are never classified, only the level
//! present at expiry. A press and release that both complete inside one window
//! therefore reads as a release.
//!
//! # Slots
//! Each monitored line owns one slot and one timer. The slot carries the pending
//! debounce for that line, so concurrent edges on different keys never share scratch
//! state, and because each timer has exactly one worker the classifications of a line
//! are produced strictly in order.

use core::cell::{Cell, RefCell};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Instant,
};

use critical_section::Mutex;
use fugit::MillisDurationU32;

use crate::{
    config::{DriverConfig, KeyDesc},
    error::Result,
    key_codes::KeyValue,
    line::{Line, LineId, LinePin},
    timer::{DeadlineTimer, TimerHandle},
};

/// A line's timer is armed and waiting for the contacts to settle.
#[derive(Copy, Clone, Debug)]
pub struct PendingDebounce {
    pub slot: usize,
    pub armed_at: Instant,
    pub settle_delay: MillisDurationU32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
    Idle,
    Settling,
}

/// The most recent classification and the line it belongs to, published as one unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub line: LineId,
    pub value: KeyValue,
}

struct Slot<P> {
    desc: KeyDesc,
    line: Mutex<RefCell<Option<Line<P>>>>,
    pending: Mutex<Cell<Option<PendingDebounce>>>,
    last_value: Mutex<Cell<KeyValue>>,
    classified: AtomicU32,
}

struct Shared<P> {
    slots: Vec<Slot<P>>,
    latest: Mutex<Cell<Option<KeyEvent>>>,
}

impl<P: LinePin> Shared<P> {
    /// Timer context: sample the settled line and publish what it shows.
    fn settle(&self, index: usize, timer: &TimerHandle) {
        let Some(slot) = self.slots.get(index) else {
            return;
        };

        // An edge that re-armed the timer after this expiry started keeps the slot
        // settling.
        let sample = critical_section::with(|cs| {
            if !timer.is_pending() {
                slot.pending.borrow(cs).set(None);
            }
            slot.line.borrow(cs).borrow_mut().as_mut().map(|line| line.is_active())
        });

        // A line that cannot be read resolves as released rather than staying unsettled.
        let value = match sample {
            Some(Ok(true)) => KeyValue::Pressed(slot.desc.code),
            Some(Ok(false)) => KeyValue::Released(slot.desc.code),
            Some(Err(_)) | None => {
                warn!("{}: sampling failed, treating as released", slot.desc.name);
                KeyValue::Released(slot.desc.code)
            }
        };

        critical_section::with(|cs| {
            slot.last_value.borrow(cs).set(value);
            self.latest.borrow(cs).set(Some(KeyEvent { line: slot.desc.gpio, value }));
        });
        slot.classified.fetch_add(1, Ordering::AcqRel);
        debug!("{}: {}", slot.desc.name, value);
    }
}

pub struct Debouncer<P> {
    shared: Arc<Shared<P>>,
    index: HashMap<LineId, usize>,
    timers: Vec<DeadlineTimer>,
    settle_delay: MillisDurationU32,
}

impl<P> Debouncer<P>
where
    P: LinePin + Send + 'static,
{
    /// Build one slot and one settle timer per line. The lines must already be
    /// configured as inputs.
    pub fn new(lines: Vec<(KeyDesc, Line<P>)>, config: &DriverConfig) -> Result<Self> {
        let slots = lines
            .into_iter()
            .map(|(desc, line)| Slot {
                desc,
                line: Mutex::new(RefCell::new(Some(line))),
                pending: Mutex::new(Cell::new(None)),
                last_value: Mutex::new(Cell::new(KeyValue::Unset)),
                classified: AtomicU32::new(0),
            })
            .collect::<Vec<_>>();
        let index = slots.iter().enumerate().map(|(i, slot)| (slot.desc.gpio, i)).collect();
        let shared = Arc::new(Shared { slots, latest: Mutex::new(Cell::new(None)) });

        let mut timers = Vec::with_capacity(shared.slots.len());
        for index in 0..shared.slots.len() {
            let context = Arc::clone(&shared);
            timers.push(DeadlineTimer::new("debounce", move |timer: &TimerHandle| {
                context.settle(index, timer)
            })?);
        }

        Ok(Self { shared, index, timers, settle_delay: config.settle_delay })
    }

    /// Interrupt context: note the edge and (re)arm the line's settle timer. Does not
    /// touch the line itself and never sleeps.
    pub fn on_edge(&self, line: LineId) {
        let Some(index) = self.slot_of(line) else {
            warn!("edge on unmonitored line {}", line.0);
            return;
        };

        let pending = PendingDebounce {
            slot: index,
            armed_at: Instant::now(),
            settle_delay: self.settle_delay,
        };
        critical_section::with(|cs| {
            self.shared.slots[index].pending.borrow(cs).set(Some(pending));
            self.timers[index].arm(self.settle_delay);
        });
    }

    pub fn state(&self, line: LineId) -> Option<SlotState> {
        let slot = &self.shared.slots[self.slot_of(line)?];
        let settling = critical_section::with(|cs| slot.pending.borrow(cs).get().is_some());
        Some(if settling { SlotState::Settling } else { SlotState::Idle })
    }

    pub fn pending(&self, line: LineId) -> Option<PendingDebounce> {
        let slot = &self.shared.slots[self.slot_of(line)?];
        critical_section::with(|cs| slot.pending.borrow(cs).get())
    }

    pub fn value(&self, line: LineId) -> Option<KeyValue> {
        let slot = &self.shared.slots[self.slot_of(line)?];
        Some(critical_section::with(|cs| slot.last_value.borrow(cs).get()))
    }

    /// Number of classifications published for `line` since load.
    pub fn classified(&self, line: LineId) -> Option<u32> {
        let slot = &self.shared.slots[self.slot_of(line)?];
        Some(slot.classified.load(Ordering::Acquire))
    }

    /// Newest classification across all lines.
    pub fn latest(&self) -> Option<KeyEvent> {
        critical_section::with(|cs| self.shared.latest.borrow(cs).get())
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyDesc> + '_ {
        self.shared.slots.iter().map(|slot| &slot.desc)
    }

    fn slot_of(&self, line: LineId) -> Option<usize> {
        self.index.get(&line).copied()
    }
}

impl<P> Drop for Debouncer<P> {
    fn drop(&mut self) {
        // Timers first, so no callback can sample a line that is already gone.
        for timer in &self.timers {
            timer.cancel_sync();
        }
        for slot in &self.shared.slots {
            let line = critical_section::with(|cs| slot.line.borrow(cs).borrow_mut().take());
            drop(line);
        }
        info!("debouncer stopped, {} lines released", self.shared.slots.len());
    }
}
