//! One-shot deadline timers.
//!
//! Each [`DeadlineTimer`] runs its callback on its own worker thread, which stands in
//! for the timer-softirq context of the board kernel. Arming an armed timer moves the
//! deadline instead of queueing a second expiry, so a timer has at most one pending
//! firing at any time.

use core::ops::Deref;
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle, ThreadId},
    time::{Duration, Instant},
};

use fugit::MillisDurationU32;

use crate::error::{Error, Result};

#[derive(Default)]
struct State {
    deadline: Option<Instant>,
    running: bool,
    shutdown: bool,
    /// The worker unwound out of a callback; nothing will ever fire again.
    dead: bool,
    worker: Option<ThreadId>,
    fired: u32,
}

struct Shared {
    name: &'static str,
    state: Mutex<State>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, State>,
        timeout: Duration,
    ) -> MutexGuard<'a, State> {
        match self.changed.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}

/// Cloneable reference to a timer, handed to the callback and to interrupt handlers
/// that need to (re)arm it.
#[derive(Clone)]
pub struct TimerHandle {
    shared: Arc<Shared>,
}

impl TimerHandle {
    /// Schedule the callback to run once, `delay` from now. If the timer is already
    /// armed the old deadline is replaced. A zero delay fires on the next pass of the
    /// worker.
    pub fn arm(&self, delay: MillisDurationU32) {
        let deadline = Instant::now() + Duration::from_millis(u64::from(delay.to_millis()));
        let mut state = self.shared.lock();
        if state.dead {
            warn!("{}: timer context is gone, not arming", self.shared.name);
            return;
        }
        state.deadline = Some(deadline);
        self.shared.changed.notify_all();
        trace!("{}: armed for {} ms", self.shared.name, delay.to_millis());
    }

    /// Disarm the timer and wait for a running callback to return. Once this returns
    /// the callback is neither running nor pending, including any re-arm the callback
    /// made on its way out.
    ///
    /// Called from inside the callback it only disarms, since waiting for itself
    /// would never finish. If the callback panicked, this returns as soon as the
    /// worker has unwound.
    pub fn cancel_sync(&self) {
        let mut state = self.shared.lock();
        loop {
            state.deadline = None;
            if !state.running || state.worker == Some(thread::current().id()) {
                break;
            }
            state = self.shared.wait(state);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    /// Number of times the callback has completed.
    pub fn fired(&self) -> u32 {
        self.shared.lock().fired
    }

    /// The callback panicked and the timer can no longer fire.
    pub fn is_dead(&self) -> bool {
        self.shared.lock().dead
    }
}

/// Clears `running` when the callback returns or unwinds, so waiters in `cancel_sync`
/// are always woken.
struct Running<'a>(&'a Shared);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.running = false;
        if thread::panicking() {
            error!("{}: callback panicked, timer disabled", self.0.name);
            state.dead = true;
            state.deadline = None;
        } else {
            state.fired = state.fired.wrapping_add(1);
        }
        self.0.changed.notify_all();
    }
}

pub struct DeadlineTimer {
    handle: TimerHandle,
    worker: Option<JoinHandle<()>>,
}

impl DeadlineTimer {
    pub fn new<F>(name: &'static str, mut callback: F) -> Result<Self>
    where
        F: FnMut(&TimerHandle) + Send + 'static,
    {
        let shared =
            Arc::new(Shared { name, state: Mutex::new(State::default()), changed: Condvar::new() });
        let handle = TimerHandle { shared };

        let worker_handle = handle.clone();
        let worker = thread::Builder::new()
            .name(name.into())
            .spawn(move || run(&worker_handle, &mut callback))
            .map_err(|_| {
                error!("{}: could not start timer context", name);
                Error::HardwareUnavailable
            })?;

        Ok(Self { handle, worker: Some(worker) })
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }
}

impl Deref for DeadlineTimer {
    type Target = TimerHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        {
            let mut state = self.handle.shared.lock();
            state.deadline = None;
            state.shutdown = true;
            self.handle.shared.changed.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            // The worker only exits between callbacks, so joining also waits out an
            // in-flight expiry.
            let _ = worker.join();
        }
    }
}

fn run<F: FnMut(&TimerHandle)>(handle: &TimerHandle, callback: &mut F) {
    let shared = &handle.shared;
    let mut state = shared.lock();
    state.worker = Some(thread::current().id());

    loop {
        if state.shutdown {
            return;
        }

        let deadline = match state.deadline {
            Some(deadline) => deadline,
            None => {
                state = shared.wait(state);
                continue;
            }
        };

        let now = Instant::now();
        if now < deadline {
            state = shared.wait_timeout(state, deadline - now);
            continue;
        }

        state.deadline = None;
        state.running = true;
        drop(state);

        {
            let _running = Running(shared);
            callback(handle);
        }

        state = shared.lock();
    }
}
