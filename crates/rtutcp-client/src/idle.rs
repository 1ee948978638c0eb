use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::connection::Connection;

#[derive(Debug, Default)]
struct TimerState {
    generation: u64,
    due: Option<Instant>,
    shutdown: bool,
}

/// A cancellable deferred close.
///
/// At most one due instant is pending. Every [`IdleTimer::arm`] or
/// [`IdleTimer::cancel`] bumps a generation counter, so a firing that raced
/// with a re-arm can be recognised as stale and ignored.
#[derive(Debug, Default)]
pub struct IdleTimer {
    state: Mutex<TimerState>,
    wake: Condvar,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a firing `after` from now, replacing any pending one.
    /// Returns the new generation. A delay too large to represent never
    /// fires.
    pub fn arm(&self, after: Duration) -> u64 {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.due = Instant::now().checked_add(after);
        self.wake.notify_all();
        state.generation
    }

    /// Drop the pending firing, if any.
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.due = None;
        self.wake.notify_all();
    }

    /// Release a thread blocked in [`IdleTimer::wait_due`] for good.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        state.due = None;
        self.wake.notify_all();
    }

    pub fn is_armed(&self) -> bool {
        self.lock().due.is_some()
    }

    /// Whether `generation` is still the latest arm/cancel.
    pub fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Block until the pending firing is due and return its generation.
    ///
    /// Returns `None` once [`IdleTimer::shutdown`] has been called.
    pub fn wait_due(&self) -> Option<u64> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            let due = state.due;
            match due {
                None => {
                    state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
                Some(due) => {
                    let now = Instant::now();
                    if now >= due {
                        state.due = None;
                        return Some(state.generation);
                    }
                    state = self
                        .wake
                        .wait_timeout(state, due - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start the thread that closes `connection` when `timer` fires.
///
/// The thread takes the connection lock before closing, so it never tears
/// down a connection in the middle of an exchange. It exits when the timer
/// is shut down or the connection is dropped.
pub(crate) fn spawn_watcher(
    timer: Arc<IdleTimer>,
    connection: Weak<Mutex<Connection>>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("rtutcp-idle".to_string())
        .spawn(move || {
            while let Some(generation) = timer.wait_due() {
                let Some(shared) = connection.upgrade() else {
                    break;
                };
                let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                guard.close_if_idle(generation);
            }
            trace!("idle watcher stopped");
        })
}
