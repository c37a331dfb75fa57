//! Reset-on-event, fire-on-quiescence timer.
//!
//! Time is passed in explicitly so the owner decides what drives it: the RPC
//! host ticks it from a `tokio` interval, tests step it by hand.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the window. Earlier pending triggers are coalesced into this one.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `action` once if the window has elapsed. Returns whether it ran.
    pub fn poll<F: FnOnce()>(&mut self, now: Instant, action: F) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                action();
                true
            }
            _ => false,
        }
    }
}
