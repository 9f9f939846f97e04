use std::cell::Cell;
use std::rc::Rc;

use crate::host::Surface;

/// Trailing-edge debounce built on cancellation tickets: arming issues a new
/// ticket and thereby cancels every ticket issued before it.
#[derive(Clone, Debug, Default)]
pub struct Debouncer {
    generation: Rc<Cell<u64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) -> Ticket {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        Ticket(next)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.get() == ticket.0
    }

    /// Cancels any outstanding ticket without issuing a usable one.
    pub fn cancel(&self) {
        self.arm();
    }

    /// Waits `millis` and reports whether this call is still the latest one.
    pub async fn settle<S: Surface>(&self, surface: &S, millis: u32) -> bool {
        let ticket = self.arm();
        surface.sleep(millis).await;
        self.is_current(ticket)
    }
}

/// Bounded retry schedule with growing delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub attempts: u32,
    pub initial_ms: u32,
    pub factor: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 6,
            initial_ms: 100,
            factor: 2,
        }
    }
}

impl Backoff {
    /// Delay before each retry; one fewer than `attempts` since the first
    /// attempt happens immediately.
    pub fn delays(self) -> impl Iterator<Item = u32> {
        let mut delay = self.initial_ms;
        (1..self.attempts).map(move |_| {
            let current = delay;
            delay = delay.saturating_mul(self.factor);
            current
        })
    }
}
