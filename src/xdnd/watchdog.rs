use std::time::{Duration, Instant};

/// One-shot deadline guarding a wait for the peer's next message.
///
/// Arming always replaces the previous deadline; at most one is pending per role.
#[derive(Clone, Debug, Default)]
pub(super) struct Watchdog {
    deadline: Option<Instant>,
}

impl Watchdog {
    pub(super) fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now.checked_add(delay).unwrap_or(now));
    }

    pub(super) fn disarm(&mut self) {
        self.deadline = None;
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms and returns `true` if the deadline has passed.
    pub(super) fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
