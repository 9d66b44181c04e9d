// Obscura — Request deadlines
//
// Every store call is bounded by a caller-supplied deadline. The gateway
// derives one per request from `server.request_timeout_secs`; the CLI uses a
// fixed budget.

use std::time::{Duration, Instant};

/// An instant after which a store call is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// A deadline at a fixed instant.
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before the deadline, or `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.at.saturating_duration_since(Instant::now());
        if left.is_zero() {
            None
        } else {
            Some(left)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_deadline_has_time_left() {
        let deadline = Deadline::after(Duration::from_secs(30));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().unwrap() <= Duration::from_secs(30));
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(deadline.is_expired());
        assert!(deadline.remaining().is_none());
    }
}
