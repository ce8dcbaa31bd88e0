//! Server timestamp source (component H).
//!
//! A monotonic clock shared across a service: every call clamps to
//! `max(last_observed, now)`, so two calls in the same wall-clock tick still
//! observe strictly non-decreasing values, and a clock that jumps backward
//! (NTP step, VM pause) never hands a client a timestamp smaller than one it
//! already saw.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

pub struct ServerClock {
    last: AtomicI64,
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    pub fn now(&self) -> i64 {
        self.advance(Utc::now().timestamp())
    }

    /// Exposed for tests so the clamp behavior can be exercised without
    /// waiting on the wall clock.
    fn advance(&self, observed: i64) -> i64 {
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let candidate = observed.max(current);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_never_decreases() {
        let clock = ServerClock::new();
        let a = clock.advance(100);
        let b = clock.advance(50);
        let c = clock.advance(200);
        assert_eq!(a, 100);
        assert_eq!(b, 100);
        assert_eq!(c, 200);
    }

    #[test]
    fn concurrent_advances_converge_to_the_max_input() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(ServerClock::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || clock.advance(i)));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(clock.advance(0), 49);
    }
}
