//! Lamport logical clock.
//!
//! Orders events across the replica group without synchronized wall clocks.
//! Each replica owns one instance; every outgoing message is stamped with
//! `tick()` and every incoming message is folded in with `witness()`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe Lamport clock. The value never decreases, and the sequence of
/// values returned to any single caller is strictly increasing.
#[derive(Debug, Default)]
pub struct LamportClock {
    value: AtomicU64,
}

impl LamportClock {
    /// A clock starting at 0.
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Advance the clock for a local event and return the new value.
    /// Called before stamping any outgoing message.
    pub fn tick(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fold in a timestamp received from another process:
    /// `new = max(local, received) + 1`. Called exactly once per received
    /// message, whatever its type.
    pub fn witness(&self, received: u64) -> u64 {
        loop {
            let current = self.value.load(Ordering::SeqCst);
            let next = current.max(received) + 1;
            match self
                .value
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return next,
                // Lost the race against a concurrent update; re-read and retry.
                Err(_) => continue,
            }
        }
    }

    /// Current value without advancing.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn tick_increments() {
        let clock = LamportClock::new();
        assert_eq!(clock.current(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn witness_jumps_past_received() {
        let clock = LamportClock::new();
        assert_eq!(clock.witness(100), 101);
        // A timestamp from the past still advances the clock.
        assert_eq!(clock.witness(50), 102);
    }

    #[test]
    fn values_strictly_increase() {
        let clock = LamportClock::new();
        let mut last = 0;
        for i in 0..200 {
            let next = if i % 3 == 0 {
                clock.witness(i)
            } else {
                clock.tick()
            };
            assert!(next > last, "clock went from {} to {}", last, next);
            last = next;
        }
    }

    #[test]
    fn concurrent_ticks_lose_nothing() {
        let clock = Arc::new(LamportClock::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    clock.tick();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(clock.current(), 8000);
    }

    #[test]
    fn send_receive_preserves_causality() {
        let sender = LamportClock::new();
        let receiver = LamportClock::new();

        let sent_at = sender.tick();
        let received_at = receiver.witness(sent_at);
        assert!(received_at > sent_at);
    }
}
