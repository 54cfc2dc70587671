//! Lightweight packet counters for the Face.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/* ---------------------------------------------------------------- *
 * Per-face counter block
 * ---------------------------------------------------------------- */

/// Packet counters maintained by a Face.
#[derive(Debug, Default)]
pub struct FaceCounters {
    pub interests_sent: Counter,
    pub data_sent: Counter,
    pub nacks_sent: Counter,
    pub interests_received: Counter,
    pub data_received: Counter,
    pub nacks_received: Counter,
    pub interest_timeouts: Counter,
}

impl FaceCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let counter = Counter::new();
        counter.increment();
        counter.add(4);
        assert_eq!(counter.value(), 5);
        counter.reset();
        assert_eq!(counter.value(), 0);
    }
}
