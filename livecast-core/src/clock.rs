//! Virtual stream-time clock.
//!
//! Stream time is the elapsed-seconds position within the replayed
//! session. It never advances on its own — resets and buffered event
//! deliveries drive it. Before the first reset (and after the stream
//! goes offline) there is no active stream and the clock reads absent.

use std::sync::{Arc, Mutex};

/// A shared, mutable, optional virtual time.
///
/// Cheap to clone; all clones observe the same time. The driver hands
/// one clone to each pacing buffer as its time-report target and reads
/// another to answer `current_time()`.
#[derive(Debug, Clone, Default)]
pub struct StreamClock {
    time: Arc<Mutex<Option<f64>>>,
}

impl StreamClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stream time, or `None` when no stream is active.
    pub fn get(&self) -> Option<f64> {
        *self.time.lock().expect("clock lock poisoned")
    }

    /// Advance (or rebase) the clock.
    pub fn set(&self, time: f64) {
        *self.time.lock().expect("clock lock poisoned") = Some(time);
    }

    /// Return to the absent state; `get` reads `None` until the next
    /// `set`.
    pub fn clear(&self) {
        *self.time.lock().expect("clock lock poisoned") = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_absent() {
        assert_eq!(StreamClock::new().get(), None);
    }

    #[test]
    fn set_get_clear() {
        let clock = StreamClock::new();
        clock.set(1.5);
        assert_eq!(clock.get(), Some(1.5));
        clock.set(2.0);
        assert_eq!(clock.get(), Some(2.0));
        clock.clear();
        assert_eq!(clock.get(), None);
    }

    #[test]
    fn clones_share_time() {
        let clock = StreamClock::new();
        let other = clock.clone();
        other.set(7.0);
        assert_eq!(clock.get(), Some(7.0));
    }
}
