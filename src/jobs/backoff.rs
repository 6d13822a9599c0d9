//! Exponential backoff as a cursor over a fixed ascending delay sequence.
//!
//! Used for idle/backpressure pauses and retry scheduling. The sequence walk
//! has two states: "off" (not engaged) and "on" (actively backing off); the
//! first `next()` while off returns the first delay without advancing twice.

use crate::constants::system::DEFAULT_BACKOFF_SECONDS;

/// Stateful exponential delay sequence generator.
///
/// # Examples
///
/// ```rust
/// use foreman_core::jobs::backoff::Backoff;
///
/// let mut backoff = Backoff::default();
/// assert_eq!(backoff.next(), 2);
/// assert_eq!(backoff.next(), 4);
/// backoff.reset();
/// assert_eq!(backoff.next(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    sequence: Vec<u64>,
    cursor: usize,
    engaged: bool,
}

impl Backoff {
    /// Create a backoff over a custom ascending delay sequence in seconds.
    ///
    /// Falls back to the default sequence when given an empty one.
    pub fn new(sequence: Vec<u64>) -> Self {
        let sequence = if sequence.is_empty() {
            DEFAULT_BACKOFF_SECONDS.to_vec()
        } else {
            sequence
        };
        Self {
            sequence,
            cursor: 0,
            engaged: false,
        }
    }

    /// Advance the cursor and return the next delay in seconds.
    ///
    /// The first call while off engages the sequence and returns its first
    /// entry; subsequent calls walk forward, saturating at the last entry.
    pub fn next(&mut self) -> u64 {
        if !self.engaged {
            self.engaged = true;
            self.cursor = 0;
        } else if self.cursor + 1 < self.sequence.len() {
            self.cursor += 1;
        }
        self.sequence[self.cursor]
    }

    /// Return the cursor to the start and disengage.
    ///
    /// Called on any successful, non-idle processing cycle.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.engaged = false;
    }

    /// Whether the sequence is currently engaged
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_SECONDS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_sequence_walk() {
        let mut backoff = Backoff::default();
        let observed: Vec<u64> = (0..8).map(|_| backoff.next()).collect();
        assert_eq!(observed, vec![2, 4, 8, 16, 32, 64, 128, 256]);
    }

    #[test]
    fn test_saturates_at_last_entry() {
        let mut backoff = Backoff::new(vec![1, 2, 4]);
        for _ in 0..3 {
            backoff.next();
        }
        assert_eq!(backoff.next(), 4);
        assert_eq!(backoff.next(), 4);
    }

    #[test]
    fn test_reset_returns_to_first_delay() {
        let mut backoff = Backoff::default();
        backoff.next();
        backoff.next();
        backoff.next();
        backoff.reset();
        assert!(!backoff.is_engaged());
        assert_eq!(backoff.next(), 2);
    }

    #[test]
    fn test_first_call_does_not_advance_twice() {
        let mut backoff = Backoff::default();
        assert!(!backoff.is_engaged());
        assert_eq!(backoff.next(), 2);
        assert!(backoff.is_engaged());
        assert_eq!(backoff.next(), 4);
    }

    #[test]
    fn test_empty_sequence_falls_back_to_default() {
        let mut backoff = Backoff::new(Vec::new());
        assert_eq!(backoff.next(), 2);
    }

    proptest! {
        /// Any interleaving of next/reset yields 2 immediately after a reset,
        /// and delays never decrease between consecutive next calls.
        #[test]
        fn prop_reset_and_monotonicity(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut backoff = Backoff::default();
            let mut last: Option<u64> = None;
            for is_next in ops {
                if is_next {
                    let delay = backoff.next();
                    if let Some(prev) = last {
                        prop_assert!(delay >= prev);
                    }
                    last = Some(delay);
                } else {
                    backoff.reset();
                    prop_assert_eq!(backoff.next(), 2);
                    backoff.reset();
                    last = None;
                }
            }
        }
    }
}
