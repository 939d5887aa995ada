//! # Epochs
//!
//! Weekly time buckets counted from a fixed start time. Odd epochs are
//! cooldown-eligible, even epochs are open.

use serde::{Deserialize, Serialize};

/// Maps timestamps to epoch numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    /// Unix time at which epoch 0 begins
    pub start_time: u64,
    /// Epoch length in seconds, nonzero
    pub epoch_length: u64,
}

impl EpochClock {
    pub fn new(start_time: u64, epoch_length: u64) -> Self {
        Self {
            start_time,
            epoch_length,
        }
    }

    /// Epoch containing `timestamp`; times before the start map to epoch 0
    pub fn epoch_at(&self, timestamp: u64) -> u64 {
        timestamp
            .saturating_sub(self.start_time)
            .checked_div(self.epoch_length)
            .unwrap_or(0)
    }

    /// Unix time at which `epoch` begins
    pub fn epoch_start(&self, epoch: u64) -> u64 {
        self.start_time
            .saturating_add(epoch.saturating_mul(self.epoch_length))
    }

    /// Whether cooldowns may be started during `epoch`
    pub fn is_cooldown_epoch(epoch: u64) -> bool {
        epoch % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EPOCH_LENGTH;

    #[test]
    fn test_epoch_boundaries() {
        let clock = EpochClock::new(1_000, EPOCH_LENGTH);
        assert_eq!(clock.epoch_at(0), 0);
        assert_eq!(clock.epoch_at(1_000), 0);
        assert_eq!(clock.epoch_at(1_000 + EPOCH_LENGTH - 1), 0);
        assert_eq!(clock.epoch_at(1_000 + EPOCH_LENGTH), 1);
        assert_eq!(clock.epoch_start(3), 1_000 + 3 * EPOCH_LENGTH);
    }

    #[test]
    fn test_cooldown_parity() {
        assert!(!EpochClock::is_cooldown_epoch(0));
        assert!(EpochClock::is_cooldown_epoch(1));
        assert!(!EpochClock::is_cooldown_epoch(2));
    }
}
