//! # Account Records
//!
//! Per-account principal, weights and cooldown queue.

use crate::math::safe_add;
use crate::errors::MagicResult;

/// Staking record of one account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    /// Principal allocated across strategies, realized and unrealized
    pub stake: u128,
    /// Principal added during `pending_epoch`, not yet realized
    pub pending_stake: u128,
    pub pending_epoch: u64,
    /// Target split in basis points, one entry per strategy
    pub weights: Vec<u16>,
    /// Principal recorded in each strategy; sums to `stake`
    pub allocations: Vec<u128>,
    pub last_weight_epoch: Option<u64>,
    pub cooldown_amount: u128,
    pub cooldown_end_epoch: u64,
}

impl Account {
    /// Principal held since before `epoch`
    pub fn realized_stake(&self, epoch: u64) -> u128 {
        if self.pending_epoch == epoch {
            self.stake.saturating_sub(self.pending_stake)
        } else {
            self.stake
        }
    }

    /// Mark `amount` of stake as added during `epoch`
    pub fn record_pending(&mut self, amount: u128, epoch: u64) -> MagicResult<()> {
        if self.pending_epoch != epoch {
            self.pending_epoch = epoch;
            self.pending_stake = 0;
        }
        self.pending_stake = safe_add(self.pending_stake, amount)?;
        Ok(())
    }

    pub fn has_weights(&self) -> bool {
        !self.weights.is_empty()
    }

    pub fn weight(&self, index: usize) -> u16 {
        self.weights.get(index).copied().unwrap_or(0)
    }

    pub fn allocation(&self, index: usize) -> u128 {
        self.allocations.get(index).copied().unwrap_or(0)
    }

    /// Pad weights and allocations for strategies added after this account
    pub(crate) fn ensure_slots(&mut self, slots: usize) {
        if self.allocations.len() < slots {
            self.allocations.resize(slots, 0);
        }
        if self.has_weights() && self.weights.len() < slots {
            self.weights.resize(slots, 0);
        }
    }
}

/// Snapshot of an account returned to callers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStakeData {
    pub stake: u128,
    pub realized_stake: u128,
    pub unclaimed: u128,
    pub weights: Vec<u16>,
    pub allocations: Vec<u128>,
    pub last_weight_epoch: Option<u64>,
    pub cooldown_amount: u128,
    pub cooldown_end_epoch: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_stake_realizes_next_epoch() {
        let mut account = Account {
            stake: 100,
            ..Default::default()
        };
        account.record_pending(100, 3).unwrap();
        assert_eq!(account.realized_stake(3), 0);
        assert_eq!(account.realized_stake(4), 100);

        account.stake += 50;
        account.record_pending(50, 4).unwrap();
        assert_eq!(account.pending_stake, 50);
        assert_eq!(account.realized_stake(4), 100);
    }

    #[test]
    fn test_ensure_slots_pads_zero_weights() {
        let mut account = Account {
            weights: vec![10_000],
            allocations: vec![5],
            ..Default::default()
        };
        account.ensure_slots(3);
        assert_eq!(account.weights, vec![10_000, 0, 0]);
        assert_eq!(account.allocations, vec![5, 0, 0]);
    }
}
