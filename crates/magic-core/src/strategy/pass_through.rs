//! # Pass-Through Vault
//!
//! Principal stays at face value; harvested rewards accrue as a separate
//! claimable token through a reward-per-token accumulator that each account
//! reconciles lazily when touched.

use std::collections::HashMap;

use crate::constants::REWARD_PRECISION;
use crate::errors::{MagicError, MagicResult};
use crate::math::{mul_div, safe_add, safe_sub};
use crate::types::Address;

#[derive(Debug, Clone, Default)]
pub struct PassThrough {
    balances: HashMap<Address, u128>,
    total_supply: u128,
    /// Cumulative reward per unit of principal, scaled by `REWARD_PRECISION`
    reward_per_token: u128,
    reward_per_token_paid: HashMap<Address, u128>,
    claimable: HashMap<Address, u128>,
    /// Rewards notified while the vault held no principal
    queued_rewards: u128,
}

impl PassThrough {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn reward_per_token(&self) -> u128 {
        self.reward_per_token
    }

    pub fn queued_rewards(&self) -> u128 {
        self.queued_rewards
    }

    /// Rewards the account could claim right now
    pub fn claimable(&self, account: Address) -> MagicResult<u128> {
        safe_add(
            self.claimable.get(&account).copied().unwrap_or(0),
            self.earned_since_checkpoint(account)?,
        )
    }

    fn earned_since_checkpoint(&self, account: Address) -> MagicResult<u128> {
        let paid = self.reward_per_token_paid.get(&account).copied().unwrap_or(0);
        let delta = safe_sub(self.reward_per_token, paid)?;
        mul_div(self.balance_of(account), delta, REWARD_PRECISION)
    }

    fn checkpoint(&mut self, account: Address) -> MagicResult<()> {
        let claimable = self.claimable(account)?;
        if claimable > 0 {
            self.claimable.insert(account, claimable);
        }
        self.reward_per_token_paid.insert(account, self.reward_per_token);
        Ok(())
    }

    pub fn deposit(&mut self, account: Address, amount: u128) -> MagicResult<()> {
        self.checkpoint(account)?;
        let balance = safe_add(self.balance_of(account), amount)?;
        self.balances.insert(account, balance);
        self.total_supply = safe_add(self.total_supply, amount)?;
        Ok(())
    }

    pub fn withdraw(&mut self, account: Address, amount: u128) -> MagicResult<()> {
        self.checkpoint(account)?;
        let balance = self
            .balance_of(account)
            .checked_sub(amount)
            .ok_or(MagicError::InsufficientBalance)?;
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
        self.total_supply = safe_sub(self.total_supply, amount)?;
        Ok(())
    }

    /// Distribute `amount` pro-rata to current principal.
    ///
    /// With no principal the reward is queued for the next notification.
    pub fn notify_reward(&mut self, amount: u128) -> MagicResult<()> {
        let pending = safe_add(amount, self.queued_rewards)?;
        if self.total_supply == 0 {
            self.queued_rewards = pending;
            return Ok(());
        }
        let increment = mul_div(pending, REWARD_PRECISION, self.total_supply)?;
        self.reward_per_token = safe_add(self.reward_per_token, increment)?;
        self.queued_rewards = 0;
        Ok(())
    }

    /// Reset the account's claimable rewards, returning what was owed
    pub fn take_claimable(&mut self, account: Address) -> MagicResult<u128> {
        self.checkpoint(account)?;
        Ok(self.claimable.remove(&account).unwrap_or(0))
    }
}
