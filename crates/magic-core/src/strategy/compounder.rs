//! # Compounder
//!
//! Share-based vault whose underlying grows on reward notification while
//! share counts stay fixed, so every share appreciates.
//!
//! Deposits mint shares rounded down and withdrawals burn shares rounded up,
//! so the underlying per share never falls. Whatever rounding costs is borne
//! by the account that moved; every other holder's `balance_of` is monotone
//! between reward notifications.

use std::collections::HashMap;

use crate::constants::SHARES_PER_UNIT;
use crate::errors::{MagicError, MagicResult};
use crate::math::{mul_div, mul_div_ceil, proportion, safe_add, safe_mul, safe_sub};
use crate::types::Address;

#[derive(Debug, Clone, Default)]
pub struct Compounder {
    shares_of: HashMap<Address, u128>,
    shares_total_supply: u128,
    /// Underlying held for all share holders
    total_supply: u128,
}

impl Compounder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shares_of(&self, account: Address) -> u128 {
        self.shares_of.get(&account).copied().unwrap_or(0)
    }

    pub fn shares_total_supply(&self) -> u128 {
        self.shares_total_supply
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Underlying value of the account's shares, rounded down
    pub fn balance_of(&self, account: Address) -> u128 {
        proportion(self.total_supply, self.shares_of(account), self.shares_total_supply)
    }

    /// Credit `amount` of underlying to `account`.
    ///
    /// The account's `balance_of` may end below what it held plus `amount`
    /// by less than one unit of underlying.
    pub fn deposit(&mut self, account: Address, amount: u128) -> MagicResult<()> {
        let shares = if self.shares_total_supply == 0 || self.total_supply == 0 {
            safe_mul(amount, SHARES_PER_UNIT)?
        } else {
            mul_div(amount, self.shares_total_supply, self.total_supply)?
        };

        let held = self.shares_of(account);
        self.shares_of.insert(account, safe_add(held, shares)?);
        self.shares_total_supply = safe_add(self.shares_total_supply, shares)?;
        self.total_supply = safe_add(self.total_supply, amount)?;
        Ok(())
    }

    /// Debit `amount` of underlying from `account`.
    ///
    /// Burns shares rounded up, clamped to what the account holds, so the
    /// underlying total always moves by exactly `amount`.
    pub fn withdraw(&mut self, account: Address, amount: u128) -> MagicResult<()> {
        if amount == 0 {
            return Ok(());
        }
        if amount > self.total_supply {
            return Err(MagicError::InsufficientBalance);
        }

        let held = self.shares_of(account);
        let shares = mul_div_ceil(amount, self.shares_total_supply, self.total_supply)?.min(held);

        let remaining = held - shares;
        if remaining == 0 {
            self.shares_of.remove(&account);
        } else {
            self.shares_of.insert(account, remaining);
        }
        self.shares_total_supply = safe_sub(self.shares_total_supply, shares)?;
        self.total_supply -= amount;
        Ok(())
    }

    /// Move the account's underlying balance to `desired`.
    ///
    /// Never fails because a share delta rounds to zero; removals clamp to the
    /// shares actually held.
    pub fn set_user_balance(&mut self, account: Address, desired: u128) -> MagicResult<()> {
        let current = self.balance_of(account);
        if desired > current {
            self.deposit(account, desired - current)
        } else if desired < current {
            self.withdraw(account, current - desired)
        } else {
            Ok(())
        }
    }

    /// Grow the underlying without minting shares
    pub fn notify_reward(&mut self, amount: u128) -> MagicResult<()> {
        self.total_supply = safe_add(self.total_supply, amount)?;
        Ok(())
    }
}
