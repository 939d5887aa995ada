//! # Staking Ledger
//!
//! Central record of staked principal. Each account's stake is split across
//! strategies by weight; harvest growth in a strategy shows up as the gap
//! between the vault balance and the recorded allocation, and is folded into
//! stake lazily the next time the account is touched.
//!
//! Invariants kept by every mutation:
//! - `Σ strategy.total_supply == total_supply`
//! - `Σ account.allocations == account.stake`
//! - `account.allocations[i] <= strategy.balance_of(account)`, so staked plus
//!   unclaimed value in a strategy never exceeds its supply

pub mod account;
pub mod allocation;

pub use account::{Account, AccountStakeData};
pub use allocation::{pro_rata_shares, split_by_weights, validate_weights};

use std::collections::HashMap;

use tracing::debug;

use crate::constants::MAX_STRATEGIES;
use crate::errors::{MagicError, MagicResult};
use crate::math::{safe_add, safe_add_u64, safe_sub};
use crate::strategy::{RewardDisposition, StrategyVault, VaultKind};
use crate::types::{Address, EpochClock};

/// A registered strategy
#[derive(Debug, Clone)]
pub struct Strategy {
    pub vault: StrategyVault,
    /// Disabled strategies keep existing allocations but accept no new weight
    pub enabled: bool,
}

impl Strategy {
    pub fn harvester(&self) -> Option<Address> {
        self.vault.harvester()
    }

    pub fn total_supply(&self) -> u128 {
        self.vault.total_supply()
    }
}

/// Supplies captured before a harvest makes any external call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplySnapshot {
    pub static_supply: u128,
    pub strategy_supplies: Vec<u128>,
}

#[derive(Debug, Clone)]
pub struct StakingLedger {
    address: Address,
    governance_token: Address,
    strategies: Vec<Strategy>,
    accounts: HashMap<Address, Account>,
    total_supply: u128,
    /// Principal sitting in cooldown queues
    total_cooling: u128,
}

impl StakingLedger {
    pub fn new(address: Address, governance_token: Address) -> Self {
        Self {
            address,
            governance_token,
            strategies: Vec::new(),
            accounts: HashMap::new(),
            total_supply: 0,
            total_cooling: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn governance_token(&self) -> Address {
        self.governance_token
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn total_cooling(&self) -> u128 {
        self.total_cooling
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn strategy(&self, index: usize) -> MagicResult<&Strategy> {
        self.strategies
            .get(index)
            .ok_or(MagicError::StrategyIndexOutOfRange {
                index,
                count: self.strategies.len(),
            })
    }

    fn strategy_mut(&mut self, index: usize) -> MagicResult<&mut Strategy> {
        let count = self.strategies.len();
        self.strategies
            .get_mut(index)
            .ok_or(MagicError::StrategyIndexOutOfRange { index, count })
    }

    pub fn strategy_index(&self, vault: Address) -> MagicResult<usize> {
        self.strategies
            .iter()
            .position(|s| s.vault.address() == vault)
            .ok_or(MagicError::UnknownStrategy(vault))
    }

    pub fn account(&self, owner: Address) -> Option<&Account> {
        self.accounts.get(&owner)
    }

    // ========================================================================
    // Strategy Administration
    // ========================================================================

    /// Register a new vault; strategies are never removed
    pub fn add_strategy(
        &mut self,
        kind: VaultKind,
        vault: Address,
        desired_token: Address,
    ) -> MagicResult<usize> {
        if self.strategies.len() >= MAX_STRATEGIES {
            return Err(MagicError::TooManyStrategies(MAX_STRATEGIES));
        }
        if vault.is_zero() || desired_token.is_zero() {
            return Err(MagicError::invalid_parameter("strategy", "zero address", "nonzero vault and desired token"));
        }
        if self.strategies.iter().any(|s| s.vault.address() == vault) {
            return Err(MagicError::DuplicateStrategy(vault));
        }

        self.strategies.push(Strategy {
            vault: StrategyVault::new(kind, vault, desired_token, self.address),
            enabled: true,
        });
        Ok(self.strategies.len() - 1)
    }

    pub fn set_strategy_enabled(&mut self, index: usize, enabled: bool) -> MagicResult<()> {
        self.strategy_mut(index)?.enabled = enabled;
        Ok(())
    }

    /// Bind or unbind the harvester allowed to notify rewards
    pub fn set_strategy_harvester(&mut self, index: usize, harvester: Option<Address>) -> MagicResult<()> {
        self.strategy_mut(index)?.vault.set_harvester(harvester);
        Ok(())
    }

    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Allocate `amount` of new principal by the owner's weights
    pub fn stake(&mut self, owner: Address, amount: u128, epoch: u64) -> MagicResult<()> {
        if amount == 0 {
            return Err(MagicError::InvalidAmount);
        }
        let slots = self.strategies.len();
        let account = self
            .accounts
            .get_mut(&owner)
            .filter(|a| a.has_weights())
            .ok_or(MagicError::InvalidWeights("weights not set"))?;
        account.ensure_slots(slots);

        let parts = split_by_weights(amount, &account.weights)?;
        for (i, part) in parts.iter().enumerate() {
            if *part > 0 {
                self.strategies[i].vault.deposit(self.address, owner, *part)?;
                account.allocations[i] = safe_add(account.allocations[i], *part)?;
            }
        }

        account.stake = safe_add(account.stake, amount)?;
        let dust = settle_rounding(&self.strategies, owner, account)?;
        account.record_pending(safe_sub(amount, dust)?, epoch)?;
        self.total_supply = safe_add(self.total_supply, amount)?;

        debug!(%owner, amount, epoch, "staked");
        Ok(())
    }

    /// Replace the owner's weights, folding unclaimed growth first.
    ///
    /// Returns the amount folded.
    pub fn set_weights(&mut self, owner: Address, weights: Vec<u16>, epoch: u64) -> MagicResult<u128> {
        let enabled: Vec<bool> = self.strategies.iter().map(|s| s.enabled).collect();
        validate_weights(&weights, &enabled)?;

        let staker = self.address;
        let account = self.accounts.entry(owner).or_default();
        if account.last_weight_epoch == Some(epoch) {
            return Err(MagicError::EpochLocked(epoch));
        }
        account.ensure_slots(self.strategies.len());

        let folded = absorb_growth(&self.strategies, owner, account, epoch)?;
        let targets = split_by_weights(account.stake, &weights)?;
        rebalance(&mut self.strategies, staker, owner, account, &targets)?;

        account.weights = weights;
        account.last_weight_epoch = Some(epoch);

        debug!(%owner, epoch, folded, "weights set");
        Ok(folded)
    }

    /// Queue `amount` of realized stake for withdrawal.
    ///
    /// Unclaimed growth is left where it is. Returns the release epoch.
    pub fn cooldown(
        &mut self,
        owner: Address,
        amount: u128,
        epoch: u64,
        cooldown_epochs: u64,
    ) -> MagicResult<u64> {
        if amount == 0 {
            return Err(MagicError::InvalidAmount);
        }
        if !EpochClock::is_cooldown_epoch(epoch) {
            return Err(MagicError::NotCooldownEpoch(epoch));
        }

        let staker = self.address;
        let slots = self.strategies.len();
        let account = self
            .accounts
            .get_mut(&owner)
            .ok_or(MagicError::InsufficientRealizedStake { requested: amount, realized: 0 })?;
        account.ensure_slots(slots);

        let realized = account.realized_stake(epoch);
        if amount > realized {
            return Err(MagicError::InsufficientRealizedStake {
                requested: amount,
                realized,
            });
        }

        let remaining = account.stake - amount;
        let targets = if remaining == 0 {
            vec![0; slots]
        } else {
            split_by_weights(remaining, &account.weights)?
        };
        account.stake = remaining;
        rebalance(&mut self.strategies, staker, owner, account, &targets)?;

        let end_epoch = safe_add_u64(epoch, cooldown_epochs)?;
        account.cooldown_amount = safe_add(account.cooldown_amount, amount)?;
        account.cooldown_end_epoch = end_epoch;
        self.total_supply = safe_sub(self.total_supply, amount)?;
        self.total_cooling = safe_add(self.total_cooling, amount)?;

        debug!(%owner, amount, epoch, end_epoch, "cooldown queued");
        Ok(end_epoch)
    }

    /// Fold unclaimed growth into stake and rebalance to current weights.
    ///
    /// Returns the amount folded; zero means nothing changed.
    pub fn checkpoint(&mut self, owner: Address, epoch: u64) -> MagicResult<u128> {
        let staker = self.address;
        let slots = self.strategies.len();
        let Some(account) = self.accounts.get_mut(&owner) else {
            return Ok(0);
        };
        account.ensure_slots(slots);

        let folded = absorb_growth(&self.strategies, owner, account, epoch)?;
        if folded == 0 {
            return Ok(0);
        }
        let targets = split_by_weights(account.stake, &account.weights)?;
        rebalance(&mut self.strategies, staker, owner, account, &targets)?;

        debug!(%owner, epoch, folded, "account checkpointed");
        Ok(folded)
    }

    /// Release the owner's cooldown queue once its end epoch is reached
    pub fn release_cooldown(&mut self, owner: Address, epoch: u64) -> MagicResult<u128> {
        let account = self
            .accounts
            .get_mut(&owner)
            .filter(|a| a.cooldown_amount > 0)
            .ok_or(MagicError::InvalidAmount)?;
        if epoch < account.cooldown_end_epoch {
            return Err(MagicError::CooldownActive(account.cooldown_end_epoch));
        }

        let amount = std::mem::take(&mut account.cooldown_amount);
        self.total_cooling = safe_sub(self.total_cooling, amount)?;

        debug!(%owner, amount, epoch, "cooldown released");
        Ok(amount)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn balance_of(&self, owner: Address) -> u128 {
        self.accounts.get(&owner).map(|a| a.stake).unwrap_or(0)
    }

    /// Realized stake at `epoch`
    pub fn voting_power(&self, owner: Address, epoch: u64) -> u128 {
        self.accounts
            .get(&owner)
            .map(|a| a.realized_stake(epoch))
            .unwrap_or(0)
    }

    /// Growth credited to the owner's allocations but not yet folded
    pub fn unclaimed(&self, owner: Address) -> u128 {
        let Some(account) = self.accounts.get(&owner) else {
            return 0;
        };
        self.strategies
            .iter()
            .enumerate()
            .map(|(i, s)| s.vault.balance_of(owner).saturating_sub(account.allocation(i)))
            .fold(0u128, u128::saturating_add)
    }

    pub fn account_strategy_weight(&self, owner: Address, index: usize) -> MagicResult<u16> {
        self.strategy(index)?;
        Ok(self.accounts.get(&owner).map(|a| a.weight(index)).unwrap_or(0))
    }

    pub fn account_stake_data(&self, owner: Address, epoch: u64) -> AccountStakeData {
        let Some(account) = self.accounts.get(&owner) else {
            return AccountStakeData::default();
        };
        AccountStakeData {
            stake: account.stake,
            realized_stake: account.realized_stake(epoch),
            unclaimed: self.unclaimed(owner),
            weights: account.weights.clone(),
            allocations: account.allocations.clone(),
            last_weight_epoch: account.last_weight_epoch,
            cooldown_amount: account.cooldown_amount,
            cooldown_end_epoch: account.cooldown_end_epoch,
        }
    }

    // ========================================================================
    // Harvest Support
    // ========================================================================

    /// Capture total and per-strategy supply
    pub fn snapshot(&self) -> SupplySnapshot {
        SupplySnapshot {
            static_supply: self.total_supply,
            strategy_supplies: self.strategies.iter().map(Strategy::total_supply).collect(),
        }
    }

    /// Notify a strategy of converted rewards.
    ///
    /// Compounded rewards become principal, so the ledger supply grows with
    /// the vault's.
    pub fn notify_strategy(
        &mut self,
        index: usize,
        harvester: Address,
        amount: u128,
    ) -> MagicResult<RewardDisposition> {
        let disposition = self.strategy_mut(index)?.vault.notify_reward(harvester, amount)?;
        if let RewardDisposition::Compounded(compounded) = disposition {
            self.total_supply = safe_add(self.total_supply, compounded)?;
        }
        Ok(disposition)
    }

    /// Take the owner's pass-through rewards from strategy `index`
    pub fn take_claimable(&mut self, index: usize, owner: Address) -> MagicResult<u128> {
        self.strategy_mut(index)?.vault.take_claimable(owner)
    }
}

/// Record vault growth above the owner's allocations as new unrealized stake
fn absorb_growth(
    strategies: &[Strategy],
    owner: Address,
    account: &mut Account,
    epoch: u64,
) -> MagicResult<u128> {
    let mut folded = 0u128;
    for (i, strategy) in strategies.iter().enumerate() {
        let growth = strategy
            .vault
            .balance_of(owner)
            .saturating_sub(account.allocations[i]);
        if growth > 0 {
            account.allocations[i] = safe_add(account.allocations[i], growth)?;
            folded = safe_add(folded, growth)?;
        }
    }
    if folded > 0 {
        account.stake = safe_add(account.stake, folded)?;
        account.record_pending(folded, epoch)?;
    }
    Ok(folded)
}

/// Move allocations to `targets`: withdrawals first, then deposits.
///
/// Returns the rounding charged to the owner's stake.
fn rebalance(
    strategies: &mut [Strategy],
    staker: Address,
    owner: Address,
    account: &mut Account,
    targets: &[u128],
) -> MagicResult<u128> {
    for (i, strategy) in strategies.iter_mut().enumerate() {
        let current = account.allocations[i];
        if current > targets[i] {
            strategy.vault.withdraw(staker, owner, current - targets[i])?;
            account.allocations[i] = targets[i];
        }
    }
    for (i, strategy) in strategies.iter_mut().enumerate() {
        let current = account.allocations[i];
        if current < targets[i] {
            strategy.vault.deposit(staker, owner, targets[i] - current)?;
            account.allocations[i] = targets[i];
        }
    }
    settle_rounding(strategies, owner, account)
}

/// Clamp allocations to the owner's vault balances.
///
/// Share rounding on the owner's own deposit or withdrawal can leave its
/// balance a unit short of the allocation; the shortfall comes off its stake
/// and stays in the vault. Returns the amount charged.
fn settle_rounding(strategies: &[Strategy], owner: Address, account: &mut Account) -> MagicResult<u128> {
    let mut dust = 0u128;
    for (i, strategy) in strategies.iter().enumerate() {
        let balance = strategy.vault.balance_of(owner);
        if account.allocations[i] > balance {
            dust = safe_add(dust, account.allocations[i] - balance)?;
            account.allocations[i] = balance;
        }
    }
    if dust > 0 {
        account.stake = safe_sub(account.stake, dust)?;
        debug!(%owner, dust, "share rounding charged to stake");
    }
    Ok(dust)
}
