//! # External Collaborators
//!
//! Interfaces to everything outside the accounting core. The core never
//! trusts an amount reported by a collaborator; it reads balances before and
//! after each call and credits only the measured delta.

use crate::errors::MagicResult;
use crate::types::{Address, PoolCall, ProposalAction};

/// Fungible token balances and allowances, keyed by token address
pub trait TokenLedger {
    fn balance_of(&self, token: Address, holder: Address) -> u128;

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128;

    fn approve(
        &mut self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> MagicResult<()>;

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> MagicResult<()>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance unless `spender == from`
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> MagicResult<()>;
}

/// External AMM pools
pub trait SwapVenue {
    /// Execute `call` against `pool` on behalf of `caller`. The pool pulls
    /// its input from `caller` by allowance.
    fn swap(&mut self, caller: Address, pool: Address, call: PoolCall) -> MagicResult<()>;
}

/// Source of accrued staking rewards
pub trait RewardSource {
    /// Pay everything accrued to `account` into its token balances
    fn claim_rewards(&mut self, account: Address) -> MagicResult<()>;
}

/// External governance contract
pub trait Governance {
    /// Capability check; a legitimate governance instance answers it
    fn min_create_proposal_weight(&self) -> MagicResult<u128>;

    fn create_proposal(
        &mut self,
        account: Address,
        actions: &[ProposalAction],
        description: &str,
    ) -> MagicResult<u64>;

    fn vote_for_proposal(
        &mut self,
        account: Address,
        proposal_id: u64,
        pct_yes: u16,
        pct_no: u16,
    ) -> MagicResult<()>;
}

/// Contract lookup
pub trait GovernanceHost {
    /// Whether code is deployed at `address`
    fn has_code(&self, address: Address) -> bool;

    /// Governance interface at `address`, if the contract exposes one
    fn governance(&mut self, address: Address) -> Option<&mut dyn Governance>;

    /// Address published in the protocol registry under `key`
    fn registry_lookup(&self, key: &str) -> Option<Address>;
}

/// Checkpointed external state. Checkpoints nest like a stack.
pub trait Journal {
    fn checkpoint(&mut self) -> usize;

    /// Keep every change made since `checkpoint`
    fn commit(&mut self, checkpoint: usize);

    /// Discard every change made since `checkpoint`
    fn revert(&mut self, checkpoint: usize);
}

/// Wall clock in unix seconds
pub trait Clock {
    fn now(&self) -> u64;
}

/// Everything the protocol needs from its host
pub trait Environment:
    TokenLedger + SwapVenue + RewardSource + GovernanceHost + Journal + Clock
{
}

impl<T> Environment for T where
    T: TokenLedger + SwapVenue + RewardSource + GovernanceHost + Journal + Clock
{
}
