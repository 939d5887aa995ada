//! # In-Memory Environment
//!
//! A self-contained host for the protocol: token balances with allowances,
//! constant-rate pools of every pool kind, a reward source, governance
//! contracts, a contract registry, a settable clock and a snapshot journal.
//! Used by tests and offline simulations.

use std::collections::{HashMap, HashSet};

use crate::env::{Clock, Governance, GovernanceHost, Journal, RewardSource, SwapVenue, TokenLedger};
use crate::errors::{MagicError, MagicResult};
use crate::math::{mul_div, safe_add};
use crate::types::{Address, PoolCall, PoolKind, ProposalAction};

// ============================================================================
// Pools
// ============================================================================

/// Constant-rate pool: `out = in * rate_numerator / rate_denominator`.
///
/// Input tokens stay in the pool; output tokens are minted to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPool {
    pub kind: PoolKind,
    /// Coins by index. Vault pools use `[asset, share]`.
    pub coins: Vec<Address>,
    pub rate_numerator: u128,
    pub rate_denominator: u128,
}

impl MemoryPool {
    pub fn new(kind: PoolKind, coins: Vec<Address>, rate_numerator: u128, rate_denominator: u128) -> Self {
        Self {
            kind,
            coins,
            rate_numerator,
            rate_denominator,
        }
    }

    fn coin(&self, index: u128) -> MagicResult<Address> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.coins.get(i).copied())
            .ok_or_else(|| MagicError::PoolFailure(format!("no coin at index {}", index)))
    }

    fn quote(&self, amount_in: u128) -> MagicResult<u128> {
        mul_div(amount_in, self.rate_numerator, self.rate_denominator)
    }
}

// ============================================================================
// Governance
// ============================================================================

/// A vote forwarded to governance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVote {
    pub account: Address,
    pub proposal_id: u64,
    pub pct_yes: u16,
    pub pct_no: u16,
}

/// A proposal created through governance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProposal {
    pub account: Address,
    pub actions: Vec<ProposalAction>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryGovernance {
    pub min_create_proposal_weight: u128,
    /// Simulates a contract that does not answer the capability check
    pub capability_fails: bool,
    pub proposals: Vec<CreatedProposal>,
    pub votes: Vec<CastVote>,
}

impl MemoryGovernance {
    pub fn new(min_create_proposal_weight: u128) -> Self {
        Self {
            min_create_proposal_weight,
            capability_fails: false,
            proposals: Vec::new(),
            votes: Vec::new(),
        }
    }

    /// Governance contract whose capability check reverts
    pub fn broken() -> Self {
        Self {
            capability_fails: true,
            ..Self::new(0)
        }
    }
}

impl Governance for MemoryGovernance {
    fn min_create_proposal_weight(&self) -> MagicResult<u128> {
        if self.capability_fails {
            return Err(MagicError::GovernanceFailure("capability query reverted".to_string()));
        }
        Ok(self.min_create_proposal_weight)
    }

    fn create_proposal(
        &mut self,
        account: Address,
        actions: &[ProposalAction],
        description: &str,
    ) -> MagicResult<u64> {
        self.proposals.push(CreatedProposal {
            account,
            actions: actions.to_vec(),
            description: description.to_string(),
        });
        Ok(self.proposals.len() as u64 - 1)
    }

    fn vote_for_proposal(
        &mut self,
        account: Address,
        proposal_id: u64,
        pct_yes: u16,
        pct_no: u16,
    ) -> MagicResult<()> {
        if proposal_id >= self.proposals.len() as u64 {
            return Err(MagicError::GovernanceFailure(format!("unknown proposal {}", proposal_id)));
        }
        self.votes.push(CastVote {
            account,
            proposal_id,
            pct_yes,
            pct_no,
        });
        Ok(())
    }
}

// ============================================================================
// Environment
// ============================================================================

#[derive(Debug, Clone, Default)]
struct World {
    now: u64,
    balances: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
    pools: HashMap<Address, MemoryPool>,
    accrued_rewards: HashMap<Address, Vec<(Address, u128)>>,
    governors: HashMap<Address, MemoryGovernance>,
    contracts: HashSet<Address>,
    registry: HashMap<String, Address>,
}

/// In-memory host environment
#[derive(Debug, Clone, Default)]
pub struct MemoryEnvironment {
    world: World,
    journal: Vec<World>,
}

impl MemoryEnvironment {
    pub fn new(now: u64) -> Self {
        let mut env = Self::default();
        env.world.now = now;
        env
    }

    pub fn set_time(&mut self, now: u64) {
        self.world.now = now;
    }

    pub fn advance(&mut self, seconds: u64) {
        self.world.now = self.world.now.saturating_add(seconds);
    }

    /// Create `amount` of `token` out of thin air
    pub fn mint(&mut self, token: Address, to: Address, amount: u128) {
        let balance = self.world.balances.entry((token, to)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Register (or replace) a pool; pools count as deployed code
    pub fn add_pool(&mut self, address: Address, pool: MemoryPool) {
        self.world.contracts.insert(address);
        self.world.pools.insert(address, pool);
    }

    /// Accrue `amount` of `token` for `account` at the reward source
    pub fn accrue_rewards(&mut self, account: Address, token: Address, amount: u128) {
        self.world
            .accrued_rewards
            .entry(account)
            .or_default()
            .push((token, amount));
    }

    pub fn register_governance(&mut self, address: Address, governance: MemoryGovernance) {
        self.world.contracts.insert(address);
        self.world.governors.insert(address, governance);
    }

    /// Mark `address` as a contract without any governance interface
    pub fn deploy_code(&mut self, address: Address) {
        self.world.contracts.insert(address);
    }

    pub fn set_registry(&mut self, key: &str, address: Address) {
        self.world.registry.insert(key.to_string(), address);
    }

    pub fn governance_at(&self, address: Address) -> Option<&MemoryGovernance> {
        self.world.governors.get(&address)
    }

    /// Open journal checkpoints
    pub fn journal_depth(&self) -> usize {
        self.journal.len()
    }

    fn debit(&mut self, token: Address, from: Address, amount: u128) -> MagicResult<()> {
        let balance = self.world.balances.entry((token, from)).or_default();
        *balance = balance
            .checked_sub(amount)
            .ok_or(MagicError::InsufficientBalance)?;
        Ok(())
    }

    fn credit(&mut self, token: Address, to: Address, amount: u128) -> MagicResult<()> {
        let balance = self.world.balances.entry((token, to)).or_default();
        *balance = safe_add(*balance, amount)?;
        Ok(())
    }
}

impl TokenLedger for MemoryEnvironment {
    fn balance_of(&self, token: Address, holder: Address) -> u128 {
        self.world.balances.get(&(token, holder)).copied().unwrap_or(0)
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128 {
        self.world
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: u128) -> MagicResult<()> {
        self.world.allowances.insert((token, owner, spender), amount);
        Ok(())
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: u128) -> MagicResult<()> {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> MagicResult<()> {
        if spender != from {
            let allowance = self.allowance(token, from, spender);
            let remaining = allowance
                .checked_sub(amount)
                .ok_or(MagicError::InsufficientAllowance)?;
            self.world.allowances.insert((token, from, spender), remaining);
        }
        self.transfer(token, from, to, amount)
    }
}

impl SwapVenue for MemoryEnvironment {
    fn swap(&mut self, caller: Address, pool_address: Address, call: PoolCall) -> MagicResult<()> {
        let pool = self
            .world
            .pools
            .get(&pool_address)
            .cloned()
            .ok_or_else(|| MagicError::PoolFailure(format!("no pool at {}", pool_address)))?;

        let (token_in, token_out, amount_in, receiver) = match (pool.kind, call) {
            (PoolKind::StableSwap, PoolCall::StableExchange { i, j, dx, .. }) => {
                let index = |v: i128| {
                    u128::try_from(v).map_err(|_| MagicError::PoolFailure("negative coin index".to_string()))
                };
                (pool.coin(index(i)?)?, pool.coin(index(j)?)?, dx, caller)
            }
            (PoolKind::CryptoSwap, PoolCall::CryptoExchange { i, j, dx, .. }) => {
                (pool.coin(i)?, pool.coin(j)?, dx, caller)
            }
            (PoolKind::TwoCryptoSwap, PoolCall::TwoCryptoExchange { i, j, dx, receiver, .. }) => {
                (pool.coin(i)?, pool.coin(j)?, dx, receiver)
            }
            (PoolKind::VaultDeposit, PoolCall::VaultDeposit { assets, receiver }) => {
                (pool.coin(0)?, pool.coin(1)?, assets, receiver)
            }
            (PoolKind::VaultRedeem, PoolCall::VaultRedeem { shares, receiver, owner }) => {
                if owner != caller {
                    return Err(MagicError::PoolFailure("redeem owner must be caller".to_string()));
                }
                (pool.coin(1)?, pool.coin(0)?, shares, receiver)
            }
            (kind, _) => {
                return Err(MagicError::PoolFailure(format!("call convention does not match {:?} pool", kind)));
            }
        };

        let amount_out = pool.quote(amount_in)?;
        self.transfer_from(token_in, pool_address, caller, pool_address, amount_in)?;
        self.credit(token_out, receiver, amount_out)
    }
}

impl RewardSource for MemoryEnvironment {
    fn claim_rewards(&mut self, account: Address) -> MagicResult<()> {
        let accrued = self.world.accrued_rewards.remove(&account).unwrap_or_default();
        for (token, amount) in accrued {
            self.credit(token, account, amount)?;
        }
        Ok(())
    }
}

impl GovernanceHost for MemoryEnvironment {
    fn has_code(&self, address: Address) -> bool {
        self.world.contracts.contains(&address)
    }

    fn governance(&mut self, address: Address) -> Option<&mut dyn Governance> {
        self.world
            .governors
            .get_mut(&address)
            .map(|g| g as &mut dyn Governance)
    }

    fn registry_lookup(&self, key: &str) -> Option<Address> {
        self.world.registry.get(key).copied()
    }
}

impl Journal for MemoryEnvironment {
    fn checkpoint(&mut self) -> usize {
        self.journal.push(self.world.clone());
        self.journal.len() - 1
    }

    fn commit(&mut self, checkpoint: usize) {
        self.journal.truncate(checkpoint);
    }

    fn revert(&mut self, checkpoint: usize) {
        if checkpoint >= self.journal.len() {
            return;
        }
        if let Some(saved) = self.journal.drain(checkpoint..).next() {
            self.world = saved;
        }
    }
}

impl Clock for MemoryEnvironment {
    fn now(&self) -> u64 {
        self.world.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = Address::repeat_byte(0x61);
    const OUT: Address = Address::repeat_byte(0x62);
    const POOL: Address = Address::repeat_byte(0x70);

    fn user(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut env = MemoryEnvironment::new(0);
        env.mint(TOKEN, user(1), 100);
        env.approve(TOKEN, user(1), user(2), 60).unwrap();

        env.transfer_from(TOKEN, user(2), user(1), user(3), 50).unwrap();
        assert_eq!(env.allowance(TOKEN, user(1), user(2)), 10);
        assert_eq!(env.balance_of(TOKEN, user(3)), 50);
        assert_eq!(
            env.transfer_from(TOKEN, user(2), user(1), user(3), 11),
            Err(MagicError::InsufficientAllowance)
        );
        assert_eq!(
            env.transfer(TOKEN, user(1), user(3), 51),
            Err(MagicError::InsufficientBalance)
        );
    }

    #[test]
    fn test_nested_journal() {
        let mut env = MemoryEnvironment::new(0);
        env.mint(TOKEN, user(1), 100);

        let outer = env.checkpoint();
        env.transfer(TOKEN, user(1), user(2), 10).unwrap();
        let inner = env.checkpoint();
        env.transfer(TOKEN, user(1), user(2), 20).unwrap();
        env.revert(inner);
        assert_eq!(env.balance_of(TOKEN, user(2)), 10);

        env.revert(outer);
        assert_eq!(env.balance_of(TOKEN, user(2)), 0);
        assert_eq!(env.journal_depth(), 0);
    }

    #[test]
    fn test_pool_checks_call_convention() {
        let mut env = MemoryEnvironment::new(0);
        env.add_pool(POOL, MemoryPool::new(PoolKind::StableSwap, vec![TOKEN, OUT], 1, 1));
        env.mint(TOKEN, user(1), 10);
        env.approve(TOKEN, user(1), POOL, 10).unwrap();

        let wrong = PoolCall::CryptoExchange { i: 0, j: 1, dx: 10, min_dy: 0 };
        assert!(matches!(env.swap(user(1), POOL, wrong), Err(MagicError::PoolFailure(_))));

        let right = PoolCall::StableExchange { i: 0, j: 1, dx: 10, min_dy: 0 };
        env.swap(user(1), POOL, right).unwrap();
        assert_eq!(env.balance_of(OUT, user(1)), 10);
        assert_eq!(env.balance_of(TOKEN, POOL), 10);
    }

    #[test]
    fn test_claim_rewards_pays_accrued() {
        let mut env = MemoryEnvironment::new(0);
        env.accrue_rewards(user(1), TOKEN, 5);
        env.accrue_rewards(user(1), TOKEN, 7);
        env.claim_rewards(user(1)).unwrap();
        env.claim_rewards(user(1)).unwrap();
        assert_eq!(env.balance_of(TOKEN, user(1)), 12);
    }
}
