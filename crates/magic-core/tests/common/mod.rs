//! Shared test infrastructure
//!
//! Builds a protocol over the in-memory environment with two strategies:
//! a compounder restaking into the governance token and a pass-through vault
//! paying out savings shares. Rewards reach the compounder through a two-hop
//! route and the savings vault through a vault deposit.

#![allow(dead_code)]

pub mod tracing;

pub use magic_core::env::TokenLedger;
pub use magic_core::sim::{MemoryEnvironment, MemoryGovernance, MemoryPool};
pub use magic_core::strategy::{VaultBook, VaultKind};
pub use magic_core::voter::VoteOutcome;
pub use magic_core::*;

pub type TestProtocol = MagicProtocol<MemoryEnvironment>;

// Roles and components, matching `ProtocolConfig::example()`
pub const OPERATOR: Address = Address::from_low_u64(0xA1);
pub const MANAGER: Address = Address::from_low_u64(0xA2);
pub const STAKER: Address = Address::from_low_u64(0x51);
pub const ROUTER: Address = Address::from_low_u64(0x52);
pub const VOTER: Address = Address::from_low_u64(0x53);

// Strategy vaults
pub const COMPOUNDER: Address = Address::from_low_u64(0x54);
pub const SAVINGS_VAULT: Address = Address::from_low_u64(0x55);

// Tokens
pub const GOV: Address = Address::from_low_u64(0x60);
pub const REWARD: Address = Address::from_low_u64(0x61);
pub const STABLE: Address = Address::from_low_u64(0x62);
/// Savings share token; also the vault pool that mints it
pub const SAVINGS: Address = Address::from_low_u64(0x63);

// Pools
pub const POOL_A: Address = Address::from_low_u64(0x70);
pub const POOL_B: Address = Address::from_low_u64(0x71);

pub const GOVERNANCE: Address = Address::from_low_u64(0x80);
pub const MIN_PROPOSAL_WEIGHT: u128 = 5_000;

/// Test amount spent validating each route during setup
pub const ROUTE_TEST_AMOUNT: u128 = 10;

pub fn user(n: u64) -> Address {
    Address::from_low_u64(0x1000 + n)
}

pub fn config() -> ProtocolConfig {
    let mut config = ProtocolConfig::example();
    config.harvest.fee_bps = 0;
    config
}

pub fn start_time() -> u64 {
    config().epoch.start_time
}

/// REWARD -> STABLE on a stable pool, STABLE -> GOV on a crypto pool
pub fn compounder_route() -> Vec<Hop> {
    vec![
        Hop {
            pool: POOL_A,
            token_in: REWARD,
            token_out: STABLE,
            kind: PoolKind::StableSwap,
            index_in: 0,
            index_out: 1,
        },
        Hop {
            pool: POOL_B,
            token_in: STABLE,
            token_out: GOV,
            kind: PoolKind::CryptoSwap,
            index_in: 0,
            index_out: 1,
        },
    ]
}

/// REWARD deposited into the savings vault for SAVINGS shares
pub fn savings_route() -> Vec<Hop> {
    vec![Hop {
        pool: SAVINGS,
        token_in: REWARD,
        token_out: SAVINGS,
        kind: PoolKind::VaultDeposit,
        index_in: 0,
        index_out: 1,
    }]
}

pub fn environment() -> MemoryEnvironment {
    let mut env = MemoryEnvironment::new(start_time());
    env.add_pool(POOL_A, MemoryPool::new(PoolKind::StableSwap, vec![REWARD, STABLE], 1, 1));
    env.add_pool(POOL_B, MemoryPool::new(PoolKind::CryptoSwap, vec![STABLE, GOV], 1, 1));
    env.add_pool(SAVINGS, MemoryPool::new(PoolKind::VaultDeposit, vec![REWARD, SAVINGS], 1, 1));
    env.register_governance(GOVERNANCE, MemoryGovernance::new(MIN_PROPOSAL_WEIGHT));
    env.set_registry(VOTER_REGISTRY_KEY, GOVERNANCE);

    env.mint(REWARD, OPERATOR, 1_000);
    env.approve(REWARD, OPERATOR, ROUTER, u128::MAX).unwrap();
    env
}

/// Protocol with both strategies registered, routed, bound and approved
pub fn setup() -> TestProtocol {
    self::tracing::init_test_tracing();

    let mut protocol = MagicProtocol::new(environment(), config()).unwrap();
    protocol
        .add_strategy(OPERATOR, VaultKind::Compounder, COMPOUNDER, GOV)
        .unwrap();
    protocol
        .add_strategy(OPERATOR, VaultKind::PassThrough, SAVINGS_VAULT, SAVINGS)
        .unwrap();

    protocol
        .set_route(OPERATOR, REWARD, compounder_route(), GOV, ROUTE_TEST_AMOUNT, false)
        .unwrap();
    protocol
        .set_route(OPERATOR, REWARD, savings_route(), SAVINGS, ROUTE_TEST_AMOUNT, false)
        .unwrap();

    protocol.set_reward_caller(OPERATOR, STAKER, true).unwrap();
    for vault in [COMPOUNDER, SAVINGS_VAULT] {
        protocol
            .set_strategy_harvester(OPERATOR, vault, ROUTER, true)
            .unwrap();
        protocol.approve_strategy(OPERATOR, vault, true).unwrap();
    }
    protocol.refresh_voting_target(OPERATOR).unwrap();
    protocol
}

/// Mint governance tokens to `account` and approve the staker
pub fn fund(protocol: &mut TestProtocol, account: Address, amount: u128) {
    let env = protocol.env_mut();
    env.mint(GOV, account, amount);
    let allowance = env.allowance(GOV, account, STAKER);
    env.approve(GOV, account, STAKER, allowance + amount).unwrap();
}

/// Set weights and stake `amount` in the current epoch
pub fn stake_as(protocol: &mut TestProtocol, account: Address, weights: &[u16], amount: u128) {
    fund(protocol, account, amount);
    protocol.set_weights(account, weights.to_vec()).unwrap();
    protocol.stake(account, amount).unwrap();
}

pub fn advance_epochs(protocol: &mut TestProtocol, epochs: u64) {
    let length = protocol.config().epoch.length;
    protocol.env_mut().advance(epochs * length);
}

/// Accrue `amount` of the reward token for the staker
pub fn accrue(protocol: &mut TestProtocol, amount: u128) {
    protocol.env_mut().accrue_rewards(STAKER, REWARD, amount);
}

/// Sum of every strategy's supply
pub fn strategy_supply_sum(protocol: &TestProtocol) -> u128 {
    protocol
        .staker()
        .strategies()
        .iter()
        .map(|s| s.total_supply())
        .sum()
}
