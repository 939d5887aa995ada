//! # Protocol Constants
//!
//! Fixed parameters for weights, epochs, voting and routing.

// ============================================================================
// Weight and Percentage Constants
// ============================================================================

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Sum every account weight vector must reach
pub const TOTAL_WEIGHT: u16 = 10_000;

/// Full-power denominator for votes (pct_yes + pct_no)
pub const MAX_PCT: u16 = 10_000;

/// Upper bound on the harvest caller fee (5%)
pub const MAX_HARVEST_FEE_BPS: u16 = 500;

/// Harvest caller fee applied when none is configured (1%)
pub const DEFAULT_HARVEST_FEE_BPS: u16 = 100;

// ============================================================================
// Epoch Constants
// ============================================================================

/// One week in seconds
pub const EPOCH_LENGTH: u64 = 7 * 24 * 60 * 60;

/// Epochs a cooldown stays locked before release
pub const DEFAULT_COOLDOWN_EPOCHS: u64 = 2;

// ============================================================================
// Strategy and Routing Limits
// ============================================================================

/// Maximum number of strategies the ledger accepts
pub const MAX_STRATEGIES: usize = 8;

/// Maximum hops in a single route
pub const MAX_ROUTE_HOPS: usize = 6;

/// Compounder shares minted per unit of underlying into an empty vault
pub const SHARES_PER_UNIT: u128 = 1_000_000_000;

/// Precision of pass-through reward-per-token accumulators
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

// ============================================================================
// Voting Constants
// ============================================================================

/// Local quorum as a share of total stake (20%)
pub const DEFAULT_QUORUM_BPS: u16 = 2_000;

/// Registry key under which the external governance contract is published
pub const VOTER_REGISTRY_KEY: &str = "VOTER";
