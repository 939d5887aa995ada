//! # Magic Core - Multi-Strategy Staking Engine
//!
//! Accounting core for a staking protocol where a governance token is staked
//! once and split by weight across yield strategies. It provides:
//!
//! - The staking ledger (principal, weights, epochs, cooldown queue)
//! - Strategy vaults (auto-compounding and pass-through)
//! - The reward router executing multi-hop swaps with delta accounting
//! - Vote aggregation forwarding local votes to external governance
//!
//! Every external collaborator (tokens, pools, reward source, governance) is
//! reached through the traits in [`env`]. [`sim::MemoryEnvironment`] is an
//! in-memory implementation used for tests and simulations.

pub mod access;
pub mod config;
pub mod constants;
pub mod env;
pub mod errors;
pub mod math;
pub mod protocol;
pub mod router;
pub mod sim;
pub mod staker;
pub mod strategy;
pub mod types;
pub mod voter;

// Re-export commonly used items
pub use access::Roles;
pub use config::ProtocolConfig;
pub use constants::*;
pub use errors::{ErrorKind, MagicError, MagicResult};
pub use protocol::{HarvestReport, MagicProtocol, StrategyCredit};
pub use types::*;
