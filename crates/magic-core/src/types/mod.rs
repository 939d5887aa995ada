//! # Core Types
//!
//! Plain data shared by every component.

pub mod address;
pub mod epoch;
pub mod route;

pub use address::*;
pub use epoch::*;
pub use route::*;

/// A call the external governance contract executes if a proposal passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalAction {
    pub target: Address,
    pub data: Vec<u8>,
}
