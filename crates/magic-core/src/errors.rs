//! # Core Error Types
//!
//! Every failure the engine can report. Errors are fatal to the current call;
//! the protocol layer rolls back all effects before returning them.

use thiserror::Error;

use crate::types::Address;

/// Broad classification of a [`MagicError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateInvariant,
    Authorization,
    External,
    Math,
    Configuration,
}

/// Protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MagicError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid weights: {0}")]
    InvalidWeights(&'static str),

    #[error("!epoch: weights already changed in epoch {0}")]
    EpochLocked(u64),

    #[error("Epoch {0} is not a cooldown epoch")]
    NotCooldownEpoch(u64),

    #[error("Invalid vote: percentages must sum to {0}")]
    InvalidVote(u16),

    #[error("Invalid parameter '{name}': got {value}, expected {expected}")]
    InvalidParameter {
        name: String,
        value: String,
        expected: String,
    },

    // ========================================================================
    // State Invariant Errors
    // ========================================================================

    #[error("Insufficient realized stake: requested {requested}, realized {realized}")]
    InsufficientRealizedStake { requested: u128, realized: u128 },

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(Address),

    #[error("Strategy index {index} out of range ({count} strategies)")]
    StrategyIndexOutOfRange { index: usize, count: usize },

    #[error("Strategy already registered: {0}")]
    DuplicateStrategy(Address),

    #[error("Too many strategies (max {0})")]
    TooManyStrategies(usize),

    #[error("Cooldown active until epoch {0}")]
    CooldownActive(u64),

    #[error("!quorum: weight {weight} below required {required}")]
    QuorumNotReached { weight: u128, required: u128 },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized")]
    Unauthorized,

    #[error("No voting power")]
    NoVotingPower,

    #[error("Insufficient voting power: have {power}, need {required}")]
    InsufficientVotingPower { power: u128, required: u128 },

    #[error("Invalid voting target: {0}")]
    InvalidVotingTarget(&'static str),

    // ========================================================================
    // Route and External Interaction Errors
    // ========================================================================

    #[error("Route ineffective: test swap produced no output")]
    RouteIneffective,

    #[error("Route execution failed at hop {0}")]
    RouteExecutionFailed(usize),

    #[error("Invalid route: {0}")]
    InvalidRoute(&'static str),

    #[error("Route too long: {0} hops (max {1})")]
    RouteTooLong(usize, usize),

    #[error("No route from {0} to {1}")]
    UnknownRoute(Address, Address),

    #[error("Route is permanent")]
    RouteLocked,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Insufficient allowance")]
    InsufficientAllowance,

    #[error("Pool call failed: {0}")]
    PoolFailure(String),

    #[error("Governance call failed: {0}")]
    GovernanceFailure(String),

    // ========================================================================
    // Math Errors
    // ========================================================================

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for protocol operations
pub type MagicResult<T> = Result<T, MagicError>;

impl MagicError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: &str, value: &str, expected: &str) -> Self {
        MagicError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        MagicError::Config(message.into())
    }

    /// Classify the error for callers deciding how to react
    pub fn kind(&self) -> ErrorKind {
        use MagicError::*;
        match self {
            InvalidAmount
            | InvalidWeights(_)
            | EpochLocked(_)
            | NotCooldownEpoch(_)
            | InvalidVote(_)
            | InvalidParameter { .. } => ErrorKind::Validation,

            InsufficientRealizedStake { .. }
            | UnknownStrategy(_)
            | StrategyIndexOutOfRange { .. }
            | DuplicateStrategy(_)
            | TooManyStrategies(_)
            | CooldownActive(_)
            | QuorumNotReached { .. } => ErrorKind::StateInvariant,

            Unauthorized
            | NoVotingPower
            | InsufficientVotingPower { .. }
            | InvalidVotingTarget(_) => ErrorKind::Authorization,

            RouteIneffective
            | RouteExecutionFailed(_)
            | InvalidRoute(_)
            | RouteTooLong(..)
            | UnknownRoute(..)
            | RouteLocked
            | InsufficientBalance
            | InsufficientAllowance
            | PoolFailure(_)
            | GovernanceFailure(_) => ErrorKind::External,

            MathOverflow | MathUnderflow | DivisionByZero => ErrorKind::Math,

            Config(_) => ErrorKind::Configuration,
        }
    }

    /// Whether retrying after waiting for an epoch rollover may succeed
    pub fn is_epoch_gated(&self) -> bool {
        matches!(
            self,
            MagicError::EpochLocked(_)
                | MagicError::NotCooldownEpoch(_)
                | MagicError::CooldownActive(_)
                | MagicError::InsufficientRealizedStake { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_precondition() {
        let err = MagicError::InsufficientRealizedStake {
            requested: 101,
            realized: 100,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient realized stake: requested 101, realized 100"
        );
        assert_eq!(
            MagicError::EpochLocked(4).to_string(),
            "!epoch: weights already changed in epoch 4"
        );
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(MagicError::InvalidAmount.kind(), ErrorKind::Validation);
        assert_eq!(MagicError::EpochLocked(1).kind(), ErrorKind::Validation);
        assert_eq!(
            MagicError::UnknownStrategy(Address::ZERO).kind(),
            ErrorKind::StateInvariant
        );
        assert_eq!(
            MagicError::InvalidVotingTarget("zero address").kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            MagicError::RouteExecutionFailed(2).kind(),
            ErrorKind::External
        );
        assert_eq!(MagicError::MathOverflow.kind(), ErrorKind::Math);
    }

    #[test]
    fn test_epoch_gated() {
        assert!(MagicError::CooldownActive(3).is_epoch_gated());
        assert!(!MagicError::Unauthorized.is_epoch_gated());
    }
}
