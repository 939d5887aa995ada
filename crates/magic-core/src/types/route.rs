//! # Route Types
//!
//! Hop descriptors for multi-hop reward conversion and the pool call
//! conventions each pool family expects.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_ROUTE_HOPS;
use crate::errors::{MagicError, MagicResult};
use crate::types::Address;

// ============================================================================
// Pool Kinds
// ============================================================================

/// External pool families, numbered as in deployed route tables
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    /// Stable pool exchange with signed coin indices
    StableSwap = 0,
    /// Tokenized vault redeem (shares in, assets out)
    VaultRedeem = 1,
    /// Crypto pool exchange with unsigned coin indices
    CryptoSwap = 2,
    /// Tokenized vault deposit (assets in, shares out)
    VaultDeposit = 3,
    /// Two-coin crypto pool exchange paying an explicit receiver
    TwoCryptoSwap = 4,
}

impl TryFrom<u8> for PoolKind {
    type Error = MagicError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PoolKind::StableSwap),
            1 => Ok(PoolKind::VaultRedeem),
            2 => Ok(PoolKind::CryptoSwap),
            3 => Ok(PoolKind::VaultDeposit),
            4 => Ok(PoolKind::TwoCryptoSwap),
            _ => Err(MagicError::invalid_parameter(
                "pool_kind",
                &value.to_string(),
                "0..=4",
            )),
        }
    }
}

/// A single call against an external pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolCall {
    StableExchange {
        i: i128,
        j: i128,
        dx: u128,
        min_dy: u128,
    },
    CryptoExchange {
        i: u128,
        j: u128,
        dx: u128,
        min_dy: u128,
    },
    TwoCryptoExchange {
        i: u128,
        j: u128,
        dx: u128,
        min_dy: u128,
        receiver: Address,
    },
    VaultDeposit {
        assets: u128,
        receiver: Address,
    },
    VaultRedeem {
        shares: u128,
        receiver: Address,
        owner: Address,
    },
}

// ============================================================================
// Hops and Routes
// ============================================================================

/// One swap step of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub kind: PoolKind,
    pub index_in: u8,
    pub index_out: u8,
}

impl Hop {
    /// Build the pool call swapping `amount_in`, paying `recipient`.
    ///
    /// Slippage floors are left at zero; the router measures the output itself.
    pub fn call(&self, amount_in: u128, recipient: Address) -> PoolCall {
        match self.kind {
            PoolKind::StableSwap => PoolCall::StableExchange {
                i: i128::from(self.index_in),
                j: i128::from(self.index_out),
                dx: amount_in,
                min_dy: 0,
            },
            PoolKind::CryptoSwap => PoolCall::CryptoExchange {
                i: u128::from(self.index_in),
                j: u128::from(self.index_out),
                dx: amount_in,
                min_dy: 0,
            },
            PoolKind::TwoCryptoSwap => PoolCall::TwoCryptoExchange {
                i: u128::from(self.index_in),
                j: u128::from(self.index_out),
                dx: amount_in,
                min_dy: 0,
                receiver: recipient,
            },
            PoolKind::VaultDeposit => PoolCall::VaultDeposit {
                assets: amount_in,
                receiver: recipient,
            },
            PoolKind::VaultRedeem => PoolCall::VaultRedeem {
                shares: amount_in,
                receiver: recipient,
                owner: recipient,
            },
        }
    }
}

/// Stored conversion path for a `(token_in, token_out)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub token_in: Address,
    pub token_out: Address,
    pub hops: Vec<Hop>,
    /// Permanent routes can never be replaced or revoked
    pub permanent: bool,
}

/// Validate route hop count
pub fn validate_hop_count(hops: usize) -> MagicResult<()> {
    if hops == 0 {
        return Err(MagicError::InvalidRoute("route has no hops"));
    }
    if hops > MAX_ROUTE_HOPS {
        return Err(MagicError::RouteTooLong(hops, MAX_ROUTE_HOPS));
    }
    Ok(())
}

/// Validate that `hops` chain from `token_in` to `token_out`
pub fn validate_route(token_in: Address, hops: &[Hop], token_out: Address) -> MagicResult<()> {
    validate_hop_count(hops.len())?;

    if token_in == token_out {
        return Err(MagicError::InvalidRoute("input and output tokens match"));
    }

    let mut current = token_in;
    for hop in hops {
        if hop.pool.is_zero() {
            return Err(MagicError::InvalidRoute("hop pool is the zero address"));
        }
        if hop.token_in != current {
            return Err(MagicError::InvalidRoute("hop chain is not continuous"));
        }
        if hop.token_in == hop.token_out {
            return Err(MagicError::InvalidRoute("hop swaps a token for itself"));
        }
        current = hop.token_out;
    }

    if current != token_out {
        return Err(MagicError::InvalidRoute("route does not end at the output token"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(pool: u8, token_in: u8, token_out: u8, kind: PoolKind) -> Hop {
        Hop {
            pool: Address::repeat_byte(pool),
            token_in: Address::repeat_byte(token_in),
            token_out: Address::repeat_byte(token_out),
            kind,
            index_in: 0,
            index_out: 1,
        }
    }

    #[test]
    fn test_pool_kind_from_u8() {
        assert_eq!(PoolKind::try_from(0), Ok(PoolKind::StableSwap));
        assert_eq!(PoolKind::try_from(4), Ok(PoolKind::TwoCryptoSwap));
        assert!(PoolKind::try_from(5).is_err());
    }

    #[test]
    fn test_call_conventions() {
        let recipient = Address::repeat_byte(9);
        let stable = hop(1, 2, 3, PoolKind::StableSwap).call(100, recipient);
        assert_eq!(
            stable,
            PoolCall::StableExchange { i: 0, j: 1, dx: 100, min_dy: 0 }
        );
        let redeem = hop(1, 2, 3, PoolKind::VaultRedeem).call(5, recipient);
        assert_eq!(
            redeem,
            PoolCall::VaultRedeem { shares: 5, receiver: recipient, owner: recipient }
        );
    }

    #[test]
    fn test_validate_route_continuity() {
        let a = Address::repeat_byte(2);
        let c = Address::repeat_byte(4);
        let good = vec![hop(1, 2, 3, PoolKind::StableSwap), hop(5, 3, 4, PoolKind::CryptoSwap)];
        assert!(validate_route(a, &good, c).is_ok());

        let broken = vec![hop(1, 2, 3, PoolKind::StableSwap), hop(5, 7, 4, PoolKind::CryptoSwap)];
        assert_eq!(
            validate_route(a, &broken, c),
            Err(MagicError::InvalidRoute("hop chain is not continuous"))
        );
        assert_eq!(
            validate_route(a, &good[..1], c),
            Err(MagicError::InvalidRoute("route does not end at the output token"))
        );
    }

    #[test]
    fn test_validate_hop_count() {
        assert!(validate_hop_count(0).is_err());
        assert!(validate_hop_count(MAX_ROUTE_HOPS).is_ok());
        assert_eq!(
            validate_hop_count(MAX_ROUTE_HOPS + 1),
            Err(MagicError::RouteTooLong(MAX_ROUTE_HOPS + 1, MAX_ROUTE_HOPS))
        );
    }
}
