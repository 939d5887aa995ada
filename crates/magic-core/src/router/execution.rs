//! # Hop Execution
//!
//! Dispatches each hop to its pool family and measures what it produced.
//! Callers run this inside a journal checkpoint so a failed hop rolls back
//! every earlier transfer.

use tracing::warn;

use crate::env::{SwapVenue, TokenLedger};
use crate::errors::{MagicError, MagicResult};
use crate::types::{Address, Hop};

/// Run `hops` on `amount_in` held by `router`, returning the final output
pub fn execute_hops<E>(env: &mut E, router: Address, hops: &[Hop], amount_in: u128) -> MagicResult<u128>
where
    E: TokenLedger + SwapVenue + ?Sized,
{
    let mut amount = amount_in;
    for (index, hop) in hops.iter().enumerate() {
        amount = execute_hop(env, router, index, hop, amount)?;
    }
    Ok(amount)
}

fn execute_hop<E>(env: &mut E, router: Address, index: usize, hop: &Hop, amount_in: u128) -> MagicResult<u128>
where
    E: TokenLedger + SwapVenue + ?Sized,
{
    let start = env.balance_of(hop.token_out, router);

    env.approve(hop.token_in, router, hop.pool, amount_in)?;
    if let Err(err) = env.swap(router, hop.pool, hop.call(amount_in, router)) {
        warn!(hop = index, pool = %hop.pool, error = %err, "hop swap failed");
        return Err(MagicError::RouteExecutionFailed(index));
    }
    env.approve(hop.token_in, router, hop.pool, 0)?;

    let produced = env.balance_of(hop.token_out, router).saturating_sub(start);
    if produced == 0 {
        warn!(hop = index, pool = %hop.pool, amount_in, "hop produced no output");
        return Err(MagicError::RouteExecutionFailed(index));
    }
    Ok(produced)
}
