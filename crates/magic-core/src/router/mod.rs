//! # Reward Router
//!
//! Converts harvested reward tokens into each strategy's desired token along
//! operator-declared routes. Every conversion is bracketed by balance reads of
//! the output token, and only the measured delta is credited, so tokens the
//! router already held are never attributed to the current caller.

pub mod execution;

pub use execution::execute_hops;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::access::Roles;
use crate::env::{SwapVenue, TokenLedger};
use crate::errors::{MagicError, MagicResult};
use crate::math::safe_sub;
use crate::types::{validate_route, Address, Hop, Route};

#[derive(Debug, Clone)]
pub struct RewardRouter {
    address: Address,
    routes: HashMap<(Address, Address), Route>,
    reward_callers: HashSet<Address>,
    approved_strategies: HashSet<Address>,
}

impl RewardRouter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            routes: HashMap::new(),
            reward_callers: HashSet::new(),
            approved_strategies: HashSet::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn route(&self, token_in: Address, token_out: Address) -> Option<&Route> {
        self.routes.get(&(token_in, token_out))
    }

    pub fn is_reward_caller(&self, caller: Address) -> bool {
        self.reward_callers.contains(&caller)
    }

    pub fn is_approved_strategy(&self, strategy: Address) -> bool {
        self.approved_strategies.contains(&strategy)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub fn set_reward_caller(
        &mut self,
        roles: &Roles,
        caller: Address,
        target: Address,
        enabled: bool,
    ) -> MagicResult<()> {
        roles.require_operator(caller)?;
        if enabled {
            self.reward_callers.insert(target);
        } else {
            self.reward_callers.remove(&target);
        }
        info!(%target, enabled, "reward caller updated");
        Ok(())
    }

    pub fn approve_strategy(
        &mut self,
        roles: &Roles,
        caller: Address,
        strategy: Address,
        approved: bool,
    ) -> MagicResult<()> {
        roles.require_operator(caller)?;
        if approved {
            self.approved_strategies.insert(strategy);
        } else {
            self.approved_strategies.remove(&strategy);
        }
        info!(%strategy, approved, "strategy approval updated");
        Ok(())
    }

    /// Validate a route by swapping `test_amount` pulled from the operator,
    /// then store it.
    ///
    /// The operator receives exactly the output of the test swap. Returns that
    /// output.
    #[allow(clippy::too_many_arguments)]
    pub fn set_route<E>(
        &mut self,
        env: &mut E,
        roles: &Roles,
        caller: Address,
        token_in: Address,
        hops: Vec<Hop>,
        token_out: Address,
        test_amount: u128,
        permanent: bool,
    ) -> MagicResult<u128>
    where
        E: TokenLedger + SwapVenue + ?Sized,
    {
        roles.require_operator(caller)?;
        if test_amount == 0 {
            return Err(MagicError::InvalidAmount);
        }
        validate_route(token_in, &hops, token_out)?;
        if self.route(token_in, token_out).is_some_and(|r| r.permanent) {
            return Err(MagicError::RouteLocked);
        }

        let start = env.balance_of(token_out, self.address);
        env.transfer_from(token_in, self.address, caller, self.address, test_amount)?;
        execute_hops(env, self.address, &hops, test_amount)?;
        let end = env.balance_of(token_out, self.address);

        let delta = safe_sub(end, start)?;
        if delta == 0 {
            return Err(MagicError::RouteIneffective);
        }
        env.transfer(token_out, self.address, caller, delta)?;

        info!(%token_in, %token_out, hops = hops.len(), test_amount, delta, permanent, "route set");
        self.routes.insert(
            (token_in, token_out),
            Route {
                token_in,
                token_out,
                hops,
                permanent,
            },
        );
        Ok(delta)
    }

    pub fn revoke_route(
        &mut self,
        roles: &Roles,
        caller: Address,
        token_in: Address,
        token_out: Address,
    ) -> MagicResult<()> {
        roles.require_operator(caller)?;
        match self.route(token_in, token_out) {
            None => return Err(MagicError::UnknownRoute(token_in, token_out)),
            Some(route) if route.permanent => return Err(MagicError::RouteLocked),
            Some(_) => {}
        }
        self.routes.remove(&(token_in, token_out));
        info!(%token_in, %token_out, "route revoked");
        Ok(())
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Pull `amount_in` of `token_in` from `caller`, convert it to
    /// `desired_token` and send the produced delta to `strategy`.
    ///
    /// The caller must be a registered reward caller or the strategy itself,
    /// and the strategy must be approved.
    pub fn process<E>(
        &self,
        env: &mut E,
        caller: Address,
        token_in: Address,
        amount_in: u128,
        strategy: Address,
        desired_token: Address,
    ) -> MagicResult<u128>
    where
        E: TokenLedger + SwapVenue + ?Sized,
    {
        if !(self.is_reward_caller(caller) || caller == strategy) {
            return Err(MagicError::Unauthorized);
        }
        if !self.is_approved_strategy(strategy) {
            return Err(MagicError::Unauthorized);
        }
        if amount_in == 0 {
            return Ok(0);
        }

        let start = env.balance_of(desired_token, self.address);
        env.transfer_from(token_in, self.address, caller, self.address, amount_in)?;
        if token_in != desired_token {
            let route = self
                .route(token_in, desired_token)
                .ok_or(MagicError::UnknownRoute(token_in, desired_token))?;
            execute_hops(env, self.address, &route.hops, amount_in)?;
        }
        let end = env.balance_of(desired_token, self.address);

        let delta = safe_sub(end, start)?;
        if delta > 0 {
            env.transfer(desired_token, self.address, strategy, delta)?;
        }

        debug!(%token_in, %desired_token, %strategy, amount_in, delta, "rewards processed");
        Ok(delta)
    }
}
