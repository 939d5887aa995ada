//! # Protocol Entry Points
//!
//! Ties the staking ledger, reward router and vote aggregator to a host
//! environment. Every public mutation runs as a unit of work: the host journal
//! is checkpointed and the internal state cloned before the call, and both are
//! restored if the call fails, so no partial effect survives an error.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::{HarvestConfig, ProtocolConfig};
use crate::env::Environment;
use crate::errors::{MagicError, MagicResult};
use crate::math::{apply_bps, safe_add, safe_sub};
use crate::router::RewardRouter;
use crate::staker::{pro_rata_shares, AccountStakeData, StakingLedger};
use crate::strategy::{RewardDisposition, VaultKind};
use crate::types::{Address, EpochClock, Hop, ProposalAction};
use crate::voter::{VoteAggregator, VoteOutcome, VoteWeights};

/// Converted reward credited to one strategy during a harvest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyCredit {
    pub index: usize,
    pub reward_token: Address,
    /// Reward tokens allotted to the strategy
    pub share: u128,
    /// Desired tokens the strategy received
    pub delta: u128,
}

/// Summary of one harvest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Total stake the shares were computed against
    pub static_supply: u128,
    pub claimed: Vec<(Address, u128)>,
    /// Fees paid to the harvest caller
    pub fees: Vec<(Address, u128)>,
    pub credits: Vec<StrategyCredit>,
    /// Shares left undistributed, retried on the next harvest
    pub carried: Vec<(Address, u128)>,
}

#[derive(Debug, Clone)]
struct ProtocolState {
    config: ProtocolConfig,
    staker: StakingLedger,
    router: RewardRouter,
    voter: VoteAggregator,
    /// Undistributed reward by token, held by the staker
    carried: BTreeMap<Address, u128>,
}

pub struct MagicProtocol<E: Environment> {
    env: E,
    state: ProtocolState,
}

impl<E: Environment> MagicProtocol<E> {
    pub fn new(env: E, config: ProtocolConfig) -> MagicResult<Self> {
        config.validate()?;
        let staker = StakingLedger::new(config.addresses.staker, config.tokens.governance);
        let router = RewardRouter::new(config.addresses.router);
        let voter = VoteAggregator::new(config.addresses.voter, config.voting.quorum_bps);

        info!(
            staker = %config.addresses.staker,
            router = %config.addresses.router,
            voter = %config.addresses.voter,
            "protocol initialized"
        );
        Ok(Self {
            env,
            state: ProtocolState {
                config,
                staker,
                router,
                voter,
                carried: BTreeMap::new(),
            },
        })
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.state.config
    }

    pub fn staker(&self) -> &StakingLedger {
        &self.state.staker
    }

    pub fn router(&self) -> &RewardRouter {
        &self.state.router
    }

    pub fn voter(&self) -> &VoteAggregator {
        &self.state.voter
    }

    /// Reward carried over from earlier harvests
    pub fn carried_rewards(&self, token: Address) -> u128 {
        self.state.carried.get(&token).copied().unwrap_or(0)
    }

    pub fn current_epoch(&self) -> u64 {
        self.state.config.clock().epoch_at(self.env.now())
    }

    pub fn is_cooldown_epoch(&self) -> bool {
        EpochClock::is_cooldown_epoch(self.current_epoch())
    }

    fn atomically<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> MagicResult<T>,
    ) -> MagicResult<T> {
        let checkpoint = self.env.checkpoint();
        let saved = self.state.clone();
        match f(self) {
            Ok(value) => {
                self.env.commit(checkpoint);
                Ok(value)
            }
            Err(err) => {
                self.env.revert(checkpoint);
                self.state = saved;
                warn!(operation, error = %err, "operation reverted");
                Err(err)
            }
        }
    }

    // ========================================================================
    // Strategy and Route Administration
    // ========================================================================

    /// Register a strategy vault. Compounders must compound the governance
    /// token since their rewards are restaked.
    pub fn add_strategy(
        &mut self,
        caller: Address,
        kind: VaultKind,
        vault: Address,
        desired_token: Address,
    ) -> MagicResult<usize> {
        self.atomically("add_strategy", |p| {
            p.state.config.roles.require_operator(caller)?;
            if kind == VaultKind::Compounder && desired_token != p.state.staker.governance_token() {
                return Err(MagicError::invalid_parameter(
                    "desired_token",
                    &desired_token.to_string(),
                    "the governance token for compounders",
                ));
            }
            let index = p.state.staker.add_strategy(kind, vault, desired_token)?;
            info!(index, %vault, ?kind, %desired_token, "strategy added");
            Ok(index)
        })
    }

    pub fn set_strategy_enabled(&mut self, caller: Address, vault: Address, enabled: bool) -> MagicResult<()> {
        self.atomically("set_strategy_enabled", |p| {
            p.state.config.roles.require_operator(caller)?;
            let index = p.state.staker.strategy_index(vault)?;
            p.state.staker.set_strategy_enabled(index, enabled)?;
            info!(index, %vault, enabled, "strategy enablement updated");
            Ok(())
        })
    }

    /// Bind or unbind the harvester of a strategy. Binding requires the
    /// harvester to be this router and a route from every reward token to the
    /// strategy's desired token.
    pub fn set_strategy_harvester(
        &mut self,
        caller: Address,
        vault: Address,
        harvester: Address,
        enabled: bool,
    ) -> MagicResult<()> {
        self.atomically("set_strategy_harvester", |p| {
            p.state.config.roles.require_operator(caller)?;
            let index = p.state.staker.strategy_index(vault)?;

            if !enabled {
                if p.state.staker.strategy(index)?.harvester() == Some(harvester) {
                    p.state.staker.set_strategy_harvester(index, None)?;
                }
                info!(index, %vault, %harvester, "strategy harvester unbound");
                return Ok(());
            }

            if harvester != p.state.router.address() {
                return Err(MagicError::invalid_parameter(
                    "harvester",
                    &harvester.to_string(),
                    "the reward router",
                ));
            }
            let desired = p.state.staker.strategy(index)?.vault.desired_token();
            for reward in &p.state.config.tokens.rewards {
                if *reward != desired && p.state.router.route(*reward, desired).is_none() {
                    return Err(MagicError::UnknownRoute(*reward, desired));
                }
            }
            p.state.staker.set_strategy_harvester(index, Some(harvester))?;
            info!(index, %vault, %harvester, "strategy harvester bound");
            Ok(())
        })
    }

    /// Validate and store a route by swapping `test_amount` pulled from the
    /// operator. Returns the test swap's output, paid to the operator.
    pub fn set_route(
        &mut self,
        caller: Address,
        token_in: Address,
        hops: Vec<Hop>,
        token_out: Address,
        test_amount: u128,
        permanent: bool,
    ) -> MagicResult<u128> {
        self.atomically("set_route", |p| {
            p.state.router.set_route(
                &mut p.env,
                &p.state.config.roles,
                caller,
                token_in,
                hops,
                token_out,
                test_amount,
                permanent,
            )
        })
    }

    pub fn revoke_route(&mut self, caller: Address, token_in: Address, token_out: Address) -> MagicResult<()> {
        self.atomically("revoke_route", |p| {
            p.state
                .router
                .revoke_route(&p.state.config.roles, caller, token_in, token_out)
        })
    }

    pub fn set_reward_caller(&mut self, caller: Address, target: Address, enabled: bool) -> MagicResult<()> {
        self.atomically("set_reward_caller", |p| {
            p.state
                .router
                .set_reward_caller(&p.state.config.roles, caller, target, enabled)
        })
    }

    pub fn approve_strategy(&mut self, caller: Address, vault: Address, approved: bool) -> MagicResult<()> {
        self.atomically("approve_strategy", |p| {
            p.state
                .router
                .approve_strategy(&p.state.config.roles, caller, vault, approved)
        })
    }

    // ========================================================================
    // Governance Administration
    // ========================================================================

    pub fn set_voting_target(&mut self, caller: Address, target: Address) -> MagicResult<()> {
        self.atomically("set_voting_target", |p| {
            p.state
                .voter
                .set_voting_target(&mut p.env, &p.state.config.roles, caller, target)
        })
    }

    /// Point the vote aggregator at the governance contract in the registry
    pub fn refresh_voting_target(&mut self, caller: Address) -> MagicResult<Address> {
        self.atomically("refresh_voting_target", |p| {
            p.state
                .voter
                .refresh_voting_target(&mut p.env, &p.state.config.roles, caller)
        })
    }

    pub fn set_operator(&mut self, caller: Address, operator: Address) -> MagicResult<()> {
        self.atomically("set_operator", |p| {
            p.state.config.roles.set_operator(caller, operator)?;
            info!(%operator, "operator updated");
            Ok(())
        })
    }

    pub fn set_harvest_fee(&mut self, caller: Address, fee_bps: u16) -> MagicResult<()> {
        self.atomically("set_harvest_fee", |p| {
            p.state.config.roles.require_manager(caller)?;
            let harvest = HarvestConfig {
                fee_bps,
                ..p.state.config.harvest
            };
            harvest.validate()?;
            p.state.config.harvest = harvest;
            info!(fee_bps, "harvest fee updated");
            Ok(())
        })
    }

    pub fn set_harvest_restricted(&mut self, caller: Address, restricted: bool) -> MagicResult<()> {
        self.atomically("set_harvest_restricted", |p| {
            p.state.config.roles.require_manager(caller)?;
            p.state.config.harvest.restricted = restricted;
            info!(restricted, "harvest restriction updated");
            Ok(())
        })
    }

    pub fn set_quorum(&mut self, caller: Address, quorum_bps: u16) -> MagicResult<()> {
        self.atomically("set_quorum", |p| {
            p.state
                .voter
                .set_quorum_bps(&p.state.config.roles, caller, quorum_bps)?;
            p.state.config.voting.quorum_bps = quorum_bps;
            Ok(())
        })
    }

    // ========================================================================
    // Staking
    // ========================================================================

    /// Stake `amount` of the governance token, pulled from the caller
    pub fn stake(&mut self, caller: Address, amount: u128) -> MagicResult<()> {
        self.atomically("stake", |p| {
            let epoch = p.current_epoch();
            let staker = p.state.staker.address();
            let token = p.state.staker.governance_token();

            p.state.staker.stake(caller, amount, epoch)?;
            p.env.transfer_from(token, staker, caller, staker, amount)
        })
    }

    /// Replace the caller's weights; returns the unclaimed amount folded in
    pub fn set_weights(&mut self, caller: Address, weights: Vec<u16>) -> MagicResult<u128> {
        self.atomically("set_weights", |p| {
            let epoch = p.current_epoch();
            p.state.staker.set_weights(caller, weights, epoch)
        })
    }

    /// Queue realized stake for withdrawal; returns the release epoch
    pub fn cooldown(&mut self, caller: Address, amount: u128) -> MagicResult<u64> {
        self.atomically("cooldown", |p| {
            let epoch = p.current_epoch();
            let cooldown_epochs = p.state.config.epoch.cooldown_epochs;
            p.state.staker.cooldown(caller, amount, epoch, cooldown_epochs)
        })
    }

    /// Pay out the caller's cooldown queue once released
    pub fn withdraw_cooldown(&mut self, caller: Address) -> MagicResult<u128> {
        self.atomically("withdraw_cooldown", |p| {
            let epoch = p.current_epoch();
            let staker = p.state.staker.address();
            let token = p.state.staker.governance_token();

            let amount = p.state.staker.release_cooldown(caller, epoch)?;
            p.env.transfer(token, staker, caller, amount)?;
            Ok(amount)
        })
    }

    /// Fold `account`'s unclaimed growth into its stake. Anyone may call.
    pub fn checkpoint_account(&mut self, caller: Address, account: Address) -> MagicResult<u128> {
        self.atomically("checkpoint_account", |p| {
            let epoch = p.current_epoch();
            let folded = p.state.staker.checkpoint(account, epoch)?;
            if folded > 0 {
                debug!(%caller, %account, folded, "checkpoint requested");
            }
            Ok(folded)
        })
    }

    pub fn sync_account(&mut self, caller: Address) -> MagicResult<u128> {
        self.checkpoint_account(caller, caller)
    }

    /// Claim the caller's pass-through rewards from `vault`
    pub fn claim(&mut self, caller: Address, vault: Address) -> MagicResult<u128> {
        self.atomically("claim", |p| {
            let index = p.state.staker.strategy_index(vault)?;
            let token = p.state.staker.strategy(index)?.vault.desired_token();
            let amount = p.state.staker.take_claimable(index, caller)?;
            if amount > 0 {
                p.env.transfer(token, vault, caller, amount)?;
            }
            debug!(%caller, %vault, amount, "rewards claimed");
            Ok(amount)
        })
    }

    // ========================================================================
    // Harvest
    // ========================================================================

    /// Claim rewards, pay the caller's fee and convert the rest into each
    /// strategy's desired token, split by the supply snapshot taken before
    /// any external call.
    pub fn harvest(&mut self, caller: Address) -> MagicResult<HarvestReport> {
        self.atomically("harvest", |p| p.run_harvest(caller))
    }

    fn run_harvest(&mut self, caller: Address) -> MagicResult<HarvestReport> {
        if self.state.config.harvest.restricted {
            self.state.config.roles.require_operator(caller)?;
        }

        // Fixed before any external call; compounding below grows the live supply
        let snapshot = self.state.staker.snapshot();
        let staker = self.state.staker.address();
        let fee_bps = self.state.config.harvest.fee_bps;
        let reward_tokens = self.state.config.tokens.rewards.clone();

        let mut report = HarvestReport {
            static_supply: snapshot.static_supply,
            ..Default::default()
        };

        let before: Vec<u128> = reward_tokens
            .iter()
            .map(|token| self.env.balance_of(*token, staker))
            .collect();
        self.env.claim_rewards(staker)?;

        for (token, start) in reward_tokens.into_iter().zip(before) {
            let claimed = safe_sub(self.env.balance_of(token, staker), start)?;
            if claimed > 0 {
                report.claimed.push((token, claimed));
            }

            let fee = apply_bps(claimed, fee_bps)?;
            if fee > 0 {
                self.env.transfer(token, staker, caller, fee)?;
                report.fees.push((token, fee));
            }

            let carried = self.state.carried.remove(&token).unwrap_or(0);
            let distributable = safe_add(claimed - fee, carried)?;
            if distributable == 0 {
                continue;
            }

            let shares = pro_rata_shares(distributable, &snapshot.strategy_supplies, snapshot.static_supply)?;
            let mut undistributed = distributable - shares.iter().sum::<u128>();
            for (index, share) in shares.into_iter().enumerate() {
                if share == 0 {
                    continue;
                }
                match self.credit_strategy(index, token, share)? {
                    Some(credit) => report.credits.push(credit),
                    None => undistributed = safe_add(undistributed, share)?,
                }
            }

            if undistributed > 0 {
                self.state.carried.insert(token, undistributed);
                report.carried.push((token, undistributed));
            }
        }

        info!(
            %caller,
            static_supply = report.static_supply,
            credits = report.credits.len(),
            total_supply = self.state.staker.total_supply(),
            "harvest complete"
        );
        Ok(report)
    }

    /// Convert `share` of `token` for strategy `index` and notify its vault.
    ///
    /// Returns `None` when the share must be carried: the strategy has no
    /// harvester bound, or its conversion failed or produced nothing. A failed
    /// conversion is rolled back on its own without failing the harvest.
    fn credit_strategy(&mut self, index: usize, token: Address, share: u128) -> MagicResult<Option<StrategyCredit>> {
        let staker = self.state.staker.address();
        let router = self.state.router.address();
        let strategy = self.state.staker.strategy(index)?;
        let vault = strategy.vault.address();
        let desired = strategy.vault.desired_token();

        if strategy.harvester() != Some(router) {
            debug!(index, %vault, share, "no harvester bound, share carried");
            return Ok(None);
        }

        let checkpoint = self.env.checkpoint();
        let converted = match self.env.approve(token, staker, router, share) {
            Ok(()) => self
                .state
                .router
                .process(&mut self.env, staker, token, share, vault, desired),
            Err(err) => Err(err),
        };
        let delta = match converted {
            Ok(delta) if delta > 0 => {
                self.env.commit(checkpoint);
                delta
            }
            Ok(_) => {
                self.env.revert(checkpoint);
                debug!(index, %vault, share, "conversion produced nothing, share carried");
                return Ok(None);
            }
            Err(err @ (MagicError::RouteExecutionFailed(_) | MagicError::UnknownRoute(..))) => {
                self.env.revert(checkpoint);
                warn!(index, %vault, %token, share, error = %err, "conversion failed, share carried");
                return Ok(None);
            }
            Err(err) => {
                self.env.revert(checkpoint);
                return Err(err);
            }
        };

        if let RewardDisposition::Compounded(amount) = self.state.staker.notify_strategy(index, router, delta)? {
            // compounded principal is held by the staker like any other stake
            self.env.transfer(desired, vault, staker, amount)?;
        }

        Ok(Some(StrategyCredit {
            index,
            reward_token: token,
            share,
            delta,
        }))
    }

    // ========================================================================
    // Voting
    // ========================================================================

    pub fn vote(&mut self, caller: Address, proposal_id: u64, pct_yes: u16, pct_no: u16) -> MagicResult<VoteOutcome> {
        self.atomically("vote", |p| {
            let epoch = p.current_epoch();
            let power = p.state.staker.voting_power(caller, epoch);
            let total_supply = p.state.staker.total_supply();
            let staker = p.state.staker.address();
            p.state.voter.vote(
                &mut p.env,
                staker,
                caller,
                power,
                total_supply,
                proposal_id,
                pct_yes,
                pct_no,
            )
        })
    }

    /// Cast the local aggregate externally. Anyone may call once quorum holds.
    pub fn commit_vote(&mut self, caller: Address, proposal_id: u64) -> MagicResult<(u16, u16)> {
        self.atomically("commit_vote", |p| {
            let total_supply = p.state.staker.total_supply();
            let staker = p.state.staker.address();
            debug!(%caller, proposal_id, "manual vote commit");
            p.state
                .voter
                .commit_vote(&mut p.env, staker, proposal_id, total_supply)
        })
    }

    /// Create an external proposal in the staker's name. The caller's voting
    /// power must meet the governance contract's minimum.
    pub fn create_proposal(
        &mut self,
        caller: Address,
        actions: Vec<ProposalAction>,
        description: &str,
    ) -> MagicResult<u64> {
        self.atomically("create_proposal", |p| {
            let epoch = p.current_epoch();
            let power = p.state.staker.voting_power(caller, epoch);
            let staker = p.state.staker.address();
            let target = p
                .state
                .voter
                .target()
                .ok_or(MagicError::InvalidVotingTarget("no voting target set"))?;

            let governance = p
                .env
                .governance(target)
                .ok_or(MagicError::InvalidVotingTarget("capability check not answered"))?;
            let required = governance.min_create_proposal_weight()?;
            if power == 0 || power < required {
                return Err(MagicError::InsufficientVotingPower { power, required });
            }
            let proposal_id = governance.create_proposal(staker, &actions, description)?;

            info!(%caller, proposal_id, "proposal created");
            Ok(proposal_id)
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn total_supply(&self) -> u128 {
        self.state.staker.total_supply()
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        self.state.staker.balance_of(account)
    }

    /// Harvest growth not yet folded into the account's stake
    pub fn unclaimed(&self, account: Address) -> u128 {
        self.state.staker.unclaimed(account)
    }

    pub fn voting_power(&self, account: Address) -> u128 {
        self.state.staker.voting_power(account, self.current_epoch())
    }

    pub fn account_strategy_weight(&self, account: Address, index: usize) -> MagicResult<u16> {
        self.state.staker.account_strategy_weight(account, index)
    }

    pub fn account_stake_data(&self, account: Address) -> AccountStakeData {
        self.state.staker.account_stake_data(account, self.current_epoch())
    }

    /// Pass-through rewards the account can claim from `vault`
    pub fn claimable(&self, account: Address, vault: Address) -> MagicResult<u128> {
        let index = self.state.staker.strategy_index(vault)?;
        self.state.staker.strategy(index)?.vault.claimable(account)
    }

    pub fn strategy_supply(&self, vault: Address) -> MagicResult<u128> {
        let index = self.state.staker.strategy_index(vault)?;
        Ok(self.state.staker.strategy(index)?.total_supply())
    }

    pub fn vote_totals(&self, proposal_id: u64) -> VoteWeights {
        self.state.voter.vote_totals(proposal_id)
    }
}
