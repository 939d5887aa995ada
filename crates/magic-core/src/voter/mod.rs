//! # Vote Aggregator
//!
//! Tallies stakers' local yes/no weight per proposal and forwards the
//! aggregate split to the external governance contract, in the staker's
//! name, once local quorum is reached.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::access::Roles;
use crate::config::VotingConfig;
use crate::constants::{BPS_DENOMINATOR, MAX_PCT, VOTER_REGISTRY_KEY};
use crate::env::GovernanceHost;
use crate::errors::{MagicError, MagicResult};
use crate::math::{mul_div, safe_add, safe_sub};
use crate::types::Address;

/// Yes/no weight of one account or one proposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteWeights {
    pub weight_yes: u128,
    pub weight_no: u128,
}

impl VoteWeights {
    pub fn total(&self) -> u128 {
        self.weight_yes.saturating_add(self.weight_no)
    }
}

/// Result of a local vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    /// The vote reached quorum and the aggregate was cast externally
    Committed { pct_yes: u16, pct_no: u16 },
}

#[derive(Debug, Clone, Default)]
struct ProposalTally {
    totals: VoteWeights,
    committed: bool,
}

#[derive(Debug, Clone)]
pub struct VoteAggregator {
    address: Address,
    quorum_bps: u16,
    target: Option<Address>,
    votes: HashMap<(u64, Address), VoteWeights>,
    tallies: HashMap<u64, ProposalTally>,
}

/// Reject zero addresses, addresses without code, and contracts that do not
/// answer the governance capability check
pub fn validate_voting_target<H>(host: &mut H, target: Address) -> MagicResult<()>
where
    H: GovernanceHost + ?Sized,
{
    if target.is_zero() {
        return Err(MagicError::InvalidVotingTarget("zero address"));
    }
    if !host.has_code(target) {
        return Err(MagicError::InvalidVotingTarget("no contract code"));
    }
    let governance = host
        .governance(target)
        .ok_or(MagicError::InvalidVotingTarget("capability check not answered"))?;
    governance
        .min_create_proposal_weight()
        .map_err(|_| MagicError::InvalidVotingTarget("capability check not answered"))?;
    Ok(())
}

impl VoteAggregator {
    pub fn new(address: Address, quorum_bps: u16) -> Self {
        Self {
            address,
            quorum_bps,
            target: None,
            votes: HashMap::new(),
            tallies: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn quorum_bps(&self) -> u16 {
        self.quorum_bps
    }

    /// External governance contract votes are cast on
    pub fn target(&self) -> Option<Address> {
        self.target
    }

    /// Weight needed for quorum given the current total stake
    pub fn quorum_weight(&self, total_supply: u128) -> MagicResult<u128> {
        mul_div(total_supply, u128::from(self.quorum_bps), BPS_DENOMINATOR)
    }

    pub fn vote_totals(&self, proposal_id: u64) -> VoteWeights {
        self.tallies
            .get(&proposal_id)
            .map(|t| t.totals)
            .unwrap_or_default()
    }

    pub fn account_vote(&self, proposal_id: u64, account: Address) -> VoteWeights {
        self.votes
            .get(&(proposal_id, account))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_committed(&self, proposal_id: u64) -> bool {
        self.tallies
            .get(&proposal_id)
            .is_some_and(|t| t.committed)
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub fn set_quorum_bps(&mut self, roles: &Roles, caller: Address, quorum_bps: u16) -> MagicResult<()> {
        roles.require_manager(caller)?;
        VotingConfig { quorum_bps }.validate()?;
        self.quorum_bps = quorum_bps;
        info!(quorum_bps, "quorum updated");
        Ok(())
    }

    pub fn set_voting_target<H>(
        &mut self,
        host: &mut H,
        roles: &Roles,
        caller: Address,
        target: Address,
    ) -> MagicResult<()>
    where
        H: GovernanceHost + ?Sized,
    {
        roles.require_operator(caller)?;
        validate_voting_target(host, target)?;
        self.target = Some(target);
        info!(%target, "voting target set");
        Ok(())
    }

    /// Point at the governance contract currently published in the registry
    pub fn refresh_voting_target<H>(&mut self, host: &mut H, roles: &Roles, caller: Address) -> MagicResult<Address>
    where
        H: GovernanceHost + ?Sized,
    {
        let target = host
            .registry_lookup(VOTER_REGISTRY_KEY)
            .ok_or(MagicError::InvalidVotingTarget("not published in registry"))?;
        self.set_voting_target(host, roles, caller, target)?;
        Ok(target)
    }

    // ========================================================================
    // Voting
    // ========================================================================

    /// Record `voter`'s split of `power` on a proposal, replacing any earlier
    /// vote, and cast the aggregate externally if this vote reaches quorum.
    ///
    /// With no voting target set the vote is only tallied; the aggregate is
    /// cast by a later vote or `commit_vote` once a target exists.
    #[allow(clippy::too_many_arguments)]
    pub fn vote<H>(
        &mut self,
        host: &mut H,
        staker: Address,
        voter: Address,
        power: u128,
        total_supply: u128,
        proposal_id: u64,
        pct_yes: u16,
        pct_no: u16,
    ) -> MagicResult<VoteOutcome>
    where
        H: GovernanceHost + ?Sized,
    {
        if power == 0 {
            return Err(MagicError::NoVotingPower);
        }
        if u32::from(pct_yes) + u32::from(pct_no) != u32::from(MAX_PCT) {
            return Err(MagicError::InvalidVote(MAX_PCT));
        }

        let weight_yes = mul_div(power, u128::from(pct_yes), u128::from(MAX_PCT))?;
        let weights = VoteWeights {
            weight_yes,
            weight_no: power - weight_yes,
        };
        let previous = self
            .votes
            .insert((proposal_id, voter), weights)
            .unwrap_or_default();

        let tally = self.tallies.entry(proposal_id).or_default();
        tally.totals.weight_yes = safe_add(safe_sub(tally.totals.weight_yes, previous.weight_yes)?, weights.weight_yes)?;
        tally.totals.weight_no = safe_add(safe_sub(tally.totals.weight_no, previous.weight_no)?, weights.weight_no)?;
        let totals = tally.totals;
        let committed = tally.committed;

        debug!(%voter, proposal_id, weight_yes = weights.weight_yes, weight_no = weights.weight_no, "vote recorded");

        if committed || totals.total() < self.quorum_weight(total_supply)? {
            return Ok(VoteOutcome::Recorded);
        }
        if self.target.is_none() {
            debug!(proposal_id, "quorum reached without a voting target, commit deferred");
            return Ok(VoteOutcome::Recorded);
        }
        let (pct_yes, pct_no) = self.submit(host, staker, proposal_id)?;
        Ok(VoteOutcome::Committed { pct_yes, pct_no })
    }

    /// Cast the current aggregate externally; requires quorum
    pub fn commit_vote<H>(
        &mut self,
        host: &mut H,
        staker: Address,
        proposal_id: u64,
        total_supply: u128,
    ) -> MagicResult<(u16, u16)>
    where
        H: GovernanceHost + ?Sized,
    {
        let weight = self.vote_totals(proposal_id).total();
        let required = self.quorum_weight(total_supply)?;
        if weight == 0 || weight < required {
            return Err(MagicError::QuorumNotReached { weight, required });
        }
        self.submit(host, staker, proposal_id)
    }

    fn submit<H>(&mut self, host: &mut H, staker: Address, proposal_id: u64) -> MagicResult<(u16, u16)>
    where
        H: GovernanceHost + ?Sized,
    {
        let target = self
            .target
            .ok_or(MagicError::InvalidVotingTarget("no voting target set"))?;
        let totals = self.vote_totals(proposal_id);
        let pct_yes = u16::try_from(mul_div(totals.weight_yes, u128::from(MAX_PCT), totals.total())?)
            .map_err(|_| MagicError::MathOverflow)?;
        let pct_no = MAX_PCT - pct_yes;

        let governance = host
            .governance(target)
            .ok_or(MagicError::InvalidVotingTarget("capability check not answered"))?;
        governance.vote_for_proposal(staker, proposal_id, pct_yes, pct_no)?;

        self.tallies.entry(proposal_id).or_default().committed = true;
        info!(proposal_id, pct_yes, pct_no, %target, "vote committed");
        Ok((pct_yes, pct_no))
    }
}
