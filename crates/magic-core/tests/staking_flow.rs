//! Staking, weight changes, cooldowns and checkpoints through the protocol

mod common;

use common::*;

#[test]
fn test_stake_pulls_tokens_and_allocates_by_weight() {
    let mut protocol = setup();
    stake_as(&mut protocol, user(1), &[5_000, 5_000], 1_000);

    assert_eq!(protocol.env().balance_of(GOV, STAKER), 1_000);
    assert_eq!(protocol.env().balance_of(GOV, user(1)), 0);
    assert_eq!(protocol.total_supply(), 1_000);
    assert_eq!(protocol.balance_of(user(1)), 1_000);
    assert_eq!(protocol.strategy_supply(COMPOUNDER).unwrap(), 500);
    assert_eq!(protocol.strategy_supply(SAVINGS_VAULT).unwrap(), 500);

    // New stake only counts from the next epoch
    assert_eq!(protocol.voting_power(user(1)), 0);
    advance_epochs(&mut protocol, 1);
    assert_eq!(protocol.voting_power(user(1)), 1_000);
}

#[test]
fn test_stake_guards() {
    let mut protocol = setup();
    fund(&mut protocol, user(1), 1_000);

    assert_eq!(
        protocol.stake(user(1), 1_000),
        Err(MagicError::InvalidWeights("weights not set"))
    );

    protocol.set_weights(user(1), vec![10_000, 0]).unwrap();
    assert_eq!(protocol.stake(user(1), 0), Err(MagicError::InvalidAmount));
    assert_eq!(protocol.env().balance_of(GOV, user(1)), 1_000);
}

#[test]
fn test_failed_stake_leaves_no_trace() {
    let mut protocol = setup();
    protocol.set_weights(user(1), vec![5_000, 5_000]).unwrap();
    protocol.env_mut().mint(GOV, user(1), 1_000);

    // No allowance: the transfer fails after the ledger was updated
    assert_eq!(
        protocol.stake(user(1), 1_000),
        Err(MagicError::InsufficientAllowance)
    );
    assert_eq!(protocol.total_supply(), 0);
    assert_eq!(protocol.balance_of(user(1)), 0);
    assert_eq!(strategy_supply_sum(&protocol), 0);
    assert_eq!(protocol.env().journal_depth(), 0);
}

#[test]
fn test_weights_locked_for_rest_of_epoch() {
    let mut protocol = setup();
    stake_as(&mut protocol, user(1), &[5_000, 5_000], 1_000);

    assert_eq!(
        protocol.set_weights(user(1), vec![10_000, 0]),
        Err(MagicError::EpochLocked(0))
    );

    advance_epochs(&mut protocol, 1);
    protocol.set_weights(user(1), vec![10_000, 0]).unwrap();
    assert_eq!(protocol.strategy_supply(COMPOUNDER).unwrap(), 1_000);
    assert_eq!(protocol.strategy_supply(SAVINGS_VAULT).unwrap(), 0);
    assert_eq!(protocol.account_strategy_weight(user(1), 0).unwrap(), 10_000);
}

#[test]
fn test_invalid_weights_rejected() {
    let mut protocol = setup();

    assert_eq!(
        protocol.set_weights(user(1), vec![5_000, 4_000]),
        Err(MagicError::InvalidWeights("weights must sum to 10000"))
    );
    assert_eq!(
        protocol.set_weights(user(1), vec![10_000]),
        Err(MagicError::InvalidWeights("length must match strategy count"))
    );

    protocol
        .set_strategy_enabled(OPERATOR, SAVINGS_VAULT, false)
        .unwrap();
    assert_eq!(
        protocol.set_weights(user(1), vec![5_000, 5_000]),
        Err(MagicError::InvalidWeights("disabled strategy given weight"))
    );
    protocol.set_weights(user(1), vec![10_000, 0]).unwrap();
}

#[test]
fn test_cooldown_and_withdraw() {
    let mut protocol = setup();
    stake_as(&mut protocol, user(1), &[5_000, 5_000], 1_000);

    assert_eq!(
        protocol.cooldown(user(1), 600),
        Err(MagicError::NotCooldownEpoch(0))
    );

    advance_epochs(&mut protocol, 1);
    assert!(protocol.is_cooldown_epoch());
    assert_eq!(protocol.cooldown(user(1), 600), Ok(3));

    assert_eq!(protocol.balance_of(user(1)), 400);
    assert_eq!(protocol.total_supply(), 400);
    assert_eq!(protocol.staker().total_cooling(), 600);
    assert_eq!(strategy_supply_sum(&protocol), 400);

    assert_eq!(
        protocol.withdraw_cooldown(user(1)),
        Err(MagicError::CooldownActive(3))
    );

    advance_epochs(&mut protocol, 2);
    assert_eq!(protocol.withdraw_cooldown(user(1)), Ok(600));
    assert_eq!(protocol.env().balance_of(GOV, user(1)), 600);
    assert_eq!(protocol.env().balance_of(GOV, STAKER), 400);
    assert_eq!(protocol.staker().total_cooling(), 0);

    assert_eq!(protocol.withdraw_cooldown(user(1)), Err(MagicError::InvalidAmount));
}

/// Two stakers, one harvest that doubles the compounder
fn harvested_protocol() -> TestProtocol {
    let mut protocol = setup();
    stake_as(&mut protocol, user(1), &[5_000, 5_000], 100_000);
    stake_as(&mut protocol, user(2), &[5_000, 5_000], 100_000);
    advance_epochs(&mut protocol, 1);

    accrue(&mut protocol, 200_000);
    protocol.harvest(user(9)).unwrap();
    protocol
}

#[test]
fn test_cooldown_limited_to_realized_stake() {
    let mut protocol = harvested_protocol();
    let principal = 100_000;
    assert_eq!(protocol.unclaimed(user(1)), 50_000);

    assert_eq!(
        protocol.cooldown(user(1), principal + 50_000),
        Err(MagicError::InsufficientRealizedStake {
            requested: principal + 50_000,
            realized: principal,
        })
    );
    assert!(matches!(
        protocol.cooldown(user(1), principal + 1),
        Err(MagicError::InsufficientRealizedStake { .. })
    ));

    assert_eq!(protocol.cooldown(user(1), principal), Ok(3));
    assert_eq!(protocol.balance_of(user(1)), 0);
    // Growth stays in the vault for a later checkpoint
    assert_eq!(protocol.unclaimed(user(1)), 50_000);

    assert_eq!(protocol.total_supply(), 200_000);
    assert_eq!(strategy_supply_sum(&protocol), protocol.total_supply());
    assert_eq!(
        protocol.env().balance_of(GOV, STAKER),
        protocol.total_supply() + protocol.staker().total_cooling()
    );
}

#[test]
fn test_checkpoint_folds_growth_once() {
    let mut protocol = harvested_protocol();

    assert_eq!(protocol.checkpoint_account(user(5), user(2)), Ok(50_000));

    let data = protocol.account_stake_data(user(2));
    assert_eq!(data.stake, 150_000);
    assert_eq!(data.allocations, vec![75_000, 75_000]);
    assert_eq!(data.unclaimed, 0);
    // Folded growth is new stake for this epoch
    assert_eq!(data.realized_stake, 100_000);

    assert_eq!(protocol.sync_account(user(2)), Ok(0));
    assert_eq!(protocol.account_stake_data(user(2)), data);
    assert_eq!(strategy_supply_sum(&protocol), protocol.total_supply());
}

#[test]
fn test_set_weights_folds_before_rebalancing() {
    let mut protocol = harvested_protocol();

    assert_eq!(protocol.set_weights(user(2), vec![1_000, 9_000]), Ok(50_000));

    let data = protocol.account_stake_data(user(2));
    assert_eq!(data.stake, 150_000);
    assert_eq!(data.allocations, vec![15_000, 135_000]);
    assert_eq!(protocol.staker().strategies()[0].vault.balance_of(user(2)), 15_000);
    assert_eq!(protocol.unclaimed(user(2)), 0);
}

#[test]
fn test_anyone_may_checkpoint_unknown_account() {
    let mut protocol = setup();
    assert_eq!(protocol.checkpoint_account(user(1), user(7)), Ok(0));
    assert_eq!(protocol.account_stake_data(user(7)), Default::default());
}
