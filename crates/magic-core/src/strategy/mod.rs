//! # Strategy Vaults
//!
//! Balance-of-record vaults holding each account's share of staked principal.
//! Deposits and withdrawals come only from the staking ledger; reward
//! notifications only from the vault's bound harvester.

pub mod compounder;
pub mod pass_through;

pub use compounder::Compounder;
pub use pass_through::PassThrough;

use serde::{Deserialize, Serialize};

use crate::errors::{MagicError, MagicResult};
use crate::types::Address;

/// Vault variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
    Compounder,
    PassThrough,
}

/// Accounting book of a vault
#[derive(Debug, Clone)]
pub enum VaultBook {
    Compounder(Compounder),
    PassThrough(PassThrough),
}

/// What a vault did with a notified reward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardDisposition {
    /// Reward became underlying principal; its tokens belong with the staker
    Compounded(u128),
    /// Reward is claimable by principal holders and stays in the vault
    Distributed(u128),
}

/// A strategy vault bound to one staking ledger
#[derive(Debug, Clone)]
pub struct StrategyVault {
    address: Address,
    desired_token: Address,
    staker: Address,
    harvester: Option<Address>,
    book: VaultBook,
}

impl StrategyVault {
    pub fn new(kind: VaultKind, address: Address, desired_token: Address, staker: Address) -> Self {
        let book = match kind {
            VaultKind::Compounder => VaultBook::Compounder(Compounder::new()),
            VaultKind::PassThrough => VaultBook::PassThrough(PassThrough::new()),
        };
        Self {
            address,
            desired_token,
            staker,
            harvester: None,
            book,
        }
    }

    pub fn kind(&self) -> VaultKind {
        match self.book {
            VaultBook::Compounder(_) => VaultKind::Compounder,
            VaultBook::PassThrough(_) => VaultKind::PassThrough,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Token harvested rewards are converted into for this vault
    pub fn desired_token(&self) -> Address {
        self.desired_token
    }

    pub fn harvester(&self) -> Option<Address> {
        self.harvester
    }

    pub fn book(&self) -> &VaultBook {
        &self.book
    }

    pub(crate) fn set_harvester(&mut self, harvester: Option<Address>) {
        self.harvester = harvester;
    }

    fn require_staker(&self, caller: Address) -> MagicResult<()> {
        if caller != self.staker {
            return Err(MagicError::Unauthorized);
        }
        Ok(())
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        match &self.book {
            VaultBook::Compounder(book) => book.balance_of(account),
            VaultBook::PassThrough(book) => book.balance_of(account),
        }
    }

    pub fn total_supply(&self) -> u128 {
        match &self.book {
            VaultBook::Compounder(book) => book.total_supply(),
            VaultBook::PassThrough(book) => book.total_supply(),
        }
    }

    pub fn deposit(&mut self, caller: Address, account: Address, amount: u128) -> MagicResult<()> {
        self.require_staker(caller)?;
        match &mut self.book {
            VaultBook::Compounder(book) => book.deposit(account, amount),
            VaultBook::PassThrough(book) => book.deposit(account, amount),
        }
    }

    pub fn withdraw(&mut self, caller: Address, account: Address, amount: u128) -> MagicResult<()> {
        self.require_staker(caller)?;
        match &mut self.book {
            VaultBook::Compounder(book) => book.withdraw(account, amount),
            VaultBook::PassThrough(book) => book.withdraw(account, amount),
        }
    }

    /// Move the account's balance to `desired`
    pub fn set_user_balance(&mut self, caller: Address, account: Address, desired: u128) -> MagicResult<()> {
        self.require_staker(caller)?;
        match &mut self.book {
            VaultBook::Compounder(book) => book.set_user_balance(account, desired),
            VaultBook::PassThrough(book) => {
                let current = book.balance_of(account);
                if desired > current {
                    book.deposit(account, desired - current)
                } else {
                    book.withdraw(account, current - desired)
                }
            }
        }
    }

    /// Credit a harvested reward. A zero amount is a fault.
    pub fn notify_reward(&mut self, caller: Address, amount: u128) -> MagicResult<RewardDisposition> {
        if self.harvester != Some(caller) {
            return Err(MagicError::Unauthorized);
        }
        if amount == 0 {
            return Err(MagicError::InvalidAmount);
        }
        match &mut self.book {
            VaultBook::Compounder(book) => {
                book.notify_reward(amount)?;
                Ok(RewardDisposition::Compounded(amount))
            }
            VaultBook::PassThrough(book) => {
                book.notify_reward(amount)?;
                Ok(RewardDisposition::Distributed(amount))
            }
        }
    }

    /// Claimable side rewards; always zero for compounders
    pub fn claimable(&self, account: Address) -> MagicResult<u128> {
        match &self.book {
            VaultBook::Compounder(_) => Ok(0),
            VaultBook::PassThrough(book) => book.claimable(account),
        }
    }

    pub(crate) fn take_claimable(&mut self, account: Address) -> MagicResult<u128> {
        match &mut self.book {
            VaultBook::Compounder(_) => Ok(0),
            VaultBook::PassThrough(book) => book.take_claimable(account),
        }
    }
}
