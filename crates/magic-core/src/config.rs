//! # Protocol Configuration
//!
//! Deployment parameters loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::access::Roles;
use crate::constants::{
    DEFAULT_COOLDOWN_EPOCHS, DEFAULT_HARVEST_FEE_BPS, DEFAULT_QUORUM_BPS, EPOCH_LENGTH,
    MAX_HARVEST_FEE_BPS, TOTAL_WEIGHT,
};
use crate::errors::{MagicError, MagicResult};
use crate::types::{Address, EpochClock};

/// Protocol configuration loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Administrative role holders
    pub roles: Roles,

    /// Addresses of this deployment's own components
    pub addresses: ComponentAddresses,

    /// Staked and reward tokens
    pub tokens: TokenConfig,

    /// Epoch timing
    pub epoch: EpochConfig,

    /// Harvest policy
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Local vote aggregation
    #[serde(default)]
    pub voting: VotingConfig,
}

/// Component addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComponentAddresses {
    pub staker: Address,
    pub router: Address,
    pub voter: Address,
}

/// Token configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Token users stake
    pub governance: Address,
    /// Tokens paid out by the reward source, claimed on every harvest
    pub rewards: Vec<Address>,
}

/// Epoch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EpochConfig {
    /// Unix time at which epoch 0 begins
    pub start_time: u64,
    /// Epoch length in seconds
    #[serde(default = "default_epoch_length")]
    pub length: u64,
    /// Epochs between a cooldown and its release
    #[serde(default = "default_cooldown_epochs")]
    pub cooldown_epochs: u64,
}

/// Harvest configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HarvestConfig {
    /// Share of each claimed reward paid to the harvest caller (basis points)
    pub fee_bps: u16,
    /// Only the operator may harvest when set
    pub restricted: bool,
}

/// Voting configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VotingConfig {
    /// Local quorum as a share of total stake (basis points)
    pub quorum_bps: u16,
}

fn default_epoch_length() -> u64 {
    EPOCH_LENGTH
}

fn default_cooldown_epochs() -> u64 {
    DEFAULT_COOLDOWN_EPOCHS
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_HARVEST_FEE_BPS,
            restricted: false,
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            quorum_bps: DEFAULT_QUORUM_BPS,
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> MagicResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MagicError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> MagicResult<Self> {
        let config: ProtocolConfig = toml::from_str(content)
            .map_err(|e| MagicError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> MagicResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MagicError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> MagicResult<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        fs::write(path, content).map_err(|e| {
            MagicError::config(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MagicResult<()> {
        if self.roles.operator.is_zero() {
            return Err(MagicError::invalid_parameter("roles.operator", "zero address", "nonzero address"));
        }
        if self.roles.manager.is_zero() {
            return Err(MagicError::invalid_parameter("roles.manager", "zero address", "nonzero address"));
        }

        let ComponentAddresses { staker, router, voter } = self.addresses;
        if staker.is_zero() || router.is_zero() || voter.is_zero() {
            return Err(MagicError::invalid_parameter("addresses", "zero address", "nonzero component addresses"));
        }
        if staker == router || staker == voter || router == voter {
            return Err(MagicError::invalid_parameter("addresses", "duplicate address", "distinct component addresses"));
        }

        if self.tokens.governance.is_zero() {
            return Err(MagicError::invalid_parameter("tokens.governance", "zero address", "nonzero address"));
        }
        if self.tokens.rewards.is_empty() {
            return Err(MagicError::invalid_parameter("tokens.rewards", "empty", "at least one reward token"));
        }
        for (i, reward) in self.tokens.rewards.iter().enumerate() {
            if reward.is_zero() || self.tokens.rewards[..i].contains(reward) {
                return Err(MagicError::invalid_parameter(
                    "tokens.rewards",
                    &reward.to_string(),
                    "distinct nonzero reward tokens",
                ));
            }
        }

        self.epoch.validate()?;
        self.harvest.validate()?;
        self.voting.validate()?;

        Ok(())
    }

    /// Epoch clock described by this configuration
    pub fn clock(&self) -> EpochClock {
        EpochClock::new(self.epoch.start_time, self.epoch.length)
    }

    /// Example configuration for a fresh deployment
    pub fn example() -> Self {
        Self {
            roles: Roles::new(Address::from_low_u64(0xA1), Address::from_low_u64(0xA2)),
            addresses: ComponentAddresses {
                staker: Address::from_low_u64(0x51),
                router: Address::from_low_u64(0x52),
                voter: Address::from_low_u64(0x53),
            },
            tokens: TokenConfig {
                governance: Address::from_low_u64(0x60),
                rewards: vec![Address::from_low_u64(0x61)],
            },
            epoch: EpochConfig {
                start_time: 1_700_000_000,
                length: EPOCH_LENGTH,
                cooldown_epochs: DEFAULT_COOLDOWN_EPOCHS,
            },
            harvest: HarvestConfig::default(),
            voting: VotingConfig::default(),
        }
    }
}

impl EpochConfig {
    fn validate(&self) -> MagicResult<()> {
        if self.length == 0 {
            return Err(MagicError::invalid_parameter("epoch.length", "0", "greater than 0"));
        }
        Ok(())
    }
}

impl HarvestConfig {
    pub(crate) fn validate(&self) -> MagicResult<()> {
        if self.fee_bps > MAX_HARVEST_FEE_BPS {
            return Err(MagicError::invalid_parameter(
                "harvest.fee_bps",
                &self.fee_bps.to_string(),
                &format!("at most {}", MAX_HARVEST_FEE_BPS),
            ));
        }
        Ok(())
    }
}

impl VotingConfig {
    pub(crate) fn validate(&self) -> MagicResult<()> {
        if self.quorum_bps == 0 || self.quorum_bps > TOTAL_WEIGHT {
            return Err(MagicError::invalid_parameter(
                "voting.quorum_bps",
                &self.quorum_bps.to_string(),
                "between 1 and 10000",
            ));
        }
        Ok(())
    }
}
