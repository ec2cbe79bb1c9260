//! Configuration types for governance contract access

use crate::error::ChainError;
use crate::networks::{EvmNetwork, MULTICALL3_ADDRESS, PRODUCTION_CHAIN_ID};
use crate::poller::DEFAULT_POLL_INTERVAL;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Deployed governance contract addresses for one chain, as configured
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractAddresses {
    /// DAOSpaceFactory (space details, members, invites, payments view)
    pub space_factory: String,
    /// DAOProposals (proposal core, voters, per-space proposal ids)
    pub proposals: String,
    /// SpacePaymentTracker (expiry time, free trial flag)
    pub payment_tracker: String,
    /// TokenBalanceJoin (token requirement for token-gated spaces)
    pub token_balance_join: String,
    /// VotingPowerDelegation (delegates per space)
    pub voting_power_delegation: String,
    /// RegularTokenFactory
    pub regular_token_factory: String,
    /// OwnershipTokenFactory
    pub ownership_token_factory: String,
    /// DecayingTokenFactory
    pub decaying_token_factory: String,
}

/// Parsed contract addresses for the active chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub chain_id: u64,
    pub multicall: Address,
    pub space_factory: Address,
    pub proposals: Address,
    pub payment_tracker: Address,
    pub token_balance_join: Address,
    pub voting_power_delegation: Address,
    pub regular_token_factory: Address,
    pub ownership_token_factory: Address,
    pub decaying_token_factory: Address,
}

/// Configuration for reading the governance contracts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP JSON-RPC URL of the EVM node
    /// Example: "https://mainnet.base.org"
    pub rpc_url: String,

    /// Chain ID (8453=Base, 84532=Base Sepolia, 31337=local)
    pub chain_id: u64,

    /// Multicall3 address used for batched reads
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,

    /// Refresh interval for polling consumers (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How often the log watcher polls for new logs (milliseconds)
    #[serde(default = "default_log_poll_interval_ms")]
    pub log_poll_interval_ms: u64,

    /// Contract addresses keyed by chain id
    #[serde(default)]
    pub deployments: HashMap<String, ContractAddresses>,
}

fn default_multicall_address() -> String {
    MULTICALL3_ADDRESS.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_log_poll_interval_ms() -> u64 {
    2_000
}

impl Default for ChainConfig {
    fn default() -> Self {
        let rpc_url = EvmNetwork::by_chain_id(PRODUCTION_CHAIN_ID)
            .and_then(EvmNetwork::default_rpc)
            .unwrap_or("http://localhost:8545")
            .to_string();
        Self {
            rpc_url,
            chain_id: PRODUCTION_CHAIN_ID,
            multicall_address: default_multicall_address(),
            poll_interval_secs: default_poll_interval_secs(),
            log_poll_interval_ms: default_log_poll_interval_ms(),
            deployments: HashMap::new(),
        }
    }
}

impl ChainConfig {
    /// Load configuration from TOML file
    ///
    /// ```no_run
    /// use hypha_chain::ChainConfig;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ChainConfig::from_file("chain.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml_str(toml: &str) -> Result<Self, anyhow::Error> {
        let config: Self = toml::from_str(toml)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
        Ok(config)
    }

    /// Refresh interval for [`Poller`](crate::Poller)s built from this config
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate configuration
    ///
    /// Returns `Ok(())` if valid, otherwise returns error message
    pub fn validate(&self) -> Result<(), String> {
        if self.rpc_url.is_empty() {
            return Err("rpc_url cannot be empty".to_string());
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err("rpc_url must start with http:// or https://".to_string());
        }

        validate_address("multicall_address", &self.multicall_address)?;

        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be > 0".to_string());
        }

        if self.log_poll_interval_ms < 100 {
            return Err("log_poll_interval_ms must be >= 100".to_string());
        }

        let Some(addresses) = self.deployments.get(&self.chain_id.to_string()) else {
            return Err(format!(
                "no deployment configured for chain_id {}",
                self.chain_id
            ));
        };

        for (field, value) in [
            ("space_factory", &addresses.space_factory),
            ("proposals", &addresses.proposals),
            ("payment_tracker", &addresses.payment_tracker),
            ("token_balance_join", &addresses.token_balance_join),
            ("voting_power_delegation", &addresses.voting_power_delegation),
            ("regular_token_factory", &addresses.regular_token_factory),
            ("ownership_token_factory", &addresses.ownership_token_factory),
            ("decaying_token_factory", &addresses.decaying_token_factory),
        ] {
            validate_address(field, value)?;
        }

        Ok(())
    }

    /// Network metadata for the configured chain, if it is a known one
    pub fn network(&self) -> Option<&'static EvmNetwork> {
        EvmNetwork::by_chain_id(self.chain_id)
    }

    /// Resolve the contract addresses for the configured chain id
    pub fn deployment(&self) -> crate::error::Result<Deployment> {
        let addresses = self
            .deployments
            .get(&self.chain_id.to_string())
            .ok_or_else(|| {
                ChainError::Configuration(format!(
                    "no deployment configured for chain_id {}",
                    self.chain_id
                ))
            })?;

        Ok(Deployment {
            chain_id: self.chain_id,
            multicall: parse_address(&self.multicall_address)?,
            space_factory: parse_address(&addresses.space_factory)?,
            proposals: parse_address(&addresses.proposals)?,
            payment_tracker: parse_address(&addresses.payment_tracker)?,
            token_balance_join: parse_address(&addresses.token_balance_join)?,
            voting_power_delegation: parse_address(&addresses.voting_power_delegation)?,
            regular_token_factory: parse_address(&addresses.regular_token_factory)?,
            ownership_token_factory: parse_address(&addresses.ownership_token_factory)?,
            decaying_token_factory: parse_address(&addresses.decaying_token_factory)?,
        })
    }
}

fn validate_address(field: &str, value: &str) -> Result<(), String> {
    if !value.starts_with("0x") {
        return Err(format!("{} must start with 0x", field));
    }
    if value.len() != 42 {
        return Err(format!(
            "{} must be 42 characters (0x + 40 hex), got {}",
            field,
            value.len()
        ));
    }
    if !value[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "{} must contain only hex characters after 0x",
            field
        ));
    }
    Ok(())
}

/// Parse a 0x-prefixed address string
pub fn parse_address(value: &str) -> crate::error::Result<Address> {
    Address::from_str(value).map_err(|e| ChainError::InvalidAddress(format!("{}: {}", value, e)))
}
