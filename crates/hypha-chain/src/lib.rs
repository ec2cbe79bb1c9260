//! Hypha governance chain layer
//!
//! Reads DAO space and proposal state from EVM contracts, decodes the
//! positional return tuples into typed records and derives the governance
//! views built on top of them.
//!
//! # Features
//!
//! - Single reads and Multicall3 batches with strict or per-element failure
//! - Typed error classification (rate limited, reverted, network)
//! - Tuple decoders with arity checks for every governance read
//! - Proposal metrics and status, space summaries and join-access checks
//! - Subscription status from payment expiry
//! - Strict and lenient event-log decoding, live proposal event subscriptions
//!
//! # Example
//!
//! ```no_run
//! use hypha_chain::{AlloyChainReader, ChainConfig, GovernanceCalls, SpaceAggregator};
//! use alloy::primitives::U256;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChainConfig::from_file("chain.toml")?;
//! let reader = Arc::new(AlloyChainReader::new(&config)?);
//! let spaces = SpaceAggregator::new(reader, GovernanceCalls::new(config.deployment()?));
//! let summary = spaces.summary(U256::from(42)).await?;
//! println!("{} members, {} proposals", summary.members_count, summary.proposals_count);
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod aggregator;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod networks;
pub mod poller;
pub mod reader;
pub mod subscription;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use abi::GovernanceCalls;
pub use aggregator::{
    derive_metrics, derive_status, AccessDecision, DerivedProposalMetrics, OnChainId,
    ProposalAggregator, ProposalStatus, SpaceAggregator, SpaceSummary, SpaceTokens,
    TokenAggregator, TokenSupply,
};
pub use config::{ChainConfig, ContractAddresses, Deployment};
pub use error::{ChainError, ChainErrorKind, Result};
pub use events::{GovernanceEvent, GovernanceEventKind, RawLog};
pub use poller::{Poller, DEFAULT_POLL_INTERVAL};
pub use reader::{AlloyChainReader, CallOutcome, ChainReader, ContractCall};
pub use subscription::{SubscriptionState, SubscriptionStatus};
pub use watcher::{
    AlloyLogSource, EventSubscription, ListenerRegistry, LogFilter, LogSource,
    ProposalEventWatcher,
};
