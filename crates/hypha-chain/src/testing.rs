//! In-memory [`ChainReader`] and [`LogSource`] for tests, plus tuple and log
//! fixtures shaped like the deployed contracts' output
//!
//! Reader responses are keyed by calldata, so the same function called with
//! different arguments can answer differently.

pub use crate::abi::reads::fixtures::deployment;
pub use crate::conversions::proposal::fixtures::{proposal_core_tuple, CoreFields};
pub use crate::conversions::space::fixtures::{addr, addr_array, space_details_tuple, uint};
pub use crate::events::fixtures::{
    encode, executed_log, proposal_created_log, raw, space_created_log, space_creator,
};

use crate::error::{ChainError, Result};
use crate::events::RawLog;
use crate::reader::{settle, CallOutcome, ChainReader, ContractCall};
use crate::watcher::{LogFilter, LogSource};
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Bytes;
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Canned answer for one call
#[derive(Debug, Clone)]
pub enum MockResponse {
    Values(Vec<DynSolValue>),
    Revert(String),
    RateLimited,
    Network(String),
}

impl MockResponse {
    fn outcome(&self, call: &ContractCall) -> CallOutcome {
        match self {
            Self::Values(values) => CallOutcome::Success(values.clone()),
            Self::Revert(reason) => CallOutcome::Failure(ChainError::Reverted {
                call: call.label(),
                reason: reason.clone(),
            }),
            Self::RateLimited => {
                CallOutcome::Failure(ChainError::RateLimited("mock rate limit".to_string()))
            }
            Self::Network(message) => CallOutcome::Failure(ChainError::Network(message.clone())),
        }
    }
}

#[derive(Default)]
pub struct MockChainReader {
    responses: Mutex<HashMap<(alloy::primitives::Address, Bytes), MockResponse>>,
    batch_failure: Mutex<Option<MockResponse>>,
    reads: AtomicUsize,
    multicalls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `call` with `response`
    pub fn on(&self, call: &ContractCall, response: MockResponse) -> &Self {
        let key = key(call).unwrap_or_default();
        self.responses.lock().insert(key, response);
        self
    }

    /// Answer `call` with a successful output tuple
    pub fn returns(&self, call: &ContractCall, values: Vec<DynSolValue>) -> &Self {
        self.on(call, MockResponse::Values(values))
    }

    /// Make every request fail as a whole, before any element is evaluated
    pub fn fail_all(&self, response: MockResponse) {
        *self.batch_failure.lock() = Some(response);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn multicall_count(&self) -> usize {
        self.multicalls.load(Ordering::SeqCst)
    }

    /// Labels of every call seen, in request order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    fn answer(&self, call: &ContractCall) -> CallOutcome {
        self.requested.lock().push(call.label());
        match key(call).ok().and_then(|k| self.responses.lock().get(&k).cloned()) {
            Some(response) => response.outcome(call),
            None => CallOutcome::Failure(ChainError::Reverted {
                call: call.label(),
                reason: "no mock response".to_string(),
            }),
        }
    }

    fn batch_error(&self, calls: &[ContractCall]) -> Option<ChainError> {
        let failure = self.batch_failure.lock().clone()?;
        let probe = calls.first()?;
        match failure.outcome(probe) {
            CallOutcome::Failure(err) => Some(err),
            CallOutcome::Success(_) => None,
        }
    }
}

fn key(call: &ContractCall) -> Result<(alloy::primitives::Address, Bytes)> {
    Ok((call.target, call.calldata()?))
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn read(&self, call: &ContractCall) -> Result<Vec<DynSolValue>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.batch_error(std::slice::from_ref(call)) {
            return Err(err);
        }
        self.answer(call).into_result()
    }

    async fn multicall(
        &self,
        calls: &[ContractCall],
        allow_failure: bool,
    ) -> Result<Vec<CallOutcome>> {
        self.multicalls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.batch_error(calls) {
            return Err(err);
        }
        let outcomes = calls.iter().map(|call| self.answer(call)).collect();
        settle(calls, outcomes, allow_failure)
    }
}

/// [`LogSource`] fed by hand through [`ChannelLogSource::send`]
#[derive(Default)]
pub struct ChannelLogSource {
    channels: Mutex<Vec<(LogFilter, UnboundedSender<RawLog>)>>,
}

impl ChannelLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `log` to every open subscription whose filter matches.
    ///
    /// Returns how many subscriptions received it; closed channels are pruned.
    pub fn send(&self, log: RawLog) -> usize {
        let mut channels = self.channels.lock();
        channels.retain(|(_, tx)| !tx.is_closed());
        channels
            .iter()
            .filter(|(filter, _)| filter.matches(&log))
            .filter(|(_, tx)| tx.unbounded_send(log.clone()).is_ok())
            .count()
    }

    /// Subscriptions whose receiving end is still alive
    pub fn open_channels(&self) -> usize {
        let mut channels = self.channels.lock();
        channels.retain(|(_, tx)| !tx.is_closed());
        channels.len()
    }
}

#[async_trait]
impl LogSource for ChannelLogSource {
    async fn subscribe(&self, filter: &LogFilter) -> Result<BoxStream<'static, RawLog>> {
        let (tx, rx) = unbounded();
        self.channels.lock().push((filter.clone(), tx));
        Ok(rx.boxed())
    }
}
