//! Proposal aggregation: batch reads, vote metrics and status

use crate::abi::GovernanceCalls;
use crate::conversions::helpers::u256_to_f64;
use crate::conversions::{decode_proposal_core, decode_proposal_voters, ProposalCore, ProposalVoters};
use crate::error::Result;
use crate::reader::ChainReader;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::U256;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Percentages derived from a proposal's vote tallies
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedProposalMetrics {
    /// yes / snapshot
    pub yes_vote_percentage: f64,
    /// no / snapshot
    pub no_vote_percentage: f64,
    /// snapshot / quorum total, capped at 100
    pub quorum_percentage: f64,
    /// yes / (yes + no)
    pub unity_percentage: f64,
    /// (yes + no) / snapshot
    pub participation_percentage: f64,
}

/// Lifecycle state of a proposal at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalStatus {
    Executed,
    Expired,
    Pending,
    Active,
    EndedAwaitingExecution,
}

/// Reads and aggregates proposals from the proposals contract
#[derive(Clone)]
pub struct ProposalAggregator {
    reader: Arc<dyn ChainReader>,
    calls: GovernanceCalls,
}

impl ProposalAggregator {
    pub fn new(reader: Arc<dyn ChainReader>, calls: GovernanceCalls) -> Self {
        Self { reader, calls }
    }

    /// Decode one `getProposalCore` tuple for `proposal_id`
    pub fn decode_one(&self, proposal_id: U256, raw: &[DynSolValue]) -> Result<ProposalCore> {
        decode_proposal_core(proposal_id, raw)
    }

    /// Read and decode a single proposal
    pub async fn fetch_one(&self, proposal_id: U256) -> Result<ProposalCore> {
        let call = self.calls.proposal_core(proposal_id)?;
        let raw = self.reader.read(&call).await?;
        self.decode_one(proposal_id, &raw)
    }

    /// Read many proposals with one independent read each.
    ///
    /// A failed read yields `None` in that slot; the other slots are unaffected.
    pub async fn decode_batch(&self, ids: &[U256]) -> Vec<Option<ProposalCore>> {
        slots(ids, self.read_all(ids).await)
    }

    /// Like [`decode_batch`](Self::decode_batch), except that a non-empty
    /// batch in which every read was rate limited fails with that error.
    pub async fn fetch_batch(&self, ids: &[U256]) -> Result<Vec<Option<ProposalCore>>> {
        let mut results = self.read_all(ids).await;
        let throttled = !results.is_empty()
            && results
                .iter()
                .all(|r| r.as_ref().is_err_and(|e| e.is_rate_limited()));
        if throttled {
            if let Some(Err(e)) = results.pop() {
                return Err(e);
            }
        }
        Ok(slots(ids, results))
    }

    async fn read_all(&self, ids: &[U256]) -> Vec<Result<ProposalCore>> {
        debug!("Fetching {} proposal cores", ids.len());
        join_all(ids.iter().map(|id| self.fetch_one(*id))).await
    }

    /// Yes and no voters of a proposal
    pub async fn fetch_voters(&self, proposal_id: U256) -> Result<ProposalVoters> {
        let call = self.calls.proposal_voters(proposal_id)?;
        let raw = self.reader.read(&call).await?;
        decode_proposal_voters(&raw)
    }
}

fn slots(ids: &[U256], results: Vec<Result<ProposalCore>>) -> Vec<Option<ProposalCore>> {
    ids.iter()
        .zip(results)
        .map(|(id, result)| match result {
            Ok(core) => Some(core),
            Err(e) => {
                warn!("Proposal {} unavailable ({:?}): {}", id, e.kind(), e);
                None
            }
        })
        .collect()
}

const PERCENT_SCALE: u64 = 1_000_000;

/// `numerator / denominator * 100`, or 0 when the denominator is zero.
///
/// Division happens on `U256` with six decimal places kept; the result is
/// narrowed to `f64` last.
pub fn percentage(numerator: U256, denominator: U256) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    match numerator.checked_mul(U256::from(100 * PERCENT_SCALE)) {
        Some(scaled) => u256_to_f64(scaled / denominator) / PERCENT_SCALE as f64,
        None => u256_to_f64(numerator) / u256_to_f64(denominator) * 100.0,
    }
}

/// Derive vote percentages for a proposal.
///
/// `quorum_total` is the voting power the snapshot is measured against; zero
/// yields a zero quorum percentage.
pub fn derive_metrics(core: &ProposalCore, quorum_total: U256) -> DerivedProposalMetrics {
    let snapshot = core.total_voting_power_at_snapshot;
    let cast = core.yes_votes.saturating_add(core.no_votes);
    DerivedProposalMetrics {
        yes_vote_percentage: percentage(core.yes_votes, snapshot),
        no_vote_percentage: percentage(core.no_votes, snapshot),
        quorum_percentage: percentage(snapshot, quorum_total).min(100.0),
        unity_percentage: percentage(core.yes_votes, cast),
        participation_percentage: percentage(cast, snapshot),
    }
}

/// Status of `core` at unix time `now`
pub fn derive_status(core: &ProposalCore, now: u64) -> ProposalStatus {
    if core.executed {
        ProposalStatus::Executed
    } else if core.expired {
        ProposalStatus::Expired
    } else if now < core.start_time {
        ProposalStatus::Pending
    } else if now <= core.end_time {
        ProposalStatus::Active
    } else {
        ProposalStatus::EndedAwaitingExecution
    }
}
