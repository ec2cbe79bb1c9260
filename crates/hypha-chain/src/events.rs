//! Governance event log decoding
//!
//! Logs arrive either from an indexer webhook or from the log watcher. Each
//! decode takes an explicit `strict` flag: strict decoding rejects the whole
//! batch on the first log that is not the target event, lenient decoding
//! skips such logs.

use crate::abi::events::{ProposalCreated, ProposalExecuted, ProposalRejected, SpaceCreated};
use crate::conversions::helpers::timestamp_to_u64;
use crate::error::{ChainError, Result};
use alloy::primitives::{Address, Bytes, LogData, B256, U256};
use alloy::sol_types::SolEvent;
use serde::{Serialize, Serializer};
use tracing::debug;

/// An undecoded EVM log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLog {
    pub address: Option<Address>,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub transaction_hash: Option<B256>,
    pub block_number: Option<u64>,
}

impl From<alloy::rpc::types::Log> for RawLog {
    fn from(log: alloy::rpc::types::Log) -> Self {
        Self {
            address: Some(log.inner.address),
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
            transaction_hash: log.transaction_hash,
            block_number: log.block_number,
        }
    }
}

/// Which governance event a decoder targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GovernanceEventKind {
    SpaceCreated,
    ProposalCreated,
    ProposalExecuted,
    ProposalRejected,
}

impl GovernanceEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpaceCreated => "SpaceCreated",
            Self::ProposalCreated => "ProposalCreated",
            Self::ProposalExecuted => "ProposalExecuted",
            Self::ProposalRejected => "ProposalRejected",
        }
    }

    /// topic0 of the event
    pub fn signature_hash(&self) -> B256 {
        match self {
            Self::SpaceCreated => SpaceCreated::SIGNATURE_HASH,
            Self::ProposalCreated => ProposalCreated::SIGNATURE_HASH,
            Self::ProposalExecuted => ProposalExecuted::SIGNATURE_HASH,
            Self::ProposalRejected => ProposalRejected::SIGNATURE_HASH,
        }
    }

    /// Decode every log in `logs` as this event
    pub fn decode(&self, logs: &[RawLog], strict: bool) -> Result<Vec<GovernanceEvent>> {
        match self {
            Self::SpaceCreated => convert(decode_logs::<SpaceCreated>(logs, strict)?),
            Self::ProposalCreated => convert(decode_logs::<ProposalCreated>(logs, strict)?),
            Self::ProposalExecuted => convert(decode_logs::<ProposalExecuted>(logs, strict)?),
            Self::ProposalRejected => convert(decode_logs::<ProposalRejected>(logs, strict)?),
        }
    }
}

fn convert<E>(decoded: Vec<(E, Option<B256>)>) -> Result<Vec<GovernanceEvent>>
where
    GovernanceEvent: From<(E, Option<B256>)>,
{
    Ok(decoded.into_iter().map(GovernanceEvent::from).collect())
}

/// Decode logs as event `E`.
///
/// Returns each decoded event with the hash of the transaction that emitted it.
pub fn decode_logs<E: SolEvent>(logs: &[RawLog], strict: bool) -> Result<Vec<(E, Option<B256>)>> {
    let mut events = Vec::with_capacity(logs.len());
    for (index, log) in logs.iter().enumerate() {
        match decode_log::<E>(log) {
            Ok(event) => events.push((event, log.transaction_hash)),
            Err(e) if strict => {
                return Err(ChainError::EventParse(format!(
                    "log {} is not a valid {}: {}",
                    index,
                    E::SIGNATURE,
                    e
                )));
            }
            Err(e) => {
                debug!("Skipping log {} while decoding {}: {}", index, E::SIGNATURE, e);
            }
        }
    }
    Ok(events)
}

fn decode_log<E: SolEvent>(log: &RawLog) -> std::result::Result<E, String> {
    if log.topics.first() != Some(&E::SIGNATURE_HASH) {
        return Err("topic0 does not match".to_string());
    }
    let data = LogData::new(log.topics.clone(), log.data.clone())
        .ok_or_else(|| "too many topics".to_string())?;
    E::decode_log_data(&data).map_err(|e| e.to_string())
}

/// Topic encoding of an indexed `uint256`
pub fn uint_topic(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

fn decimal<S: Serializer>(value: &U256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Normalized governance event handed to dispatchers and streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GovernanceEvent {
    #[serde(rename_all = "camelCase")]
    SpaceCreated {
        #[serde(serialize_with = "decimal")]
        space_id: U256,
        #[serde(serialize_with = "decimal")]
        unity: U256,
        #[serde(serialize_with = "decimal")]
        quorum: U256,
        #[serde(serialize_with = "decimal")]
        join_method: U256,
        creator: Address,
        executor: Address,
        transaction_hash: Option<B256>,
    },
    #[serde(rename_all = "camelCase")]
    ProposalCreated {
        #[serde(serialize_with = "decimal")]
        proposal_id: U256,
        #[serde(serialize_with = "decimal")]
        space_id: U256,
        start_time: u64,
        duration: u64,
        creator: Address,
        transaction_hash: Option<B256>,
    },
    #[serde(rename_all = "camelCase")]
    ProposalExecuted {
        #[serde(serialize_with = "decimal")]
        proposal_id: U256,
        passed: bool,
        #[serde(serialize_with = "decimal")]
        yes_votes: U256,
        #[serde(serialize_with = "decimal")]
        no_votes: U256,
        transaction_hash: Option<B256>,
    },
    #[serde(rename_all = "camelCase")]
    ProposalRejected {
        #[serde(serialize_with = "decimal")]
        proposal_id: U256,
        #[serde(serialize_with = "decimal")]
        yes_votes: U256,
        #[serde(serialize_with = "decimal")]
        no_votes: U256,
        transaction_hash: Option<B256>,
    },
}

impl GovernanceEvent {
    pub fn kind(&self) -> GovernanceEventKind {
        match self {
            Self::SpaceCreated { .. } => GovernanceEventKind::SpaceCreated,
            Self::ProposalCreated { .. } => GovernanceEventKind::ProposalCreated,
            Self::ProposalExecuted { .. } => GovernanceEventKind::ProposalExecuted,
            Self::ProposalRejected { .. } => GovernanceEventKind::ProposalRejected,
        }
    }

    /// Proposal the event refers to, if any
    pub fn proposal_id(&self) -> Option<U256> {
        match self {
            Self::SpaceCreated { .. } => None,
            Self::ProposalCreated { proposal_id, .. }
            | Self::ProposalExecuted { proposal_id, .. }
            | Self::ProposalRejected { proposal_id, .. } => Some(*proposal_id),
        }
    }
}

impl From<(SpaceCreated, Option<B256>)> for GovernanceEvent {
    fn from((e, transaction_hash): (SpaceCreated, Option<B256>)) -> Self {
        Self::SpaceCreated {
            space_id: e.spaceId,
            unity: e.unity,
            quorum: e.quorum,
            join_method: e.joinMethod,
            creator: e.creator,
            executor: e.executor,
            transaction_hash,
        }
    }
}

impl From<(ProposalCreated, Option<B256>)> for GovernanceEvent {
    fn from((e, transaction_hash): (ProposalCreated, Option<B256>)) -> Self {
        Self::ProposalCreated {
            proposal_id: e.proposalId,
            space_id: e.spaceId,
            start_time: timestamp_to_u64(e.startTime),
            duration: timestamp_to_u64(e.duration),
            creator: e.creator,
            transaction_hash,
        }
    }
}

impl From<(ProposalExecuted, Option<B256>)> for GovernanceEvent {
    fn from((e, transaction_hash): (ProposalExecuted, Option<B256>)) -> Self {
        Self::ProposalExecuted {
            proposal_id: e.proposalId,
            passed: e.passed,
            yes_votes: e.yesVotes,
            no_votes: e.noVotes,
            transaction_hash,
        }
    }
}

impl From<(ProposalRejected, Option<B256>)> for GovernanceEvent {
    fn from((e, transaction_hash): (ProposalRejected, Option<B256>)) -> Self {
        Self::ProposalRejected {
            proposal_id: e.proposalId,
            yes_votes: e.yesVotes,
            no_votes: e.noVotes,
            transaction_hash,
        }
    }
}

/// Encoded governance logs for tests
#[cfg(any(test, feature = "testing"))]
pub mod fixtures {
    use super::*;
    use alloy::dyn_abi::DynSolValue;

    pub fn raw(topics: Vec<B256>, data: Bytes) -> RawLog {
        RawLog {
            address: Some(Address::repeat_byte(0x02)),
            topics,
            data,
            transaction_hash: Some(B256::repeat_byte(0x7e)),
            block_number: Some(100),
        }
    }

    pub fn encode<E: SolEvent>(event: &E) -> RawLog {
        let data = event.encode_log_data();
        raw(data.topics().to_vec(), data.data.clone())
    }

    pub fn executed_log(proposal_id: u64, passed: bool) -> RawLog {
        encode(&ProposalExecuted {
            proposalId: U256::from(proposal_id),
            passed,
            yesVotes: U256::from(70),
            noVotes: U256::from(10),
        })
    }

    /// SpaceCreated as the deployed factory emits it: topics are the
    /// signature, `spaceId` and `creator`; the remaining fields are data.
    pub fn space_created_log(space_id: u64, executor: Address) -> RawLog {
        let signature = alloy::primitives::keccak256(
            "SpaceCreated(uint256,uint256,uint256,uint256,uint256,uint256,address,address)",
        );
        let data = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(67), 256),
            DynSolValue::Uint(U256::from(51), 256),
            DynSolValue::Uint(U256::from(1), 256),
            DynSolValue::Uint(U256::from(1), 256),
            DynSolValue::Uint(U256::ZERO, 256),
            DynSolValue::Address(executor),
        ])
        .abi_encode_params();
        raw(
            vec![
                signature,
                uint_topic(U256::from(space_id)),
                space_creator().into_word(),
            ],
            Bytes::from(data),
        )
    }

    pub fn space_creator() -> Address {
        Address::repeat_byte(0xc0)
    }

    pub fn proposal_created_log(proposal_id: u64, space_id: u64) -> RawLog {
        encode(&ProposalCreated {
            proposalId: U256::from(proposal_id),
            spaceId: U256::from(space_id),
            startTime: U256::from(1_700_000_000u64),
            duration: U256::from(86_400u64),
            creator: Address::repeat_byte(0xc1),
            executionData: Bytes::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_strict_decodes_matching_logs() {
        let logs = vec![executed_log(1, true), executed_log(2, false)];
        let events = GovernanceEventKind::ProposalExecuted
            .decode(&logs, true)
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].proposal_id(), Some(U256::from(2)));
        assert_eq!(events[0].kind(), GovernanceEventKind::ProposalExecuted);
    }

    #[test]
    fn test_strict_rejects_foreign_log() {
        let logs = vec![
            proposal_created_log(1, 42),
            space_created_log(42, Address::repeat_byte(0xe0)),
        ];
        let err = GovernanceEventKind::ProposalCreated
            .decode(&logs, true)
            .unwrap_err();
        assert!(matches!(err, ChainError::EventParse(_)));
        assert!(err.to_string().contains("log 1"));
    }

    #[test]
    fn test_lenient_skips_foreign_log() {
        let logs = vec![
            executed_log(9, true),
            space_created_log(42, Address::repeat_byte(0xe0)),
            raw(vec![], Bytes::new()),
        ];
        let events = GovernanceEventKind::SpaceCreated
            .decode(&logs, false)
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            GovernanceEvent::SpaceCreated {
                space_id, executor, ..
            } => {
                assert_eq!(*space_id, U256::from(42));
                assert_eq!(*executor, Address::repeat_byte(0xe0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_space_created_matches_deployed_layout() {
        let log = space_created_log(42, Address::repeat_byte(0xe0));
        assert_eq!(log.topics.len(), 3);
        assert_eq!(log.topics[0], SpaceCreated::SIGNATURE_HASH);

        let events = GovernanceEventKind::SpaceCreated
            .decode(&[log], true)
            .unwrap();
        match &events[0] {
            GovernanceEvent::SpaceCreated {
                space_id,
                creator,
                executor,
                quorum,
                ..
            } => {
                assert_eq!(*space_id, U256::from(42));
                assert_eq!(*creator, space_creator());
                assert_eq!(*executor, Address::repeat_byte(0xe0));
                assert_eq!(*quorum, U256::from(51));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_truncated_data_rejected_in_strict_mode() {
        let mut log = executed_log(1, true);
        log.data = Bytes::from(vec![0u8; 5]);
        assert!(GovernanceEventKind::ProposalExecuted
            .decode(&[log], true)
            .is_err());
    }

    #[test]
    fn test_uint_topic_matches_indexed_encoding() {
        let log = executed_log(77, true);
        assert_eq!(log.topics[1], uint_topic(U256::from(77)));
    }

    #[test]
    fn test_event_serializes_decimal_ids() {
        let events = GovernanceEventKind::ProposalExecuted
            .decode(&[executed_log(12, true)], true)
            .unwrap();
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "proposalExecuted");
        assert_eq!(json["proposalId"], "12");
        assert_eq!(json["yesVotes"], "70");
        assert_eq!(json["passed"], true);
    }
}
