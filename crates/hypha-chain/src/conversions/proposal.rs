//! Proposal tuple decoding

use super::helpers::*;
use crate::error::{ChainError, Result};
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, U256};
use serde::Serialize;

/// One call a proposal executes when accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalTransaction {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Decoded `getProposalCore` tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalCore {
    pub proposal_id: U256,
    pub space_id: U256,
    pub start_time: u64,
    pub end_time: u64,
    pub executed: bool,
    pub expired: bool,
    pub yes_votes: U256,
    pub no_votes: U256,
    pub total_voting_power_at_snapshot: U256,
    pub creator: Address,
    pub transactions: Vec<ProposalTransaction>,
}

impl ProposalCore {
    /// Executed or expired; never aggregated as active again
    pub fn is_terminal(&self) -> bool {
        self.executed || self.expired
    }
}

const PROPOSAL_CORE: &str = "getProposalCore";

/// Decode a `getProposalCore(proposalId)` output tuple
pub fn decode_proposal_core(proposal_id: U256, values: &[DynSolValue]) -> Result<ProposalCore> {
    expect_arity(PROPOSAL_CORE, values, 10)?;

    let start_time = timestamp_to_u64(as_uint(PROPOSAL_CORE, "startTime", &values[1])?);
    let end_time = timestamp_to_u64(as_uint(PROPOSAL_CORE, "endTime", &values[2])?);
    if end_time < start_time {
        return Err(ChainError::decode(
            PROPOSAL_CORE,
            format!(
                "proposal {} ends ({}) before it starts ({})",
                proposal_id, end_time, start_time
            ),
        ));
    }

    let transactions = as_array(PROPOSAL_CORE, "transactions", &values[9])?
        .iter()
        .map(decode_transaction)
        .collect::<Result<Vec<_>>>()?;

    Ok(ProposalCore {
        proposal_id,
        space_id: as_uint(PROPOSAL_CORE, "spaceId", &values[0])?,
        start_time,
        end_time,
        executed: as_bool(PROPOSAL_CORE, "executed", &values[3])?,
        expired: as_bool(PROPOSAL_CORE, "expired", &values[4])?,
        yes_votes: as_uint(PROPOSAL_CORE, "yesVotes", &values[5])?,
        no_votes: as_uint(PROPOSAL_CORE, "noVotes", &values[6])?,
        total_voting_power_at_snapshot: as_uint(
            PROPOSAL_CORE,
            "totalVotingPowerAtSnapshot",
            &values[7],
        )?,
        creator: as_address(PROPOSAL_CORE, "creator", &values[8])?,
        transactions,
    })
}

fn decode_transaction(value: &DynSolValue) -> Result<ProposalTransaction> {
    let fields = value
        .as_tuple()
        .ok_or_else(|| ChainError::decode(PROPOSAL_CORE, "transaction is not a tuple"))?;
    expect_arity(PROPOSAL_CORE, fields, 3)?;
    Ok(ProposalTransaction {
        target: as_address(PROPOSAL_CORE, "transactions.target", &fields[0])?,
        value: as_uint(PROPOSAL_CORE, "transactions.value", &fields[1])?,
        data: as_bytes(PROPOSAL_CORE, "transactions.data", &fields[2])?,
    })
}

/// Yes and no voter addresses of a proposal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalVoters {
    pub yes_voters: Vec<Address>,
    pub no_voters: Vec<Address>,
}

/// Decode a `getProposalVoters(proposalId)` output tuple
pub fn decode_proposal_voters(values: &[DynSolValue]) -> Result<ProposalVoters> {
    const CTX: &str = "getProposalVoters";
    expect_arity(CTX, values, 2)?;
    Ok(ProposalVoters {
        yes_voters: as_address_array(CTX, "yesVoters", &values[0])?,
        no_voters: as_address_array(CTX, "noVoters", &values[1])?,
    })
}

#[cfg(any(test, feature = "testing"))]
pub mod fixtures {
    use super::*;
    use crate::conversions::space::fixtures::{addr, uint};

    pub struct CoreFields {
        pub start: u64,
        pub end: u64,
        pub executed: bool,
        pub expired: bool,
        pub yes: u64,
        pub no: u64,
        pub snapshot: u64,
    }

    impl Default for CoreFields {
        fn default() -> Self {
            Self {
                start: 1_000,
                end: 2_000,
                executed: false,
                expired: false,
                yes: 60,
                no: 20,
                snapshot: 100,
            }
        }
    }

    pub fn proposal_core_tuple(fields: CoreFields) -> Vec<DynSolValue> {
        vec![
            uint(42),
            uint(fields.start),
            uint(fields.end),
            DynSolValue::Bool(fields.executed),
            DynSolValue::Bool(fields.expired),
            uint(fields.yes),
            uint(fields.no),
            uint(fields.snapshot),
            addr(0xc0),
            DynSolValue::Array(vec![DynSolValue::Tuple(vec![
                addr(0x11),
                uint(0),
                DynSolValue::Bytes(vec![0xa9, 0x05, 0x9c, 0xbb]),
            ])]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::conversions::space::fixtures::addr_array;

    #[test]
    fn test_decode_proposal_core() {
        let core = decode_proposal_core(U256::from(7), &proposal_core_tuple(CoreFields::default()))
            .unwrap();
        assert_eq!(core.proposal_id, U256::from(7));
        assert_eq!(core.space_id, U256::from(42));
        assert_eq!(core.yes_votes, U256::from(60));
        assert_eq!(core.total_voting_power_at_snapshot, U256::from(100));
        assert_eq!(core.transactions.len(), 1);
        assert_eq!(core.transactions[0].target, Address::repeat_byte(0x11));
        assert_eq!(core.transactions[0].data.len(), 4);
        assert!(!core.is_terminal());
    }

    #[test]
    fn test_end_before_start_is_error() {
        let tuple = proposal_core_tuple(CoreFields {
            start: 2_000,
            end: 1_000,
            ..CoreFields::default()
        });
        assert!(decode_proposal_core(U256::from(1), &tuple).is_err());
    }

    #[test]
    fn test_wrong_arity_is_error() {
        let mut tuple = proposal_core_tuple(CoreFields::default());
        tuple.truncate(8);
        let err = decode_proposal_core(U256::from(1), &tuple).unwrap_err();
        assert!(matches!(err, ChainError::Arity { actual: 8, .. }));
    }

    #[test]
    fn test_terminal_flags() {
        let core = decode_proposal_core(
            U256::from(1),
            &proposal_core_tuple(CoreFields {
                expired: true,
                ..CoreFields::default()
            }),
        )
        .unwrap();
        assert!(core.is_terminal());
    }

    #[test]
    fn test_decode_voters() {
        let voters = decode_proposal_voters(&[addr_array(&[1, 2]), addr_array(&[3])]).unwrap();
        assert_eq!(voters.yes_voters.len(), 2);
        assert_eq!(voters.no_voters, vec![Address::repeat_byte(3)]);
    }
}
