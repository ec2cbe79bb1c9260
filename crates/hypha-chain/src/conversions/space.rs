//! Space tuple decoding

use super::helpers::*;
use crate::error::{ChainError, Result};
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use serde::Serialize;
use tracing::warn;

/// How new members enter a space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinMethod {
    Open,
    TokenBased,
    InviteOnly,
    /// A join method this build does not know about
    Other(u64),
}

impl From<U256> for JoinMethod {
    fn from(value: U256) -> Self {
        match timestamp_to_u64(value) {
            0 => Self::Open,
            1 => Self::TokenBased,
            2 => Self::InviteOnly,
            other => Self::Other(other),
        }
    }
}

/// Decoded `getSpaceDetails` tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceDetails {
    pub space_id: U256,
    pub unity: u8,
    pub quorum: u8,
    pub voting_power_source: U256,
    pub token_addresses: Vec<Address>,
    pub members: Vec<Address>,
    pub exit_method: U256,
    pub join_method: JoinMethod,
    pub created_at: u64,
    pub creator: Address,
    pub executor: Address,
}

const SPACE_DETAILS: &str = "getSpaceDetails";

/// Decode a `getSpaceDetails(spaceId)` output tuple.
///
/// `space_id` is not part of the tuple; the caller supplies the id it asked for.
pub fn decode_space_details(space_id: U256, values: &[DynSolValue]) -> Result<SpaceDetails> {
    expect_arity(SPACE_DETAILS, values, 10)?;

    let members = as_address_array(SPACE_DETAILS, "members", &values[4])?;
    let unique = dedup_addresses(members);
    if unique.duplicates > 0 {
        warn!(
            "space {} returned {} duplicate member addresses",
            space_id, unique.duplicates
        );
    }

    Ok(SpaceDetails {
        space_id,
        unity: as_percent(SPACE_DETAILS, "unity", &values[0])?,
        quorum: as_percent(SPACE_DETAILS, "quorum", &values[1])?,
        voting_power_source: as_uint(SPACE_DETAILS, "votingPowerSource", &values[2])?,
        token_addresses: as_address_array(SPACE_DETAILS, "tokenAddresses", &values[3])?,
        members: unique.addresses,
        exit_method: as_uint(SPACE_DETAILS, "exitMethod", &values[5])?,
        join_method: as_uint(SPACE_DETAILS, "joinMethod", &values[6])?.into(),
        created_at: timestamp_to_u64(as_uint(SPACE_DETAILS, "createdAt", &values[7])?),
        creator: as_address(SPACE_DETAILS, "creator", &values[8])?,
        executor: as_address(SPACE_DETAILS, "executor", &values[9])?,
    })
}

struct Deduped {
    addresses: Vec<Address>,
    duplicates: usize,
}

fn dedup_addresses(addresses: Vec<Address>) -> Deduped {
    let mut seen = std::collections::HashSet::with_capacity(addresses.len());
    let total = addresses.len();
    let addresses: Vec<Address> = addresses.into_iter().filter(|a| seen.insert(*a)).collect();
    Deduped {
        duplicates: total - addresses.len(),
        addresses,
    }
}

/// Accepted and rejected proposal ids of a space
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpaceProposalIds {
    pub accepted: Vec<U256>,
    pub rejected: Vec<U256>,
}

/// Decode a `getSpaceProposals(spaceId)` output tuple
pub fn decode_space_proposals(values: &[DynSolValue]) -> Result<SpaceProposalIds> {
    const CTX: &str = "getSpaceProposals";
    expect_arity(CTX, values, 2)?;
    Ok(SpaceProposalIds {
        accepted: as_uint_array(CTX, "accepted", &values[0])?,
        rejected: as_uint_array(CTX, "rejected", &values[1])?,
    })
}

/// Token and amount a token-gated space requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenRequirement {
    pub token: Address,
    pub amount: U256,
}

impl TokenRequirement {
    /// Zero token or zero amount means no requirement at all
    pub fn is_empty(&self) -> bool {
        self.token == Address::ZERO || self.amount.is_zero()
    }
}

/// Decode a `spaceRequirements(spaceId)` output tuple
pub fn decode_token_requirement(values: &[DynSolValue]) -> Result<TokenRequirement> {
    const CTX: &str = "spaceRequirements";
    expect_arity(CTX, values, 2)?;
    Ok(TokenRequirement {
        token: as_address(CTX, "token", &values[0])?,
        amount: as_uint(CTX, "amount", &values[1])?,
    })
}

/// Decode a single `address[]` output (delegates, token factory lists)
pub fn decode_address_list(context: &'static str, values: &[DynSolValue]) -> Result<Vec<Address>> {
    expect_arity(context, values, 1)?;
    as_address_array(context, "addresses", &values[0])
}

/// Decode a single `uint` output and check it fits the expected width
pub fn decode_single_uint(context: &'static str, values: &[DynSolValue]) -> Result<U256> {
    expect_arity(context, values, 1)?;
    as_uint(context, "value", &values[0])
}

/// Decode a single `uint8` output such as ERC-20 `decimals()`
pub fn decode_decimals(values: &[DynSolValue]) -> Result<u8> {
    let raw = decode_single_uint("decimals", values)?;
    if raw > U256::from(u8::MAX) {
        return Err(ChainError::decode("decimals", format!("out of range: {}", raw)));
    }
    Ok(raw.to::<u8>())
}

/// Decode a single `string` output such as ERC-20 `symbol()`
pub fn decode_string(context: &'static str, values: &[DynSolValue]) -> Result<String> {
    expect_arity(context, values, 1)?;
    match &values[0] {
        DynSolValue::String(s) => Ok(s.clone()),
        other => Err(type_error(context, "value", "string", other)),
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod fixtures {
    use super::*;

    pub fn uint(v: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(v), 256)
    }

    pub fn addr(byte: u8) -> DynSolValue {
        DynSolValue::Address(Address::repeat_byte(byte))
    }

    pub fn addr_array(bytes: &[u8]) -> DynSolValue {
        DynSolValue::Array(bytes.iter().map(|b| addr(*b)).collect())
    }

    /// getSpaceDetails output with the given member bytes
    pub fn space_details_tuple(members: &[u8], join_method: u64) -> Vec<DynSolValue> {
        vec![
            uint(67),
            uint(51),
            uint(1),
            addr_array(&[0x70]),
            addr_array(members),
            uint(1),
            uint(join_method),
            uint(1_700_000_000),
            addr(0xc0),
            addr(0xe0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_decode_space_details() {
        let details =
            decode_space_details(U256::from(42), &space_details_tuple(&[1, 2, 3], 1)).unwrap();
        assert_eq!(details.space_id, U256::from(42));
        assert_eq!(details.unity, 67);
        assert_eq!(details.quorum, 51);
        assert_eq!(details.members.len(), 3);
        assert_eq!(details.join_method, JoinMethod::TokenBased);
        assert_eq!(details.created_at, 1_700_000_000);
        assert_eq!(details.executor, Address::repeat_byte(0xe0));
    }

    #[test]
    fn test_decode_space_details_rejects_short_tuple() {
        let mut tuple = space_details_tuple(&[1], 0);
        tuple.pop();
        let err = decode_space_details(U256::from(1), &tuple).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Arity {
                expected: 10,
                actual: 9,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_space_details_rejects_extra_fields() {
        let mut tuple = space_details_tuple(&[1], 0);
        tuple.push(uint(0));
        assert!(decode_space_details(U256::from(1), &tuple).is_err());
    }

    #[test]
    fn test_duplicate_members_collapsed() {
        let details =
            decode_space_details(U256::from(7), &space_details_tuple(&[1, 2, 1, 2, 3], 0))
                .unwrap();
        assert_eq!(
            details.members,
            vec![
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                Address::repeat_byte(3)
            ]
        );
    }

    #[test]
    fn test_out_of_range_quorum_is_error() {
        let mut tuple = space_details_tuple(&[1], 0);
        tuple[1] = uint(150);
        assert!(decode_space_details(U256::from(1), &tuple).is_err());
    }

    #[test]
    fn test_join_method_mapping() {
        assert_eq!(JoinMethod::from(U256::ZERO), JoinMethod::Open);
        assert_eq!(JoinMethod::from(U256::from(2)), JoinMethod::InviteOnly);
        assert_eq!(JoinMethod::from(U256::from(9)), JoinMethod::Other(9));
    }

    #[test]
    fn test_decode_space_proposals() {
        let values = vec![
            DynSolValue::Array(vec![uint(1), uint(2), uint(3)]),
            DynSolValue::Array(vec![uint(4)]),
        ];
        let ids = decode_space_proposals(&values).unwrap();
        assert_eq!(ids.accepted.len(), 3);
        assert_eq!(ids.rejected, vec![U256::from(4)]);
    }

    #[test]
    fn test_token_requirement_empty() {
        let zero_token = TokenRequirement {
            token: Address::ZERO,
            amount: U256::from(100),
        };
        assert!(zero_token.is_empty());
        let zero_amount = TokenRequirement {
            token: Address::repeat_byte(1),
            amount: U256::ZERO,
        };
        assert!(zero_amount.is_empty());
        let real = TokenRequirement {
            token: Address::repeat_byte(1),
            amount: U256::from(1),
        };
        assert!(!real.is_empty());
    }

    #[test]
    fn test_decode_decimals_range() {
        assert_eq!(decode_decimals(&[uint(18)]).unwrap(), 18);
        assert!(decode_decimals(&[uint(300)]).is_err());
        assert!(decode_decimals(&[]).is_err());
    }

    #[test]
    fn test_decode_string() {
        let symbol = DynSolValue::String("HYP".to_string());
        assert_eq!(decode_string("symbol", &[symbol]).unwrap(), "HYP");
        assert!(decode_string("symbol", &[uint(1)]).is_err());
    }
}
