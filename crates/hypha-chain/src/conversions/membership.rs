//! Payment, invite and delegation tuple decoding

use super::helpers::*;
use crate::error::Result;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Address;
use serde::Serialize;

/// Decoded `getSpacePayments` tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacePayments {
    /// Unix seconds; zero when the space never paid
    pub expiry_time: u64,
    pub free_trial_used: bool,
}

/// Decode a `getSpacePayments(spaceId)` output tuple
pub fn decode_space_payments(values: &[DynSolValue]) -> Result<SpacePayments> {
    const CTX: &str = "getSpacePayments";
    expect_arity(CTX, values, 2)?;
    Ok(SpacePayments {
        expiry_time: timestamp_to_u64(as_uint(CTX, "expiryTime", &values[0])?),
        free_trial_used: as_bool(CTX, "freeTrialUsed", &values[1])?,
    })
}

/// Decode a `hasSpacePaid(spaceId)` output
pub fn decode_has_paid(values: &[DynSolValue]) -> Result<bool> {
    const CTX: &str = "hasSpacePaid";
    expect_arity(CTX, values, 1)?;
    as_bool(CTX, "paid", &values[0])
}

/// Decoded `getInviteInfo` tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteInfo {
    pub last_invite_time: u64,
    pub has_active_proposal: bool,
}

/// Decode a `getInviteInfo(spaceId, user)` output tuple
pub fn decode_invite_info(values: &[DynSolValue]) -> Result<InviteInfo> {
    const CTX: &str = "getInviteInfo";
    expect_arity(CTX, values, 2)?;
    Ok(InviteInfo {
        last_invite_time: timestamp_to_u64(as_uint(CTX, "lastInviteTime", &values[0])?),
        has_active_proposal: as_bool(CTX, "hasActiveProposal", &values[1])?,
    })
}

/// Decode a `getDelegate(user, spaceId)` output.
///
/// The zero address means the user has not delegated.
pub fn decode_delegate(values: &[DynSolValue]) -> Result<Option<Address>> {
    const CTX: &str = "getDelegate";
    expect_arity(CTX, values, 1)?;
    let delegate = as_address(CTX, "delegate", &values[0])?;
    Ok((delegate != Address::ZERO).then_some(delegate))
}
