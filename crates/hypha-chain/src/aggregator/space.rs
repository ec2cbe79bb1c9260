//! Space aggregation: details, proposal counts, tokens and join access

use crate::abi::GovernanceCalls;
use crate::conversions::{
    decode_address_list, decode_delegate, decode_has_paid, decode_invite_info,
    decode_space_details, decode_space_payments, decode_space_proposals,
    decode_token_requirement, InviteInfo, JoinMethod, SpaceDetails, SpacePayments,
    SpaceProposalIds, TokenRequirement,
};
use crate::error::{ChainError, Result};
use crate::reader::{CallOutcome, ChainReader};
use crate::subscription::{resolve_payments, SubscriptionStatus};
use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Counts shown on a space summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpaceSummary {
    pub members_count: usize,
    pub proposals_count: usize,
}

/// Token addresses of a space per token type; each lookup fails on its own
#[derive(Debug)]
pub struct SpaceTokens {
    pub regular: Result<Vec<Address>>,
    pub ownership: Result<Vec<Address>>,
    pub decaying: Result<Vec<Address>>,
}

/// Outcome of checking a caller's balance against a space's join rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum AccessDecision {
    /// The space is not token gated
    NoRequirement,
    Granted {
        token: Address,
        required: U256,
    },
    Denied {
        token: Address,
        required: U256,
        balance: U256,
    },
}

/// Reads and aggregates spaces from the space factory and related contracts
#[derive(Clone)]
pub struct SpaceAggregator {
    reader: Arc<dyn ChainReader>,
    calls: GovernanceCalls,
}

impl SpaceAggregator {
    pub fn new(reader: Arc<dyn ChainReader>, calls: GovernanceCalls) -> Self {
        Self { reader, calls }
    }

    /// Details of every space in `space_ids`, in request order.
    ///
    /// One strict multicall; any failing element fails the whole request.
    pub async fn fetch_details(&self, space_ids: &[U256]) -> Result<Vec<SpaceDetails>> {
        debug!("Fetching details for {} spaces", space_ids.len());
        let calls = space_ids
            .iter()
            .map(|id| self.calls.space_details(*id))
            .collect::<Result<Vec<_>>>()?;
        let tuples = self.reader.multicall_strict(&calls).await?;
        ensure_len(space_ids.len(), tuples.len())?;
        space_ids
            .iter()
            .zip(tuples)
            .map(|(id, tuple)| decode_space_details(*id, &tuple))
            .collect()
    }

    /// Accepted and rejected proposal ids for every space in `space_ids`
    pub async fn fetch_proposal_ids(&self, space_ids: &[U256]) -> Result<Vec<SpaceProposalIds>> {
        let calls = space_ids
            .iter()
            .map(|id| self.calls.space_proposals(*id))
            .collect::<Result<Vec<_>>>()?;
        let tuples = self.reader.multicall_strict(&calls).await?;
        ensure_len(space_ids.len(), tuples.len())?;
        tuples
            .iter()
            .map(|tuple| decode_space_proposals(tuple))
            .collect()
    }

    /// Member and accepted-proposal counts for one space
    pub async fn summary(&self, space_id: U256) -> Result<SpaceSummary> {
        let ids = [space_id];
        let (details, proposals) =
            tokio::try_join!(self.fetch_details(&ids), self.fetch_proposal_ids(&ids))?;
        let details = details.first().ok_or(ChainError::LengthMismatch {
            expected: 1,
            actual: 0,
        })?;
        let proposals = proposals.first().ok_or(ChainError::LengthMismatch {
            expected: 1,
            actual: 0,
        })?;
        Ok(SpaceSummary {
            members_count: count_members(details),
            proposals_count: count_accepted_proposals(proposals),
        })
    }

    /// Regular, ownership and decaying token addresses of a space
    pub async fn fetch_tokens(&self, space_id: U256) -> Result<SpaceTokens> {
        let calls = self.calls.space_tokens(space_id)?;
        let outcomes = self.reader.multicall(&calls, true).await?;
        ensure_len(calls.len(), outcomes.len())?;

        let mut lists = outcomes.into_iter().map(|outcome| match outcome {
            CallOutcome::Success(values) => decode_address_list("getSpaceToken", &values),
            CallOutcome::Failure(err) => Err(err),
        });
        let missing = || {
            Err(ChainError::LengthMismatch {
                expected: 3,
                actual: 0,
            })
        };
        Ok(SpaceTokens {
            regular: lists.next().unwrap_or_else(missing),
            ownership: lists.next().unwrap_or_else(missing),
            decaying: lists.next().unwrap_or_else(missing),
        })
    }

    pub async fn fetch_payments(&self, space_id: U256) -> Result<SpacePayments> {
        let raw = self.reader.read(&self.calls.space_payments(space_id)?).await?;
        decode_space_payments(&raw)
    }

    pub async fn fetch_has_paid(&self, space_id: U256) -> Result<bool> {
        let raw = self.reader.read(&self.calls.has_space_paid(space_id)?).await?;
        decode_has_paid(&raw)
    }

    /// Payments and paid flag, read concurrently and resolved at `now_ms`
    pub async fn fetch_subscription(&self, space_id: U256, now_ms: u64) -> Result<SubscriptionStatus> {
        let (payments, has_paid) = tokio::try_join!(
            self.fetch_payments(space_id),
            self.fetch_has_paid(space_id)
        )?;
        Ok(resolve_payments(&payments, has_paid, now_ms))
    }

    pub async fn fetch_invite_info(&self, space_id: U256, user: Address) -> Result<InviteInfo> {
        let raw = self
            .reader
            .read(&self.calls.invite_info(space_id, user)?)
            .await?;
        decode_invite_info(&raw)
    }

    /// Address `user` delegated to in `space_id`, if any
    pub async fn fetch_delegate(&self, user: Address, space_id: U256) -> Result<Option<Address>> {
        let raw = self.reader.read(&self.calls.delegate(user, space_id)?).await?;
        decode_delegate(&raw)
    }

    /// Every address holding delegated power in `space_id`
    pub async fn fetch_delegates(&self, space_id: U256) -> Result<Vec<Address>> {
        let raw = self
            .reader
            .read(&self.calls.delegates_for_space(space_id)?)
            .await?;
        decode_address_list("getDelegatesForSpace", &raw)
    }

    /// Token requirement of a space, or `None` when it is not token gated.
    ///
    /// Only token-based spaces are queried.
    pub async fn token_requirement(&self, details: &SpaceDetails) -> Result<Option<TokenRequirement>> {
        if details.join_method != JoinMethod::TokenBased {
            return Ok(None);
        }
        let raw = self
            .reader
            .read(&self.calls.token_requirement(details.space_id)?)
            .await?;
        let requirement = decode_token_requirement(&raw)?;
        Ok((!requirement.is_empty()).then_some(requirement))
    }

    /// Check `balance` against the join rule of the space
    pub async fn check_join_access(
        &self,
        details: &SpaceDetails,
        balance: U256,
    ) -> Result<AccessDecision> {
        let requirement = self.token_requirement(details).await?;
        Ok(evaluate_access(details.join_method, requirement, balance))
    }
}

pub fn count_members(details: &SpaceDetails) -> usize {
    details.members.len()
}

/// Only accepted proposals count towards a space's visible agreements
pub fn count_accepted_proposals(ids: &SpaceProposalIds) -> usize {
    ids.accepted.len()
}

/// Pure join-rule evaluation.
///
/// A zero token or zero amount means no requirement regardless of join method.
pub fn evaluate_access(
    join_method: JoinMethod,
    requirement: Option<TokenRequirement>,
    balance: U256,
) -> AccessDecision {
    match requirement {
        Some(req) if join_method == JoinMethod::TokenBased && !req.is_empty() => {
            if balance >= req.amount {
                AccessDecision::Granted {
                    token: req.token,
                    required: req.amount,
                }
            } else {
                AccessDecision::Denied {
                    token: req.token,
                    required: req.amount,
                    balance,
                }
            }
        }
        _ => AccessDecision::NoRequirement,
    }
}

fn ensure_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ChainError::LengthMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::reads::fixtures::deployment;
    use crate::conversions::space::fixtures::{addr, addr_array, space_details_tuple, uint};
    use crate::testing::{MockChainReader, MockResponse};
    use alloy::dyn_abi::DynSolValue;

    fn setup() -> (Arc<MockChainReader>, GovernanceCalls) {
        (Arc::new(MockChainReader::new()), GovernanceCalls::new(deployment()))
    }

    fn proposal_ids(accepted: u64, rejected: u64) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Array((0..accepted).map(uint).collect()),
            DynSolValue::Array((100..100 + rejected).map(uint).collect()),
        ]
    }

    #[tokio::test]
    async fn test_summary_counts_members_and_accepted() {
        let (reader, calls) = setup();
        let id = U256::from(42);
        reader.returns(
            &calls.space_details(id).unwrap(),
            space_details_tuple(&[1, 2, 3, 4, 5], 0),
        );
        reader.returns(&calls.space_proposals(id).unwrap(), proposal_ids(3, 4));

        let summary = SpaceAggregator::new(reader.clone(), calls)
            .summary(id)
            .await
            .unwrap();
        assert_eq!(
            summary,
            SpaceSummary {
                members_count: 5,
                proposals_count: 3
            }
        );
        assert_eq!(reader.multicall_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_details_is_strict() {
        let (reader, calls) = setup();
        reader.returns(
            &calls.space_details(U256::from(1)).unwrap(),
            space_details_tuple(&[1], 0),
        );
        reader.on(
            &calls.space_details(U256::from(2)).unwrap(),
            MockResponse::Revert("Space does not exist".to_string()),
        );

        let err = SpaceAggregator::new(reader, calls)
            .fetch_details(&[U256::from(1), U256::from(2)])
            .await
            .unwrap_err();
        match err {
            ChainError::MulticallElement { index, call, .. } => {
                assert_eq!(index, 1);
                assert!(call.ends_with("::getSpaceDetails"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_details_keeps_order() {
        let (reader, calls) = setup();
        reader.returns(
            &calls.space_details(U256::from(1)).unwrap(),
            space_details_tuple(&[1], 0),
        );
        reader.returns(
            &calls.space_details(U256::from(2)).unwrap(),
            space_details_tuple(&[1, 2], 2),
        );
        let details = SpaceAggregator::new(reader, calls)
            .fetch_details(&[U256::from(2), U256::from(1)])
            .await
            .unwrap();
        assert_eq!(details[0].space_id, U256::from(2));
        assert_eq!(details[0].join_method, JoinMethod::InviteOnly);
        assert_eq!(details[1].members.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_propagates_as_kind() {
        let (reader, calls) = setup();
        reader.fail_all(MockResponse::RateLimited);
        let err = SpaceAggregator::new(reader, calls)
            .summary(U256::from(1))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_fetch_tokens_allows_partial_failure() {
        let (reader, calls) = setup();
        let id = U256::from(9);
        let [regular, ownership, decaying] = calls.space_tokens(id).unwrap();
        reader.returns(&regular, vec![addr_array(&[0x31])]);
        reader.on(&ownership, MockResponse::Revert("factory paused".to_string()));
        reader.returns(&decaying, vec![addr_array(&[0x33, 0x34])]);

        let tokens = SpaceAggregator::new(reader, calls)
            .fetch_tokens(id)
            .await
            .unwrap();
        assert_eq!(tokens.regular.unwrap(), vec![Address::repeat_byte(0x31)]);
        assert!(tokens.ownership.is_err());
        assert_eq!(tokens.decaying.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_token_requirement_only_for_token_based() {
        let (reader, calls) = setup();
        let open = decode_space_details(U256::from(1), &space_details_tuple(&[1], 0)).unwrap();
        let aggregator = SpaceAggregator::new(reader.clone(), calls);
        assert_eq!(aggregator.token_requirement(&open).await.unwrap(), None);
        assert_eq!(reader.read_count(), 0);
    }

    #[tokio::test]
    async fn test_check_join_access() {
        let (reader, calls) = setup();
        let gated = decode_space_details(U256::from(3), &space_details_tuple(&[1], 1)).unwrap();
        reader.returns(
            &calls.token_requirement(U256::from(3)).unwrap(),
            vec![addr(0x44), uint(100)],
        );
        let aggregator = SpaceAggregator::new(reader, calls);

        let denied = aggregator
            .check_join_access(&gated, U256::from(99))
            .await
            .unwrap();
        assert!(matches!(denied, AccessDecision::Denied { .. }));

        let granted = aggregator
            .check_join_access(&gated, U256::from(100))
            .await
            .unwrap();
        assert_eq!(
            granted,
            AccessDecision::Granted {
                token: Address::repeat_byte(0x44),
                required: U256::from(100)
            }
        );
    }

    #[test]
    fn test_empty_requirement_ignores_join_method() {
        let zero_amount = TokenRequirement {
            token: Address::repeat_byte(0x44),
            amount: U256::ZERO,
        };
        assert_eq!(
            evaluate_access(JoinMethod::TokenBased, Some(zero_amount), U256::ZERO),
            AccessDecision::NoRequirement
        );
        let zero_token = TokenRequirement {
            token: Address::ZERO,
            amount: U256::from(5),
        };
        assert_eq!(
            evaluate_access(JoinMethod::TokenBased, Some(zero_token), U256::ZERO),
            AccessDecision::NoRequirement
        );
    }

    #[tokio::test]
    async fn test_fetch_delegate_and_payments() {
        let (reader, calls) = setup();
        let user = Address::repeat_byte(0x99);
        reader.returns(&calls.delegate(user, U256::from(4)).unwrap(), vec![addr(0x55)]);
        reader.returns(
            &calls.space_payments(U256::from(4)).unwrap(),
            vec![uint(1_900_000_000), DynSolValue::Bool(false)],
        );
        let aggregator = SpaceAggregator::new(reader, calls);
        assert_eq!(
            aggregator.fetch_delegate(user, U256::from(4)).await.unwrap(),
            Some(Address::repeat_byte(0x55))
        );
        let payments = aggregator.fetch_payments(U256::from(4)).await.unwrap();
        assert_eq!(payments.expiry_time, 1_900_000_000);
        assert!(!payments.free_trial_used);
    }

    #[tokio::test]
    async fn test_fetch_subscription_reports_unpaid_trial() {
        let (reader, calls) = setup();
        let id = U256::from(9);
        let now_ms = 1_700_000_000_000u64;
        let expiry = now_ms / 1000 + 30 * 86_400;
        reader.returns(
            &calls.space_payments(id).unwrap(),
            vec![uint(expiry), DynSolValue::Bool(true)],
        );
        reader.returns(&calls.has_space_paid(id).unwrap(), vec![DynSolValue::Bool(false)]);

        let aggregator = SpaceAggregator::new(reader.clone(), calls);
        let status = aggregator.fetch_subscription(id, now_ms).await.unwrap();
        assert_eq!(status.status, crate::subscription::SubscriptionState::Trial);
        assert_eq!(status.days_left, 30);

        reader.returns(&calls.has_space_paid(id).unwrap(), vec![DynSolValue::Bool(true)]);
        let status = aggregator.fetch_subscription(id, now_ms).await.unwrap();
        assert_eq!(status.status, crate::subscription::SubscriptionState::Active);
        assert_eq!(reader.read_count(), 4);
    }

    #[tokio::test]
    async fn test_fetch_subscription_fails_when_paid_flag_reverts() {
        let (reader, calls) = setup();
        let id = U256::from(9);
        reader.returns(
            &calls.space_payments(id).unwrap(),
            vec![uint(1_900_000_000), DynSolValue::Bool(false)],
        );
        reader.on(
            &calls.has_space_paid(id).unwrap(),
            MockResponse::Revert("tracker paused".to_string()),
        );
        let err = SpaceAggregator::new(reader, calls)
            .fetch_subscription(id, 1_700_000_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Reverted { .. }));
    }

    #[tokio::test]
    async fn test_fetch_invite_info() {
        let (reader, calls) = setup();
        let user = Address::repeat_byte(0x99);
        reader.returns(
            &calls.invite_info(U256::from(4), user).unwrap(),
            vec![uint(1_700_000_123), DynSolValue::Bool(true)],
        );
        let info = SpaceAggregator::new(reader, calls)
            .fetch_invite_info(U256::from(4), user)
            .await
            .unwrap();
        assert_eq!(info.last_invite_time, 1_700_000_123);
        assert!(info.has_active_proposal);
    }

    #[tokio::test]
    async fn test_fetch_delegate_zero_is_none() {
        let (reader, calls) = setup();
        let user = Address::repeat_byte(0x99);
        reader.returns(
            &calls.delegate(user, U256::from(4)).unwrap(),
            vec![DynSolValue::Address(Address::ZERO)],
        );
        let delegate = SpaceAggregator::new(reader, calls)
            .fetch_delegate(user, U256::from(4))
            .await
            .unwrap();
        assert_eq!(delegate, None);
    }
}
