//! Aggregators combining decoded tuples into derived governance views

pub mod proposal;
pub mod space;
pub mod token;

pub use proposal::{
    derive_metrics, derive_status, percentage, DerivedProposalMetrics, ProposalAggregator,
    ProposalStatus,
};
pub use space::{
    count_accepted_proposals, count_members, evaluate_access, AccessDecision, SpaceAggregator,
    SpaceSummary, SpaceTokens,
};
pub use token::{TokenAggregator, TokenSupply};

use alloy::primitives::U256;

/// On-chain link of an off-chain row.
///
/// Rows are created before their on-chain counterpart is confirmed; until a
/// webhook attaches the id the row is pending and must not be queried on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnChainId {
    Pending,
    Active(U256),
}

impl OnChainId {
    /// Map a nullable database column to a link; negative ids are treated as pending
    pub fn from_column(value: Option<i64>) -> Self {
        match value {
            Some(id) if id >= 0 => Self::Active(U256::from(id as u64)),
            _ => Self::Pending,
        }
    }

    pub fn active(self) -> Option<U256> {
        match self {
            Self::Active(id) => Some(id),
            Self::Pending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_chain_id_from_column() {
        assert_eq!(OnChainId::from_column(None), OnChainId::Pending);
        assert_eq!(OnChainId::from_column(Some(-1)), OnChainId::Pending);
        assert_eq!(
            OnChainId::from_column(Some(42)).active(),
            Some(U256::from(42))
        );
    }
}
