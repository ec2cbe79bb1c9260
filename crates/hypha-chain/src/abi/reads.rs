//! Read-only governance contract functions
//!
//! Signatures must match the deployed contracts exactly; output order is the
//! tuple order the decoders in [`crate::conversions`] expect.

use crate::config::Deployment;
use crate::error::Result;
use crate::reader::ContractCall;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};

pub const GET_SPACE_DETAILS: &str = "function getSpaceDetails(uint256 spaceId) view returns (uint256 unity, uint256 quorum, uint256 votingPowerSource, address[] tokenAddresses, address[] members, uint256 exitMethod, uint256 joinMethod, uint256 createdAt, address creator, address executor)";
pub const GET_INVITE_INFO: &str = "function getInviteInfo(uint256 spaceId, address user) view returns (uint256 lastInviteTime, bool hasActiveProposal)";
pub const GET_PROPOSAL_CORE: &str = "function getProposalCore(uint256 proposalId) view returns (uint256 spaceId, uint256 startTime, uint256 endTime, bool executed, bool expired, uint256 yesVotes, uint256 noVotes, uint256 totalVotingPowerAtSnapshot, address creator, (address target, uint256 value, bytes data)[] transactions)";
pub const GET_PROPOSAL_VOTERS: &str = "function getProposalVoters(uint256 proposalId) view returns (address[] yesVoters, address[] noVoters)";
pub const GET_SPACE_PROPOSALS: &str = "function getSpaceProposals(uint256 spaceId) view returns (uint256[] accepted, uint256[] rejected)";
pub const GET_SPACE_PAYMENTS: &str = "function getSpacePayments(uint256 spaceId) view returns (uint256 expiryTime, bool freeTrialUsed)";
pub const HAS_SPACE_PAID: &str = "function hasSpacePaid(uint256 spaceId) view returns (bool)";
pub const SPACE_REQUIREMENTS: &str = "function spaceRequirements(uint256 spaceId) view returns (address token, uint256 amount)";
pub const GET_DELEGATE: &str = "function getDelegate(address user, uint256 spaceId) view returns (address)";
pub const GET_DELEGATES_FOR_SPACE: &str = "function getDelegatesForSpace(uint256 spaceId) view returns (address[])";
pub const GET_SPACE_TOKEN: &str = "function getSpaceToken(uint256 spaceId) view returns (address[])";
pub const TOTAL_SUPPLY: &str = "function totalSupply() view returns (uint256)";
pub const DECIMALS: &str = "function decimals() view returns (uint8)";
pub const SYMBOL: &str = "function symbol() view returns (string)";

/// Builds [`ContractCall`]s against one chain's deployment
#[derive(Debug, Clone, Copy)]
pub struct GovernanceCalls {
    deployment: Deployment,
}

fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

impl GovernanceCalls {
    pub fn new(deployment: Deployment) -> Self {
        Self { deployment }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn space_details(&self, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.space_factory,
            GET_SPACE_DETAILS,
            vec![uint(space_id)],
        )
    }

    pub fn invite_info(&self, space_id: U256, user: Address) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.space_factory,
            GET_INVITE_INFO,
            vec![uint(space_id), DynSolValue::Address(user)],
        )
    }

    pub fn proposal_core(&self, proposal_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.proposals,
            GET_PROPOSAL_CORE,
            vec![uint(proposal_id)],
        )
    }

    pub fn proposal_voters(&self, proposal_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.proposals,
            GET_PROPOSAL_VOTERS,
            vec![uint(proposal_id)],
        )
    }

    pub fn space_proposals(&self, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.proposals,
            GET_SPACE_PROPOSALS,
            vec![uint(space_id)],
        )
    }

    pub fn space_payments(&self, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.payment_tracker,
            GET_SPACE_PAYMENTS,
            vec![uint(space_id)],
        )
    }

    pub fn has_space_paid(&self, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.payment_tracker,
            HAS_SPACE_PAID,
            vec![uint(space_id)],
        )
    }

    pub fn token_requirement(&self, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.token_balance_join,
            SPACE_REQUIREMENTS,
            vec![uint(space_id)],
        )
    }

    pub fn delegate(&self, user: Address, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.voting_power_delegation,
            GET_DELEGATE,
            vec![DynSolValue::Address(user), uint(space_id)],
        )
    }

    pub fn delegates_for_space(&self, space_id: U256) -> Result<ContractCall> {
        ContractCall::new(
            self.deployment.voting_power_delegation,
            GET_DELEGATES_FOR_SPACE,
            vec![uint(space_id)],
        )
    }

    /// One `getSpaceToken` call per token factory: regular, ownership, decaying
    pub fn space_tokens(&self, space_id: U256) -> Result<[ContractCall; 3]> {
        Ok([
            ContractCall::new(
                self.deployment.regular_token_factory,
                GET_SPACE_TOKEN,
                vec![uint(space_id)],
            )?,
            ContractCall::new(
                self.deployment.ownership_token_factory,
                GET_SPACE_TOKEN,
                vec![uint(space_id)],
            )?,
            ContractCall::new(
                self.deployment.decaying_token_factory,
                GET_SPACE_TOKEN,
                vec![uint(space_id)],
            )?,
        ])
    }

    pub fn total_supply(token: Address) -> Result<ContractCall> {
        ContractCall::new(token, TOTAL_SUPPLY, vec![])
    }

    pub fn decimals(token: Address) -> Result<ContractCall> {
        ContractCall::new(token, DECIMALS, vec![])
    }

    pub fn symbol(token: Address) -> Result<ContractCall> {
        ContractCall::new(token, SYMBOL, vec![])
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod fixtures {
    use super::*;

    pub fn deployment() -> Deployment {
        Deployment {
            chain_id: 8453,
            multicall: Address::repeat_byte(0xca),
            space_factory: Address::repeat_byte(0x01),
            proposals: Address::repeat_byte(0x02),
            payment_tracker: Address::repeat_byte(0x03),
            token_balance_join: Address::repeat_byte(0x04),
            voting_power_delegation: Address::repeat_byte(0x05),
            regular_token_factory: Address::repeat_byte(0x06),
            ownership_token_factory: Address::repeat_byte(0x07),
            decaying_token_factory: Address::repeat_byte(0x08),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_signatures_parse() {
        let calls = GovernanceCalls::new(fixtures::deployment());
        let id = U256::from(1);
        let user = Address::repeat_byte(0xaa);
        let built = vec![
            calls.space_details(id).unwrap(),
            calls.invite_info(id, user).unwrap(),
            calls.proposal_core(id).unwrap(),
            calls.proposal_voters(id).unwrap(),
            calls.space_proposals(id).unwrap(),
            calls.space_payments(id).unwrap(),
            calls.has_space_paid(id).unwrap(),
            calls.token_requirement(id).unwrap(),
            calls.delegate(user, id).unwrap(),
            calls.delegates_for_space(id).unwrap(),
            GovernanceCalls::total_supply(user).unwrap(),
            GovernanceCalls::decimals(user).unwrap(),
            GovernanceCalls::symbol(user).unwrap(),
        ];
        for call in &built {
            assert!(call.calldata().is_ok(), "{}", call.label());
        }
    }

    #[test]
    fn test_output_arity_matches_decoders() {
        let calls = GovernanceCalls::new(fixtures::deployment());
        let id = U256::from(1);
        assert_eq!(calls.space_details(id).unwrap().function.outputs.len(), 10);
        assert_eq!(calls.proposal_core(id).unwrap().function.outputs.len(), 10);
        assert_eq!(calls.space_payments(id).unwrap().function.outputs.len(), 2);
        assert_eq!(
            calls
                .delegate(Address::ZERO, id)
                .unwrap()
                .function
                .outputs
                .len(),
            1
        );
    }

    #[test]
    fn test_space_tokens_target_each_factory() {
        let calls = GovernanceCalls::new(fixtures::deployment());
        let tokens = calls.space_tokens(U256::from(3)).unwrap();
        let targets: Vec<Address> = tokens.iter().map(|c| c.target).collect();
        assert_eq!(
            targets,
            vec![
                Address::repeat_byte(0x06),
                Address::repeat_byte(0x07),
                Address::repeat_byte(0x08)
            ]
        );
    }

    #[test]
    fn test_delegate_argument_order() {
        let calls = GovernanceCalls::new(fixtures::deployment());
        let call = calls.delegate(Address::repeat_byte(0xaa), U256::from(9)).unwrap();
        assert_eq!(call.function.inputs[0].ty, "address");
        assert_eq!(call.function.inputs[1].ty, "uint256");
    }
}
