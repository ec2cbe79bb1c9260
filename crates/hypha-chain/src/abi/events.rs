//! Governance event bindings
//!
//! Event layouts emitted by the DAO space factory and proposals contracts.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    event SpaceCreated(
        uint256 indexed spaceId,
        uint256 unity,
        uint256 quorum,
        uint256 votingPowerSource,
        uint256 exitMethod,
        uint256 joinMethod,
        address indexed creator,
        address executor
    );

    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    event ProposalCreated(
        uint256 indexed proposalId,
        uint256 indexed spaceId,
        uint256 startTime,
        uint256 duration,
        address creator,
        bytes executionData
    );

    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    event ProposalExecuted(uint256 indexed proposalId, bool passed, uint256 yesVotes, uint256 noVotes);

    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    event ProposalRejected(uint256 indexed proposalId, uint256 yesVotes, uint256 noVotes);
}
