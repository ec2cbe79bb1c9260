//! Conversions from positional contract return tuples to named records
//!
//! Every decoder checks tuple arity before reading fields and keeps numeric
//! values as `U256` until display.

pub mod helpers;
pub mod membership;
pub mod proposal;
pub mod space;

pub use membership::{
    decode_delegate, decode_has_paid, decode_invite_info, decode_space_payments, InviteInfo,
    SpacePayments,
};
pub use proposal::{
    decode_proposal_core, decode_proposal_voters, ProposalCore, ProposalTransaction,
    ProposalVoters,
};
pub use space::{
    decode_address_list, decode_decimals, decode_single_uint, decode_space_details,
    decode_space_proposals, decode_string, decode_token_requirement, JoinMethod, SpaceDetails,
    SpaceProposalIds, TokenRequirement,
};
