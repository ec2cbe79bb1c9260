//! Contract ABI bindings module
//!
//! Typed `sol!` bindings for Multicall3 and the governance events, plus the
//! human-readable read signatures used with the dynamic [`ChainReader`](crate::ChainReader).

pub mod events;
pub mod multicall;
pub mod reads;

pub use events::{ProposalCreated, ProposalExecuted, ProposalRejected, SpaceCreated};
pub use multicall::IMulticall3;
pub use reads::GovernanceCalls;
