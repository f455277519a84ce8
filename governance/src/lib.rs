//! On-chain governance for the Meridian protocol.
//!
//! A block-driven state machine: verifier nodes submit proposals, votes are
//! collected across a bounded voting window, and tallying at each proposal's
//! end-voting block is byte-for-byte deterministic across nodes. Version
//! proposals additionally run a staged activation handshake — the recorded
//! protocol version advances only once every validator of the current
//! consensus round has demonstrably adopted the new version, either by
//! voting for it or by declaring it.
//!
//! The engine is embedded in a consensus node: the host invokes
//! [`GovernanceEngine::begin_block`] and [`GovernanceEngine::end_block`]
//! once per block, and routes governance transactions to
//! [`GovernanceEngine::submit`], [`GovernanceEngine::vote`] and
//! [`GovernanceEngine::declare_version`]. All persistent effects go through
//! the fork-aware state gateway, so governance state follows chain reorgs.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod proposal;
pub mod staking;
pub mod vote;

pub use engine::{GovernanceEngine, ProgramVersionValue};
pub use error::GovError;
pub use gateway::GovStore;
pub use proposal::{Proposal, ProposalPayload, ProposalStatus, ProposalType, TallyResult};
pub use staking::{CandidateInfo, NodeStatus, Staking, StakingError, VerifierInfo};
pub use vote::{Vote, VoteOption};
