//! The staking collaborator.
//!
//! Governance consumes a narrow slice of staking: who verifies at a block,
//! who is a candidate, and two notifications that drive the upgrade
//! handshake. The node wires in the real staking subsystem; tests use the
//! nullable implementation.

use meridian_types::{BlockHash, NodeId, ProtocolVersion, StakingAddress};
use thiserror::Error;

/// Failure inside the staking collaborator. Fatal for the enclosing block
/// operation.
#[derive(Debug, Error)]
#[error("staking: {0}")]
pub struct StakingError(pub String);

/// Admission state of a staked node, as staking tracks it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Valid,
    Invalid,
}

/// A verifier as seen by governance.
#[derive(Clone, Debug)]
pub struct VerifierInfo {
    pub node_id: NodeId,
    pub staking_address: StakingAddress,
    pub status: NodeStatus,
}

/// A staked candidate. Candidates are a superset of verifiers.
#[derive(Clone, Debug)]
pub struct CandidateInfo {
    pub node_id: NodeId,
    pub staking_address: StakingAddress,
    pub status: NodeStatus,
}

pub trait Staking: Send + Sync {
    /// Validator IDs of the consensus round containing `block_number`.
    fn list_current_validator_id(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<Vec<NodeId>, StakingError>;

    /// Verifier IDs at the given block.
    fn list_verifier_node_id(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<Vec<NodeId>, StakingError>;

    /// Full verifier records at the given block.
    fn verifier_list(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<Vec<VerifierInfo>, StakingError>;

    /// Full candidate records at the given block.
    fn candidate_list(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<Vec<CandidateInfo>, StakingError>;

    /// One candidate record, by node ID.
    fn candidate_info(
        &self,
        block_hash: &BlockHash,
        node_id: &NodeId,
    ) -> Result<Option<CandidateInfo>, StakingError>;

    /// A node declared a version that is already active (or pre-active);
    /// staking may promote it immediately.
    fn declare_promote_notify(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
        node_id: &NodeId,
        version: ProtocolVersion,
    ) -> Result<(), StakingError>;

    /// A version proposal passed tally; `active_nodes` have already adopted
    /// `new_version`.
    fn proposal_passed_notify(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
        active_nodes: &[NodeId],
        new_version: ProtocolVersion,
    ) -> Result<(), StakingError>;
}
