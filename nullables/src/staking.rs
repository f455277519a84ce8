//! Nullable staking collaborator with programmable validator sets.

use meridian_governance::staking::{
    CandidateInfo, NodeStatus, Staking, StakingError, VerifierInfo,
};
use meridian_types::{BlockHash, NodeId, ProtocolVersion, StakingAddress};
use std::sync::Mutex;

/// An in-memory staking collaborator.
///
/// Verifier, candidate and validator sets are set programmatically and
/// returned regardless of block; notifications are recorded for assertion.
pub struct NullStaking {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    verifiers: Vec<VerifierInfo>,
    candidates: Vec<CandidateInfo>,
    validators: Vec<NodeId>,
    promote_notices: Vec<(NodeId, ProtocolVersion)>,
    passed_notices: Vec<(Vec<NodeId>, ProtocolVersion)>,
}

impl NullStaking {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a node as verifier, candidate and current validator at once.
    pub fn add_verifier(&self, node_id: NodeId, staking_address: StakingAddress) {
        let mut inner = self.inner.lock().unwrap();
        inner.verifiers.push(VerifierInfo {
            node_id,
            staking_address,
            status: NodeStatus::Valid,
        });
        inner.candidates.push(CandidateInfo {
            node_id,
            staking_address,
            status: NodeStatus::Valid,
        });
        inner.validators.push(node_id);
    }

    /// Register a node as candidate only.
    pub fn add_candidate(&self, node_id: NodeId, staking_address: StakingAddress) {
        self.inner.lock().unwrap().candidates.push(CandidateInfo {
            node_id,
            staking_address,
            status: NodeStatus::Valid,
        });
    }

    /// Replace the current-round validator set.
    pub fn set_validators(&self, validators: Vec<NodeId>) {
        self.inner.lock().unwrap().validators = validators;
    }

    /// Mark a registered verifier as invalid.
    pub fn invalidate(&self, node_id: &NodeId) {
        let mut inner = self.inner.lock().unwrap();
        for v in inner.verifiers.iter_mut().filter(|v| v.node_id == *node_id) {
            v.status = NodeStatus::Invalid;
        }
        for c in inner.candidates.iter_mut().filter(|c| c.node_id == *node_id) {
            c.status = NodeStatus::Invalid;
        }
    }

    /// Recorded `declare_promote_notify` calls.
    pub fn promote_notices(&self) -> Vec<(NodeId, ProtocolVersion)> {
        self.inner.lock().unwrap().promote_notices.clone()
    }

    /// Recorded `proposal_passed_notify` calls.
    pub fn passed_notices(&self) -> Vec<(Vec<NodeId>, ProtocolVersion)> {
        self.inner.lock().unwrap().passed_notices.clone()
    }
}

impl Default for NullStaking {
    fn default() -> Self {
        Self::new()
    }
}

impl Staking for NullStaking {
    fn list_current_validator_id(
        &self,
        _block_hash: &BlockHash,
        _block_number: u64,
    ) -> Result<Vec<NodeId>, StakingError> {
        Ok(self.inner.lock().unwrap().validators.clone())
    }

    fn list_verifier_node_id(
        &self,
        _block_hash: &BlockHash,
        _block_number: u64,
    ) -> Result<Vec<NodeId>, StakingError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .verifiers
            .iter()
            .map(|v| v.node_id)
            .collect())
    }

    fn verifier_list(
        &self,
        _block_hash: &BlockHash,
        _block_number: u64,
    ) -> Result<Vec<VerifierInfo>, StakingError> {
        Ok(self.inner.lock().unwrap().verifiers.clone())
    }

    fn candidate_list(
        &self,
        _block_hash: &BlockHash,
        _block_number: u64,
    ) -> Result<Vec<CandidateInfo>, StakingError> {
        Ok(self.inner.lock().unwrap().candidates.clone())
    }

    fn candidate_info(
        &self,
        _block_hash: &BlockHash,
        node_id: &NodeId,
    ) -> Result<Option<CandidateInfo>, StakingError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .candidates
            .iter()
            .find(|c| c.node_id == *node_id)
            .cloned())
    }

    fn declare_promote_notify(
        &self,
        _block_hash: &BlockHash,
        _block_number: u64,
        node_id: &NodeId,
        version: ProtocolVersion,
    ) -> Result<(), StakingError> {
        self.inner
            .lock()
            .unwrap()
            .promote_notices
            .push((*node_id, version));
        Ok(())
    }

    fn proposal_passed_notify(
        &self,
        _block_hash: &BlockHash,
        _block_number: u64,
        active_nodes: &[NodeId],
        new_version: ProtocolVersion,
    ) -> Result<(), StakingError> {
        self.inner
            .lock()
            .unwrap()
            .passed_notices
            .push((active_nodes.to_vec(), new_version));
        Ok(())
    }
}
