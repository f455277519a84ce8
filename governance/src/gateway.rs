//! The state gateway: typed access to governance state in the fork-aware
//! store.
//!
//! Every operation is scoped by block hash so governance state participates
//! in the chain's fork semantics. Values are bincode-encoded under prefixed
//! keys; all collections are stored as ordered vectors so the encoded bytes
//! are identical on every node.

use meridian_store::{ForkState, StoreError};
use meridian_types::{ActiveVersionRecord, BlockHash, NodeId, ProposalId, ProtocolVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::proposal::{Proposal, ProposalType, TallyResult};
use crate::vote::{Vote, VoteOption};

const PROPOSAL_PREFIX: u8 = 0x01;
const VOTE_PREFIX: u8 = 0x02;
const TALLY_PREFIX: u8 = 0x03;
const ACCU_VERIFIER_PREFIX: u8 = 0x04;
const ACTIVE_NODE_PREFIX: u8 = 0x05;

const VOTING_LIST_KEY: &[u8] = b"gov/voting";
const END_LIST_KEY: &[u8] = b"gov/end";
const PRE_ACTIVE_ID_KEY: &[u8] = b"gov/pre_active";
const PRE_ACTIVE_VERSION_KEY: &[u8] = b"gov/pre_active_version";
const ACTIVE_VERSIONS_KEY: &[u8] = b"gov/active_versions";

fn prefixed(prefix: u8, id: &ProposalId) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(prefix);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Governance's only path to persistent state.
pub struct GovStore<S> {
    state: S,
}

impl<S: ForkState> GovStore<S> {
    pub fn new(state: S) -> Self {
        Self { state }
    }

    fn load<T: DeserializeOwned>(
        &self,
        block_hash: &BlockHash,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match self.state.get(block_hash, key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(
        &self,
        block_hash: &BlockHash,
        key: &[u8],
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes =
            bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.state.put(block_hash, key, &bytes)
    }

    // ── Proposals ────────────────────────────────────────────────────────

    pub fn set_proposal(
        &self,
        block_hash: &BlockHash,
        proposal: &Proposal,
    ) -> Result<(), StoreError> {
        self.save(block_hash, &prefixed(PROPOSAL_PREFIX, &proposal.id), proposal)
    }

    pub fn proposal(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<Option<Proposal>, StoreError> {
        self.load(block_hash, &prefixed(PROPOSAL_PREFIX, &id))
    }

    /// The at-most-one version proposal currently at voting stage.
    pub fn find_voting_version_proposal(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Option<Proposal>, StoreError> {
        for id in self.list_voting_proposal(block_hash)? {
            let proposal = self.proposal(block_hash, id)?.ok_or_else(|| {
                StoreError::Corruption(format!("voting proposal {id} has no record"))
            })?;
            if proposal.proposal_type() == ProposalType::Version {
                return Ok(Some(proposal));
            }
        }
        Ok(None)
    }

    // ── Votes ────────────────────────────────────────────────────────────

    pub fn set_vote(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
        node_id: NodeId,
        option: VoteOption,
    ) -> Result<(), StoreError> {
        let key = prefixed(VOTE_PREFIX, &proposal_id);
        let mut votes: Vec<Vote> = self.load(block_hash, &key)?.unwrap_or_default();
        votes.push(Vote {
            proposal_id,
            node_id,
            option,
        });
        self.save(block_hash, &key, &votes)
    }

    pub fn list_vote_value(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
    ) -> Result<Vec<Vote>, StoreError> {
        Ok(self
            .load(block_hash, &prefixed(VOTE_PREFIX, &proposal_id))?
            .unwrap_or_default())
    }

    /// The nodes that have already cast a vote on the proposal. Derived
    /// from the vote records, so the two can never disagree.
    pub fn list_voted_verifier(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
    ) -> Result<Vec<NodeId>, StoreError> {
        Ok(self
            .list_vote_value(block_hash, proposal_id)?
            .into_iter()
            .map(|v| v.node_id)
            .collect())
    }

    // ── Tally results ────────────────────────────────────────────────────

    pub fn set_tally_result(
        &self,
        block_hash: &BlockHash,
        result: &TallyResult,
    ) -> Result<(), StoreError> {
        self.save(
            block_hash,
            &prefixed(TALLY_PREFIX, &result.proposal_id),
            result,
        )
    }

    pub fn tally_result(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
    ) -> Result<Option<TallyResult>, StoreError> {
        self.load(block_hash, &prefixed(TALLY_PREFIX, &proposal_id))
    }

    // ── Proposal ID lists ────────────────────────────────────────────────

    fn id_list(&self, block_hash: &BlockHash, key: &[u8]) -> Result<Vec<ProposalId>, StoreError> {
        Ok(self.load(block_hash, key)?.unwrap_or_default())
    }

    pub fn add_voting_proposal_id(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        let mut voting = self.id_list(block_hash, VOTING_LIST_KEY)?;
        voting.push(id);
        self.save(block_hash, VOTING_LIST_KEY, &voting)
    }

    pub fn list_voting_proposal(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Vec<ProposalId>, StoreError> {
        self.id_list(block_hash, VOTING_LIST_KEY)
    }

    pub fn list_end_proposal_id(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Vec<ProposalId>, StoreError> {
        self.id_list(block_hash, END_LIST_KEY)
    }

    pub fn pre_active_proposal_id(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Option<ProposalId>, StoreError> {
        self.load(block_hash, PRE_ACTIVE_ID_KEY)
    }

    fn remove_from_voting(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        let mut voting = self.id_list(block_hash, VOTING_LIST_KEY)?;
        let before = voting.len();
        voting.retain(|v| *v != id);
        if voting.len() == before {
            return Err(StoreError::Corruption(format!(
                "proposal {id} is not in the voting list"
            )));
        }
        self.save(block_hash, VOTING_LIST_KEY, &voting)
    }

    pub fn move_voting_proposal_id_to_end(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        self.remove_from_voting(block_hash, id)?;
        let mut end = self.id_list(block_hash, END_LIST_KEY)?;
        end.push(id);
        self.save(block_hash, END_LIST_KEY, &end)
    }

    pub fn move_voting_proposal_id_to_pre_active(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        if self.pre_active_proposal_id(block_hash)?.is_some() {
            return Err(StoreError::Corruption(
                "pre-active slot is already occupied".to_string(),
            ));
        }
        self.remove_from_voting(block_hash, id)?;
        self.save(block_hash, PRE_ACTIVE_ID_KEY, &id)
    }

    pub fn move_pre_active_proposal_id_to_end(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<(), StoreError> {
        match self.pre_active_proposal_id(block_hash)? {
            Some(current) if current == id => {}
            _ => {
                return Err(StoreError::Corruption(format!(
                    "proposal {id} is not in the pre-active slot"
                )));
            }
        }
        self.state.delete(block_hash, PRE_ACTIVE_ID_KEY)?;
        let mut end = self.id_list(block_hash, END_LIST_KEY)?;
        end.push(id);
        self.save(block_hash, END_LIST_KEY, &end)
    }

    // ── Accumulated verifiers ────────────────────────────────────────────

    /// Merge the given verifier set into the proposal's accumulated set.
    /// Insertion order is preserved and duplicates are dropped, so the
    /// stored bytes are identical on every node.
    pub fn accu_verifiers(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
        verifiers: &[NodeId],
    ) -> Result<(), StoreError> {
        let key = prefixed(ACCU_VERIFIER_PREFIX, &proposal_id);
        let mut accumulated: Vec<NodeId> = self.load(block_hash, &key)?.unwrap_or_default();
        for verifier in verifiers {
            if !accumulated.contains(verifier) {
                accumulated.push(*verifier);
            }
        }
        self.save(block_hash, &key, &accumulated)
    }

    pub fn accu_verifiers_length(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
    ) -> Result<u32, StoreError> {
        let accumulated: Vec<NodeId> = self
            .load(block_hash, &prefixed(ACCU_VERIFIER_PREFIX, &proposal_id))?
            .unwrap_or_default();
        Ok(accumulated.len() as u32)
    }

    // ── Active nodes ─────────────────────────────────────────────────────

    /// Record that a node has adopted the proposal's new version. Adding a
    /// node twice leaves the set unchanged.
    pub fn add_active_node(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
        node_id: NodeId,
    ) -> Result<(), StoreError> {
        let key = prefixed(ACTIVE_NODE_PREFIX, &proposal_id);
        let mut nodes: Vec<NodeId> = self.load(block_hash, &key)?.unwrap_or_default();
        if !nodes.contains(&node_id) {
            nodes.push(node_id);
            self.save(block_hash, &key, &nodes)?;
        }
        Ok(())
    }

    pub fn active_node_list(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
    ) -> Result<Vec<NodeId>, StoreError> {
        Ok(self
            .load(block_hash, &prefixed(ACTIVE_NODE_PREFIX, &proposal_id))?
            .unwrap_or_default())
    }

    pub fn clear_active_nodes(
        &self,
        block_hash: &BlockHash,
        proposal_id: ProposalId,
    ) -> Result<(), StoreError> {
        self.state
            .delete(block_hash, &prefixed(ACTIVE_NODE_PREFIX, &proposal_id))
    }

    // ── Version history ──────────────────────────────────────────────────

    pub fn set_pre_active_version(
        &self,
        block_hash: &BlockHash,
        version: ProtocolVersion,
    ) -> Result<(), StoreError> {
        self.save(block_hash, PRE_ACTIVE_VERSION_KEY, &version)
    }

    pub fn pre_active_version(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Option<ProtocolVersion>, StoreError> {
        self.load(block_hash, PRE_ACTIVE_VERSION_KEY)
    }

    /// Prepend a newly activated version. The history must stay strictly
    /// decreasing in `active_block`.
    pub fn add_active_version(
        &self,
        block_hash: &BlockHash,
        version: ProtocolVersion,
        active_block: u64,
    ) -> Result<(), StoreError> {
        let mut history: Vec<ActiveVersionRecord> =
            self.load(block_hash, ACTIVE_VERSIONS_KEY)?.unwrap_or_default();
        if let Some(newest) = history.first() {
            if newest.active_block >= active_block {
                return Err(StoreError::Corruption(format!(
                    "active version history is not decreasing: {} >= {}",
                    newest.active_block, active_block
                )));
            }
        }
        history.insert(
            0,
            ActiveVersionRecord {
                version,
                active_block,
            },
        );
        self.save(block_hash, ACTIVE_VERSIONS_KEY, &history)
    }

    /// The full history, newest first.
    pub fn list_active_version(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Vec<ActiveVersionRecord>, StoreError> {
        Ok(self.load(block_hash, ACTIVE_VERSIONS_KEY)?.unwrap_or_default())
    }

    pub fn current_active_version(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Option<ProtocolVersion>, StoreError> {
        Ok(self
            .list_active_version(block_hash)?
            .first()
            .map(|record| record.version))
    }

    /// The version in force at `block_number`: the newest record whose
    /// `active_block` does not exceed it.
    pub fn active_version_at(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<Option<ProtocolVersion>, StoreError> {
        Ok(self
            .list_active_version(block_hash)?
            .into_iter()
            .find(|record| record.active_block <= block_number)
            .map(|record| record.version))
    }
}

