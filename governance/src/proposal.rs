//! Proposal variants and their submission-time validation.

use meridian_store::ForkState;
use meridian_types::{BlockHash, GovParams, NodeId, ProposalId, ProtocolVersion};
use serde::{Deserialize, Serialize};

use crate::error::GovError;
use crate::gateway::GovStore;

/// Discriminant of the three proposal kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalType {
    Text,
    Version,
    Cancel,
}

/// A governance proposal: shared header plus type-specific payload.
///
/// A proposal is created by submission, mutated only by tallying (status)
/// and activation (active-block rewrite), and never destroyed — it migrates
/// between the voting, pre-active and end lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    /// The node that submitted the proposal.
    pub proposer: NodeId,
    /// Identifier of the improvement-proposal document this implements.
    pub pip_id: String,
    /// Block height the proposal was submitted at.
    pub submit_block: u64,
    /// Block height at which votes are tallied.
    pub end_voting_block: u64,
    pub payload: ProposalPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProposalPayload {
    /// Opaque text proposal; its content carries no on-chain effect beyond
    /// the recorded tally.
    Text,
    /// Protocol upgrade to `new_version`. Activation is attempted from
    /// `active_block` onward, once per consensus round, until every current
    /// validator has adopted the version.
    Version {
        new_version: ProtocolVersion,
        active_block: u64,
    },
    /// Cancels a version proposal that is still at voting stage.
    Cancel { tobe_canceled: ProposalId },
}

impl Proposal {
    pub fn proposal_type(&self) -> ProposalType {
        match self.payload {
            ProposalPayload::Text => ProposalType::Text,
            ProposalPayload::Version { .. } => ProposalType::Version,
            ProposalPayload::Cancel { .. } => ProposalType::Cancel,
        }
    }

    /// For version proposals, the `(new_version, active_block)` pair.
    pub fn version_payload(&self) -> Option<(ProtocolVersion, u64)> {
        match self.payload {
            ProposalPayload::Version {
                new_version,
                active_block,
            } => Some((new_version, active_block)),
            _ => None,
        }
    }

    /// Submission-time validation. Every rejection here is a business error.
    pub(crate) fn verify<S: ForkState>(
        &self,
        block_number: u64,
        block_hash: &BlockHash,
        store: &GovStore<S>,
        params: &GovParams,
    ) -> Result<(), GovError> {
        if self.id.is_zero() {
            return Err(GovError::EmptyParameter);
        }
        if store.proposal(block_hash, self.id)?.is_some() {
            return Err(GovError::DuplicateProposal);
        }
        if self.pip_id.is_empty() {
            return Err(GovError::EmptyPipId);
        }
        if self.submit_block != block_number {
            return Err(GovError::WrongSubmitBlock);
        }
        self.verify_end_voting_block(params)?;

        match &self.payload {
            ProposalPayload::Text => Ok(()),
            ProposalPayload::Version {
                new_version,
                active_block,
            } => self.verify_version(*new_version, *active_block, block_hash, store),
            ProposalPayload::Cancel { tobe_canceled } => {
                self.verify_cancel(*tobe_canceled, block_hash, store)
            }
        }
    }

    /// The end-voting block must be a consensus-round boundary inside the
    /// voting window. Settlement blocks are excluded so that verifier
    /// accumulation and tallying never land on the same block.
    fn verify_end_voting_block(&self, params: &GovParams) -> Result<(), GovError> {
        let window_end = self
            .submit_block
            .saturating_add(params.max_voting_window_blocks);
        if self.end_voting_block <= self.submit_block || self.end_voting_block > window_end {
            return Err(GovError::InvalidEndVotingBlock);
        }
        if !params.is_round_boundary(self.end_voting_block) {
            return Err(GovError::InvalidEndVotingBlock);
        }
        if params.is_settlement_block(self.end_voting_block) {
            return Err(GovError::InvalidEndVotingBlock);
        }
        Ok(())
    }

    fn verify_version<S: ForkState>(
        &self,
        new_version: ProtocolVersion,
        active_block: u64,
        block_hash: &BlockHash,
        store: &GovStore<S>,
    ) -> Result<(), GovError> {
        if active_block <= self.end_voting_block {
            return Err(GovError::InvalidActiveBlock);
        }
        let active = store
            .current_active_version(block_hash)?
            .ok_or(GovError::MissingActiveVersion)?;
        if !new_version.supersedes(active) {
            return Err(GovError::VersionTooLow);
        }
        // At most one version proposal may exist across voting ∪ pre-active.
        if store.find_voting_version_proposal(block_hash)?.is_some() {
            return Err(GovError::VersionProposalExists);
        }
        if store.pre_active_proposal_id(block_hash)?.is_some() {
            return Err(GovError::VersionProposalExists);
        }
        Ok(())
    }

    fn verify_cancel<S: ForkState>(
        &self,
        tobe_canceled: ProposalId,
        block_hash: &BlockHash,
        store: &GovStore<S>,
    ) -> Result<(), GovError> {
        match store.find_voting_version_proposal(block_hash)? {
            Some(target) if target.id == tobe_canceled => {
                if self.end_voting_block >= target.end_voting_block {
                    return Err(GovError::CancelEndsTooLate);
                }
                Ok(())
            }
            _ => Err(GovError::CancelTargetNotVoting),
        }
    }
}

/// Lifecycle status recorded in a proposal's tally result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Voting,
    Pass,
    Failed,
    PreActive,
    Active,
    Canceled,
}

/// Outcome of tallying one proposal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TallyResult {
    pub proposal_id: ProposalId,
    pub yeas: u32,
    pub nays: u32,
    pub abstentions: u32,
    /// Accumulated verifier count — the denominator of both rates.
    pub accu_verifiers: u32,
    pub status: ProposalStatus,
    /// For a canceled version proposal, the cancel proposal that ended it.
    pub canceled_by: Option<ProposalId>,
}
