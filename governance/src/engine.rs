//! The governance engine.
//!
//! One engine instance is constructed at node startup and lives for the
//! process. It is immutable after construction: configuration, the state
//! gateway and the staking handle. The consensus loop serializes all
//! mutating calls per block, so the engine needs no internal locking; read
//! queries may run concurrently from RPC threads.

use std::sync::Arc;

use meridian_crypto::{NodeKeys, VersionSign};
use meridian_store::{ForkState, StoreError};
use meridian_types::{
    BlockHash, GovParams, NodeId, ProposalId, ProtocolVersion, StakingAddress,
};

use crate::error::GovError;
use crate::gateway::GovStore;
use crate::proposal::{Proposal, ProposalPayload, ProposalStatus, ProposalType, TallyResult};
use crate::staking::{NodeStatus, Staking};
use crate::vote::{Vote, VoteOption};

/// The locally running program version together with the node's signature
/// over it, as served to the transaction layer.
#[derive(Clone, Debug)]
pub struct ProgramVersionValue {
    pub version: ProtocolVersion,
    pub sign: VersionSign,
}

/// The process-wide governance instance.
pub struct GovernanceEngine<S: ForkState> {
    store: GovStore<S>,
    staking: Arc<dyn Staking>,
    params: GovParams,
    /// The version this binary was built as; declared and signed on request.
    local_version: ProtocolVersion,
    node_keys: NodeKeys,
}

impl<S: ForkState> GovernanceEngine<S> {
    pub fn new(
        state: S,
        staking: Arc<dyn Staking>,
        params: GovParams,
        local_version: ProtocolVersion,
        node_keys: NodeKeys,
    ) -> Self {
        Self {
            store: GovStore::new(state),
            staking,
            params,
            local_version,
            node_keys,
        }
    }

    /// Seed the active-version history at genesis. Does nothing if a
    /// version is already recorded.
    pub fn bootstrap(
        &self,
        block_hash: &BlockHash,
        genesis_version: ProtocolVersion,
    ) -> Result<(), GovError> {
        if self.store.list_active_version(block_hash)?.is_empty() {
            self.store
                .add_active_version(block_hash, genesis_version, 0)?;
        }
        Ok(())
    }

    // ── Transaction entry points ─────────────────────────────────────────

    /// Submit a proposal and place it on the voting list.
    pub fn submit(
        &self,
        from: &StakingAddress,
        proposal: Proposal,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<(), GovError> {
        tracing::debug!(proposal = ?proposal.id, block = block_number, "submit proposal");
        proposal.verify(block_number, block_hash, &self.store, &self.params)?;
        self.check_verifier(from, &proposal.proposer, block_hash, block_number)?;

        self.store.set_proposal(block_hash, &proposal)?;
        self.store.add_voting_proposal_id(block_hash, proposal.id)?;
        Ok(())
    }

    /// Record a verifier's vote on a voting proposal.
    ///
    /// For version proposals only Yes is accepted, the voter must be
    /// running the proposed version, and the signed version must verify
    /// under the voting node's identity; a valid vote also joins the voter
    /// to the proposal's active-node set.
    pub fn vote(
        &self,
        from: &StakingAddress,
        vote: Vote,
        block_hash: &BlockHash,
        block_number: u64,
        program_version: ProtocolVersion,
        version_sign: &VersionSign,
    ) -> Result<(), GovError> {
        if vote.proposal_id.is_zero() {
            return Err(GovError::EmptyParameter);
        }
        let proposal = self
            .store
            .proposal(block_hash, vote.proposal_id)?
            .ok_or(GovError::ProposalNotFound)?;

        let voting = self.store.list_voting_proposal(block_hash)?;
        if !voting.contains(&vote.proposal_id) {
            return Err(GovError::NotVoting);
        }

        self.check_verifier(from, &vote.node_id, block_hash, block_number)?;

        if let ProposalPayload::Version { new_version, .. } = proposal.payload {
            if vote.option != VoteOption::Yes {
                return Err(GovError::InvalidVoteOption);
            }
            if program_version != new_version {
                return Err(GovError::NotUpgraded);
            }
            if !meridian_crypto::is_signed_by_node(program_version, version_sign, &vote.node_id) {
                return Err(GovError::VersionSignError);
            }
        }

        let voted = self
            .store
            .list_voted_verifier(block_hash, vote.proposal_id)?;
        if voted.contains(&vote.node_id) {
            return Err(GovError::AlreadyVoted);
        }

        self.store
            .set_vote(block_hash, vote.proposal_id, vote.node_id, vote.option)?;
        if proposal.proposal_type() == ProposalType::Version {
            self.store
                .add_active_node(block_hash, vote.proposal_id, vote.node_id)?;
        }
        Ok(())
    }

    /// A node independently announces the program version it is running.
    ///
    /// The declared version must match the active version, a voting version
    /// proposal's new version, or the pre-active version; anything else is
    /// a business error. Matching against active/new versions compares the
    /// high 24 bits only, matching against the pre-active version is exact.
    pub fn declare_version(
        &self,
        from: &StakingAddress,
        node_id: &NodeId,
        declared: ProtocolVersion,
        sign: &VersionSign,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<(), GovError> {
        if !meridian_crypto::is_signed_by_node(declared, sign, node_id) {
            return Err(GovError::VersionSignError);
        }
        self.check_candidate(from, node_id, block_hash, block_number)?;

        let active = self
            .store
            .current_active_version(block_hash)?
            .ok_or(GovError::MissingActiveVersion)?;

        match self.store.find_voting_version_proposal(block_hash)? {
            Some(proposal) => {
                let Some((new_version, _)) = proposal.version_payload() else {
                    return Err(StoreError::Corruption(
                        "voting version proposal has a non-version payload".to_string(),
                    )
                    .into());
                };
                if declared.same_minor(active) {
                    // A node that voted for the upgrade must keep running it.
                    let voted = self.store.list_voted_verifier(block_hash, proposal.id)?;
                    if voted.contains(node_id) && declared != new_version {
                        return Err(GovError::DeclaredVersionShouldBeNew);
                    }
                    self.staking
                        .declare_promote_notify(block_hash, block_number, node_id, declared)?;
                } else if declared.same_minor(new_version) {
                    self.store
                        .add_active_node(block_hash, proposal.id, *node_id)?;
                } else {
                    return Err(GovError::DeclaredVersionMismatch);
                }
            }
            None => {
                let pre_active = self.store.pre_active_version(block_hash)?;
                if declared.same_minor(active) {
                    self.staking
                        .declare_promote_notify(block_hash, block_number, node_id, declared)?;
                } else if pre_active == Some(declared) {
                    if let Some(pre_id) = self.store.pre_active_proposal_id(block_hash)? {
                        self.store.add_active_node(block_hash, pre_id, *node_id)?;
                    }
                    self.staking
                        .declare_promote_notify(block_hash, block_number, node_id, declared)?;
                } else {
                    return Err(GovError::DeclaredVersionNotActive);
                }
            }
        }
        Ok(())
    }

    // ── Block driver ─────────────────────────────────────────────────────

    /// Runs the activation check for a pre-active version proposal, once
    /// per consensus round from its scheduled active block onward.
    pub fn begin_block(&self, block_hash: &BlockHash, block_number: u64) -> Result<(), GovError> {
        let Some(pre_id) = self.store.pre_active_proposal_id(block_hash)? else {
            return Ok(());
        };
        let proposal = self.must_proposal(block_hash, pre_id)?;
        let Some((new_version, active_block)) = proposal.version_payload() else {
            return Ok(());
        };
        if block_number < active_block
            || (block_number - active_block) % self.params.consensus_round_blocks != 0
        {
            return Ok(());
        }

        let validators = self
            .staking
            .list_current_validator_id(block_hash, block_number)?;
        let active_nodes = self.store.active_node_list(block_hash, pre_id)?;
        let upgraded = validators
            .iter()
            .filter(|v| active_nodes.contains(v))
            .count();
        tracing::debug!(
            proposal = ?pre_id,
            block = block_number,
            upgraded,
            total = validators.len(),
            "activation check"
        );
        if upgraded != validators.len() {
            // Not unanimous yet; retry at the next round boundary.
            return Ok(());
        }

        let mut result = self
            .store
            .tally_result(block_hash, pre_id)?
            .ok_or_else(|| {
                StoreError::Corruption(format!("pre-active proposal {pre_id} has no tally result"))
            })?;
        result.status = ProposalStatus::Active;
        self.store.set_tally_result(block_hash, &result)?;

        if active_block != block_number {
            // The scheduled height is superseded by the actual one.
            let mut updated = proposal;
            updated.payload = ProposalPayload::Version {
                new_version,
                active_block: block_number,
            };
            self.store.set_proposal(block_hash, &updated)?;
        }

        self.store
            .move_pre_active_proposal_id_to_end(block_hash, pre_id)?;
        self.store.clear_active_nodes(block_hash, pre_id)?;
        self.store
            .add_active_version(block_hash, new_version, block_number)?;

        tracing::info!(version = %new_version, block = block_number, "protocol version activated");
        Ok(())
    }

    /// Accumulates verifiers on settlement blocks and tallies proposals
    /// whose end-voting block is reached.
    pub fn end_block(&self, block_hash: &BlockHash, block_number: u64) -> Result<(), GovError> {
        let voting = self.store.list_voting_proposal(block_hash)?;
        if voting.is_empty() {
            return Ok(());
        }

        let verifiers = self
            .staking
            .list_verifier_node_id(block_hash, block_number)?;

        if self.params.is_settlement_block(block_number) {
            for id in &voting {
                self.store.accu_verifiers(block_hash, *id, &verifiers)?;
            }
            // Settlement blocks are never end-voting blocks.
            return Ok(());
        }

        for id in voting {
            let proposal = self.must_proposal(block_hash, id)?;
            if proposal.end_voting_block != block_number {
                continue;
            }
            // Final accumulation before the votes are counted.
            self.store.accu_verifiers(block_hash, id, &verifiers)?;
            match proposal.payload {
                ProposalPayload::Text => {
                    self.tally(
                        self.params.text_vote_rate_bps,
                        self.params.text_support_rate_bps,
                        &proposal,
                        block_hash,
                    )?;
                }
                ProposalPayload::Version { new_version, .. } => {
                    self.tally_version(&proposal, new_version, block_hash, block_number)?;
                }
                ProposalPayload::Cancel { tobe_canceled } => {
                    self.tally_cancel(&proposal, tobe_canceled, block_hash)?;
                }
            }
        }
        Ok(())
    }

    /// Hook invoked when a block is confirmed. Governance has nothing to do.
    pub fn confirmed(&self) -> Result<(), GovError> {
        Ok(())
    }

    // ── Tallying ─────────────────────────────────────────────────────────

    /// Tally a text or cancel proposal against strict participation and
    /// approval thresholds. Rates are compared by integer
    /// cross-multiplication so every node reaches the same decision.
    fn tally(
        &self,
        vote_rate_bps: u32,
        support_rate_bps: u32,
        proposal: &Proposal,
        block_hash: &BlockHash,
    ) -> Result<bool, GovError> {
        let verifier_count = self.store.accu_verifiers_length(block_hash, proposal.id)?;
        let votes = self.store.list_vote_value(block_hash, proposal.id)?;
        let (yeas, nays, abstentions) = count_votes(&votes);

        let total = (yeas + nays + abstentions) as u64;
        let denom = verifier_count as u64;
        let pass = total * 10_000 > vote_rate_bps as u64 * denom
            && yeas as u64 * 10_000 > support_rate_bps as u64 * denom;
        let status = if pass {
            ProposalStatus::Pass
        } else {
            ProposalStatus::Failed
        };

        self.store
            .move_voting_proposal_id_to_end(block_hash, proposal.id)?;
        let result = TallyResult {
            proposal_id: proposal.id,
            yeas,
            nays,
            abstentions,
            accu_verifiers: verifier_count,
            status,
            canceled_by: None,
        };
        tracing::debug!(
            proposal = ?proposal.id,
            yeas,
            nays,
            abstentions,
            verifiers = verifier_count,
            ?status,
            "proposal tallied"
        );
        self.store.set_tally_result(block_hash, &result)?;
        Ok(pass)
    }

    /// Tally a version proposal. Only Yes votes exist for version
    /// proposals, and the approval threshold is non-strict.
    fn tally_version(
        &self,
        proposal: &Proposal,
        new_version: ProtocolVersion,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<(), GovError> {
        let verifier_count = self.store.accu_verifiers_length(block_hash, proposal.id)?;
        let votes = self.store.list_vote_value(block_hash, proposal.id)?;
        let yeas = votes.len() as u32;

        let pass = verifier_count > 0
            && yeas as u64 * 10_000
                >= self.params.version_support_rate_bps as u64 * verifier_count as u64;

        let status = if pass {
            self.store
                .move_voting_proposal_id_to_pre_active(block_hash, proposal.id)?;
            self.store.set_pre_active_version(block_hash, new_version)?;
            let active_nodes = self.store.active_node_list(block_hash, proposal.id)?;
            self.staking.proposal_passed_notify(
                block_hash,
                block_number,
                &active_nodes,
                new_version,
            )?;
            ProposalStatus::PreActive
        } else {
            self.store
                .move_voting_proposal_id_to_end(block_hash, proposal.id)?;
            ProposalStatus::Failed
        };

        let result = TallyResult {
            proposal_id: proposal.id,
            yeas,
            nays: 0,
            abstentions: 0,
            accu_verifiers: verifier_count,
            status,
            canceled_by: None,
        };
        tracing::debug!(
            proposal = ?proposal.id,
            yeas,
            verifiers = verifier_count,
            ?status,
            "version proposal tallied"
        );
        self.store.set_tally_result(block_hash, &result)?;
        Ok(())
    }

    /// Tally a cancel proposal; on pass, terminate the targeted version
    /// proposal.
    fn tally_cancel(
        &self,
        cancel: &Proposal,
        target_id: ProposalId,
        block_hash: &BlockHash,
    ) -> Result<(), GovError> {
        let pass = self.tally(
            self.params.cancel_vote_rate_bps,
            self.params.cancel_support_rate_bps,
            cancel,
            block_hash,
        )?;
        if !pass {
            return Ok(());
        }

        let target = self.must_proposal(block_hash, target_id)?;
        if target.proposal_type() != ProposalType::Version {
            return Err(GovError::CancelTargetNotVoting);
        }
        let voting = self.store.list_voting_proposal(block_hash)?;
        if !voting.contains(&target_id) {
            return Err(GovError::CancelTargetNotVoting);
        }

        // The target never reaches its own end-voting block; record its
        // terminal tally here.
        let votes = self.store.list_vote_value(block_hash, target_id)?;
        let (yeas, nays, abstentions) = count_votes(&votes);
        let result = TallyResult {
            proposal_id: target_id,
            yeas,
            nays,
            abstentions,
            accu_verifiers: self.store.accu_verifiers_length(block_hash, target_id)?,
            status: ProposalStatus::Canceled,
            canceled_by: Some(cancel.id),
        };
        self.store.set_tally_result(block_hash, &result)?;
        self.store.clear_active_nodes(block_hash, target_id)?;
        self.store
            .move_voting_proposal_id_to_end(block_hash, target_id)?;

        tracing::info!(proposal = ?target_id, canceled_by = ?cancel.id, "version proposal canceled");
        Ok(())
    }

    // ── Read queries ─────────────────────────────────────────────────────

    pub fn get_proposal(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<Proposal, GovError> {
        self.store
            .proposal(block_hash, id)?
            .ok_or(GovError::ProposalNotFound)
    }

    pub fn get_tally_result(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<TallyResult, GovError> {
        self.store
            .tally_result(block_hash, id)?
            .ok_or(GovError::TallyResultNotFound)
    }

    /// All proposals: voting, then ended, then the pre-active one.
    pub fn list_proposal(&self, block_hash: &BlockHash) -> Result<Vec<Proposal>, GovError> {
        let mut ids = self.store.list_voting_proposal(block_hash)?;
        ids.extend(self.store.list_end_proposal_id(block_hash)?);
        if let Some(pre_active) = self.store.pre_active_proposal_id(block_hash)? {
            ids.push(pre_active);
        }
        ids.into_iter()
            .map(|id| self.must_proposal(block_hash, id))
            .collect()
    }

    /// The locally running version, signed with the node key.
    pub fn get_program_version(&self) -> ProgramVersionValue {
        let sign = meridian_crypto::sign_version(self.local_version, &self.node_keys);
        ProgramVersionValue {
            version: self.local_version,
            sign,
        }
    }

    pub fn get_current_active_version(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Option<ProtocolVersion>, GovError> {
        Ok(self.store.current_active_version(block_hash)?)
    }

    pub fn get_pre_active_version(
        &self,
        block_hash: &BlockHash,
    ) -> Result<Option<ProtocolVersion>, GovError> {
        Ok(self.store.pre_active_version(block_hash)?)
    }

    /// The version in force at `block_number`.
    pub fn get_active_version(
        &self,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<Option<ProtocolVersion>, GovError> {
        Ok(self.store.active_version_at(block_hash, block_number)?)
    }

    // ── Caller checks ────────────────────────────────────────────────────

    /// The acting node must be a verifier whose staking address matches the
    /// transaction sender.
    fn check_verifier(
        &self,
        from: &StakingAddress,
        node_id: &NodeId,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<(), GovError> {
        let verifiers = self.staking.verifier_list(block_hash, block_number)?;
        let Some(verifier) = verifiers.iter().find(|v| v.node_id == *node_id) else {
            return Err(GovError::NotVerifier);
        };
        if verifier.staking_address != *from {
            return Err(GovError::NotStakingAddress);
        }
        if verifier.status == NodeStatus::Invalid {
            return Err(GovError::InvalidVerifierStatus);
        }
        match self.staking.candidate_info(block_hash, node_id)? {
            Some(candidate) if candidate.status == NodeStatus::Valid => Ok(()),
            Some(_) => Err(GovError::InvalidVerifierStatus),
            None => Err(GovError::MissingCandidateInfo),
        }
    }

    /// The acting node must be a candidate (a superset of verifiers) whose
    /// staking address matches the transaction sender.
    fn check_candidate(
        &self,
        from: &StakingAddress,
        node_id: &NodeId,
        block_hash: &BlockHash,
        block_number: u64,
    ) -> Result<(), GovError> {
        let candidates = self.staking.candidate_list(block_hash, block_number)?;
        let Some(candidate) = candidates.iter().find(|c| c.node_id == *node_id) else {
            return Err(GovError::NotCandidate);
        };
        if candidate.staking_address != *from {
            return Err(GovError::NotStakingAddress);
        }
        Ok(())
    }

    /// A proposal the state machine itself placed on a list; absence means
    /// corrupted state, not caller error.
    fn must_proposal(
        &self,
        block_hash: &BlockHash,
        id: ProposalId,
    ) -> Result<Proposal, GovError> {
        self.store.proposal(block_hash, id)?.ok_or_else(|| {
            StoreError::Corruption(format!("listed proposal {id} has no record")).into()
        })
    }
}

fn count_votes(votes: &[Vote]) -> (u32, u32, u32) {
    let (mut yeas, mut nays, mut abstentions) = (0u32, 0u32, 0u32);
    for vote in votes {
        match vote.option {
            VoteOption::Yes => yeas += 1,
            VoteOption::No => nays += 1,
            VoteOption::Abstention => abstentions += 1,
        }
    }
    (yeas, nays, abstentions)
}
