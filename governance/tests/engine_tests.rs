//! Unit-level engine tests, run as an integration test so this crate's
//! dev-dependency on `meridian_nullables` (which itself depends on
//! `meridian_governance`) doesn't create two compiled instances of this
//! crate the way embedding them under `#[cfg(test)] mod tests` would.

use std::sync::Arc;

use meridian_crypto::{sign_version, NodeKeys};
use meridian_governance::staking::Staking;
use meridian_governance::{
    GovError, GovStore, GovernanceEngine, Proposal, ProposalPayload, ProposalStatus, Vote,
    VoteOption,
};
use meridian_nullables::{NullForkState, NullStaking};
use meridian_types::{
    BlockHash, GovParams, NodeId, ProposalId, ProtocolVersion, StakingAddress,
};

const ACTIVE: ProtocolVersion = ProtocolVersion::new(1, 1, 0);
const NEW: ProtocolVersion = ProtocolVersion::new(1, 2, 0);

fn test_params() -> GovParams {
    GovParams {
        consensus_round_blocks: 10,
        settlement_epoch_blocks: 30,
        max_voting_window_blocks: 1000,
        ..GovParams::default()
    }
}

fn hash(n: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    BlockHash::new(bytes)
}

fn pid(n: u8) -> ProposalId {
    ProposalId::new([n; 32])
}

fn node_key(i: u8) -> NodeKeys {
    NodeKeys::from_seed(&[i; 32])
}

fn node_id(i: u8) -> NodeId {
    node_key(i).node_id()
}

fn addr(i: u8) -> StakingAddress {
    StakingAddress::new([i; 20])
}

struct Fixture {
    engine: GovernanceEngine<std::sync::Arc<NullForkState>>,
    state: std::sync::Arc<NullForkState>,
    staking: std::sync::Arc<NullStaking>,
}

impl Fixture {
    /// Engine over in-memory state with `verifiers` registered nodes
    /// (node 1..=verifiers), bootstrapped at version 1.1.0.
    fn with_params(verifiers: u8, params: GovParams) -> Self {
        let state = std::sync::Arc::new(NullForkState::new());
        state.add_block(hash(0), None);
        let staking = std::sync::Arc::new(NullStaking::new());
        for i in 1..=verifiers {
            staking.add_verifier(node_id(i), addr(i));
        }
        let staking_dyn: Arc<dyn Staking> = staking.clone();
        let engine = GovernanceEngine::new(
            std::sync::Arc::clone(&state),
            staking_dyn,
            params,
            NEW,
            node_key(1),
        );
        engine.bootstrap(&hash(0), ACTIVE).unwrap();
        Self {
            engine,
            state,
            staking,
        }
    }

    fn new(verifiers: u8) -> Self {
        Self::with_params(verifiers, test_params())
    }

    fn chain_to(&self, n: u64) {
        for b in 1..=n {
            self.state.add_block(hash(b), Some(hash(b - 1)));
        }
    }

    fn gov_store(&self) -> GovStore<std::sync::Arc<NullForkState>> {
        GovStore::new(std::sync::Arc::clone(&self.state))
    }

    fn text_proposal(&self, id: u8, submit: u64, end: u64) -> Proposal {
        Proposal {
            id: pid(id),
            proposer: node_id(1),
            pip_id: format!("PIP-{id}"),
            submit_block: submit,
            end_voting_block: end,
            payload: ProposalPayload::Text,
        }
    }

    fn version_proposal(&self, id: u8, submit: u64, end: u64, active: u64) -> Proposal {
        Proposal {
            id: pid(id),
            proposer: node_id(1),
            pip_id: format!("PIP-{id}"),
            submit_block: submit,
            end_voting_block: end,
            payload: ProposalPayload::Version {
                new_version: NEW,
                active_block: active,
            },
        }
    }

    fn cancel_proposal(&self, id: u8, submit: u64, end: u64, target: ProposalId) -> Proposal {
        Proposal {
            id: pid(id),
            proposer: node_id(1),
            pip_id: format!("PIP-{id}"),
            submit_block: submit,
            end_voting_block: end,
            payload: ProposalPayload::Cancel {
                tobe_canceled: target,
            },
        }
    }

    fn vote_yes_on_version(&self, voter: u8, proposal: ProposalId, block: u64) {
        let sign = sign_version(NEW, &node_key(voter));
        self.engine
            .vote(
                &addr(voter),
                Vote {
                    proposal_id: proposal,
                    node_id: node_id(voter),
                    option: VoteOption::Yes,
                },
                &hash(block),
                block,
                NEW,
                &sign,
            )
            .unwrap();
    }
}

// ── Submit ───────────────────────────────────────────────────────────

#[test]
fn submit_text_proposal_enters_voting_list() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let proposal = fx.text_proposal(1, 10, 100);
    fx.engine
        .submit(&addr(1), proposal.clone(), &hash(10), 10)
        .unwrap();

    assert_eq!(fx.engine.get_proposal(&hash(10), pid(1)).unwrap(), proposal);
    assert_eq!(
        fx.gov_store().list_voting_proposal(&hash(10)).unwrap(),
        vec![pid(1)]
    );
}

#[test]
fn duplicate_proposal_id_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(11);
    fx.engine
        .submit(&addr(1), fx.text_proposal(1, 10, 100), &hash(10), 10)
        .unwrap();
    let err = fx
        .engine
        .submit(&addr(1), fx.text_proposal(1, 11, 100), &hash(11), 11)
        .unwrap_err();
    assert!(matches!(err, GovError::DuplicateProposal));
    assert!(err.is_business());
}

#[test]
fn submit_from_non_verifier_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let mut proposal = fx.text_proposal(1, 10, 100);
    proposal.proposer = node_id(9);
    let err = fx
        .engine
        .submit(&addr(9), proposal, &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::NotVerifier));
}

#[test]
fn submit_with_wrong_staking_address_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let err = fx
        .engine
        .submit(&addr(2), fx.text_proposal(1, 10, 100), &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::NotStakingAddress));
}

#[test]
fn end_voting_block_must_be_round_boundary() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let err = fx
        .engine
        .submit(&addr(1), fx.text_proposal(1, 10, 105), &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidEndVotingBlock));
}

#[test]
fn end_voting_block_must_not_be_settlement() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    // 60 is both a round boundary and a settlement block.
    let err = fx
        .engine
        .submit(&addr(1), fx.text_proposal(1, 10, 60), &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidEndVotingBlock));
}

#[test]
fn end_voting_block_must_be_inside_window() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let err = fx
        .engine
        .submit(&addr(1), fx.text_proposal(1, 10, 1020), &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidEndVotingBlock));
}

#[test]
fn only_one_version_proposal_at_a_time() {
    let fx = Fixture::new(4);
    fx.chain_to(11);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    let err = fx
        .engine
        .submit(&addr(1), fx.version_proposal(2, 11, 100, 200), &hash(11), 11)
        .unwrap_err();
    assert!(matches!(err, GovError::VersionProposalExists));
}

#[test]
fn version_active_block_must_follow_end_voting() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let err = fx
        .engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 100), &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidActiveBlock));
}

#[test]
fn version_must_supersede_active() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let mut proposal = fx.version_proposal(1, 10, 100, 200);
    proposal.payload = ProposalPayload::Version {
        new_version: ProtocolVersion::new(1, 1, 5),
        active_block: 200,
    };
    let err = fx
        .engine
        .submit(&addr(1), proposal, &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::VersionTooLow));
}

#[test]
fn cancel_must_target_voting_version() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let err = fx
        .engine
        .submit(
            &addr(1),
            fx.cancel_proposal(1, 10, 50, pid(9)),
            &hash(10),
            10,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::CancelTargetNotVoting));
}

#[test]
fn cancel_must_end_before_target() {
    let fx = Fixture::new(4);
    fx.chain_to(11);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    let err = fx
        .engine
        .submit(
            &addr(1),
            fx.cancel_proposal(2, 11, 100, pid(1)),
            &hash(11),
            11,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::CancelEndsTooLate));
}

// ── Vote ─────────────────────────────────────────────────────────────

#[test]
fn vote_on_unknown_proposal_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let sign = sign_version(NEW, &node_key(1));
    let err = fx
        .engine
        .vote(
            &addr(1),
            Vote {
                proposal_id: pid(1),
                node_id: node_id(1),
                option: VoteOption::Yes,
            },
            &hash(10),
            10,
            NEW,
            &sign,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::ProposalNotFound));
}

#[test]
fn duplicate_vote_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    fx.vote_yes_on_version(1, pid(1), 20);

    let sign = sign_version(NEW, &node_key(1));
    let err = fx
        .engine
        .vote(
            &addr(1),
            Vote {
                proposal_id: pid(1),
                node_id: node_id(1),
                option: VoteOption::Yes,
            },
            &hash(20),
            20,
            NEW,
            &sign,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::AlreadyVoted));
    assert_eq!(err.to_string(), "node has voted this proposal.");
}

#[test]
fn version_vote_must_be_yes() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    let sign = sign_version(NEW, &node_key(1));
    let err = fx
        .engine
        .vote(
            &addr(1),
            Vote {
                proposal_id: pid(1),
                node_id: node_id(1),
                option: VoteOption::No,
            },
            &hash(20),
            20,
            NEW,
            &sign,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::InvalidVoteOption));
}

#[test]
fn version_vote_requires_upgraded_node() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    let sign = sign_version(ACTIVE, &node_key(1));
    let err = fx
        .engine
        .vote(
            &addr(1),
            Vote {
                proposal_id: pid(1),
                node_id: node_id(1),
                option: VoteOption::Yes,
            },
            &hash(20),
            20,
            ACTIVE,
            &sign,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::NotUpgraded));
}

#[test]
fn version_vote_requires_valid_signature() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    // Signed by a different node.
    let sign = sign_version(NEW, &node_key(2));
    let err = fx
        .engine
        .vote(
            &addr(1),
            Vote {
                proposal_id: pid(1),
                node_id: node_id(1),
                option: VoteOption::Yes,
            },
            &hash(20),
            20,
            NEW,
            &sign,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::VersionSignError));
    assert_eq!(err.to_string(), "version sign error.");
}

#[test]
fn vote_after_tally_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(101);
    fx.engine
        .submit(&addr(1), fx.text_proposal(1, 10, 100), &hash(10), 10)
        .unwrap();
    fx.engine.end_block(&hash(100), 100).unwrap();

    let sign = sign_version(NEW, &node_key(1));
    let err = fx
        .engine
        .vote(
            &addr(1),
            Vote {
                proposal_id: pid(1),
                node_id: node_id(1),
                option: VoteOption::Yes,
            },
            &hash(101),
            101,
            NEW,
            &sign,
        )
        .unwrap_err();
    assert!(matches!(err, GovError::NotVoting));
    assert_eq!(err.to_string(), "Proposal is not at voting stage.");
}

// ── DeclareVersion ───────────────────────────────────────────────────

#[test]
fn declare_mismatched_version_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();

    let declared = ProtocolVersion::new(1, 3, 0);
    let sign = sign_version(declared, &node_key(2));
    let err = fx
        .engine
        .declare_version(&addr(2), &node_id(2), declared, &sign, &hash(20), 20)
        .unwrap_err();
    assert!(matches!(err, GovError::DeclaredVersionMismatch));
    assert_eq!(
        err.to_string(),
        "declared version neither equals active version nor new version."
    );
}

#[test]
fn declare_new_version_joins_active_set() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();

    // A candidate that is not a verifier can still declare.
    fx.staking.add_candidate(node_id(9), addr(9));
    let declared = ProtocolVersion::new(1, 2, 3);
    let sign = sign_version(declared, &node_key(9));
    fx.engine
        .declare_version(&addr(9), &node_id(9), declared, &sign, &hash(20), 20)
        .unwrap();

    let active = fx.gov_store().active_node_list(&hash(20), pid(1)).unwrap();
    assert!(active.contains(&node_id(9)));
    assert!(fx.staking.promote_notices().is_empty());
}

#[test]
fn declare_active_version_notifies_promotion() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();

    // Patch level differs from the active version; high 24 bits match.
    let declared = ProtocolVersion::new(1, 1, 7);
    let sign = sign_version(declared, &node_key(2));
    fx.engine
        .declare_version(&addr(2), &node_id(2), declared, &sign, &hash(20), 20)
        .unwrap();

    assert_eq!(fx.staking.promote_notices(), vec![(node_id(2), declared)]);
}

#[test]
fn voted_node_must_keep_running_the_new_version() {
    let fx = Fixture::new(4);
    fx.chain_to(20);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    fx.vote_yes_on_version(2, pid(1), 15);

    let declared = ProtocolVersion::new(1, 1, 0);
    let sign = sign_version(declared, &node_key(2));
    let err = fx
        .engine
        .declare_version(&addr(2), &node_id(2), declared, &sign, &hash(20), 20)
        .unwrap_err();
    assert!(matches!(err, GovError::DeclaredVersionShouldBeNew));
}

#[test]
fn declare_without_voting_proposal() {
    let fx = Fixture::new(4);
    fx.chain_to(10);

    let declared = ProtocolVersion::new(1, 1, 3);
    let sign = sign_version(declared, &node_key(2));
    fx.engine
        .declare_version(&addr(2), &node_id(2), declared, &sign, &hash(10), 10)
        .unwrap();
    assert_eq!(fx.staking.promote_notices(), vec![(node_id(2), declared)]);

    let wrong = ProtocolVersion::new(1, 3, 0);
    let sign = sign_version(wrong, &node_key(2));
    let err = fx
        .engine
        .declare_version(&addr(2), &node_id(2), wrong, &sign, &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::DeclaredVersionNotActive));
}

#[test]
fn declare_with_bad_signature_rejected() {
    let fx = Fixture::new(4);
    fx.chain_to(10);
    let declared = ProtocolVersion::new(1, 1, 0);
    let sign = sign_version(declared, &node_key(3));
    let err = fx
        .engine
        .declare_version(&addr(2), &node_id(2), declared, &sign, &hash(10), 10)
        .unwrap_err();
    assert!(matches!(err, GovError::VersionSignError));
}

// ── Block driver and tallying ────────────────────────────────────────

#[test]
fn settlement_block_accumulates_verifiers() {
    let fx = Fixture::new(4);
    fx.chain_to(30);
    fx.engine
        .submit(&addr(1), fx.text_proposal(1, 10, 100), &hash(10), 10)
        .unwrap();
    fx.engine.end_block(&hash(30), 30).unwrap();

    assert_eq!(
        fx.gov_store()
            .accu_verifiers_length(&hash(30), pid(1))
            .unwrap(),
        4
    );
    // No tally on a settlement block.
    assert_eq!(
        fx.gov_store().list_voting_proposal(&hash(30)).unwrap(),
        vec![pid(1)]
    );
}

#[test]
fn text_tally_passes_over_both_thresholds() {
    let fx = Fixture::new(4);
    fx.chain_to(100);
    fx.engine
        .submit(&addr(1), fx.text_proposal(1, 10, 100), &hash(10), 10)
        .unwrap();
    for voter in 1..=3 {
        let sign = sign_version(NEW, &node_key(voter));
        fx.engine
            .vote(
                &addr(voter),
                Vote {
                    proposal_id: pid(1),
                    node_id: node_id(voter),
                    option: VoteOption::Yes,
                },
                &hash(20),
                20,
                NEW,
                &sign,
            )
            .unwrap();
    }
    fx.engine.end_block(&hash(100), 100).unwrap();

    let result = fx.engine.get_tally_result(&hash(100), pid(1)).unwrap();
    assert_eq!(result.status, ProposalStatus::Pass);
    assert_eq!(result.yeas, 3);
    assert_eq!(result.accu_verifiers, 4);
    assert_eq!(
        fx.gov_store().list_end_proposal_id(&hash(100)).unwrap(),
        vec![pid(1)]
    );
}

#[test]
fn text_support_exactly_at_threshold_fails() {
    // Strict comparison: 3 of 4 yeas == 75.00% does not clear 7500 bps.
    let params = GovParams {
        text_support_rate_bps: 7500,
        ..test_params()
    };
    let fx = Fixture::with_params(4, params);
    fx.chain_to(100);
    fx.engine
        .submit(&addr(1), fx.text_proposal(1, 10, 100), &hash(10), 10)
        .unwrap();
    for voter in 1..=3 {
        let sign = sign_version(NEW, &node_key(voter));
        fx.engine
            .vote(
                &addr(voter),
                Vote {
                    proposal_id: pid(1),
                    node_id: node_id(voter),
                    option: VoteOption::Yes,
                },
                &hash(20),
                20,
                NEW,
                &sign,
            )
            .unwrap();
    }
    fx.engine.end_block(&hash(100), 100).unwrap();

    let result = fx.engine.get_tally_result(&hash(100), pid(1)).unwrap();
    assert_eq!(result.status, ProposalStatus::Failed);
}

#[test]
fn version_support_exactly_at_threshold_passes() {
    // Non-strict comparison: 3 of 4 yeas == 75.00% clears 7500 bps.
    let params = GovParams {
        version_support_rate_bps: 7500,
        ..test_params()
    };
    let fx = Fixture::with_params(4, params);
    fx.chain_to(100);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    for voter in 1..=3 {
        fx.vote_yes_on_version(voter, pid(1), 20);
    }
    fx.engine.end_block(&hash(100), 100).unwrap();

    let result = fx.engine.get_tally_result(&hash(100), pid(1)).unwrap();
    assert_eq!(result.status, ProposalStatus::PreActive);
}

#[test]
fn vote_on_end_voting_block_is_counted() {
    let fx = Fixture::new(4);
    fx.chain_to(100);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    for voter in 1..=3 {
        fx.vote_yes_on_version(voter, pid(1), 20);
    }
    // The last vote lands on the end-voting block itself.
    fx.vote_yes_on_version(4, pid(1), 100);
    fx.engine.end_block(&hash(100), 100).unwrap();

    let result = fx.engine.get_tally_result(&hash(100), pid(1)).unwrap();
    assert_eq!(result.yeas, 4);
    assert_eq!(result.status, ProposalStatus::PreActive);
}

#[test]
fn list_proposal_spans_all_lists() {
    let fx = Fixture::new(4);
    fx.chain_to(100);
    fx.engine
        .submit(&addr(1), fx.version_proposal(1, 10, 100, 200), &hash(10), 10)
        .unwrap();
    fx.engine
        .submit(&addr(1), fx.text_proposal(2, 10, 80), &hash(10), 10)
        .unwrap();
    for voter in 1..=4 {
        fx.vote_yes_on_version(voter, pid(1), 20);
    }
    fx.engine.end_block(&hash(80), 80).unwrap();
    fx.engine.end_block(&hash(100), 100).unwrap();

    // Text proposal ended, version proposal pre-active.
    let proposals = fx.engine.list_proposal(&hash(100)).unwrap();
    assert_eq!(proposals.len(), 2);
    assert_eq!(
        fx.engine.get_pre_active_version(&hash(100)).unwrap(),
        Some(NEW)
    );
}

#[test]
fn program_version_is_signed_by_the_node_key() {
    let fx = Fixture::new(4);
    let value = fx.engine.get_program_version();
    assert_eq!(value.version, NEW);
    assert!(meridian_crypto::is_signed_by_node(
        value.version,
        &value.sign,
        &node_id(1)
    ));
}
