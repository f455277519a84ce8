use crate::staking::StakingError;
use meridian_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the governance core.
///
/// Business errors are caller-induced: the transaction layer charges gas for
/// them but the block stays valid. System errors (`Store`, `Staking`) abort
/// the enclosing operation and are fatal for the block being processed.
#[derive(Debug, Error)]
pub enum GovError {
    #[error("empty parameter detected.")]
    EmptyParameter,

    #[error("incorrect proposal ID.")]
    ProposalNotFound,

    #[error("proposal ID already exists.")]
    DuplicateProposal,

    #[error("PIP ID is empty.")]
    EmptyPipId,

    #[error("submit block is not the current block.")]
    WrongSubmitBlock,

    #[error("end-voting block is not a round boundary inside the voting window.")]
    InvalidEndVotingBlock,

    #[error("active block must be after the end-voting block.")]
    InvalidActiveBlock,

    #[error("new version should be larger than current active version.")]
    VersionTooLow,

    #[error("another version proposal is voting or pre-active.")]
    VersionProposalExists,

    #[error("to-be-canceled proposal is not a version proposal at voting stage.")]
    CancelTargetNotVoting,

    #[error("cancel proposal must end before the proposal it cancels.")]
    CancelEndsTooLate,

    #[error("Proposal is not at voting stage.")]
    NotVoting,

    #[error("vote option is error.")]
    InvalidVoteOption,

    #[error("version sign error.")]
    VersionSignError,

    #[error("node has not upgraded to the new version.")]
    NotUpgraded,

    #[error("node has voted this proposal.")]
    AlreadyVoted,

    #[error("declared version neither equals active version nor new version.")]
    DeclaredVersionMismatch,

    #[error("declared version should be the proposal's new version.")]
    DeclaredVersionShouldBeNew,

    #[error("there's no version proposal at voting stage, declared version should be active or pre-active version.")]
    DeclaredVersionNotActive,

    #[error("wrong current active version.")]
    MissingActiveVersion,

    #[error("tally result not found.")]
    TallyResultNotFound,

    #[error("tx sender is not a verifier.")]
    NotVerifier,

    #[error("tx sender is not a candidate.")]
    NotCandidate,

    #[error("tx sender should be node's staking address.")]
    NotStakingAddress,

    #[error("verifier's status is invalid.")]
    InvalidVerifierStatus,

    #[error("cannot get verifier's detail info.")]
    MissingCandidateInfo,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Staking(#[from] StakingError),
}

impl GovError {
    /// Whether this error was caller-induced. The transaction layer charges
    /// gas for business errors; system errors fault the block.
    pub fn is_business(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Staking(_))
    }
}
