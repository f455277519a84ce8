//! Votes cast by verifiers on proposals at voting stage.

use meridian_types::{NodeId, ProposalId};
use serde::{Deserialize, Serialize};

/// A verifier's choice on a proposal.
///
/// The transaction decoder maps the raw wire value to this enum, so an
/// out-of-range option is rejected before it reaches the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoteOption {
    Yes = 1,
    No = 2,
    Abstention = 3,
}

/// A single vote, keyed uniquely by `(proposal_id, node_id)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: ProposalId,
    pub node_id: NodeId,
    pub option: VoteOption,
}
