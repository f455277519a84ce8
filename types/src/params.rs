//! Governance parameters.
//!
//! All tally thresholds are expressed in basis points (10000 = 100%) so that
//! every node reaches the same pass/fail decision with pure integer
//! arithmetic.

use serde::{Deserialize, Serialize};

/// Chain-wide governance configuration, fixed at node construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GovParams {
    /// Number of blocks in one consensus round. The validator set is stable
    /// within a round.
    pub consensus_round_blocks: u64,

    /// Number of blocks in one staking settlement epoch. The verifier set
    /// may change immediately after a settlement block.
    pub settlement_epoch_blocks: u64,

    /// Longest allowed voting window, in blocks from submission.
    pub max_voting_window_blocks: u64,

    /// Text proposal participation threshold (basis points of accumulated
    /// verifiers, strict).
    pub text_vote_rate_bps: u32,

    /// Text proposal approval threshold (basis points, strict).
    pub text_support_rate_bps: u32,

    /// Cancel proposal participation threshold (basis points, strict).
    pub cancel_vote_rate_bps: u32,

    /// Cancel proposal approval threshold (basis points, strict).
    pub cancel_support_rate_bps: u32,

    /// Version proposal approval threshold (basis points, non-strict).
    pub version_support_rate_bps: u32,
}

impl GovParams {
    /// Whether `block_number` is the last block of a settlement epoch.
    pub fn is_settlement_block(&self, block_number: u64) -> bool {
        block_number > 0 && block_number % self.settlement_epoch_blocks == 0
    }

    /// Whether `block_number` is a consensus-round boundary.
    pub fn is_round_boundary(&self, block_number: u64) -> bool {
        block_number > 0 && block_number % self.consensus_round_blocks == 0
    }
}

impl Default for GovParams {
    fn default() -> Self {
        Self {
            consensus_round_blocks: 250,
            settlement_epoch_blocks: 27_500,
            max_voting_window_blocks: 1_209_600, // two weeks of one-second blocks
            text_vote_rate_bps: 5000,            // 50%
            text_support_rate_bps: 6670,         // 66.7%
            cancel_vote_rate_bps: 5000,
            cancel_support_rate_bps: 6670,
            version_support_rate_bps: 6670,
        }
    }
}
