//! Node identity: consensus node identifiers and staking account addresses.

use crate::hash::write_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node identifier.
///
/// The identifier is the raw bytes of the node's Ed25519 verifying key, so
/// a signature over a declared program version can be checked against the
/// declaring node without any registry lookup. `meridian_crypto` owns the
/// signing side.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; 32]);

impl NodeId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId(")?;
        write_hex(f, &self.0[..4])?;
        write!(f, "…)")
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

/// A 20-byte staking account address. Governance transactions must be sent
/// from the staking address that backs the acting node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StakingAddress([u8; 20]);

impl StakingAddress {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for StakingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StakingAddress(")?;
        write_hex(f, &self.0[..4])?;
        write!(f, "…)")
    }
}

impl fmt::Display for StakingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}
