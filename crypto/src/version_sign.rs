//! The program-version signature scheme used by governance.
//!
//! A node proves which binary it runs by signing the packed protocol
//! version with its node keys; governance checks that signature against the
//! declaring node's identity. The signed message is the version's
//! big-endian bytes, so builds differing only in patch level produce
//! different signatures even though they run the same protocol.

use ed25519_dalek::{Signer, Verifier, VerifyingKey};
use meridian_types::{NodeId, ProtocolVersion};
use std::fmt;

use crate::keys::NodeKeys;

/// A node's signature over a packed program version, as carried by vote
/// and declare-version transactions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VersionSign([u8; 64]);

impl VersionSign {
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for VersionSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionSign(")?;
        for b in &self.0[..4] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "…)")
    }
}

/// Sign a packed program version with the node's keys.
pub fn sign_version(version: ProtocolVersion, keys: &NodeKeys) -> VersionSign {
    let sig = keys.signing_key().sign(&version.raw().to_be_bytes());
    VersionSign(sig.to_bytes())
}

/// Verify a version signature against the declaring node's identity.
///
/// Returns `true` if `sign` is a valid signature of `version` under the
/// node's verifying key. Malformed node identifiers verify as `false`.
pub fn is_signed_by_node(version: ProtocolVersion, sign: &VersionSign, node: &NodeId) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(node.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sign.0);
    verifying_key
        .verify(&version.raw().to_be_bytes(), &sig)
        .is_ok()
}
