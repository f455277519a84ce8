//! Node signing keys.

use ed25519_dalek::SigningKey;
use meridian_types::NodeId;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A node's Ed25519 signing identity.
///
/// The verifying key doubles as the node's on-chain [`NodeId`]; the secret
/// half never leaves this struct and is zeroized on drop. There is no way
/// to read the secret back out, only to sign with it.
pub struct NodeKeys {
    node_id: NodeId,
    secret: SecretBytes,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct SecretBytes([u8; 32]);

impl NodeKeys {
    /// Generate fresh keys from a secure random source.
    pub fn generate() -> Self {
        Self::from_signing(SigningKey::generate(&mut OsRng))
    }

    /// Derive keys deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing(SigningKey::from_bytes(seed))
    }

    fn from_signing(signing: SigningKey) -> Self {
        Self {
            node_id: NodeId::new(signing.verifying_key().to_bytes()),
            secret: SecretBytes(signing.to_bytes()),
        }
    }

    /// The on-chain identifier these keys sign as.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret.0)
    }
}
