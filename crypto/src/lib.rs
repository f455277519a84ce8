//! Cryptography for the Meridian protocol: node signing keys and the
//! program-version signature scheme consumed by governance.

pub mod keys;
pub mod version_sign;

pub use keys::NodeKeys;
pub use version_sign::{is_signed_by_node, sign_version, VersionSign};
