//! Fundamental types for the Meridian protocol.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: block hashes, proposal identifiers, node identity, the packed
//! protocol version, and governance parameters. Signing key material lives
//! in `meridian_crypto`.

pub mod hash;
pub mod node;
pub mod params;
pub mod version;

pub use hash::{BlockHash, ProposalId};
pub use node::{NodeId, StakingAddress};
pub use params::GovParams;
pub use version::{ActiveVersionRecord, ProtocolVersion};
