//! Nullable infrastructure for deterministic governance testing.
//!
//! External collaborators (fork-aware storage, staking) are abstracted
//! behind traits. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod staking;
pub mod store;

pub use staking::NullStaking;
pub use store::NullForkState;
