//! Packed protocol version encoding.
//!
//! A version is a single `u32`: `major << 16 | minor << 8 | patch`. Upgrade
//! decisions compare only the high 24 bits — two builds that differ only in
//! patch level run the same protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A protocol version packed as `major << 16 | minor << 8 | patch`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    pub const ZERO: Self = Self(0);

    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self((major as u32) << 16 | (minor as u32) << 8 | patch as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn minor(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn patch(self) -> u8 {
        self.0 as u8
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether two versions agree in major and minor (patch is ignored).
    pub const fn same_minor(self, other: Self) -> bool {
        self.0 >> 8 == other.0 >> 8
    }

    /// Whether this version is a protocol upgrade over `other`,
    /// comparing major and minor only.
    pub const fn supersedes(self, other: Self) -> bool {
        self.0 >> 8 > other.0 >> 8
    }
}

impl fmt::Debug for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// One entry of the active-version history: `version` is in force from
/// `active_block` onward. The history is kept newest-first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVersionRecord {
    pub version: ProtocolVersion,
    pub active_block: u64,
}
