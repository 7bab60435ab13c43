//! Common types shared between the forwarding engine and its hosts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of entries in the FIB table.
pub const MAX_FIB_ENTRIES: usize = 20;

/// Maximum number of entries in the PIT table.
pub const MAX_PIT_ENTRIES: usize = 128;

/// Maximum number of entries in the content store.
pub const MAX_CS_ENTRIES: usize = 10;

/// Maximum number of entries in the name-tree arena.
pub const MAX_NAME_TREE_ENTRIES: usize = 256;

/// Maximum number of incoming faces recorded per PIT entry.
pub const MAX_PIT_FACES: usize = 8;

/// Maximum number of nexthops per FIB entry.
pub const MAX_FIB_NEXTHOPS: usize = 4;

/// Maximum number of registered faces.
pub const MAX_FACES: usize = 16;

/// Maximum number of locally registered application prefixes.
pub const MAX_LOCAL_PREFIXES: usize = 8;

/// Number of blocks in the packet memory pool.
pub const POOL_BLOCK_COUNT: usize = 16;

/// Size of each memory pool block, large enough for one Interest or Data.
pub const POOL_BLOCK_SIZE: usize = 1024;

/// Unique identifier for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(C)]
pub struct FaceId(pub u16);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

impl From<u16> for FaceId {
    fn from(id: u16) -> Self {
        FaceId(id)
    }
}

/// Face type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaceType {
    /// Physical or link-layer device.
    NetDevice = 0,
    /// Internal app face.
    App = 1,
    /// UDP tunnel.
    Udp = 2,
}

/// Outcome of a removal that is allowed to find nothing to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStatus {
    /// Something was removed.
    Removed,
    /// Nothing matched; the call changed no state.
    NoEffect,
}

impl RemoveStatus {
    /// Stable numeric status code (`0` removed, `1` no effect).
    pub fn code(self) -> i32 {
        match self {
            RemoveStatus::Removed => 0,
            RemoveStatus::NoEffect => 1,
        }
    }
}
