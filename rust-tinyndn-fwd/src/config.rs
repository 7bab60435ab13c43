//! Forwarder configuration.
//!
//! Every table in the forwarder is bounded; this module gathers the bounds
//! and the forwarding policy flags into one serde-friendly struct.

use rust_tinyndn_common::types::{
    MAX_CS_ENTRIES, MAX_FACES, MAX_FIB_ENTRIES, MAX_FIB_NEXTHOPS, MAX_LOCAL_PREFIXES,
    MAX_NAME_TREE_ENTRIES, MAX_PIT_ENTRIES, MAX_PIT_FACES, POOL_BLOCK_COUNT, POOL_BLOCK_SIZE,
};
use rust_tinyndn_common::packet::DEFAULT_INTEREST_LIFETIME_MS;
use rust_tinyndn_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Smallest pool block that can hold an Interest for a one-component name.
const MIN_BLOCK_SIZE: usize = 64;

/// Forwarder configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Number of PIT entries (and PIT expiry timers)
    pub pit_capacity: usize,

    /// Number of FIB records
    pub fib_capacity: usize,

    /// Number of cached Data packets
    pub cs_capacity: usize,

    /// Number of name-tree entries, root included
    pub name_tree_capacity: usize,

    /// Incoming faces recorded per PIT entry
    pub max_pit_faces: usize,

    /// Nexthops per FIB record
    pub max_nexthops: usize,

    /// Face table size, app face included
    pub max_faces: usize,

    /// Locally registered application prefixes
    pub max_local_prefixes: usize,

    /// Number of packet buffers in the memory pool
    pub pool_blocks: usize,

    /// Size of each packet buffer
    pub pool_block_size: usize,

    /// Lifetime given to received or expressed Interests that carry none (in milliseconds)
    pub default_lifetime_ms: u32,

    /// Never send a packet back out of the face it arrived on
    pub split_horizon: bool,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            pit_capacity: MAX_PIT_ENTRIES,
            fib_capacity: MAX_FIB_ENTRIES,
            cs_capacity: MAX_CS_ENTRIES,
            name_tree_capacity: MAX_NAME_TREE_ENTRIES,
            max_pit_faces: MAX_PIT_FACES,
            max_nexthops: MAX_FIB_NEXTHOPS,
            max_faces: MAX_FACES,
            max_local_prefixes: MAX_LOCAL_PREFIXES,
            pool_blocks: POOL_BLOCK_COUNT,
            pool_block_size: POOL_BLOCK_SIZE,
            default_lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            split_horizon: true,
        }
    }
}

impl ForwarderConfig {
    /// Reject configurations the forwarder cannot run with.
    pub fn validate(&self) -> Result<()> {
        let capacities = [
            ("pit_capacity", self.pit_capacity),
            ("fib_capacity", self.fib_capacity),
            ("cs_capacity", self.cs_capacity),
            ("max_pit_faces", self.max_pit_faces),
            ("max_nexthops", self.max_nexthops),
            ("pool_blocks", self.pool_blocks),
        ];
        if let Some((field, _)) = capacities.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidConfig(format!("{} must be non-zero", field)));
        }
        if self.name_tree_capacity < 2 {
            return Err(Error::InvalidConfig(
                "name_tree_capacity must leave room beyond the root".into(),
            ));
        }
        if self.max_faces < 2 {
            return Err(Error::InvalidConfig(
                "max_faces must leave room beyond the app face".into(),
            ));
        }
        if self.pool_block_size < MIN_BLOCK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "pool_block_size must be at least {} bytes",
                MIN_BLOCK_SIZE
            )));
        }
        if self.max_faces > usize::from(u16::MAX) {
            return Err(Error::InvalidConfig("max_faces exceeds the face id range".into()));
        }
        Ok(())
    }
}
