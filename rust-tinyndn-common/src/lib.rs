//! Common types and utilities for the tinyNDN forwarding stack.
//!
//! This crate provides the wire-level pieces shared by the forwarding engine
//! and the host tooling: the TLV codec, hierarchical names, Interest/Data
//! packets, identifier types and the forwarder metrics.

pub mod error;
pub mod metrics;
pub mod name;
pub mod packet;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub use name::{Name, NameCmp, NameComponent};
pub use packet::{Data, Interest, PacketKind};
pub use types::{FaceId, FaceType, RemoveStatus};
pub type Result<T> = std::result::Result<T, Error>;
