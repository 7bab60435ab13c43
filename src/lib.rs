//! tinyNDN: a named-data forwarding stack for constrained nodes.
//!
//! This crate re-exports the wire layer ([`common`]) and the forwarding
//! engine ([`fwd`]) under one name.

pub use rust_tinyndn_common as common;
pub use rust_tinyndn_fwd as fwd;

pub use rust_tinyndn_common::{Data, Error, FaceId, Interest, Name, Result};
pub use rust_tinyndn_fwd::{Face, Forwarder, ForwarderConfig};
