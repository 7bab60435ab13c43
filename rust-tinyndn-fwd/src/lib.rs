//! Forwarding engine for the tinyNDN stack.
//!
//! The tables (name-tree, FIB, PIT, CS) are fixed-capacity arenas linked by
//! index. The [`Forwarder`] bundles them with a packet memory pool, a
//! single-alarm timer scheduler and the face table.

pub mod app;
pub mod config;
pub mod cs;
pub mod face;
pub mod fib;
pub mod forwarder;
pub mod mempool;
pub mod name_tree;
pub mod pit;
pub mod timer;

pub use config::ForwarderConfig;
pub use face::{Face, APP_FACE};
pub use forwarder::{DataOutcome, Forwarder, InterestOutcome, ReceiveOutcome};
pub use name_tree::{Annotation, NameTree};
pub use timer::{Alarm, ManualAlarm, TimerScheduler};
