//! Metrics collection and reporting for the tinyNDN forwarder.
//!
//! Counters are plain relaxed atomics so they can be read from a host
//! thread while the forwarder runs on its own loop.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for the forwarder
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct ForwarderMetrics {
    // Packet processing metrics
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    pub interests_aggregated: Counter,
    pub interests_rejected: Counter,
    /// Interests dropped for loops, hop limit or resource exhaustion
    pub interests_dropped: Counter,
    pub interests_delivered_locally: Counter,
    pub data_received: Counter,
    pub data_sent: Counter,
    pub data_unsolicited: Counter,
    pub malformed_packets: Counter,

    // Cache metrics
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,
    pub cs_evictions: Counter,
    pub cs_size: Gauge,

    // PIT metrics
    pub pit_inserts: Counter,
    pub pit_satisfied: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,

    // FIB metrics
    pub fib_hits: Counter,
    pub fib_misses: Counter,
    pub fib_size: Gauge,
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy suitable for serialisation.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            interests_received: self.interests_received.value(),
            interests_forwarded: self.interests_forwarded.value(),
            interests_aggregated: self.interests_aggregated.value(),
            interests_rejected: self.interests_rejected.value(),
            interests_dropped: self.interests_dropped.value(),
            interests_delivered_locally: self.interests_delivered_locally.value(),
            data_received: self.data_received.value(),
            data_sent: self.data_sent.value(),
            data_unsolicited: self.data_unsolicited.value(),
            malformed_packets: self.malformed_packets.value(),
            cs_hits: self.cs_hits.value(),
            cs_misses: self.cs_misses.value(),
            cs_inserts: self.cs_inserts.value(),
            cs_evictions: self.cs_evictions.value(),
            cs_size: self.cs_size.value(),
            pit_inserts: self.pit_inserts.value(),
            pit_satisfied: self.pit_satisfied.value(),
            pit_expirations: self.pit_expirations.value(),
            pit_size: self.pit_size.value(),
            fib_hits: self.fib_hits.value(),
            fib_misses: self.fib_misses.value(),
            fib_size: self.fib_size.value(),
        }
    }
}

/// Serialisable view of [`ForwarderMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub interests_received: u64,
    pub interests_forwarded: u64,
    pub interests_aggregated: u64,
    pub interests_rejected: u64,
    pub interests_dropped: u64,
    pub interests_delivered_locally: u64,
    pub data_received: u64,
    pub data_sent: u64,
    pub data_unsolicited: u64,
    pub malformed_packets: u64,
    pub cs_hits: u64,
    pub cs_misses: u64,
    pub cs_inserts: u64,
    pub cs_evictions: u64,
    pub cs_size: u64,
    pub pit_inserts: u64,
    pub pit_satisfied: u64,
    pub pit_expirations: u64,
    pub pit_size: u64,
    pub fib_hits: u64,
    pub fib_misses: u64,
    pub fib_size: u64,
}
