//! The forwarder.
//!
//! Owns every table (name-tree, FIB, PIT, CS), the packet memory pool, the
//! timer scheduler and the face table, and runs the Interest and Data
//! pipelines over them. Everything happens on the caller's thread: a call
//! to [`Forwarder::receive`] or [`Forwarder::process_timers`] runs to
//! completion, and callbacks into faces or the application never re-enter
//! the forwarder.

use crate::app::{
    DataHandler, InterestHandler, LocalPrefixes, PendingRequests, TimeoutHandler,
};
use crate::config::ForwarderConfig;
use crate::cs::{Cs, CsEntry};
use crate::face::{Face, FaceTable, APP_FACE};
use crate::fib::Fib;
use crate::mempool::MemoryPool;
use crate::name_tree::NameTree;
use crate::pit::{Pit, PitId, PitOutcome, PitTimer};
use crate::timer::{Alarm, TimerScheduler};
use bytes::Bytes;
use log::{debug, info, trace, warn};
use rust_tinyndn_common::metrics::ForwarderMetrics;
use rust_tinyndn_common::packet::hop_limit_offset;
use rust_tinyndn_common::{
    Data, Error, FaceId, Interest, Name, PacketKind, RemoveStatus, Result,
};

/// What happened to a received Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestOutcome {
    /// Answered from the content store.
    CacheHit,
    /// Joined a pending entry; nothing was sent.
    Aggregated,
    /// Sent out on this many faces.
    Forwarded(usize),
    /// Handed to a local application handler.
    DeliveredLocally,
    /// Dropped as a looping Interest.
    Duplicate,
    /// Dropped because its HopLimit was exhausted.
    HopLimitExceeded,
}

/// What happened to a received Data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    /// Matched pending Interests and was delivered to this many faces.
    Satisfied(usize),
    /// Matched nothing; cached only.
    Unsolicited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Interest(InterestOutcome),
    Data(DataOutcome),
}

/// A named-data forwarder over a platform alarm `A`.
pub struct Forwarder<A> {
    config: ForwarderConfig,
    tree: NameTree,
    fib: Fib,
    pit: Pit,
    cs: Cs,
    pool: MemoryPool,
    timers: TimerScheduler<A, PitTimer>,
    faces: FaceTable,
    local: LocalPrefixes,
    requests: PendingRequests,
    metrics: ForwarderMetrics,
}

impl<A: Alarm> Forwarder<A> {
    /// Create a forwarder with validated `config`, driven by `alarm`.
    pub fn new(config: ForwarderConfig, alarm: A) -> Result<Self> {
        config.validate()?;
        info!(
            "[Forwarder] starting: PIT {}, FIB {}, CS {}, name-tree {}, pool {}x{}",
            config.pit_capacity,
            config.fib_capacity,
            config.cs_capacity,
            config.name_tree_capacity,
            config.pool_blocks,
            config.pool_block_size
        );
        Ok(Self {
            tree: NameTree::new(config.name_tree_capacity),
            fib: Fib::new(config.fib_capacity, config.max_nexthops),
            pit: Pit::new(config.pit_capacity, config.max_pit_faces)
                .with_default_lifetime(config.default_lifetime_ms),
            cs: Cs::new(config.cs_capacity),
            pool: MemoryPool::new(config.pool_blocks, config.pool_block_size),
            timers: TimerScheduler::new(alarm, config.pit_capacity),
            faces: FaceTable::new(config.max_faces),
            local: LocalPrefixes::new(config.max_local_prefixes),
            requests: PendingRequests::default(),
            metrics: ForwarderMetrics::new(),
            config,
        })
    }

    /* --- Accessors --- */

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ForwarderMetrics {
        &self.metrics
    }

    pub fn name_tree(&self) -> &NameTree {
        &self.tree
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn cs(&self) -> &Cs {
        &self.cs
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }

    pub fn timers(&self) -> &TimerScheduler<A, PitTimer> {
        &self.timers
    }

    pub fn alarm(&self) -> &A {
        self.timers.alarm()
    }

    pub fn alarm_mut(&mut self) -> &mut A {
        self.timers.alarm_mut()
    }

    /// Current tick of the alarm.
    pub fn now(&self) -> u32 {
        self.timers.now()
    }

    /// Interests the local application is still waiting on.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Exact-name CS lookup, ignoring freshness.
    pub fn cs_lookup(&self, name: &Name) -> Result<Option<&CsEntry>> {
        self.cs.lookup(&self.tree, name, self.now(), false)
    }

    /* --- Faces and routes --- */

    pub fn add_face<F: Face + 'static>(&mut self, face: F) -> Result<FaceId> {
        self.faces.add(Box::new(face))
    }

    /// Unregister a face and purge it from every route and pending Interest.
    pub fn remove_face(&mut self, id: FaceId) -> Result<Box<dyn Face>> {
        let face = self.faces.remove(id)?;
        let touched = self.fib.remove_face(&mut self.tree, id);
        let dropped = self.pit.remove_face(&mut self.tree, &mut self.timers, id);
        self.metrics.fib_size.set(self.fib.len() as u64);
        self.metrics.pit_size.set(self.pit.len() as u64);
        info!(
            "[Forwarder] removed {} ({} routes touched, {} pending Interests dropped)",
            id, touched, dropped
        );
        Ok(face)
    }

    pub fn add_route(&mut self, face: FaceId, prefix: &Name) -> Result<()> {
        self.add_route_with_cost(face, prefix, 0)
    }

    pub fn add_route_with_cost(&mut self, face: FaceId, prefix: &Name, cost: u8) -> Result<()> {
        if self.faces.get_mut(face).is_none() {
            return Err(Error::UnknownFace(face.0));
        }
        self.fib.add_route(&mut self.tree, face, prefix, cost)?;
        self.metrics.fib_size.set(self.fib.len() as u64);
        Ok(())
    }

    /// [`add_route`](Self::add_route) with a TLV-encoded Name.
    pub fn add_route_wire(&mut self, face: FaceId, name_block: &[u8]) -> Result<()> {
        let prefix = Name::from_wire(name_block)?;
        self.add_route(face, &prefix)
    }

    pub fn remove_route(&mut self, face: FaceId, prefix: &Name) -> Result<RemoveStatus> {
        let status = self.fib.remove_route(&mut self.tree, face, prefix)?;
        self.metrics.fib_size.set(self.fib.len() as u64);
        Ok(status)
    }

    pub fn remove_route_wire(&mut self, face: FaceId, name_block: &[u8]) -> Result<RemoveStatus> {
        let prefix = Name::from_wire(name_block)?;
        self.remove_route(face, &prefix)
    }

    pub fn remove_all_routes(&mut self, prefix: &Name) -> Result<RemoveStatus> {
        let status = self.fib.remove_all_routes(&mut self.tree, prefix)?;
        self.metrics.fib_size.set(self.fib.len() as u64);
        Ok(status)
    }

    /* --- Application API --- */

    /// Listen for Interests under `prefix`.
    ///
    /// The handler is consulted only for Interests no FIB route can carry.
    pub fn register_prefix<H>(&mut self, prefix: &Name, handler: H) -> Result<()>
    where
        H: FnMut(&Interest, &[u8]) -> Option<Bytes> + 'static,
    {
        let handler: InterestHandler = Box::new(handler);
        self.local.register(prefix.clone(), handler)
    }

    /// [`register_prefix`](Self::register_prefix) with a TLV-encoded Name.
    pub fn register_prefix_wire<H>(&mut self, name_block: &[u8], handler: H) -> Result<()>
    where
        H: FnMut(&Interest, &[u8]) -> Option<Bytes> + 'static,
    {
        let prefix = Name::from_wire(name_block)?;
        self.register_prefix(&prefix, handler)
    }

    pub fn unregister_prefix(&mut self, prefix: &Name) -> RemoveStatus {
        self.local.unregister(prefix)
    }

    /// Send an encoded Interest from the local application.
    ///
    /// Exactly one of `on_data` or `on_timeout` eventually runs, unless the
    /// call fails or the Interest is dropped, in which case neither does.
    pub fn express_interest<D, T>(
        &mut self,
        wire: &[u8],
        on_data: D,
        on_timeout: T,
    ) -> Result<InterestOutcome>
    where
        D: FnMut(&Data, &[u8]) + 'static,
        T: FnMut(&Name) + 'static,
    {
        let interest = Interest::decode(wire).map_err(|e| self.malformed(e))?;
        let on_data: DataHandler = Box::new(on_data);
        let on_timeout: TimeoutHandler = Box::new(on_timeout);
        let request = self.requests.insert(&interest, on_data, on_timeout);

        let result = self.on_interest(APP_FACE, &interest, wire);
        let keep = matches!(
            result,
            Ok(InterestOutcome::Aggregated)
                | Ok(InterestOutcome::Forwarded(_))
                | Ok(InterestOutcome::DeliveredLocally)
        );
        if !keep {
            self.requests.remove(request);
        }
        result
    }

    /// Encode `interest` and express it.
    pub fn express<D, T>(&mut self, interest: &Interest, on_data: D, on_timeout: T) -> Result<InterestOutcome>
    where
        D: FnMut(&Data, &[u8]) + 'static,
        T: FnMut(&Name) + 'static,
    {
        let wire = interest.to_bytes()?;
        self.express_interest(&wire, on_data, on_timeout)
    }

    /// Inject encoded Data from the local application.
    pub fn put_data(&mut self, wire: &[u8]) -> Result<DataOutcome> {
        let data = Data::decode(wire).map_err(|e| self.malformed(e))?;
        self.on_data(APP_FACE, &data, wire)
    }

    /* --- Packet pipelines --- */

    /// Handle a packet that arrived on `face`.
    pub fn receive(&mut self, face: FaceId, wire: &[u8]) -> Result<ReceiveOutcome> {
        if !self.faces.contains(face) {
            return Err(Error::UnknownFace(face.0));
        }
        match PacketKind::of(wire).map_err(|e| self.malformed(e))? {
            PacketKind::Interest => {
                let interest = Interest::decode(wire).map_err(|e| self.malformed(e))?;
                self.on_interest(face, &interest, wire)
                    .map(ReceiveOutcome::Interest)
            }
            PacketKind::Data => {
                let data = Data::decode(wire).map_err(|e| self.malformed(e))?;
                self.on_data(face, &data, wire).map(ReceiveOutcome::Data)
            }
        }
    }

    /// Fire every due timer. Returns the number of PIT entries that expired.
    ///
    /// The platform calls this whenever its alarm goes off.
    pub fn process_timers(&mut self) -> usize {
        let mut expired = 0;
        while let Some(timer) = self.timers.process() {
            let entry = match self.pit.on_timeout(&mut self.tree, timer) {
                Some(entry) => entry,
                None => continue,
            };
            expired += 1;
            self.metrics.pit_expirations.increment();
            debug!("[Forwarder] {} timed out", entry.name());

            for face in entry.in_faces() {
                if self.faces.is_app(face) {
                    let requests = self.requests.take_named(entry.name(), entry.can_be_prefix());
                    for mut request in requests {
                        (request.on_timeout)(entry.name());
                    }
                } else if let Some(link) = self.faces.get_mut(face) {
                    link.on_timeout(entry.name());
                }
            }
        }
        self.metrics.pit_size.set(self.pit.len() as u64);
        expired
    }

    fn on_interest(&mut self, face: FaceId, interest: &Interest, wire: &[u8]) -> Result<InterestOutcome> {
        self.metrics.interests_received.increment();
        trace!("[Forwarder] Interest {} from {}", interest.name, face);

        if interest.hop_limit == Some(0) {
            debug!("[Forwarder] {} dropped: hop limit exhausted", interest.name);
            self.metrics.interests_dropped.increment();
            return Ok(InterestOutcome::HopLimitExceeded);
        }

        let now = self.now();
        let cached = self
            .cs
            .lookup_interest(&self.tree, interest, now)?
            .map(|entry| entry.wire().clone());
        if let Some(cached) = cached {
            self.metrics.cs_hits.increment();
            debug!("[Forwarder] {} answered from CS", interest.name);
            self.send_data(face, &cached)?;
            return Ok(InterestOutcome::CacheHit);
        }
        self.metrics.cs_misses.increment();

        let id = match self.pit.on_interest(&mut self.tree, &mut self.timers, interest, face)? {
            PitOutcome::New(id) => id,
            PitOutcome::Aggregated(_) => {
                self.metrics.interests_aggregated.increment();
                return Ok(InterestOutcome::Aggregated);
            }
            PitOutcome::Duplicate(_) => {
                self.metrics.interests_dropped.increment();
                return Ok(InterestOutcome::Duplicate);
            }
        };
        self.metrics.pit_inserts.increment();
        self.metrics.pit_size.set(self.pit.len() as u64);

        match self.dispatch_interest(id, face, interest, wire) {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => {
                self.release_pit(id);
                self.metrics.interests_rejected.increment();
                info!("[Forwarder] {} rejected: no route", interest.name);
                Err(Error::InterestRejected(interest.name.to_string()))
            }
            Err(e) => {
                self.release_pit(id);
                Err(e)
            }
        }
    }

    /// Send a freshly pending Interest toward its FIB nexthops, or else to a
    /// local handler. `None` means nobody could take it.
    fn dispatch_interest(
        &mut self,
        id: PitId,
        face: FaceId,
        interest: &Interest,
        wire: &[u8],
    ) -> Result<Option<InterestOutcome>> {
        let split_horizon = self.config.split_horizon;
        let nexthops: Vec<FaceId> = match self.fib.lookup(&self.tree, &interest.name)? {
            Some(entry) => {
                self.metrics.fib_hits.increment();
                entry
                    .nexthops()
                    .iter()
                    .map(|n| n.face)
                    .filter(|f| !(split_horizon && *f == face))
                    .collect()
            }
            None => {
                self.metrics.fib_misses.increment();
                Vec::new()
            }
        };

        if !nexthops.is_empty() {
            let sent = self.forward_interest(id, interest.nonce, wire, &nexthops)?;
            if sent > 0 {
                self.metrics.interests_forwarded.add(sent as u64);
                return Ok(Some(InterestOutcome::Forwarded(sent)));
            }
        }

        let reply = match self.local.lookup_mut(&interest.name) {
            Some(handler) => handler(interest, wire),
            None => return Ok(None),
        };
        self.metrics.interests_delivered_locally.increment();
        debug!("[Forwarder] {} delivered to local application", interest.name);
        if let Some(data) = reply {
            self.put_data(&data)?;
        }
        Ok(Some(InterestOutcome::DeliveredLocally))
    }

    /// Copy `wire` into a pool block, spend one hop, and send it on each
    /// nexthop. Returns how many sends succeeded.
    fn forward_interest(&mut self, id: PitId, nonce: u32, wire: &[u8], nexthops: &[FaceId]) -> Result<usize> {
        if wire.len() > self.pool.block_size() {
            return Err(Error::PacketTooLarge {
                size: wire.len(),
                limit: self.pool.block_size(),
            });
        }
        let hop_limit = hop_limit_offset(wire)?;
        let block = self.pool.alloc().ok_or(Error::PoolExhausted)?;

        let buf = &mut self.pool.block_mut(block)[..wire.len()];
        buf.copy_from_slice(wire);
        if let Some(offset) = hop_limit {
            buf[offset] = buf[offset].saturating_sub(1);
        }

        let mut sent = 0;
        for &nexthop in nexthops {
            let result = match self.faces.get_mut(nexthop) {
                Some(link) => link.send(buf),
                None => Err(Error::UnknownFace(nexthop.0)),
            };
            match result {
                Ok(()) => {
                    trace!("[Forwarder] forwarded Interest to {}", nexthop);
                    self.pit.record_out(id, nexthop, nonce);
                    sent += 1;
                }
                Err(e) => warn!("[Forwarder] send to {} failed: {}", nexthop, e),
            }
        }

        self.pool.free_block(block)?;
        Ok(sent)
    }

    fn on_data(&mut self, face: FaceId, data: &Data, wire: &[u8]) -> Result<DataOutcome> {
        self.metrics.data_received.increment();
        trace!("[Forwarder] Data {} from {}", data.name, face);

        let satisfied = self.pit.on_data(&mut self.tree, &mut self.timers, &data.name)?;
        self.metrics.pit_satisfied.add(satisfied.len() as u64);
        self.metrics.pit_size.set(self.pit.len() as u64);

        let mut targets: Vec<FaceId> = Vec::new();
        for entry in &satisfied {
            for in_face in entry.in_faces() {
                let echo = self.config.split_horizon && in_face == face && face != APP_FACE;
                if !echo && !targets.contains(&in_face) {
                    targets.push(in_face);
                }
            }
        }

        let mut delivered = 0;
        for target in targets {
            match self.send_data(target, wire) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("[Forwarder] Data delivery to {} failed: {}", target, e),
            }
        }

        let now = self.now();
        match self.cs.insert(&mut self.tree, data, Bytes::copy_from_slice(wire), now) {
            Ok(insert) => {
                self.metrics.cs_inserts.increment();
                if insert.evicted.is_some() {
                    self.metrics.cs_evictions.increment();
                }
            }
            Err(e) => warn!("[Forwarder] could not cache {}: {}", data.name, e),
        }
        self.metrics.cs_size.set(self.cs.len() as u64);

        if satisfied.is_empty() {
            debug!("[Forwarder] unsolicited Data {}", data.name);
            self.metrics.data_unsolicited.increment();
            Ok(DataOutcome::Unsolicited)
        } else {
            Ok(DataOutcome::Satisfied(delivered))
        }
    }

    /// Deliver encoded Data to `face`, or to the waiting application requests.
    fn send_data(&mut self, face: FaceId, wire: &[u8]) -> Result<()> {
        if self.faces.is_app(face) {
            let data = Data::decode(wire)?;
            for mut request in self.requests.take_satisfied(&data.name) {
                (request.on_data)(&data, wire);
            }
        } else {
            self.faces.send(face, wire)?;
        }
        self.metrics.data_sent.increment();
        Ok(())
    }

    fn release_pit(&mut self, id: PitId) {
        self.pit.remove(&mut self.tree, &mut self.timers, id);
        self.metrics.pit_size.set(self.pit.len() as u64);
    }

    fn malformed(&self, e: Error) -> Error {
        if e.is_decode_error() {
            warn!("[Forwarder] malformed packet: {}", e);
            self.metrics.malformed_packets.increment();
        }
        e
    }
}

impl<A: std::fmt::Debug> std::fmt::Debug for Forwarder<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("config", &self.config)
            .field("fib", &self.fib.len())
            .field("pit", &self.pit.len())
            .field("cs", &self.cs.len())
            .field("faces", &self.faces)
            .finish()
    }
}
