//! PIT (Pending Interest Table).
//!
//! Entries are keyed by name and CanBePrefix: each name-tree entry can hold
//! one exact-name PIT entry and one CanBePrefix PIT entry. Incoming faces
//! that ask for the same (name, CanBePrefix) pair while the entry is alive
//! are aggregated onto it instead of being forwarded again. Each entry owns
//! the timer slot with the same index, which drives its expiry.

use crate::name_tree::{EntryId, NameTree};
use crate::timer::{fires_before, Alarm, TimerId, TimerScheduler, MAX_TIMER_DELAY};
use log::{debug, trace};
use rust_tinyndn_common::packet::DEFAULT_INTEREST_LIFETIME_MS;
use rust_tinyndn_common::{Error, FaceId, Interest, Name, Result};

/// Index of a PIT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitId(pub(crate) usize);

impl PitId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Argument carried by a PIT expiry timer.
///
/// The generation pins the timer to one incarnation of the slot so a
/// late fire can never expire an entry that reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitTimer {
    pub pit: PitId,
    pub generation: u32,
}

/// A face waiting for Data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InRecord {
    pub face: FaceId,
    pub nonce: u32,
}

/// A face the Interest was forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutRecord {
    pub face: FaceId,
    pub nonce: u32,
}

#[derive(Debug, Clone)]
pub struct PitEntry {
    node: EntryId,
    name: Name,
    can_be_prefix: bool,
    must_be_fresh: bool,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    expires_at: u32,
}

impl PitEntry {
    pub fn node(&self) -> EntryId {
        self.node
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    pub fn must_be_fresh(&self) -> bool {
        self.must_be_fresh
    }

    /// Waiting faces, in arrival order.
    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn expires_at(&self) -> u32 {
        self.expires_at
    }

    pub fn has_in_face(&self, face: FaceId) -> bool {
        self.in_records.iter().any(|r| r.face == face)
    }

    /// Faces waiting for Data, in arrival order.
    pub fn in_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.in_records.iter().map(|r| r.face)
    }

    fn seen_nonce(&self, nonce: u32, face: FaceId) -> bool {
        self.in_records
            .iter()
            .any(|r| r.nonce == nonce && r.face != face)
            || self.out_records.iter().any(|r| r.nonce == nonce)
    }
}

/// Result of [`Pit::on_interest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitOutcome {
    /// A new entry was created; the Interest should be forwarded.
    New(PitId),
    /// The face joined an existing entry; nothing to forward.
    Aggregated(PitId),
    /// The nonce was already seen from another face: a looping Interest.
    Duplicate(PitId),
}

impl PitOutcome {
    pub fn id(self) -> PitId {
        match self {
            PitOutcome::New(id) | PitOutcome::Aggregated(id) | PitOutcome::Duplicate(id) => id,
        }
    }
}

#[derive(Debug)]
pub struct Pit {
    entries: Vec<Option<PitEntry>>,
    generations: Vec<u32>,
    max_faces: usize,
    default_lifetime_ms: u32,
    len: usize,
}

impl Pit {
    pub fn new(capacity: usize, max_faces: usize) -> Self {
        Self {
            entries: vec![None; capacity],
            generations: vec![0; capacity],
            max_faces,
            default_lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            len: 0,
        }
    }

    /// Lifetime applied to Interests that carry no InterestLifetime.
    pub fn with_default_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.default_lifetime_ms = lifetime_ms;
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: PitId) -> Option<&PitEntry> {
        self.entries.get(id.0).and_then(Option::as_ref)
    }

    /// Entry pending on exactly `name` with the given CanBePrefix.
    pub fn find(&self, tree: &NameTree, name: &Name, can_be_prefix: bool) -> Result<Option<&PitEntry>> {
        Ok(tree
            .find_name(name)?
            .and_then(|node| tree.get(node))
            .and_then(|e| e.pit(can_be_prefix))
            .and_then(|id| self.get(id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PitId, &PitEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (PitId(i), e)))
    }

    /// Register `interest` arriving on `face`.
    ///
    /// A later-expiring Interest that aggregates onto an entry pushes the
    /// entry's expiry out to its own lifetime.
    pub fn on_interest<A: Alarm>(
        &mut self,
        tree: &mut NameTree,
        timers: &mut TimerScheduler<A, PitTimer>,
        interest: &Interest,
        face: FaceId,
    ) -> Result<PitOutcome> {
        let now = timers.now();
        let lifetime = interest.lifetime_or(self.default_lifetime_ms);
        let expires_at = now.wrapping_add(lifetime.min(MAX_TIMER_DELAY));
        let node = tree.find_or_insert_name(&interest.name)?;

        if let Some(id) = tree.get(node).and_then(|e| e.pit(interest.can_be_prefix)) {
            let max_faces = self.max_faces;
            let generation = self.generations[id.0];
            let entry = self.entries[id.0].as_mut().ok_or(Error::PitFull)?;

            if entry.seen_nonce(interest.nonce, face) {
                debug!("[PIT] duplicate nonce {:08x} for {}", interest.nonce, entry.name);
                return Ok(PitOutcome::Duplicate(id));
            }
            let full = entry.in_records.len() >= max_faces;
            match entry.in_records.iter_mut().find(|r| r.face == face) {
                Some(record) => record.nonce = interest.nonce,
                None if full => return Err(Error::PitFaceSetFull),
                None => entry.in_records.push(InRecord {
                    face,
                    nonce: interest.nonce,
                }),
            }
            entry.must_be_fresh |= interest.must_be_fresh;

            if fires_before(entry.expires_at, expires_at, now) {
                entry.expires_at = expires_at;
                timers.add(TimerId(id.0), expires_at, PitTimer { pit: id, generation })?;
            }
            debug!("[PIT] {} aggregated from {}", entry.name, face);
            return Ok(PitOutcome::Aggregated(id));
        }

        let slot = match self.entries.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                tree.reclaim(node);
                return Err(Error::PitFull);
            }
        };
        let id = PitId(slot);
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.entries[slot] = Some(PitEntry {
            node,
            name: interest.name.clone(),
            can_be_prefix: interest.can_be_prefix,
            must_be_fresh: interest.must_be_fresh,
            in_records: vec![InRecord {
                face,
                nonce: interest.nonce,
            }],
            out_records: Vec::new(),
            expires_at,
        });
        if let Some(entry) = tree.get_mut(node) {
            entry.set_pit(interest.can_be_prefix, Some(id));
        }
        self.len += 1;

        let timer = PitTimer {
            pit: id,
            generation: self.generations[slot],
        };
        if let Err(e) = timers.add(TimerId(slot), expires_at, timer) {
            self.release(tree, id);
            return Err(e);
        }
        debug!("[PIT] new entry {} from {} (expires {})", interest.name, face, expires_at);
        Ok(PitOutcome::New(id))
    }

    /// Note that the Interest behind `id` was sent out on `face`.
    pub fn record_out(&mut self, id: PitId, face: FaceId, nonce: u32) {
        if let Some(entry) = self.entries.get_mut(id.0).and_then(Option::as_mut) {
            match entry.out_records.iter_mut().find(|r| r.face == face) {
                Some(record) => record.nonce = nonce,
                None => entry.out_records.push(OutRecord { face, nonce }),
            }
        }
    }

    /// Take every entry satisfied by Data named `name`.
    ///
    /// That is the exact-name entry for `name` plus the CanBePrefix entry of
    /// `name` and of each of its prefixes. Timers of the taken entries are
    /// stopped.
    pub fn on_data<A: Alarm>(
        &mut self,
        tree: &mut NameTree,
        timers: &mut TimerScheduler<A, PitTimer>,
        name: &Name,
    ) -> Result<Vec<PitEntry>> {
        let path = tree.path(name)?;
        let mut satisfied = Vec::new();
        for node in path {
            let (prefix, exact) = match tree.get(node) {
                Some(entry) => (
                    entry.pit(true),
                    entry.pit(false).filter(|_| entry.depth() == name.len()),
                ),
                None => continue,
            };
            for id in prefix.into_iter().chain(exact) {
                timers.remove(TimerId(id.0));
                if let Some(entry) = self.release(tree, id) {
                    trace!("[PIT] {} satisfied by {}", entry.name, name);
                    satisfied.push(entry);
                }
            }
        }
        Ok(satisfied)
    }

    /// Expire the entry a fired timer points at.
    ///
    /// Returns `None` for a stale timer whose entry is already gone.
    pub fn on_timeout(&mut self, tree: &mut NameTree, timer: PitTimer) -> Option<PitEntry> {
        if self.generations.get(timer.pit.0) != Some(&timer.generation) {
            return None;
        }
        let entry = self.release(tree, timer.pit)?;
        debug!("[PIT] {} expired", entry.name);
        Some(entry)
    }

    /// Drop entry `id` and stop its timer.
    pub fn remove<A: Alarm>(
        &mut self,
        tree: &mut NameTree,
        timers: &mut TimerScheduler<A, PitTimer>,
        id: PitId,
    ) -> Option<PitEntry> {
        timers.remove(TimerId(id.0));
        self.release(tree, id)
    }

    /// Forget `face` in every entry. Entries left with no waiting face are
    /// dropped and their timers stopped; their count is returned.
    pub fn remove_face<A: Alarm>(
        &mut self,
        tree: &mut NameTree,
        timers: &mut TimerScheduler<A, PitTimer>,
        face: FaceId,
    ) -> usize {
        let mut orphaned = Vec::new();
        for (i, slot) in self.entries.iter_mut().enumerate() {
            if let Some(entry) = slot {
                entry.in_records.retain(|r| r.face != face);
                entry.out_records.retain(|r| r.face != face);
                if entry.in_records.is_empty() {
                    orphaned.push(PitId(i));
                }
            }
        }
        for &id in &orphaned {
            if let Some(entry) = self.remove(tree, timers, id) {
                debug!("[PIT] dropped {}: no faces left", entry.name);
            }
        }
        orphaned.len()
    }

    fn release(&mut self, tree: &mut NameTree, id: PitId) -> Option<PitEntry> {
        let entry = self.entries.get_mut(id.0)?.take()?;
        if let Some(node) = tree.get_mut(entry.node) {
            node.set_pit(entry.can_be_prefix, None);
        }
        tree.reclaim(entry.node);
        self.len -= 1;
        Some(entry)
    }
}
