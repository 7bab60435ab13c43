//! Content Store.
//!
//! A bounded cache of Data packets keyed by exact name. When full, the
//! oldest insertion is evicted first; re-inserting a cached name replaces
//! its bytes and counts as a new insertion.

use crate::name_tree::{EntryId, NameTree, NameTreeEntry};
use crate::timer::{has_fired, MAX_TIMER_DELAY};
use bytes::Bytes;
use log::{debug, trace, warn};
use rust_tinyndn_common::{Data, Error, Interest, Name, RemoveStatus, Result};
use std::collections::VecDeque;

/// Index of a CS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CsId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct CsEntry {
    node: EntryId,
    name: Name,
    wire: Bytes,
    inserted_at: u32,
    fresh_until: Option<u32>,
}

impl CsEntry {
    pub fn node(&self) -> EntryId {
        self.node
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The cached Data packet, exactly as received.
    pub fn wire(&self) -> &Bytes {
        &self.wire
    }

    pub fn inserted_at(&self) -> u32 {
        self.inserted_at
    }

    /// Data without a FreshnessPeriod is never fresh.
    pub fn is_fresh(&self, now: u32) -> bool {
        self.fresh_until.map_or(false, |until| !has_fired(until, now))
    }
}

/// Result of [`Cs::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsInsert {
    pub id: CsId,
    /// Name of the entry pushed out to make room, if any.
    pub evicted: Option<Name>,
}

#[derive(Debug)]
pub struct Cs {
    entries: Vec<Option<CsEntry>>,
    order: VecDeque<CsId>,
    evictions: u64,
}

impl Cs {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity],
            order: VecDeque::with_capacity(capacity),
            evictions: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Total number of evictions so far.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn get(&self, id: CsId) -> Option<&CsEntry> {
        self.entries.get(id.0).and_then(Option::as_ref)
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &CsEntry> {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    /// Exact-name lookup.
    pub fn lookup(
        &self,
        tree: &NameTree,
        name: &Name,
        now: u32,
        must_be_fresh: bool,
    ) -> Result<Option<&CsEntry>> {
        let entry = tree
            .find_name(name)?
            .and_then(|node| tree.get(node))
            .and_then(|e| e.cs)
            .and_then(|id| self.get(id));
        Ok(entry.filter(|e| !must_be_fresh || e.is_fresh(now)))
    }

    /// Lookup honouring the Interest's CanBePrefix and MustBeFresh.
    ///
    /// With CanBePrefix an exact hit is preferred, then the first usable
    /// cached descendant in name-tree order.
    pub fn lookup_interest(
        &self,
        tree: &NameTree,
        interest: &Interest,
        now: u32,
    ) -> Result<Option<&CsEntry>> {
        let node = match tree.find_name(&interest.name)? {
            Some(node) => node,
            None => return Ok(None),
        };
        let usable = |e: &&CsEntry| !interest.must_be_fresh || e.is_fresh(now);

        let exact = tree
            .get(node)
            .and_then(|e| e.cs)
            .and_then(|id| self.get(id))
            .filter(usable);
        if exact.is_some() || !interest.can_be_prefix {
            return Ok(exact);
        }
        let cached = |e: &NameTreeEntry| e.cs.and_then(|id| self.get(id));
        Ok(tree
            .find_descendant_by(node, |e| cached(e).filter(usable).is_some())
            .and_then(|d| tree.get(d))
            .and_then(cached))
    }

    /// Cache `wire` (the encoding of `data`), evicting the oldest entry when full.
    pub fn insert(&mut self, tree: &mut NameTree, data: &Data, wire: Bytes, now: u32) -> Result<CsInsert> {
        let fresh_until = data
            .freshness_period_ms
            .map(|ms| now.wrapping_add(ms.min(u64::from(MAX_TIMER_DELAY)) as u32));

        if let Some(id) = tree.find_name(&data.name)?.and_then(|n| tree.get(n)).and_then(|e| e.cs) {
            if let Some(entry) = self.entries[id.0].as_mut() {
                entry.wire = wire;
                entry.inserted_at = now;
                entry.fresh_until = fresh_until;
            }
            self.order.retain(|o| *o != id);
            self.order.push_back(id);
            trace!("[CS] refreshed {}", data.name);
            return Ok(CsInsert { id, evicted: None });
        }

        let node = match tree.find_or_insert_name(&data.name) {
            Ok(node) => node,
            Err(Error::NameTreeFull) if self.is_full() && !self.is_empty() => {
                return self.insert_in_place_of_oldest(tree, data, wire, now, fresh_until);
            }
            Err(e) => return Err(e),
        };
        let (slot, victim) = match self.entries.iter().position(Option::is_none) {
            Some(slot) => (slot, None),
            None => match self.order.pop_front() {
                Some(victim) => (victim.0, Some(victim)),
                None => {
                    tree.reclaim(node);
                    return Err(Error::InvalidConfig("content store has no capacity".into()));
                }
            },
        };
        let id = CsId(slot);
        // Annotate first so reclaiming the victim keeps the new entry's ancestors.
        if let Some(entry) = tree.get_mut(node) {
            entry.cs = Some(id);
        }
        let evicted = victim.and_then(|victim| self.evict(tree, victim));
        self.entries[slot] = Some(CsEntry {
            node,
            name: data.name.clone(),
            wire,
            inserted_at: now,
            fresh_until,
        });
        self.order.push_back(id);
        debug!("[CS] cached {}", data.name);
        Ok(CsInsert { id, evicted })
    }

    /// Drop the entry cached under exactly `name`.
    pub fn remove(&mut self, tree: &mut NameTree, name: &Name) -> Result<RemoveStatus> {
        let id = match tree.find_name(name)?.and_then(|n| tree.get(n)).and_then(|e| e.cs) {
            Some(id) => id,
            None => return Ok(RemoveStatus::NoEffect),
        };
        self.order.retain(|o| *o != id);
        self.release(tree, id);
        Ok(RemoveStatus::Removed)
    }

    fn is_full(&self) -> bool {
        self.order.len() >= self.entries.len()
    }

    fn evict(&mut self, tree: &mut NameTree, victim: CsId) -> Option<Name> {
        let entry = self.release(tree, victim)?;
        debug!("[CS] evicted {}", entry.name);
        self.evictions += 1;
        Some(entry.name)
    }

    /// Insert when the name-tree has no room for the new name: evict the
    /// oldest entry to free its tree entries, and put it back if the new
    /// name still does not fit.
    fn insert_in_place_of_oldest(
        &mut self,
        tree: &mut NameTree,
        data: &Data,
        wire: Bytes,
        now: u32,
        fresh_until: Option<u32>,
    ) -> Result<CsInsert> {
        let victim = self.order.pop_front().ok_or(Error::NameTreeFull)?;
        let old = match self.release(tree, victim) {
            Some(old) => old,
            None => return Err(Error::NameTreeFull),
        };
        let node = match tree.find_or_insert_name(&data.name) {
            Ok(node) => node,
            Err(e) => {
                self.restore(tree, victim, old);
                return Err(e);
            }
        };
        if let Some(entry) = tree.get_mut(node) {
            entry.cs = Some(victim);
        }
        self.entries[victim.0] = Some(CsEntry {
            node,
            name: data.name.clone(),
            wire,
            inserted_at: now,
            fresh_until,
        });
        self.order.push_back(victim);
        self.evictions += 1;
        debug!("[CS] cached {} in place of {}", data.name, old.name);
        Ok(CsInsert {
            id: victim,
            evicted: Some(old.name),
        })
    }

    /// Put a just-released entry back at the head of the eviction queue.
    fn restore(&mut self, tree: &mut NameTree, id: CsId, mut entry: CsEntry) {
        match tree.find_or_insert_name(&entry.name) {
            Ok(node) => {
                if let Some(n) = tree.get_mut(node) {
                    n.cs = Some(id);
                }
                entry.node = node;
                self.entries[id.0] = Some(entry);
                self.order.push_front(id);
            }
            Err(e) => warn!("[CS] lost {} while making room: {}", entry.name, e),
        }
    }

    fn release(&mut self, tree: &mut NameTree, id: CsId) -> Option<CsEntry> {
        let entry = self.entries.get_mut(id.0)?.take()?;
        if let Some(node) = tree.get_mut(entry.node) {
            node.cs = None;
        }
        tree.reclaim(entry.node);
        Some(entry)
    }
}
