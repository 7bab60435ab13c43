//! Name-tree: the trie shared by the FIB, PIT and CS.
//!
//! Every distinct name (or name prefix) that one of the tables refers to has
//! exactly one entry here. Entries live in a fixed arena and link to each
//! other by index (parent, first child, next sibling); each entry can carry
//! one FIB record, one CS entry and two PIT entries (one for exact-name
//! Interests, one for CanBePrefix Interests). Entries that lose their
//! last annotation and have no children are reclaimed together with any
//! ancestors left in the same state, so the arena is bounded by the live
//! table contents rather than by every name ever seen.

use crate::cs::CsId;
use crate::fib::FibId;
use crate::pit::PitId;
use bytes::Bytes;
use log::{debug, trace};
use rust_tinyndn_common::name::{name_components, MAX_NAME_COMPONENTS};
use rust_tinyndn_common::{Error, Name, NameComponent, Result};

/// Index of a name-tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The root entry, representing the empty name `/`.
pub const ROOT: EntryId = EntryId(0);

/// Which table annotation a lookup is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    Fib,
    Pit,
    Cs,
}

/// One node of the name-tree.
#[derive(Debug, Clone)]
pub struct NameTreeEntry {
    component: Bytes,
    depth: usize,
    parent: Option<EntryId>,
    first_child: Option<EntryId>,
    next_sibling: Option<EntryId>,
    pub(crate) fib: Option<FibId>,
    pub(crate) pit: Option<PitId>,
    pub(crate) pit_prefix: Option<PitId>,
    pub(crate) cs: Option<CsId>,
}

impl NameTreeEntry {
    fn new(component: Bytes, depth: usize, parent: Option<EntryId>) -> Self {
        Self {
            component,
            depth,
            parent,
            first_child: None,
            next_sibling: None,
            fib: None,
            pit: None,
            pit_prefix: None,
            cs: None,
        }
    }

    /// Value of the last component of this entry's name.
    pub fn component(&self) -> &[u8] {
        &self.component
    }

    /// Number of components in this entry's name.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn fib(&self) -> Option<FibId> {
        self.fib
    }

    /// PIT entry for Interests on this name with the given CanBePrefix.
    pub fn pit(&self, can_be_prefix: bool) -> Option<PitId> {
        if can_be_prefix {
            self.pit_prefix
        } else {
            self.pit
        }
    }

    pub(crate) fn set_pit(&mut self, can_be_prefix: bool, id: Option<PitId>) {
        if can_be_prefix {
            self.pit_prefix = id;
        } else {
            self.pit = id;
        }
    }

    pub fn cs(&self) -> Option<CsId> {
        self.cs
    }

    /// Whether this entry carries the given annotation.
    pub fn has(&self, kind: Annotation) -> bool {
        match kind {
            Annotation::Fib => self.fib.is_some(),
            Annotation::Pit => self.pit.is_some() || self.pit_prefix.is_some(),
            Annotation::Cs => self.cs.is_some(),
        }
    }

    /// Whether any table refers to this entry.
    pub fn is_annotated(&self) -> bool {
        self.fib.is_some() || self.pit.is_some() || self.pit_prefix.is_some() || self.cs.is_some()
    }

    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Free(Option<usize>),
    Used(NameTreeEntry),
}

/// Component values of one name, split without allocating.
type Parts<'a> = ([&'a [u8]; MAX_NAME_COMPONENTS], usize);

fn split_block(block: &[u8]) -> Result<Parts<'_>> {
    let mut parts: [&[u8]; MAX_NAME_COMPONENTS] = [&[]; MAX_NAME_COMPONENTS];
    let mut count = 0;
    for component in name_components(block)? {
        // The iterator enforces the component limit before yielding.
        parts[count] = component?;
        count += 1;
    }
    Ok((parts, count))
}

fn split_name(name: &Name) -> Result<Parts<'_>> {
    if name.len() > MAX_NAME_COMPONENTS {
        return Err(Error::TooManyComponents(name.len()));
    }
    let mut parts: [&[u8]; MAX_NAME_COMPONENTS] = [&[]; MAX_NAME_COMPONENTS];
    for (slot, component) in parts.iter_mut().zip(name.components()) {
        *slot = component.as_bytes();
    }
    Ok((parts, name.len()))
}

/// Bounded trie of names.
#[derive(Debug)]
pub struct NameTree {
    slots: Vec<Slot>,
    free_head: Option<usize>,
    len: usize,
}

impl NameTree {
    /// Create a tree with room for `capacity` entries, the root included.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.push(Slot::Used(NameTreeEntry::new(Bytes::new(), 0, None)));
        for i in 1..capacity {
            let next = if i + 1 < capacity { Some(i + 1) } else { None };
            slots.push(Slot::Free(next));
        }
        Self {
            slots,
            free_head: if capacity > 1 { Some(1) } else { None },
            len: 1,
        }
    }

    /// Number of live entries, the root included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len <= 1
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn root(&self) -> EntryId {
        ROOT
    }

    pub fn get(&self, id: EntryId) -> Option<&NameTreeEntry> {
        match self.slots.get(id.0) {
            Some(Slot::Used(entry)) => Some(entry),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut NameTreeEntry> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Used(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Find the entry for an encoded Name block, creating it (and any
    /// missing ancestors) if necessary.
    pub fn find_or_insert(&mut self, name_block: &[u8]) -> Result<EntryId> {
        let (parts, count) = split_block(name_block)?;
        self.insert_parts(&parts[..count])
    }

    /// [`find_or_insert`](Self::find_or_insert) for a decoded name.
    pub fn find_or_insert_name(&mut self, name: &Name) -> Result<EntryId> {
        let (parts, count) = split_name(name)?;
        self.insert_parts(&parts[..count])
    }

    /// Find the entry for an encoded Name block without creating anything.
    pub fn find(&self, name_block: &[u8]) -> Result<Option<EntryId>> {
        let (parts, count) = split_block(name_block)?;
        Ok(self.find_parts(&parts[..count]))
    }

    /// [`find`](Self::find) for a decoded name.
    pub fn find_name(&self, name: &Name) -> Result<Option<EntryId>> {
        let (parts, count) = split_name(name)?;
        Ok(self.find_parts(&parts[..count]))
    }

    /// Longest-prefix match: the deepest entry on the path to the encoded
    /// name that carries the requested annotation.
    pub fn prefix_match(&self, name_block: &[u8], kind: Annotation) -> Result<Option<EntryId>> {
        let (parts, count) = split_block(name_block)?;
        Ok(self.prefix_match_parts(&parts[..count], kind))
    }

    /// [`prefix_match`](Self::prefix_match) for a decoded name.
    pub fn prefix_match_name(&self, name: &Name, kind: Annotation) -> Result<Option<EntryId>> {
        let (parts, count) = split_name(name)?;
        Ok(self.prefix_match_parts(&parts[..count], kind))
    }

    /// Existing entries along the path to `name`, root first.
    ///
    /// The walk stops at the first missing component, so the last element
    /// is the entry for `name` itself only if the whole path exists.
    pub fn path(&self, name: &Name) -> Result<Vec<EntryId>> {
        let (parts, count) = split_name(name)?;
        let mut path = Vec::with_capacity(count + 1);
        let mut cur = ROOT;
        path.push(cur);
        for part in &parts[..count] {
            match self.child(cur, part) {
                Some(child) => {
                    cur = child;
                    path.push(cur);
                }
                None => break,
            }
        }
        Ok(path)
    }

    /// First entry below `id` (pre-order, `id` excluded) carrying `kind`.
    pub fn find_descendant(&self, id: EntryId, kind: Annotation) -> Option<EntryId> {
        self.find_descendant_by(id, |entry| entry.has(kind))
    }

    /// First entry below `id` (pre-order, `id` excluded) accepted by `pred`.
    pub fn find_descendant_by<P>(&self, id: EntryId, mut pred: P) -> Option<EntryId>
    where
        P: FnMut(&NameTreeEntry) -> bool,
    {
        let mut cur = self.get(id)?.first_child?;
        loop {
            let entry = self.get(cur)?;
            if pred(entry) {
                return Some(cur);
            }
            if let Some(child) = entry.first_child {
                cur = child;
                continue;
            }
            // Climb until a sibling is available.
            let mut node = cur;
            loop {
                let entry = self.get(node)?;
                if let Some(sibling) = entry.next_sibling {
                    cur = sibling;
                    break;
                }
                node = entry.parent?;
                if node == id {
                    return None;
                }
            }
        }
    }

    /// Rebuild the full name of an entry.
    pub fn name_of(&self, id: EntryId) -> Name {
        let mut components = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.get(c) {
                Some(entry) if c != ROOT => {
                    components.push(NameComponent::new(entry.component.clone()));
                    cur = entry.parent;
                }
                _ => break,
            }
        }
        let mut name = Name::new();
        for component in components.into_iter().rev() {
            name.push(component);
        }
        name
    }

    /// Reclaim `id` and then each ancestor, for as long as they carry no
    /// annotation and have no children. The root is never reclaimed.
    pub fn reclaim(&mut self, id: EntryId) {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ROOT {
                break;
            }
            let parent = match self.get(c) {
                Some(entry) if !entry.is_annotated() && !entry.has_children() => entry.parent,
                _ => break,
            };
            if let Some(p) = parent {
                self.unlink_child(p, c);
            }
            self.slots[c.0] = Slot::Free(self.free_head);
            self.free_head = Some(c.0);
            self.len -= 1;
            trace!("[NameTree] reclaimed entry {}", c.0);
            cur = parent;
        }
    }

    fn child(&self, parent: EntryId, component: &[u8]) -> Option<EntryId> {
        let mut cur = self.get(parent)?.first_child;
        while let Some(c) = cur {
            let entry = self.get(c)?;
            if entry.component.as_ref() == component {
                return Some(c);
            }
            cur = entry.next_sibling;
        }
        None
    }

    fn insert_parts(&mut self, parts: &[&[u8]]) -> Result<EntryId> {
        let mut cur = ROOT;
        for (depth, part) in parts.iter().enumerate() {
            cur = match self.child(cur, part) {
                Some(child) => child,
                None => match self.create(cur, part, depth + 1) {
                    Ok(child) => child,
                    Err(e) => {
                        // Drop the partially built chain.
                        self.reclaim(cur);
                        return Err(e);
                    }
                },
            };
        }
        Ok(cur)
    }

    fn find_parts(&self, parts: &[&[u8]]) -> Option<EntryId> {
        let mut cur = ROOT;
        for part in parts {
            cur = self.child(cur, part)?;
        }
        Some(cur)
    }

    fn prefix_match_parts(&self, parts: &[&[u8]], kind: Annotation) -> Option<EntryId> {
        let mut cur = ROOT;
        let mut best = self.get(ROOT).filter(|e| e.has(kind)).map(|_| ROOT);
        for part in parts {
            match self.child(cur, part) {
                Some(child) => {
                    cur = child;
                    if self.get(cur).map_or(false, |e| e.has(kind)) {
                        best = Some(cur);
                    }
                }
                None => break,
            }
        }
        best
    }

    fn create(&mut self, parent: EntryId, component: &[u8], depth: usize) -> Result<EntryId> {
        let index = match self.free_head {
            Some(index) => index,
            None => {
                debug!("[NameTree] arena full ({} entries)", self.capacity());
                return Err(Error::NameTreeFull);
            }
        };
        self.free_head = match self.slots[index] {
            Slot::Free(next) => next,
            Slot::Used(_) => None,
        };

        let id = EntryId(index);
        let mut entry = NameTreeEntry::new(Bytes::copy_from_slice(component), depth, Some(parent));
        if let Some(p) = self.get_mut(parent) {
            entry.next_sibling = p.first_child;
            p.first_child = Some(id);
        }
        self.slots[index] = Slot::Used(entry);
        self.len += 1;
        trace!("[NameTree] created entry {} at depth {}", index, depth);
        Ok(id)
    }

    fn unlink_child(&mut self, parent: EntryId, child: EntryId) {
        let next = self.get(child).and_then(|e| e.next_sibling);
        let first = self.get(parent).and_then(|e| e.first_child);
        if first == Some(child) {
            if let Some(p) = self.get_mut(parent) {
                p.first_child = next;
            }
            return;
        }
        let mut cur = first;
        while let Some(c) = cur {
            let sibling = self.get(c).and_then(|e| e.next_sibling);
            if sibling == Some(child) {
                if let Some(entry) = self.get_mut(c) {
                    entry.next_sibling = next;
                }
                return;
            }
            cur = sibling;
        }
    }
}
