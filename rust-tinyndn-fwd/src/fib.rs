//! FIB (Forwarding Information Base) operations.
//!
//! This module maps name prefixes to next-hop faces. A FIB record is a
//! bounded nexthop set hanging off a name-tree entry; lookups are
//! longest-prefix matches over the name-tree.

use crate::name_tree::{Annotation, EntryId, NameTree};
use log::{debug, info};
use rust_tinyndn_common::{Error, FaceId, Name, RemoveStatus, Result};

/// Index of a FIB record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FibId(pub(crate) usize);

/// One outgoing face of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nexthop {
    pub face: FaceId,
    /// Lower is preferred.
    pub cost: u8,
}

/// The nexthop set registered under one prefix.
#[derive(Debug, Clone)]
pub struct FibEntry {
    node: EntryId,
    nexthops: Vec<Nexthop>,
}

impl FibEntry {
    /// Name-tree entry holding the prefix.
    pub fn node(&self) -> EntryId {
        self.node
    }

    /// Nexthops in ascending cost order.
    pub fn nexthops(&self) -> &[Nexthop] {
        &self.nexthops
    }

    pub fn contains(&self, face: FaceId) -> bool {
        self.nexthops.iter().any(|n| n.face == face)
    }
}

/// Bounded table of FIB records.
#[derive(Debug)]
pub struct Fib {
    entries: Vec<Option<FibEntry>>,
    max_nexthops: usize,
    len: usize,
}

impl Fib {
    pub fn new(capacity: usize, max_nexthops: usize) -> Self {
        Self {
            entries: vec![None; capacity],
            max_nexthops,
            len: 0,
        }
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

    pub fn get(&self, id: FibId) -> Option<&FibEntry> {
        self.entries.get(id.0).and_then(Option::as_ref)
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = (FibId, &FibEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (FibId(i), e)))
    }

    /// Add `face` as a nexthop for `prefix`.
    ///
    /// Adding a face that is already present only updates its cost.
    pub fn add_route(
        &mut self,
        tree: &mut NameTree,
        face: FaceId,
        prefix: &Name,
        cost: u8,
    ) -> Result<()> {
        let node = tree.find_or_insert_name(prefix)?;

        if let Some(id) = tree.get(node).and_then(|e| e.fib) {
            let max_nexthops = self.max_nexthops;
            let entry = self.entries[id.0].as_mut().ok_or(Error::FibFull)?;
            let full = entry.nexthops.len() >= max_nexthops;
            match entry.nexthops.iter_mut().find(|n| n.face == face) {
                Some(existing) => existing.cost = cost,
                None if full => {
                    return Err(Error::FibNexthopsFull);
                }
                None => entry.nexthops.push(Nexthop { face, cost }),
            }
            entry.nexthops.sort_by_key(|n| n.cost);
            debug!("[FIB] {} += {} (cost {})", prefix, face, cost);
            return Ok(());
        }

        let slot = match self.entries.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                tree.reclaim(node);
                return Err(Error::FibFull);
            }
        };
        self.entries[slot] = Some(FibEntry {
            node,
            nexthops: vec![Nexthop { face, cost }],
        });
        if let Some(entry) = tree.get_mut(node) {
            entry.fib = Some(FibId(slot));
        }
        self.len += 1;
        info!("[FIB] new route {} -> {} (cost {})", prefix, face, cost);
        Ok(())
    }

    /// Remove `face` from the nexthops of `prefix`.
    ///
    /// The record is released once its last nexthop goes away.
    pub fn remove_route(
        &mut self,
        tree: &mut NameTree,
        face: FaceId,
        prefix: &Name,
    ) -> Result<RemoveStatus> {
        let id = match self.record_for(tree, prefix)? {
            Some(id) => id,
            None => return Ok(RemoveStatus::NoEffect),
        };
        let entry = match self.entries[id.0].as_mut() {
            Some(entry) => entry,
            None => return Ok(RemoveStatus::NoEffect),
        };
        let before = entry.nexthops.len();
        entry.nexthops.retain(|n| n.face != face);
        if entry.nexthops.len() == before {
            return Ok(RemoveStatus::NoEffect);
        }
        debug!("[FIB] {} -= {}", prefix, face);
        if entry.nexthops.is_empty() {
            self.release(tree, id);
        }
        Ok(RemoveStatus::Removed)
    }

    /// Drop the whole record for `prefix`.
    pub fn remove_all_routes(&mut self, tree: &mut NameTree, prefix: &Name) -> Result<RemoveStatus> {
        match self.record_for(tree, prefix)? {
            Some(id) => {
                self.release(tree, id);
                info!("[FIB] removed all routes for {}", prefix);
                Ok(RemoveStatus::Removed)
            }
            None => Ok(RemoveStatus::NoEffect),
        }
    }

    /// Remove `face` from every record. Returns the number of records touched.
    pub fn remove_face(&mut self, tree: &mut NameTree, face: FaceId) -> usize {
        let mut touched = 0;
        for i in 0..self.entries.len() {
            let now_empty = match self.entries[i].as_mut() {
                Some(entry) if entry.contains(face) => {
                    entry.nexthops.retain(|n| n.face != face);
                    touched += 1;
                    entry.nexthops.is_empty()
                }
                _ => continue,
            };
            if now_empty {
                self.release(tree, FibId(i));
            }
        }
        touched
    }

    /// Longest-prefix match for `name`.
    pub fn lookup(&self, tree: &NameTree, name: &Name) -> Result<Option<&FibEntry>> {
        let node = tree.prefix_match_name(name, Annotation::Fib)?;
        Ok(node
            .and_then(|n| tree.get(n))
            .and_then(|e| e.fib)
            .and_then(|id| self.get(id)))
    }

    fn record_for(&self, tree: &NameTree, prefix: &Name) -> Result<Option<FibId>> {
        Ok(tree
            .find_name(prefix)?
            .and_then(|node| tree.get(node))
            .and_then(|e| e.fib))
    }

    fn release(&mut self, tree: &mut NameTree, id: FibId) {
        if let Some(entry) = self.entries[id.0].take() {
            if let Some(node) = tree.get_mut(entry.node) {
                node.fib = None;
            }
            tree.reclaim(entry.node);
            self.len -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn setup() -> (Fib, NameTree) {
        (Fib::new(4, 2), NameTree::new(32))
    }

    #[test]
    fn test_add_and_lookup() {
        let (mut fib, mut tree) = setup();
        fib.add_route(&mut tree, FaceId(1), &name("/aaa"), 10).unwrap();
        fib.add_route(&mut tree, FaceId(2), &name("/aaa/bbb"), 10).unwrap();

        let hit = fib.lookup(&tree, &name("/aaa/bbb/ccc/ddd")).unwrap().unwrap();
        assert_eq!(hit.nexthops()[0].face, FaceId(2));
        let hit = fib.lookup(&tree, &name("/aaa/zzz")).unwrap().unwrap();
        assert_eq!(hit.nexthops()[0].face, FaceId(1));
        assert!(fib.lookup(&tree, &name("/other")).unwrap().is_none());
    }

    #[test]
    fn test_add_is_idempotent_and_updates_cost() {
        let (mut fib, mut tree) = setup();
        fib.add_route(&mut tree, FaceId(1), &name("/p"), 10).unwrap();
        fib.add_route(&mut tree, FaceId(2), &name("/p"), 5).unwrap();
        fib.add_route(&mut tree, FaceId(1), &name("/p"), 1).unwrap();
        assert_eq!(fib.len(), 1);

        let entry = fib.lookup(&tree, &name("/p")).unwrap().unwrap();
        let faces: Vec<FaceId> = entry.nexthops().iter().map(|n| n.face).collect();
        assert_eq!(faces, vec![FaceId(1), FaceId(2)]);
    }

    #[test]
    fn test_nexthop_limit() {
        let (mut fib, mut tree) = setup();
        fib.add_route(&mut tree, FaceId(1), &name("/p"), 0).unwrap();
        fib.add_route(&mut tree, FaceId(2), &name("/p"), 0).unwrap();
        assert!(matches!(
            fib.add_route(&mut tree, FaceId(3), &name("/p"), 0),
            Err(Error::FibNexthopsFull)
        ));
        // A full record still accepts cost updates for its own nexthops.
        fib.add_route(&mut tree, FaceId(1), &name("/p"), 7).unwrap();
        let entry = fib.lookup(&tree, &name("/p")).unwrap().unwrap();
        let faces: Vec<FaceId> = entry.nexthops().iter().map(|n| n.face).collect();
        assert_eq!(faces, vec![FaceId(2), FaceId(1)]);
    }

    #[test]
    fn test_fib_full_leaves_tree_clean() {
        let (mut fib, mut tree) = setup();
        for i in 0..4 {
            fib.add_route(&mut tree, FaceId(1), &name(&format!("/p{}", i)), 0).unwrap();
        }
        let before = tree.len();
        assert!(matches!(
            fib.add_route(&mut tree, FaceId(1), &name("/q/r"), 0),
            Err(Error::FibFull)
        ));
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn test_remove_route() {
        let (mut fib, mut tree) = setup();
        fib.add_route(&mut tree, FaceId(1), &name("/p/q"), 0).unwrap();
        fib.add_route(&mut tree, FaceId(2), &name("/p/q"), 0).unwrap();

        assert_eq!(
            fib.remove_route(&mut tree, FaceId(1), &name("/p/q")).unwrap(),
            RemoveStatus::Removed
        );
        assert_eq!(fib.len(), 1);
        assert_eq!(
            fib.remove_route(&mut tree, FaceId(2), &name("/p/q")).unwrap(),
            RemoveStatus::Removed
        );
        assert!(fib.is_empty());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_remove_missing_is_no_effect() {
        let (mut fib, mut tree) = setup();
        assert_eq!(
            fib.remove_route(&mut tree, FaceId(1), &name("/nothing")).unwrap(),
            RemoveStatus::NoEffect
        );
        assert_eq!(
            fib.remove_all_routes(&mut tree, &name("/nothing")).unwrap(),
            RemoveStatus::NoEffect
        );
        fib.add_route(&mut tree, FaceId(1), &name("/p"), 0).unwrap();
        assert_eq!(
            fib.remove_route(&mut tree, FaceId(9), &name("/p")).unwrap(),
            RemoveStatus::NoEffect
        );
        assert_eq!(
            fib.remove_all_routes(&mut tree, &name("/p")).unwrap(),
            RemoveStatus::Removed
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn test_remove_face_everywhere() {
        let (mut fib, mut tree) = setup();
        fib.add_route(&mut tree, FaceId(1), &name("/a"), 0).unwrap();
        fib.add_route(&mut tree, FaceId(1), &name("/b"), 0).unwrap();
        fib.add_route(&mut tree, FaceId(2), &name("/b"), 0).unwrap();

        assert_eq!(fib.remove_face(&mut tree, FaceId(1)), 2);
        assert_eq!(fib.len(), 1);
        assert!(fib.lookup(&tree, &name("/a/x")).unwrap().is_none());
        assert!(fib.lookup(&tree, &name("/b/x")).unwrap().unwrap().contains(FaceId(2)));
    }
}
