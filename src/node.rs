use crate::{Error, Insert, Node, RefCounted, Result, MAX_DEPTH, NODE_SIZE};
use std::mem::size_of;
use tracing::{error, warn};

pub(crate) type Nodes<T> = [Node<T>; NODE_SIZE];

const IDENTITY_CHECKS: bool = cfg!(any(debug_assertions, feature = "identity-checks"));

/// Splits off the lowest digit: `(slot, rest)`.
///
/// A zero `rest` means the key ends at `slot`; otherwise the walk continues
/// one level down with `rest - 1`.
#[inline]
pub(crate) fn split(key: u64) -> (usize, u64) {
    ((key % NODE_SIZE as u64) as usize, key / NODE_SIZE as u64)
}

/// Reserves a fresh array of empty nodes, reporting failure instead of
/// aborting.
pub(crate) fn alloc_nodes<T>() -> Result<Box<Nodes<T>>> {
    let bytes = size_of::<Nodes<T>>();
    let mut nodes: Vec<Node<T>> = Vec::new();
    if nodes.try_reserve_exact(NODE_SIZE).is_err() {
        error!(bytes, "failed to allocate node array");
        return Err(Error::AllocationFailed { bytes });
    }
    nodes.resize_with(NODE_SIZE, Node::default);
    // length is exactly NODE_SIZE, the conversion cannot fail
    nodes
        .into_boxed_slice()
        .try_into()
        .map_err(|_| Error::AllocationFailed { bytes })
}

/// Slots walked from the root down to an entry.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Path {
    slots: [u8; MAX_DEPTH],
    depth: usize,
}

impl Path {
    pub(crate) fn push(mut self, slot: usize) -> Self {
        self.slots[self.depth] = slot as u8;
        self.depth += 1;
        self
    }

    pub(crate) fn truncate(&mut self, depth: usize) {
        self.depth = depth.min(self.depth);
    }

    /// Rebuilds the key of the entry stored at the last slot.
    pub(crate) fn key(&self) -> u64 {
        let mut slots = self.slots[..self.depth].iter().rev();
        let mut key = slots.next().map_or(0, |&slot| slot as u64);
        for &slot in slots {
            key = slot as u64 + NODE_SIZE as u64 * (key + 1);
        }
        key
    }
}

/// The reference-counted set operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SetOp {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}

impl SetOp {
    /// Whether entries found only in the other map move over.
    fn keeps_incoming(self) -> bool {
        matches!(self, SetOp::Union | SetOp::SymmetricDifference)
    }

    /// Whether entries found in both maps survive in the destination.
    fn keeps_shared(self) -> bool {
        matches!(self, SetOp::Union | SetOp::Intersection)
    }

    /// Whether entries found only in the destination survive.
    fn keeps_own(self) -> bool {
        self != SetOp::Intersection
    }
}

/// Bookkeeping for one set operation.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub(crate) moved: usize,
    pub(crate) released: usize,
    pub(crate) mismatch: Option<u64>,
}

impl Tally {
    fn release<T: RefCounted>(&mut self, value: T) {
        self.released += 1;
        value.decref();
    }

    /// Drops the incoming duplicate of `kept`.
    fn release_duplicate<T: RefCounted>(&mut self, kept: &T, incoming: T, path: Path) {
        if IDENTITY_CHECKS && self.mismatch.is_none() && !kept.same_object(&incoming) {
            let key = path.key();
            warn!(key, "set operation found different objects under one key");
            self.mismatch = Some(key);
        }
        self.release(incoming);
    }
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Node {
            value: None,
            nodes: None,
            size: 0,
        }
    }
}

impl<T> Node<T> {
    pub(crate) fn set(&mut self, value: T) -> Insert<T> {
        match self.value.replace(value) {
            Some(old) => Insert::Overwritten(old),
            None => Insert::Inserted,
        }
    }

    /// Stores `value` under `key` below this node, allocating arrays on the
    /// way down. `size` only grows once the deepest write succeeded.
    pub(crate) fn insert(&mut self, key: u64, value: T) -> Result<Insert<T>> {
        let mut nodes = match self.nodes.take() {
            Some(nodes) => nodes,
            None => alloc_nodes()?,
        };

        let (slot, key) = split(key);
        let nd = &mut nodes[slot];
        let res = if key == 0 {
            Ok(nd.set(value))
        } else {
            nd.insert(key - 1, value)
        };

        if let Ok(Insert::Inserted) = res {
            self.size += 1;
        }
        // an array allocated by a failed call is dropped here
        if self.size > 0 {
            self.nodes = Some(nodes);
        }
        res
    }

    pub(crate) fn get(&self, key: u64) -> Option<&T> {
        let (slot, key) = split(key);
        let nd = &self.nodes.as_ref()?[slot];
        if key == 0 {
            nd.value.as_ref()
        } else {
            nd.get(key - 1)
        }
    }

    pub(crate) fn get_mut(&mut self, key: u64) -> Option<&mut T> {
        let (slot, key) = split(key);
        let nd = &mut self.nodes.as_mut()?[slot];
        if key == 0 {
            nd.value.as_mut()
        } else {
            nd.get_mut(key - 1)
        }
    }

    /// Removes `key` below this node and frees every array it empties.
    pub(crate) fn pop(&mut self, key: u64) -> Option<T> {
        let (slot, key) = split(key);
        let nd = &mut self.nodes.as_mut()?[slot];
        let value = if key == 0 {
            nd.value.take()
        } else {
            nd.pop(key - 1)
        }?;

        self.size -= 1;
        if self.size == 0 {
            self.nodes = None;
        }
        Some(value)
    }

    /// Own value first, then the children from slot 0 to 31.
    pub(crate) fn walk<F>(&self, visit: &mut F) -> i64
    where
        F: FnMut(&T) -> i64,
    {
        let mut total = self.value.as_ref().map_or(0, |value| visit(value));
        if let Some(nodes) = &self.nodes {
            for nd in nodes.iter() {
                total += nd.walk(visit);
            }
        }
        total
    }

    pub(crate) fn walkn<F>(&self, budget: &mut usize, visit: &mut F)
    where
        F: FnMut(&T) -> usize,
    {
        if let Some(value) = &self.value {
            *budget = budget.saturating_sub(visit(value));
            if *budget == 0 {
                return;
            }
        }
        if let Some(nodes) = &self.nodes {
            for nd in nodes.iter() {
                if *budget == 0 {
                    return;
                }
                nd.walkn(budget, visit);
            }
        }
    }

    pub(crate) fn collect<'a>(&'a self, out: &mut Vec<&'a T>) {
        if let Some(value) = &self.value {
            out.push(value);
        }
        if let Some(nodes) = &self.nodes {
            nodes.iter().for_each(|nd| nd.collect(out));
        }
    }

    pub(crate) fn collect_ref(&self, out: &mut Vec<T>)
    where
        T: RefCounted,
    {
        if let Some(value) = &self.value {
            out.push(value.incref());
        }
        if let Some(nodes) = &self.nodes {
            nodes.iter().for_each(|nd| nd.collect_ref(out));
        }
    }

    /// Hands every value to `cleanup`; arrays stay allocated.
    pub(crate) fn drain_values<F>(&mut self, cleanup: &mut F)
    where
        F: FnMut(T),
    {
        if let Some(value) = self.value.take() {
            cleanup(value);
        }
        if let Some(nodes) = &mut self.nodes {
            nodes.iter_mut().for_each(|nd| nd.drain_values(cleanup));
        }
    }

    /// Releases every handle held by this node and below.
    fn release(self, tally: &mut Tally)
    where
        T: RefCounted,
    {
        if let Some(value) = self.value {
            tally.release(value);
        }
        if let Some(nodes) = self.nodes {
            for nd in *nodes {
                nd.release(tally);
            }
        }
    }
}

/// Combines `src` into `dest` slot by slot and returns how many entries
/// `dest` gained and lost. `src` is consumed; every handle it holds either
/// moves into `dest` or is released.
pub(crate) fn merge<T: RefCounted>(
    dest: &mut Nodes<T>,
    src: Nodes<T>,
    path: Path,
    op: SetOp,
    tally: &mut Tally,
) -> (usize, usize) {
    let mut added = 0;
    let mut removed = 0;

    for (slot, (dn, sn)) in dest.iter_mut().zip(src).enumerate() {
        let path = path.push(slot);

        match (dn.value.take(), sn.value) {
            (Some(kept), Some(incoming)) => {
                tally.release_duplicate(&kept, incoming, path);
                if op.keeps_shared() {
                    dn.value = Some(kept);
                } else {
                    tally.release(kept);
                    removed += 1;
                }
            }
            (Some(kept), None) => {
                if op.keeps_own() {
                    dn.value = Some(kept);
                } else {
                    tally.release(kept);
                    removed += 1;
                }
            }
            (None, Some(incoming)) => {
                if op.keeps_incoming() {
                    dn.value = Some(incoming);
                    tally.moved += 1;
                    added += 1;
                } else {
                    tally.release(incoming);
                }
            }
            (None, None) => {}
        }

        match (dn.nodes.take(), sn.nodes) {
            (Some(mut nodes), Some(incoming)) => {
                let (a, r) = merge(&mut nodes, *incoming, path, op, tally);
                dn.size = dn.size + a - r;
                if dn.size > 0 {
                    dn.nodes = Some(nodes);
                }
                added += a;
                removed += r;
            }
            (Some(nodes), None) => {
                if op.keeps_own() {
                    dn.nodes = Some(nodes);
                } else {
                    for nd in *nodes {
                        nd.release(tally);
                    }
                    removed += dn.size;
                    dn.size = 0;
                }
            }
            (None, Some(incoming)) => {
                if op.keeps_incoming() {
                    dn.nodes = Some(incoming);
                    dn.size = sn.size;
                    tally.moved += sn.size;
                    added += sn.size;
                } else {
                    for nd in *incoming {
                        nd.release(tally);
                    }
                }
            }
            (None, None) => {}
        }
    }

    (added, removed)
}
