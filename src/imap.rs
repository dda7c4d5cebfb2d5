use crate::node::{self, split, Path, SetOp, Tally};
use crate::{Error, IMap, Insert, Iter, RefCounted, Result};
use std::fmt::{self, Debug, Formatter};
use std::mem::size_of;
use tracing::{debug, error};

impl<T> IMap<T> {
    pub fn new() -> Self {
        IMap {
            len: 0,
            nodes: Default::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` under `key`.
    ///
    /// Returns [`Insert::Overwritten`] with the old value when the key was
    /// already present. Fails with [`Error::AllocationFailed`] when a node
    /// array could not be reserved; the map is left as it was.
    pub fn insert(&mut self, key: u64, value: T) -> Result<Insert<T>> {
        let (slot, key) = split(key);
        let nd = &mut self.nodes[slot];
        let res = if key == 0 {
            Ok(nd.set(value))
        } else {
            nd.insert(key - 1, value)
        };

        if let Ok(Insert::Inserted) = res {
            self.len += 1;
        }
        res
    }

    pub fn get(&self, key: u64) -> Option<&T> {
        let (slot, key) = split(key);
        let nd = &self.nodes[slot];
        if key == 0 {
            nd.value.as_ref()
        } else {
            nd.get(key - 1)
        }
    }

    pub fn get_mut(&mut self, key: u64) -> Option<&mut T> {
        let (slot, key) = split(key);
        let nd = &mut self.nodes[slot];
        if key == 0 {
            nd.value.as_mut()
        } else {
            nd.get_mut(key - 1)
        }
    }

    pub fn contains_key(&self, key: u64) -> bool {
        self.get(key).is_some()
    }

    /// Removes and returns the value under `key`.
    ///
    /// Node arrays emptied by the removal are freed before this returns.
    pub fn pop(&mut self, key: u64) -> Option<T> {
        let (slot, key) = split(key);
        let nd = &mut self.nodes[slot];
        let value = if key == 0 {
            nd.value.take()
        } else {
            nd.pop(key - 1)
        }?;

        self.len -= 1;
        Some(value)
    }

    pub fn remove(&mut self, key: u64) -> Option<T> {
        self.pop(key)
    }

    /// Drops every entry and frees all node arrays.
    pub fn clear(&mut self) {
        *self = IMap::new();
    }

    /// Destroys the map, handing every value to `cleanup` before any node
    /// array is freed.
    pub fn free_with<F>(mut self, mut cleanup: F)
    where
        F: FnMut(T),
    {
        if self.len == 0 {
            return;
        }
        for nd in self.nodes.iter_mut() {
            nd.drain_values(&mut cleanup);
        }
    }

    /// Calls `visit` on every value and returns the sum of the results.
    ///
    /// Values are visited in trie order, which is not key order.
    pub fn walk<F>(&self, mut visit: F) -> i64
    where
        F: FnMut(&T) -> i64,
    {
        if self.len == 0 {
            return 0;
        }
        self.nodes.iter().map(|nd| nd.walk(&mut visit)).sum()
    }

    /// Like [`walk`](IMap::walk), but every result is subtracted from
    /// `budget` and the walk stops as soon as `budget` reaches zero.
    pub fn walkn<F>(&self, budget: &mut usize, mut visit: F)
    where
        F: FnMut(&T) -> usize,
    {
        if self.len == 0 {
            return;
        }
        for nd in self.nodes.iter() {
            if *budget == 0 {
                return;
            }
            nd.walkn(budget, &mut visit);
        }
    }

    /// Collects references to every value, in trie order.
    pub fn to_vec(&self) -> Result<Vec<&T>> {
        let mut out = reserve(self.len)?;
        for nd in self.nodes.iter() {
            nd.collect(&mut out);
        }
        Ok(out)
    }

    /// Collects a new counted handle to every value, in trie order.
    ///
    /// The handles keep the objects alive independently of the map.
    pub fn to_vec_ref(&self) -> Result<Vec<T>>
    where
        T: RefCounted,
    {
        let mut out = reserve(self.len)?;
        for nd in self.nodes.iter() {
            nd.collect_ref(&mut out);
        }
        Ok(out)
    }

    /// Iterates over `(key, value)` pairs in trie order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(&self.nodes, self.len)
    }

    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Merges `other` into `self`.
    ///
    /// Entries only in `other` move over without copying, whole subtrees
    /// included. For keys present in both maps `self` keeps its handle and
    /// the one from `other` is released.
    ///
    /// `other` is always consumed. If the two maps hold different objects
    /// under one key, the merge still completes and
    /// [`Error::NonIdenticalDuplicate`] names the first such key. That check
    /// only runs in debug builds or with the `identity-checks` feature.
    pub fn union_ref(&mut self, other: IMap<T>) -> Result<()>
    where
        T: RefCounted,
    {
        if other.is_empty() {
            return Ok(());
        }
        self.merge_ref(other, SetOp::Union)
    }

    /// Keeps only the keys present in both maps, releasing every other
    /// handle of both maps.
    pub fn intersection_ref(&mut self, other: IMap<T>) -> Result<()>
    where
        T: RefCounted,
    {
        self.merge_ref(other, SetOp::Intersection)
    }

    /// Removes the keys of `other` from `self`, releasing both handles of
    /// every shared key.
    pub fn difference_ref(&mut self, other: IMap<T>) -> Result<()>
    where
        T: RefCounted,
    {
        if other.is_empty() {
            return Ok(());
        }
        self.merge_ref(other, SetOp::Difference)
    }

    /// Keeps the keys present in exactly one of the two maps.
    pub fn symmetric_difference_ref(&mut self, other: IMap<T>) -> Result<()>
    where
        T: RefCounted,
    {
        if other.is_empty() {
            return Ok(());
        }
        self.merge_ref(other, SetOp::SymmetricDifference)
    }

    fn merge_ref(&mut self, other: IMap<T>, op: SetOp) -> Result<()>
    where
        T: RefCounted,
    {
        let mut tally = Tally::default();
        let (added, removed) = node::merge(&mut self.nodes, other.nodes, Path::default(), op, &mut tally);
        self.len = self.len + added - removed;

        debug!(
            ?op,
            added,
            removed,
            moved = tally.moved,
            released = tally.released,
            len = self.len,
            "merged maps"
        );

        match tally.mismatch {
            Some(key) => Err(Error::NonIdenticalDuplicate { key }),
            None => Ok(()),
        }
    }
}

fn reserve<V>(len: usize) -> Result<Vec<V>> {
    let mut out = Vec::new();
    if out.try_reserve_exact(len).is_err() {
        let bytes = len.saturating_mul(size_of::<V>());
        error!(bytes, len, "failed to allocate export buffer");
        return Err(Error::AllocationFailed { bytes });
    }
    Ok(out)
}

impl<T> Default for IMap<T> {
    fn default() -> Self {
        IMap::new()
    }
}

impl<T: Debug> Debug for IMap<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a IMap<T> {
    type Item = (u64, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
