use crate::node::{Nodes, Path};
use crate::{MAX_DEPTH, NODE_SIZE};
use std::iter::FusedIterator;

/// Iterator over `(key, &value)` pairs of an [`IMap`](crate::IMap).
///
/// Yields entries in the same order as [`walk`](crate::IMap::walk): a node's
/// own value, then everything below it, slot 0 first.
pub struct Iter<'a, T> {
    /// One frame per level: the array and the next slot to look at.
    stack: Vec<(&'a Nodes<T>, usize)>,
    path: Path,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(root: &'a Nodes<T>, len: usize) -> Self {
        let mut stack = Vec::with_capacity(MAX_DEPTH);
        if len > 0 {
            stack.push((root, 0));
        }
        Iter {
            stack,
            path: Path::default(),
            remaining: len,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (u64, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let frame = self.stack.last_mut()?;
            let (nodes, slot) = *frame;
            if slot == NODE_SIZE {
                self.stack.pop();
                continue;
            }
            frame.1 += 1;

            self.path.truncate(depth - 1);
            self.path = self.path.push(slot);

            let nd = &nodes[slot];
            if let Some(children) = &nd.nodes {
                self.stack.push((&**children, 0));
            }
            if let Some(value) = &nd.value {
                self.remaining -= 1;
                return Some((self.path.key(), value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
