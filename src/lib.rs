//! # imap-rs
//!
//! A map for `u64` keys, tuned for sparse and mostly small keys such as object
//! ids and timestamps.
//!
//! Keys are consumed one base-32 digit at a time, least significant digit
//! first. A key that fits in one digit lives directly in the inlined root
//! array, so small ids never allocate, while the full 64-bit key space is
//! still reachable in at most [`MAX_DEPTH`] levels.
//!
//! ## Example
//!
//! ```rust
//! use imap_rs::{IMap, Insert};
//!
//! let mut map: IMap<&str> = IMap::new();
//! assert!(matches!(map.insert(7, "seven"), Ok(Insert::Inserted)));
//! assert!(matches!(map.insert(7, "SEVEN"), Ok(Insert::Overwritten("seven"))));
//!
//! assert_eq!(map.get(7), Some(&"SEVEN"));
//! assert_eq!(map.pop(7), Some("SEVEN"));
//! assert!(map.is_empty());
//! ```
//!
//! Traversal (`walk`, `walkn`, `iter`, `to_vec`) is a pre-order descent of the
//! trie. Because the first digit is the lowest one, entries come out grouped
//! by their low digits, **not** in ascending key order.

mod error;
mod imap;
mod iter;
mod node;
mod refcount;

#[cfg(test)]
mod proptests;

pub use crate::error::{Error, Result};
pub use crate::iter::Iter;
pub use crate::refcount::RefCounted;

/// Fan-out of every node array; one key digit selects one of these slots.
pub const NODE_SIZE: usize = 32;

/// Deepest descent needed for a 64-bit key (`ceil(64 / 5)` digits).
pub const MAX_DEPTH: usize = 13;

/// Map from `u64` keys to owned values.
pub struct IMap<T> {
    len: usize,
    nodes: [Node<T>; NODE_SIZE],
}

/// One digit slot.
///
/// `value` holds the entry whose key ends at this digit, `nodes` holds the
/// entries that continue past it. Both may be set at the same time.
struct Node<T> {
    value: Option<T>,
    nodes: Option<Box<[Node<T>; NODE_SIZE]>>,
    /// Live entries under `nodes`; zero exactly when `nodes` is `None`.
    size: usize,
}

/// Outcome of a successful [`IMap::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insert<T> {
    /// The key was not present before.
    Inserted,
    /// The key was present; its previous value is handed back.
    Overwritten(T),
}
