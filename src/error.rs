use thiserror::Error;

/// Errors reported by map operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A node array or an export buffer could not be reserved.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Size of the reservation that failed.
        bytes: usize,
    },

    /// A set operation found two different objects stored under one key.
    #[error("non-identical objects stored under key {key}")]
    NonIdenticalDuplicate {
        /// First key where the mismatch was seen.
        key: u64,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
