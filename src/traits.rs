//! # Capability Traits
//!
//! This module defines the capability seams of the cache: how a value
//! reports its size, how missing data is loaded, and how keys are routed to
//! peer nodes. Each concern is a single-method capability so callers can
//! supply either a closure or a stateful object.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────────────────────────────┐
//!                  │              Group::get(key)             │
//!                  └──────┬──────────────┬──────────────┬─────┘
//!                         │              │              │
//!                         ▼              ▼              ▼
//!              ┌────────────────┐ ┌─────────────┐ ┌────────────────┐
//!              │  Weighted      │ │ PeerPicker  │ │    Loader      │
//!              │                │ │             │ │                │
//!              │  weight() →    │ │ pick_peer() │ │ load(key) →    │
//!              │  byte cost for │ │ → owner of  │ │ authoritative  │
//!              │  LRU budgeting │ │ the key, or │ │ bytes-or-error │
//!              │                │ │ None (self/ │ │                │
//!              │                │ │ empty ring) │ │                │
//!              └────────────────┘ └──────┬──────┘ └────────────────┘
//!                                        │
//!                                        ▼
//!                               ┌────────────────┐
//!                               │  PeerFetcher   │
//!                               │                │
//!                               │ fetch(group,   │
//!                               │   key) → bytes │
//!                               └────────────────┘
//! ```
//!
//! ## Trait Summary
//!
//! | Trait         | Implemented by                         | Purpose                     |
//! |---------------|----------------------------------------|-----------------------------|
//! | `Weighted`    | cached value types                     | byte cost for the budget    |
//! | `Loader`      | user code (closure or struct)          | authoritative data source   |
//! | `PeerPicker`  | peer pools (transport layer)           | key → owning peer           |
//! | `PeerFetcher` | one remote peer handle                 | fetch a key from that peer  |
//!
//! A blanket impl lifts any `Fn(&str) -> Result<Vec<u8>, LoadError>` into
//! [`Loader`], so plain functions and capturing closures work directly:
//!
//! ```
//! use peercache::error::LoadError;
//! use peercache::traits::Loader;
//!
//! fn takes_loader(loader: impl Loader) -> Result<Vec<u8>, LoadError> {
//!     loader.load("Tom")
//! }
//!
//! let echo = |key: &str| -> Result<Vec<u8>, LoadError> { Ok(key.as_bytes().to_vec()) };
//! assert_eq!(takes_loader(echo).unwrap(), b"Tom");
//! ```

use crate::error::LoadError;

/// Values that can report their size in bytes.
///
/// The LRU engine is polymorphic over any value exposing a byte weight; an
/// entry is charged `key.len() + value.weight()` against the cache budget.
/// The weight must be cheap to compute and constant for the lifetime of the
/// value.
///
/// # Example
///
/// ```
/// use peercache::traits::Weighted;
///
/// struct Row {
///     csv: String,
/// }
///
/// impl Weighted for Row {
///     fn weight(&self) -> usize {
///         self.csv.len()
///     }
/// }
///
/// assert_eq!(Row { csv: "a,b,c".into() }.weight(), 5);
/// ```
pub trait Weighted {
    /// Size of the value in bytes.
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    #[inline]
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    #[inline]
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Authoritative data source consulted on a true cache miss.
///
/// Returning an error propagates to the caller of
/// [`Group::get`](crate::group::Group::get). Returning empty bytes is
/// allowed and caches an empty value.
///
/// Any `Fn(&str) -> Result<Vec<u8>, LoadError> + Send + Sync` closure is a
/// `Loader` via the blanket impl below; stateful sources implement the
/// trait directly.
pub trait Loader: Send + Sync {
    /// Produces the authoritative bytes for `key`.
    fn load(&self, key: &str) -> Result<Vec<u8>, LoadError>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Vec<u8>, LoadError> + Send + Sync,
{
    #[inline]
    fn load(&self, key: &str) -> Result<Vec<u8>, LoadError> {
        self(key)
    }
}

/// Selects the peer that owns a key.
///
/// Implementations must return `None` both when no peer is registered and
/// when the selected peer is the local node, so the coordinator runs the
/// local loader without a self-RPC. The returned fetcher borrows from the
/// picker for the duration of the slow path.
pub trait PeerPicker: Send + Sync {
    /// Returns a handle to the remote owner of `key`, or `None` when the
    /// key should be loaded locally.
    fn pick_peer(&self, key: &str) -> Option<&dyn PeerFetcher>;
}

/// A handle to one remote peer.
///
/// The transport is implementation-defined; only the logical request
/// (group name + key) and response (value bytes) are fixed here. Response
/// bytes are treated as authoritative and are not re-validated.
pub trait PeerFetcher: Send + Sync {
    /// Fetches `key` from the remote group named `group`.
    fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>, LoadError>;
}
