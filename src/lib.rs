//! peercache: distributed read-through in-memory byte caching primitives.
//!
//! A key is owned by exactly one node of a fixed peer set; reads resolve
//! local-hit → peer-fetch → local-load, with concurrent duplicate loads
//! coalesced per key. See `DESIGN.md` for architecture and invariants.

pub mod ds;
pub mod policy;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod builder;
pub mod error;
pub mod group;
pub mod prelude;
pub mod traits;
pub mod view;
