//! Consistent-hash ring for deterministic key-to-peer selection.
//!
//! Maps keys to peer identifiers with bounded churn under membership
//! changes: adding a peer to a ring of N reassigns roughly 1/(N+1) of the
//! key space, all of it to the new peer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Ring Selection Flow                            │
//! │                                                                         │
//! │   add("A")  with replicas = 3                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   hash("0A"), hash("1A"), hash("2A")   ── 3 virtual nodes for "A"       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   entries: [(h, "A"), (h, "B"), …]  sorted ascending by hash            │
//! │                                                                         │
//! │   get(key):                                                             │
//! │     h = hash(key)                                                       │
//! │     first entry with hash ≥ h   (wrap to entries[0] past the end)       │
//! │                                                                         │
//! │          0 ──────────────────────────────► u32::MAX                     │
//! │          │   ▲B      ▲A     ▲key  ▲A   ▲B │                             │
//! │          │   │       │       └────┘       │   key → "A"                 │
//! │          └────────────────────────────────┘   (circular)                │
//! │                                                                         │
//! │ Properties                                                              │
//! │ ──────────                                                              │
//! │ • Deterministic: same (hash fn, members, key) → same peer               │
//! │ • Balanced: replicas spread each peer around the circle                 │
//! │ • Stable: adding a peer moves keys only onto that peer                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Hash Function
//!
//! The default is CRC-32 (IEEE) over the UTF-8 bytes, which is stable
//! across processes and platforms. Any `Fn(&[u8]) -> u32` can be injected
//! instead, which test fixtures use to pin exact placements. Virtual nodes
//! are hashed as `"{replica_index}{peer}"`, so distinct replicas of one
//! peer land at distinct points.
//!
//! ## Duplicate Members
//!
//! Re-adding an identifier appends another full set of replicas rather
//! than erroring; the identifier's share of the circle grows accordingly.
//! Entries are kept stably sorted, so among equal hashes the one added
//! first wins selection.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::ds::ring::HashRing;
//!
//! let mut ring = HashRing::new(50);
//! assert!(ring.get("Tom").is_none()); // empty ring selects nobody
//!
//! ring.add(["peer-a", "peer-b", "peer-c"]);
//!
//! let owner = ring.get("Tom").unwrap().to_owned();
//! assert_eq!(ring.get("Tom").unwrap(), owner); // deterministic
//! ```

use std::fmt;

/// Virtual nodes per peer when none are configured explicitly.
pub const DEFAULT_REPLICAS: usize = 50;

/// Stable 32-bit checksum used to place keys and virtual nodes on the ring.
pub type RingHashFn = dyn Fn(&[u8]) -> u32 + Send + Sync;

/// Consistent-hash peer selector with virtual nodes.
///
/// Not thread-safe; membership is fixed at startup in practice, and
/// owners that mutate concurrently must synchronize externally.
pub struct HashRing {
    replicas: usize,
    hash: Box<RingHashFn>,
    /// (hash, peer) pairs, stably sorted ascending by hash.
    entries: Vec<(u32, String)>,
}

impl HashRing {
    /// Creates a ring with `replicas` virtual nodes per peer and the
    /// default CRC-32 hash. The replica count is clamped to at least 1.
    pub fn new(replicas: usize) -> Self {
        Self::with_hash_fn(replicas, |bytes: &[u8]| crc32fast::hash(bytes))
    }

    /// Creates a ring with a caller-supplied hash function.
    ///
    /// The function must be stable across processes for identical inputs.
    /// Test fixtures inject trivial hashes here to pin exact owners.
    ///
    /// # Example
    ///
    /// ```
    /// use peercache::ds::ring::HashRing;
    ///
    /// // Keys and virtual nodes are decimal strings; hash = numeric value.
    /// let mut ring = HashRing::with_hash_fn(3, |bytes| {
    ///     std::str::from_utf8(bytes).unwrap().parse().unwrap()
    /// });
    /// ring.add(["6", "4", "2"]);
    ///
    /// // "11" falls between virtual nodes 06 and 12; 12 belongs to "2".
    /// assert_eq!(ring.get("11"), Some("2"));
    /// ```
    pub fn with_hash_fn<F>(replicas: usize, hash: F) -> Self
    where
        F: Fn(&[u8]) -> u32 + Send + Sync + 'static,
    {
        HashRing {
            replicas: replicas.max(1),
            hash: Box::new(hash),
            entries: Vec::new(),
        }
    }

    /// Registers peers, inserting `replicas` virtual nodes for each.
    ///
    /// Re-adding an existing identifier appends more replicas for it.
    pub fn add<I>(&mut self, peers: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for peer in peers {
            let peer = peer.into();
            for replica in 0..self.replicas {
                let point = (self.hash)(format!("{replica}{peer}").as_bytes());
                self.entries.push((point, peer.clone()));
            }
        }
        // Stable sort: equal hashes keep insertion order, so the earliest
        // registration wins selection.
        self.entries.sort_by_key(|(point, _)| *point);
    }

    /// Returns the peer owning `key`, or `None` on an empty ring.
    ///
    /// Selects the first virtual node clockwise from `hash(key)`, wrapping
    /// past the largest hash back to the smallest.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }

        let point = (self.hash)(key.as_bytes());
        let idx = self.entries.partition_point(|(entry, _)| *entry < point);
        let idx = if idx == self.entries.len() { 0 } else { idx };
        Some(self.entries[idx].1.as_str())
    }

    /// Number of virtual nodes currently on the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no peers are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured virtual nodes per peer.
    #[inline]
    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl Default for HashRing {
    /// Creates a ring with [`DEFAULT_REPLICAS`] virtual nodes per peer.
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.entries.len())
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Same members and key always select the same peer.
        #[test]
        fn selection_is_deterministic(
            peers in prop::collection::hash_set("[a-z]{1,8}", 1..8),
            key in "[a-zA-Z0-9]{0,16}",
        ) {
            let mut a = HashRing::new(16);
            let mut b = HashRing::new(16);
            let members: Vec<String> = peers.iter().cloned().collect();
            a.add(members.clone());
            b.add(members);

            prop_assert_eq!(a.get(&key), b.get(&key));
        }

        /// The selected peer is always a registered member.
        #[test]
        fn selection_is_a_member(
            peers in prop::collection::hash_set("[a-z]{1,8}", 1..8),
            keys in prop::collection::vec("[a-zA-Z0-9]{0,16}", 0..32),
        ) {
            let mut ring = HashRing::new(16);
            let members: Vec<String> = peers.iter().cloned().collect();
            ring.add(members);

            for key in keys {
                let owner = ring.get(&key);
                prop_assert!(owner.is_some());
                prop_assert!(peers.contains(owner.unwrap()));
            }
        }
    }
}
