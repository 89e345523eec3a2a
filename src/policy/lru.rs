//! # Byte-Budget Least Recently Used (LRU) Cache
//!
//! This module provides the recency-ordered eviction engine at the heart of
//! every cache group, plus the thread-safe wrapper used on the read path.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                       ConcurrentLruCache<V>                              │
//!   │                                                                          │
//!   │   ┌────────────────────────────────────────────────────────────────────┐ │
//!   │   │              parking_lot::Mutex<Option<LruCore<V>>>                │ │
//!   │   │              (engine built lazily on first add)                    │ │
//!   │   └────────────────────────────────────────────────────────────────────┘ │
//!   │                                  │                                       │
//!   │                                  ▼                                       │
//!   │   ┌────────────────────────────────────────────────────────────────────┐ │
//!   │   │                         LruCore<V>                                 │ │
//!   │   │                                                                    │ │
//!   │   │   ┌──────────────────────────────────────────────────────────────┐ │ │
//!   │   │   │  FxHashMap<String, NonNull<Node<V>>>                         │ │ │
//!   │   │   │                                                              │ │ │
//!   │   │   │  ┌─────────┬──────────────────────────────────────────┐      │ │ │
//!   │   │   │  │   Key   │  node ptr                                │      │ │ │
//!   │   │   │  ├─────────┼──────────────────────────────────────────┤      │ │ │
//!   │   │   │  │  "Tom"  │  ────────────────────────────────────┐   │      │ │ │
//!   │   │   │  │  "Jack" │  ──────────────────────────────┐     │   │      │ │ │
//!   │   │   │  │  "Sam"  │  ────────────────────────┐     │     │   │      │ │ │
//!   │   │   │  └─────────┴──────────────────────────┼─────┼─────┼───┘      │ │ │
//!   │   │   └───────────────────────────────────────┼─────┼─────┼──────────┘ │ │
//!   │   │                                           ▼     ▼     ▼            │ │
//!   │   │   head ──► ┌──────┐ ◄──► ┌──────┐ ◄──► ┌──────┐ ◄── tail           │ │
//!   │   │     (MRU)  │ Node │      │ Node │      │ Node │   (LRU)            │ │
//!   │   │            └──────┘      └──────┘      └──────┘                    │ │
//!   │   │                                                                    │ │
//!   │   │   total_bytes = Σ (key.len() + value.weight())  ≤  max_bytes       │ │
//!   │   └────────────────────────────────────────────────────────────────────┘ │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Byte Accounting
//!
//! Every entry is charged `key.len() + value.weight()` against the budget.
//! `add` enforces the budget by evicting from the tail until
//! `total_bytes <= max_bytes`; a budget of 0 disables enforcement entirely
//! (unbounded cache). An entry whose lone cost exceeds a non-zero budget is
//! admitted and then evicted by the same loop — it is the tail at that
//! point, so the loop runs exactly once and leaves the cache empty.
//!
//! ## LruCore Methods
//!
//! | Method            | Complexity | Description                                |
//! |-------------------|------------|--------------------------------------------|
//! | `new(max_bytes)`  | O(1)       | Create engine with a byte budget (0 = ∞)   |
//! | `add(k, v)`       | O(1)*      | Insert or update, then enforce the budget  |
//! | `get(&k)`         | O(1)       | Get value, promotes to MRU position        |
//! | `peek(&k)`        | O(1)       | Get value without promotion                |
//! | `contains(&k)`    | O(1)       | Check existence, no promotion              |
//! | `remove_oldest()` | O(1)       | Evict the tail, fire the listener          |
//! | `len()`           | O(1)       | Current number of entries                  |
//! | `total_bytes()`   | O(1)       | Current charged bytes                      |
//!
//! *`add` is O(k) in the number of entries the budget enforcement displaces.
//!
//! ## Concurrency Model
//!
//! `LruCore` is **not** thread-safe; every read promotes, so the wrapper
//! takes one exclusive `parking_lot::Mutex` for reads and writes alike.
//! Recency updates happen under the same lock as the lookup, so an observer
//! never sees a missing promotion for a value it just read. The engine is
//! built lazily on first `add`, so zero-use groups allocate nothing.
//!
//! ## Safety
//!
//! Nodes are heap-allocated and tracked via `NonNull` pointers owned by the
//! map; the list holds no owning references. All unsafe blocks are confined
//! to detach/attach/pop operations, and a debug-only `validate_invariants`
//! walks the list checking map agreement, byte accounting, and cycles.

use std::fmt;
use std::ptr::NonNull;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::traits::Weighted;

/// Callback invoked with the displaced entry after each forced eviction.
pub type EvictionListener<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Node in the recency list.
///
/// The key lives in the node (for map removal during eviction) and, cloned,
/// in the map itself. Only the node copy is charged against the budget.
struct Node<V> {
    prev: Option<NonNull<Node<V>>>,
    next: Option<NonNull<Node<V>>>,
    key: String,
    value: V,
}

impl<V: Weighted> Node<V> {
    /// Byte cost charged for this entry.
    #[inline]
    fn cost(&self) -> u64 {
        self.key.len() as u64 + self.value.weight() as u64
    }
}

/// Byte-bounded LRU engine: `FxHashMap` index into a raw-pointer recency
/// list.
///
/// Not thread-safe; wrap in [`ConcurrentLruCache`] for shared access. A
/// `max_bytes` of 0 means unbounded.
///
/// # Example
///
/// ```
/// use peercache::policy::lru::LruCore;
///
/// let mut cache: LruCore<Vec<u8>> = LruCore::new(16);
/// cache.add("a", b"1234567890".to_vec()); // cost 11
/// cache.add("b", b"1234567890".to_vec()); // cost 11 -> evicts "a"
///
/// assert!(cache.get("a").is_none());
/// assert!(cache.get("b").is_some());
/// assert_eq!(cache.total_bytes(), 11);
/// ```
pub struct LruCore<V> {
    map: FxHashMap<String, NonNull<Node<V>>>,
    head: Option<NonNull<Node<V>>>,
    tail: Option<NonNull<Node<V>>>,
    max_bytes: u64,
    total_bytes: u64,
    on_evicted: Option<EvictionListener<V>>,
}

// SAFETY: the raw pointers only reference heap memory owned by the struct;
// no aliases escape. Sending the core moves ownership of every node.
unsafe impl<V: Send> Send for LruCore<V> {}

// SAFETY: &LruCore exposes no interior mutability; all mutation requires
// &mut. Shared access is mediated by the wrapper's Mutex.
unsafe impl<V: Sync> Sync for LruCore<V> {}

impl<V: Weighted> LruCore<V> {
    /// Creates an engine with the given byte budget. A budget of 0 means
    /// unbounded.
    #[inline]
    pub fn new(max_bytes: u64) -> Self {
        Self::with_listener(max_bytes, None)
    }

    /// Creates an engine that invokes `on_evicted` with each entry displaced
    /// by budget enforcement.
    ///
    /// The listener fires only for forced removals, not for drops or value
    /// replacement.
    pub fn with_listener(max_bytes: u64, on_evicted: Option<EvictionListener<V>>) -> Self {
        LruCore {
            map: FxHashMap::default(),
            head: None,
            tail: None,
            max_bytes,
            total_bytes: 0,
            on_evicted,
        }
    }

    /// Looks up `key`, promoting the entry to the MRU position on a hit.
    ///
    /// # Example
    ///
    /// ```
    /// use peercache::policy::lru::LruCore;
    ///
    /// let mut cache: LruCore<String> = LruCore::new(0);
    /// cache.add("k", "value".to_string());
    /// assert_eq!(cache.get("k").map(String::as_str), Some("value"));
    /// assert!(cache.get("missing").is_none());
    /// ```
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let node_ptr = *self.map.get(key)?;

        self.detach(node_ptr);
        self.attach_front(node_ptr);

        #[cfg(debug_assertions)]
        self.validate_invariants();

        unsafe { Some(&(*node_ptr.as_ptr()).value) }
    }

    /// Looks up `key` without touching recency order.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.map
            .get(key)
            .map(|node_ptr| unsafe { &(*node_ptr.as_ptr()).value })
    }

    /// Inserts or replaces `key`, then enforces the byte budget.
    ///
    /// An existing entry is promoted and its value replaced, adjusting the
    /// byte counter by the weight delta (which may be negative). A new entry
    /// is attached at the head. Afterwards the tail is evicted until
    /// `total_bytes <= max_bytes` (skipped entirely when the budget is 0).
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&node_ptr) = self.map.get(&key) {
            unsafe {
                let node = &mut *node_ptr.as_ptr();
                let old_weight = node.value.weight() as u64;
                self.total_bytes = self.total_bytes - old_weight + value.weight() as u64;
                node.value = value;
            }
            self.detach(node_ptr);
            self.attach_front(node_ptr);
        } else {
            let node = Box::new(Node {
                prev: None,
                next: None,
                key: key.clone(),
                value,
            });
            self.total_bytes += node.cost();
            let node_ptr = NonNull::from(Box::leak(node));
            self.map.insert(key, node_ptr);
            self.attach_front(node_ptr);
        }

        while self.max_bytes > 0 && self.total_bytes > self.max_bytes {
            self.remove_oldest();
        }

        #[cfg(debug_assertions)]
        self.validate_invariants();
    }

    /// Evicts the least-recently-used entry and fires the eviction listener.
    ///
    /// No-op on an empty cache.
    pub fn remove_oldest(&mut self) {
        if let Some(node) = self.pop_tail() {
            self.map.remove(&node.key);
            self.total_bytes -= node.cost();
            if let Some(listener) = self.on_evicted.as_mut() {
                listener(&node.key, &node.value);
            }
        }
    }

    /// Returns `true` if `key` is cached. Does not promote.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Current number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes currently charged against the budget.
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// The configured byte budget (0 = unbounded).
    #[inline]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Detach a node from the linked list without removing it from the map.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the front (MRU position).
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Pop the tail node (LRU) and return it.
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<V>>> {
        self.tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }

            node
        })
    }

    /// Validate internal invariants (debug builds only).
    fn validate_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            if self.map.is_empty() {
                debug_assert!(self.head.is_none());
                debug_assert!(self.tail.is_none());
                debug_assert_eq!(self.total_bytes, 0);
                return;
            }

            let mut count = 0usize;
            let mut bytes = 0u64;
            let mut current = self.head;
            while let Some(ptr) = current {
                count += 1;
                unsafe {
                    let node = ptr.as_ref();
                    debug_assert!(self.map.contains_key(&node.key));
                    bytes += node.cost();
                    current = node.next;
                }
                if count > self.map.len() {
                    panic!("cycle detected in recency list");
                }
            }

            debug_assert_eq!(count, self.map.len());
            debug_assert_eq!(bytes, self.total_bytes);
        }
    }
}

// Free all heap-allocated nodes when the engine is dropped. The eviction
// listener is not invoked for drops.
impl<V> Drop for LruCore<V> {
    fn drop(&mut self) {
        let mut current = self.head.take();
        self.tail = None;
        while let Some(ptr) = current {
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            current = node.next;
        }
    }
}

impl<V: Weighted> fmt::Debug for LruCore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("len", &self.len())
            .field("total_bytes", &self.total_bytes())
            .field("max_bytes", &self.max_bytes())
            .finish_non_exhaustive()
    }
}

/// Thread-safe, lazily initialized wrapper around [`LruCore`].
///
/// A single exclusive lock guards reads and writes; reads must promote, so
/// a reader/writer split buys nothing here. The engine is constructed on
/// the first `add`, so a cache that is never written costs one `None`.
///
/// # Example
///
/// ```
/// use peercache::policy::lru::ConcurrentLruCache;
/// use peercache::view::ByteView;
///
/// let cache: ConcurrentLruCache<ByteView> = ConcurrentLruCache::new(2 << 10);
///
/// // Miss on the uninitialized engine is fine.
/// assert!(cache.get("Tom").is_none());
///
/// cache.add("Tom", ByteView::from("630"));
/// assert_eq!(cache.get("Tom").unwrap().to_string(), "630");
/// ```
pub struct ConcurrentLruCache<V> {
    max_bytes: u64,
    inner: Mutex<Option<LruCore<V>>>,
}

impl<V> ConcurrentLruCache<V>
where
    V: Weighted + Clone + Send,
{
    /// Creates a wrapper with the given byte budget (0 = unbounded). No
    /// engine is allocated until the first `add`.
    pub fn new(max_bytes: u64) -> Self {
        ConcurrentLruCache {
            max_bytes,
            inner: Mutex::new(None),
        }
    }

    /// Inserts `value` under `key`, building the engine on first use.
    pub fn add(&self, key: impl Into<String>, value: V) {
        let mut guard = self.inner.lock();
        guard
            .get_or_insert_with(|| LruCore::new(self.max_bytes))
            .add(key, value);
    }

    /// Looks up `key`, promoting on a hit. Returns a clone of the value;
    /// for [`ByteView`](crate::view::ByteView) that is a reference-count
    /// bump, not a byte copy.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.lock();
        guard.as_mut()?.get(key).cloned()
    }

    /// Current number of entries (0 while uninitialized).
    pub fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, LruCore::len)
    }

    /// Returns `true` if no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget (0 while uninitialized).
    pub fn total_bytes(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, LruCore::total_bytes)
    }

    /// The configured byte budget (0 = unbounded).
    #[inline]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl<V: Weighted> fmt::Debug for ConcurrentLruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("ConcurrentLruCache")
            .field("initialized", &guard.is_some())
            .field("len", &guard.as_ref().map_or(0, LruCore::len))
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod correctness {
        use super::*;

        #[test]
        fn get_on_missing_key_is_none() {
            let mut cache: LruCore<String> = LruCore::new(0);
            assert!(cache.get("k").is_none());
            assert_eq!(cache.len(), 0);
        }

        #[test]
        fn add_then_get_returns_value() {
            let mut cache: LruCore<String> = LruCore::new(0);
            cache.add("key1", "1234".to_string());

            assert_eq!(cache.get("key1").map(String::as_str), Some("1234"));
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.total_bytes(), 4 + 4);
        }

        #[test]
        fn replacing_a_value_adjusts_bytes_by_the_delta() {
            let mut cache: LruCore<String> = LruCore::new(0);
            cache.add("k", "1234567890".to_string());
            assert_eq!(cache.total_bytes(), 1 + 10);

            // Shrinking the value must shrink the counter.
            cache.add("k", "12".to_string());
            assert_eq!(cache.total_bytes(), 1 + 2);
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.get("k").map(String::as_str), Some("12"));
        }

        #[test]
        fn budget_evicts_least_recently_used() {
            // Scenario from the wire: budget 16, two entries of cost 11 each.
            let mut cache: LruCore<Vec<u8>> = LruCore::new(16);
            cache.add("a", b"1234567890".to_vec());
            cache.add("b", b"1234567890".to_vec());

            assert!(cache.get("a").is_none());
            assert!(cache.get("b").is_some());
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.total_bytes(), 11);
        }

        #[test]
        fn get_promotes_entry_out_of_eviction_order() {
            let mut cache: LruCore<String> = LruCore::new(24);
            cache.add("k1", "v1".to_string()); // cost 4
            cache.add("k2", "v2".to_string()); // cost 4
            cache.add("k3", "v3".to_string()); // cost 4

            // Touch k1 so k2 becomes the tail.
            assert!(cache.get("k1").is_some());

            cache.add("k4", "0123456789ab".to_string()); // cost 14, forces eviction
            assert!(cache.contains("k1"));
            assert!(!cache.contains("k2"));
            assert!(cache.contains("k3"));
            assert!(cache.contains("k4"));
        }

        #[test]
        fn add_promotes_existing_entry() {
            let mut cache: LruCore<String> = LruCore::new(24);
            cache.add("k1", "v1".to_string());
            cache.add("k2", "v2".to_string());
            cache.add("k3", "v3".to_string());

            // Re-adding k1 promotes it; k2 is now the oldest.
            cache.add("k1", "v1".to_string());
            cache.remove_oldest();
            assert!(!cache.contains("k2"));
            assert!(cache.contains("k1"));
        }

        #[test]
        fn peek_does_not_promote() {
            let mut cache: LruCore<String> = LruCore::new(0);
            cache.add("old", "v".to_string());
            cache.add("new", "v".to_string());

            assert_eq!(cache.peek("old").map(String::as_str), Some("v"));
            cache.remove_oldest();
            assert!(!cache.contains("old"));
        }

        #[test]
        fn remove_oldest_on_empty_cache_is_a_noop() {
            let mut cache: LruCore<String> = LruCore::new(8);
            cache.remove_oldest();
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.total_bytes(), 0);
        }

        #[test]
        fn zero_budget_means_unbounded() {
            let mut cache: LruCore<Vec<u8>> = LruCore::new(0);
            for i in 0..100 {
                cache.add(format!("key-{i}"), vec![0u8; 1024]);
            }
            assert_eq!(cache.len(), 100);
        }

        #[test]
        fn oversized_entry_is_admitted_then_evicted_by_the_budget_loop() {
            let mut cache: LruCore<Vec<u8>> = LruCore::new(8);
            cache.add("huge", vec![0u8; 64]);

            // One eviction pass empties the cache; the loop terminates.
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.total_bytes(), 0);

            // Subsequent use is unaffected.
            cache.add("ok", vec![0u8; 4]);
            assert!(cache.contains("ok"));
        }

        #[test]
        fn eviction_listener_sees_each_displaced_entry() {
            use std::sync::atomic::{AtomicUsize, Ordering};
            use std::sync::Arc;

            let evicted: Arc<parking_lot::Mutex<Vec<String>>> = Arc::default();
            let fired = Arc::new(AtomicUsize::new(0));
            let listener: EvictionListener<Vec<u8>> = {
                let evicted = Arc::clone(&evicted);
                let fired = Arc::clone(&fired);
                Box::new(move |key, _value| {
                    evicted.lock().push(key.to_owned());
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            };

            let mut cache = LruCore::with_listener(10, Some(listener));
            cache.add("k1", b"1234".to_vec()); // cost 6
            cache.add("k2", b"1234".to_vec()); // cost 6, evicts k1
            cache.add("k3", b"1234".to_vec()); // cost 6, evicts k2

            assert_eq!(fired.load(Ordering::SeqCst), 2);
            assert_eq!(*evicted.lock(), vec!["k1".to_string(), "k2".to_string()]);
        }

        #[test]
        fn accounting_matches_across_mixed_operations() {
            let mut cache: LruCore<Vec<u8>> = LruCore::new(0);
            cache.add("a", vec![0u8; 3]); // 4
            cache.add("bb", vec![0u8; 5]); // 7
            cache.add("a", vec![0u8; 10]); // 4 -> 11
            assert_eq!(cache.total_bytes(), 11 + 7);

            cache.remove_oldest(); // "bb" is oldest ("a" was re-added)
            assert_eq!(cache.total_bytes(), 11);
            assert_eq!(cache.len(), 1);
        }
    }

    mod concurrent_wrapper {
        use super::*;
        use crate::view::ByteView;
        use std::sync::Arc;
        use std::thread;

        #[test]
        fn get_before_first_add_is_a_miss() {
            let cache: ConcurrentLruCache<ByteView> = ConcurrentLruCache::new(1024);
            assert!(cache.get("k").is_none());
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.total_bytes(), 0);
        }

        #[test]
        fn add_then_get_round_trips() {
            let cache: ConcurrentLruCache<ByteView> = ConcurrentLruCache::new(1024);
            cache.add("Tom", ByteView::from("630"));

            assert_eq!(cache.get("Tom").unwrap().to_string(), "630");
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.total_bytes(), 3 + 3);
        }

        #[test]
        fn budget_is_enforced_through_the_wrapper() {
            let cache: ConcurrentLruCache<ByteView> = ConcurrentLruCache::new(16);
            cache.add("a", ByteView::from("1234567890"));
            cache.add("b", ByteView::from("1234567890"));

            assert!(cache.get("a").is_none());
            assert!(cache.get("b").is_some());
        }

        #[test]
        fn parallel_readers_and_writers_stay_consistent() {
            let cache: Arc<ConcurrentLruCache<ByteView>> =
                Arc::new(ConcurrentLruCache::new(64 << 10));
            let threads = 8;
            let per_thread = 200;

            let handles: Vec<_> = (0..threads)
                .map(|t| {
                    let cache = Arc::clone(&cache);
                    thread::spawn(move || {
                        for i in 0..per_thread {
                            let key = format!("t{t}-{i}");
                            cache.add(key.clone(), ByteView::from(key.as_str()));
                            assert!(cache.get(&key).is_some());
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(cache.len(), threads * per_thread);
        }
    }
}
