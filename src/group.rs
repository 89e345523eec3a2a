//! Group coordinator: the read-through flow over the cache parts.
//!
//! A [`Group`] is a named cache namespace owning a byte budget, a loader,
//! a single-flight coalescer, and (optionally) a peer selector. `get`
//! resolves a key as:
//!
//! ```text
//!   get(key) ── cached? ──────────────────────────► return view  ⑴
//!                  │ no
//!                  ▼
//!            single-flight ── owner is a remote peer? ── fetch ──► return view  ⑵
//!            (one slow path      │ no / fetch failed
//!             per key)           ▼
//!                          local loader ── admit to cache ──► return view  ⑶
//! ```
//!
//! Values fetched from a peer are **not** admitted locally — the owner
//! already caches them; only locally loaded values populate this node's
//! cache. Peer failures are recovered (logged at warn level, then the
//! local loader runs); loader errors are surfaced to the caller.
//!
//! Groups live in a process-wide registry keyed by name, which is also how
//! a transport handler serving remote requests finds the group to read
//! from — by name, never by holding a direct reference back into itself.
//!
//! ## Blocking
//!
//! Coalesced callers block for the duration of the leader's slow path.
//! The core sets no timeout: a loader that never returns blocks every
//! concurrent caller for that key. Cancellation belongs to the loader and
//! transport implementations.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::group::Group;
//! use peercache::error::LoadError;
//!
//! let group = Group::new("scores-doc", 2 << 10, |key: &str| match key {
//!     "Tom" => Ok(b"630".to_vec()),
//!     _ => Err(LoadError::not_found(format!("{key} not exist"))),
//! });
//!
//! assert_eq!(group.get("Tom").unwrap().to_string(), "630");
//! assert_eq!(group.get("Tom").unwrap().to_string(), "630"); // served from cache
//! assert!(group.get("Bob").is_err());
//! ```

use std::sync::{Arc, LazyLock, OnceLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::ds::flight::FlightGroup;
use crate::error::{ConfigError, LoadError};
#[cfg(feature = "metrics")]
use crate::metrics::{GroupCounters, GroupMetrics};
use crate::policy::lru::ConcurrentLruCache;
use crate::traits::{Loader, PeerFetcher, PeerPicker};
use crate::view::ByteView;

/// Process-wide registry of groups, keyed by name.
static REGISTRY: LazyLock<Mutex<FxHashMap<String, Arc<Group>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Looks up a registered group by name.
///
/// This is the seam a transport handler uses to serve remote peers: it
/// resolves the group named in the request and calls [`Group::get`] on it.
pub fn group(name: &str) -> Option<Arc<Group>> {
    REGISTRY.lock().get(name).cloned()
}

/// A named, read-through cache namespace.
///
/// Construction registers the group; configuration is immutable afterwards
/// except for the one-shot peer-selector registration.
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    main_cache: ConcurrentLruCache<ByteView>,
    peers: OnceLock<Box<dyn PeerPicker>>,
    flight: FlightGroup<ByteView, LoadError>,
    #[cfg(feature = "metrics")]
    counters: GroupCounters,
}

impl Group {
    /// Creates and registers a group.
    ///
    /// `cache_bytes` bounds the local cache (0 = unbounded). The loader is
    /// consulted on true misses; closures work directly via the blanket
    /// [`Loader`] impl.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or already registered. Use
    /// [`try_new`](Self::try_new) to handle those as errors.
    pub fn new(name: impl Into<String>, cache_bytes: u64, loader: impl Loader + 'static) -> Arc<Group> {
        Self::try_new(name, cache_bytes, loader)
            .unwrap_or_else(|err| panic!("invalid group configuration: {err}"))
    }

    /// Fallible variant of [`new`](Self::new).
    pub fn try_new(
        name: impl Into<String>,
        cache_bytes: u64,
        loader: impl Loader + 'static,
    ) -> Result<Arc<Group>, ConfigError> {
        Self::register(name.into(), cache_bytes, Box::new(loader))
    }

    /// Constructs the group and publishes it in the registry atomically.
    pub(crate) fn register(
        name: String,
        cache_bytes: u64,
        loader: Box<dyn Loader>,
    ) -> Result<Arc<Group>, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::new("group name must not be empty"));
        }

        let mut groups = REGISTRY.lock();
        if groups.contains_key(&name) {
            return Err(ConfigError::new(format!(
                "group {name:?} is already registered"
            )));
        }

        let group = Arc::new(Group {
            name: name.clone(),
            loader,
            main_cache: ConcurrentLruCache::new(cache_bytes),
            peers: OnceLock::new(),
            flight: FlightGroup::new(),
            #[cfg(feature = "metrics")]
            counters: GroupCounters::default(),
        });
        groups.insert(name, Arc::clone(&group));
        Ok(group)
    }

    /// The group's registered name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries currently in the local cache.
    pub fn cache_len(&self) -> usize {
        self.main_cache.len()
    }

    /// Bytes currently charged against the local cache budget.
    pub fn cache_bytes(&self) -> u64 {
        self.main_cache.total_bytes()
    }

    /// Registers the peer selector. Allowed at most once.
    ///
    /// # Panics
    ///
    /// Panics on a second call; re-registration is a programmer error.
    pub fn register_peers(&self, picker: impl PeerPicker + 'static) {
        if self.peers.set(Box::new(picker)).is_err() {
            panic!("register_peers called more than once for group {:?}", self.name);
        }
    }

    /// Resolves `key`: local hit, else coalesced peer-fetch / local-load.
    ///
    /// Returns an error for an empty key and surfaces loader errors
    /// verbatim. All concurrent callers for one key share a single slow
    /// path and receive the same outcome.
    pub fn get(&self, key: &str) -> Result<ByteView, LoadError> {
        if key.is_empty() {
            return Err(LoadError::EmptyKey);
        }

        if let Some(view) = self.main_cache.get(key) {
            #[cfg(feature = "metrics")]
            self.counters.inc_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(view);
        }

        #[cfg(feature = "metrics")]
        self.counters.inc_miss();
        self.load(key)
    }

    /// Snapshot of this group's read-path counters.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> GroupMetrics {
        self.counters.snapshot()
    }

    /// Slow path, guarded by the coalescer: at most one execution per key
    /// at any instant, outcome shared with every concurrent caller.
    fn load(&self, key: &str) -> Result<ByteView, LoadError> {
        self.flight.run(key, || {
            if let Some(picker) = self.peers.get() {
                if let Some(peer) = picker.pick_peer(key) {
                    match self.fetch_from_peer(peer, key) {
                        Ok(view) => {
                            #[cfg(feature = "metrics")]
                            self.counters.inc_peer_fetch();
                            return Ok(view);
                        },
                        Err(err) => {
                            #[cfg(feature = "metrics")]
                            self.counters.inc_peer_failure();
                            warn!(
                                group = %self.name,
                                key,
                                error = %err,
                                "peer fetch failed, falling back to local load"
                            );
                        },
                    }
                }
            }

            self.load_locally(key)
        })
    }

    /// Fetches `key` from its remote owner. The response bytes are
    /// authoritative and are not admitted to the local cache.
    fn fetch_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<ByteView, LoadError> {
        let bytes = peer.fetch(&self.name, key)?;
        Ok(ByteView::from(bytes))
    }

    /// Invokes the user loader and admits the result to the local cache.
    fn load_locally(&self, key: &str) -> Result<ByteView, LoadError> {
        let bytes = match self.loader.load(key) {
            Ok(bytes) => bytes,
            Err(err) => {
                #[cfg(feature = "metrics")]
                self.counters.inc_loader_error();
                return Err(err);
            },
        };

        #[cfg(feature = "metrics")]
        self.counters.inc_local_load();

        // Ownership of the loader's buffer moves into the view, so no
        // caller retains a mutable alias to the cached bytes.
        let view = ByteView::from(bytes);
        self.main_cache.add(key, view.clone());
        Ok(view)
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache_len", &self.main_cache.len())
            .field("has_peers", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}
