// ==============================================
// GROUP READ-THROUGH TESTS (integration)
// ==============================================
//
// End-to-end behavior of the coordinator: hit/miss flow, error surfacing,
// request coalescing under a thundering herd, and peer fall-through. The
// group registry is process-wide, so every test registers a unique name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use peercache::error::LoadError;
use peercache::group::Group;
use peercache::traits::{PeerFetcher, PeerPicker};

/// Loader over a fixed score table that records per-key invocation counts.
fn counted_scores_loader(
    counts: Arc<Mutex<HashMap<String, usize>>>,
) -> impl Fn(&str) -> Result<Vec<u8>, LoadError> + Send + Sync + 'static {
    let db: HashMap<&'static str, &'static str> =
        [("Tom", "630"), ("Jack", "589"), ("Sam", "567")].into();

    move |key: &str| {
        *counts.lock().entry(key.to_owned()).or_insert(0) += 1;
        db.get(key)
            .map(|value| value.as_bytes().to_vec())
            .ok_or_else(|| LoadError::not_found(format!("{key} not exist")))
    }
}

#[test]
fn local_hit_serves_second_read_without_the_loader() {
    let counts: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let group = Group::new(
        "it-scores-hit",
        2048,
        counted_scores_loader(Arc::clone(&counts)),
    );

    assert_eq!(group.get("Tom").unwrap().to_string(), "630");
    assert_eq!(group.get("Tom").unwrap().to_string(), "630");

    assert_eq!(counts.lock().get("Tom"), Some(&1));
}

#[test]
fn repeated_reads_over_the_table_load_each_key_once() {
    let counts: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let group = Group::new(
        "it-scores-idempotent",
        2048,
        counted_scores_loader(Arc::clone(&counts)),
    );

    for _ in 0..5 {
        assert_eq!(group.get("Tom").unwrap().to_string(), "630");
        assert_eq!(group.get("Jack").unwrap().to_string(), "589");
        assert_eq!(group.get("Sam").unwrap().to_string(), "567");
    }

    let counts = counts.lock();
    assert_eq!(counts.get("Tom"), Some(&1));
    assert_eq!(counts.get("Jack"), Some(&1));
    assert_eq!(counts.get("Sam"), Some(&1));
}

#[test]
fn loader_miss_surfaces_the_error_and_admits_nothing() {
    let counts: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let group = Group::new(
        "it-scores-miss",
        2048,
        counted_scores_loader(Arc::clone(&counts)),
    );

    let err = group.get("Unknown").unwrap_err();
    assert_eq!(err.to_string(), "Unknown not exist");
    assert!(err.is_not_found());
    assert_eq!(group.cache_len(), 0);

    // No admission happened, so the loader runs again on the next attempt.
    let _ = group.get("Unknown");
    assert_eq!(counts.lock().get("Unknown"), Some(&2));
}

#[test]
fn empty_key_is_rejected() {
    let group = Group::new("it-empty-key", 2048, |key: &str| -> Result<Vec<u8>, LoadError> {
        Ok(key.as_bytes().to_vec())
    });
    assert_eq!(group.get("").unwrap_err(), LoadError::EmptyKey);
}

#[test]
fn thundering_herd_invokes_the_loader_once() {
    const CALLERS: usize = 1000;

    let loads = Arc::new(AtomicUsize::new(0));
    let group = {
        let loads = Arc::clone(&loads);
        Group::new("it-herd", 2048, move |key: &str| -> Result<Vec<u8>, LoadError> {
            loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            Ok(format!("value-for-{key}").into_bytes())
        })
    };

    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let group = Arc::clone(&group);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                group.get("k").unwrap().to_vec()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), b"value-for-k");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

// ----------------------------------------------------------------------
// Peer routing
// ----------------------------------------------------------------------

struct CountingFetcher {
    fetches: AtomicUsize,
    outcome: Result<Vec<u8>, &'static str>,
}

impl PeerFetcher for CountingFetcher {
    fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>, LoadError> {
        assert!(!group.is_empty());
        assert!(!key.is_empty());
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .map_err(|msg| LoadError::peer(msg.to_string()))
    }
}

/// Picker that routes every key to one fetcher, as if the ring always
/// selected the same remote owner.
struct SinglePeerPicker {
    fetcher: CountingFetcher,
}

impl PeerPicker for SinglePeerPicker {
    fn pick_peer(&self, _key: &str) -> Option<&dyn PeerFetcher> {
        Some(&self.fetcher)
    }
}

#[test]
fn failing_peer_falls_through_to_the_local_loader() {
    let loads = Arc::new(AtomicUsize::new(0));
    let group = {
        let loads = Arc::clone(&loads);
        Group::new(
            "it-peer-fallthrough",
            2048,
            move |key: &str| -> Result<Vec<u8>, LoadError> {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(format!("local-{key}").into_bytes())
            },
        )
    };
    group.register_peers(SinglePeerPicker {
        fetcher: CountingFetcher {
            fetches: AtomicUsize::new(0),
            outcome: Err("connection refused"),
        },
    });

    assert_eq!(group.get("Tom").unwrap().to_string(), "local-Tom");
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn peer_value_is_returned_but_not_admitted_locally() {
    let group = Group::new(
        "it-peer-authoritative",
        2048,
        |_key: &str| -> Result<Vec<u8>, LoadError> {
            panic!("local loader must not run while the peer succeeds")
        },
    );
    group.register_peers(SinglePeerPicker {
        fetcher: CountingFetcher {
            fetches: AtomicUsize::new(0),
            outcome: Ok(b"remote-value".to_vec()),
        },
    });

    // The owner caches the value; this node must not.
    assert_eq!(group.get("Tom").unwrap().to_string(), "remote-value");
    assert_eq!(group.cache_len(), 0);

    // With nothing admitted, the next read goes back to the peer.
    assert_eq!(group.get("Tom").unwrap().to_string(), "remote-value");
}

#[test]
fn peer_success_after_local_admission_is_not_consulted() {
    // A key already in the local cache never reaches the picker.
    struct PanickingPicker;
    impl PeerPicker for PanickingPicker {
        fn pick_peer(&self, _key: &str) -> Option<&dyn PeerFetcher> {
            panic!("picker must not run for a cached key")
        }
    }

    let group = Group::new("it-peer-hit-skips", 2048, |key: &str| -> Result<Vec<u8>, LoadError> {
        Ok(key.as_bytes().to_vec())
    });
    assert_eq!(group.get("warm").unwrap().to_string(), "warm");

    group.register_peers(PanickingPicker);
    assert_eq!(group.get("warm").unwrap().to_string(), "warm");
}
