//! Single-flight request coalescer.
//!
//! Collapses concurrent duplicate requests for one key into a single
//! execution whose outcome is broadcast to every caller. This is what keeps
//! a thundering herd of cache misses from stampeding the loader or a peer.
//!
//! ## Protocol
//!
//! ```text
//!   caller A ── run("k", f) ──► no record for "k"
//!                               │ insert record, release map lock
//!                               │ execute f()            ◄── the only execution
//!   caller B ── run("k", g) ──► record exists: block on its signal (g is dropped)
//!   caller C ── run("k", h) ──► record exists: block on its signal (h is dropped)
//!                               │ A stores the outcome, signals all waiters,
//!                               │ then removes the record under the map lock
//!   A, B, C ◄────────────────── all three observe the identical outcome
//! ```
//!
//! A record is removed only *after* its outcome is stored, so a caller
//! arriving strictly after completion starts a fresh execution. Removal is
//! handled by a scoped-release guard that runs on every exit path: if the
//! closure unwinds, the record is still cleared and waiters are released
//! (they panic with context rather than block forever).
//!
//! ## Example Usage
//!
//! ```
//! use peercache::ds::flight::FlightGroup;
//!
//! let flights: FlightGroup<String, String> = FlightGroup::new();
//!
//! let out = flights.run("config", || Ok("v1".to_string())).unwrap();
//! assert_eq!(out, "v1");
//!
//! // The previous call completed, so this one executes afresh.
//! let out = flights.run("config", || Ok("v2".to_string())).unwrap();
//! assert_eq!(out, "v2");
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

/// Lifecycle of one in-flight call.
enum FlightState<T, E> {
    /// The leader is still executing.
    Pending,
    /// The leader finished; every caller observes this outcome.
    Done(Result<T, E>),
    /// The leader unwound without producing an outcome.
    Poisoned,
}

/// One in-flight call record: completion signal plus outcome slot.
struct Flight<T, E> {
    state: Mutex<FlightState<T, E>>,
    done: Condvar,
}

/// Per-key request coalescer.
///
/// `run(key, f)` executes `f` at most once per key at any instant;
/// concurrent callers for the same key block until the leader finishes and
/// then receive clones of the leader's outcome.
pub struct FlightGroup<T, E> {
    calls: Mutex<FxHashMap<String, Arc<Flight<T, E>>>>,
}

impl<T, E> FlightGroup<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Creates an empty coalescer.
    pub fn new() -> Self {
        FlightGroup {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Executes `f` for `key`, coalescing with any in-flight call.
    ///
    /// If a call for `key` is already running, `f` is dropped unexecuted
    /// and this call blocks until the leader completes, returning a clone
    /// of the leader's outcome. Otherwise this caller becomes the leader.
    ///
    /// # Panics
    ///
    /// If the leader panics inside `f`, waiters panic too (with a message
    /// naming the key) instead of blocking forever; the leader's own panic
    /// propagates unchanged.
    pub fn run<F>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let flight = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(key) {
                let flight = Arc::clone(existing);
                drop(calls);
                return Self::await_outcome(key, &flight);
            }

            let flight = Arc::new(Flight {
                state: Mutex::new(FlightState::Pending),
                done: Condvar::new(),
            });
            calls.insert(key.to_owned(), Arc::clone(&flight));
            flight
        };

        // The guard clears the record on every exit path, including unwind.
        let mut guard = FlightGuard {
            group: self,
            key,
            flight: &flight,
            completed: false,
        };

        let outcome = f();

        *flight.state.lock() = FlightState::Done(outcome.clone());
        flight.done.notify_all();
        guard.completed = true;
        drop(guard);

        outcome
    }

    /// Blocks until the leader for `flight` completes, then returns a clone
    /// of its outcome.
    fn await_outcome(key: &str, flight: &Flight<T, E>) -> Result<T, E> {
        let mut state = flight.state.lock();
        while matches!(*state, FlightState::Pending) {
            flight.done.wait(&mut state);
        }
        match &*state {
            FlightState::Done(outcome) => outcome.clone(),
            FlightState::Poisoned => {
                panic!("coalesced call for key {key:?} aborted: leader panicked")
            },
            FlightState::Pending => unreachable!("woken while still pending"),
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone, E: Clone> Default for FlightGroup<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped-release cleanup for a leader's record.
///
/// On drop: if the leader never stored an outcome (unwind), the record is
/// poisoned and waiters are woken; either way the record is removed from
/// the call map so later callers start fresh.
struct FlightGuard<'a, T, E> {
    group: &'a FlightGroup<T, E>,
    key: &'a str,
    flight: &'a Arc<Flight<T, E>>,
    completed: bool,
}

impl<T, E> Drop for FlightGuard<'_, T, E> {
    fn drop(&mut self) {
        if !self.completed {
            *self.flight.state.lock() = FlightState::Poisoned;
            self.flight.done.notify_all();
        }
        self.group.calls.lock().remove(self.key);
    }
}
