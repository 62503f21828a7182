//! Single-flight coordination.
//!
//! Collapses concurrent work for the same fingerprint into one task. The
//! first caller spawns the work and becomes the leader; later callers join
//! as waiters on the same result. The work runs on its own task, so a
//! caller that gives up (deadline, disconnect) only drops its own
//! registration and never cancels the generation others are waiting on.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use fitforge_core::{Error, RequestFingerprint, Result};

type Slot<T> = watch::Receiver<Option<Result<T>>>;

/// A registered in-flight computation.
struct Flight<T> {
    result: Slot<T>,
    waiters: Arc<AtomicUsize>,
}

/// Whether this caller started the work or joined it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Waiter,
}

/// In-flight table keyed by fingerprint.
pub struct SingleFlight<T> {
    flights: Arc<DashMap<RequestFingerprint, Flight<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `fingerprint`, or start one running `work()`.
    ///
    /// `work` is only called when this caller becomes the leader. Must be
    /// called from within a Tokio runtime.
    pub fn acquire_or_join<F, Fut>(&self, fingerprint: &RequestFingerprint, work: F) -> FlightHandle<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.flights.entry(fingerprint.clone()) {
            Entry::Occupied(flight) => {
                let flight = flight.get();
                flight.waiters.fetch_add(1, Ordering::SeqCst);
                FlightHandle {
                    role: Role::Waiter,
                    result: flight.result.clone(),
                    _registration: Registration(flight.waiters.clone()),
                }
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                let waiters = Arc::new(AtomicUsize::new(1));
                slot.insert(Flight {
                    result: rx.clone(),
                    waiters: waiters.clone(),
                });

                let task = work();
                let cleanup = Cleanup {
                    flights: self.flights.clone(),
                    key: fingerprint.clone(),
                };
                tokio::spawn(async move {
                    let result = task.await;
                    // Unregister before publishing so late callers start
                    // fresh (and find the cache populated) instead of
                    // joining a finished flight.
                    drop(cleanup);
                    tx.send_replace(Some(result));
                });

                FlightHandle {
                    role: Role::Leader,
                    result: rx,
                    _registration: Registration(waiters),
                }
            }
        }
    }

    /// Number of fingerprints with work in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Callers currently registered on `fingerprint`'s flight.
    pub fn waiters(&self, fingerprint: &RequestFingerprint) -> Option<usize> {
        self.flights
            .get(fingerprint)
            .map(|f| f.waiters.load(Ordering::SeqCst))
    }
}

/// One caller's view of a flight.
pub struct FlightHandle<T> {
    role: Role,
    result: Slot<T>,
    _registration: Registration,
}

impl<T: Clone> FlightHandle<T> {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Wait for the flight's result. Dropping the future detaches this
    /// caller without affecting the flight.
    pub async fn wait(mut self) -> Result<T> {
        loop {
            let current = self.result.borrow_and_update().clone();
            if let Some(result) = current {
                return result;
            }
            if self.result.changed().await.is_err() {
                // Sender gone: either the result was just published or the
                // task died (panic) without one.
                let last = self.result.borrow().clone();
                return last.unwrap_or_else(|| {
                    Err(Error::internal("generation task ended without a result"))
                });
            }
        }
    }
}

/// Counts a caller on a flight until dropped.
struct Registration(Arc<AtomicUsize>);

impl Drop for Registration {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Removes the flight entry when the task ends, panics included.
struct Cleanup<T> {
    flights: Arc<DashMap<RequestFingerprint, Flight<T>>>,
    key: RequestFingerprint,
}

impl<T> Drop for Cleanup<T> {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fp(s: &str) -> RequestFingerprint {
        RequestFingerprint::from_string(s)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let flights: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let runs = runs.clone();
            handles.push(flights.acquire_or_join(&fp("a"), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(7)
            }));
        }

        assert_eq!(handles.iter().filter(|h| h.role() == Role::Leader).count(), 1);
        assert_eq!(flights.waiters(&fp("a")), Some(8));

        for handle in handles {
            assert_eq!(handle.wait().await.unwrap(), 7);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_entry_removed() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let leader = flights.acquire_or_join(&fp("b"), || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(Error::provider("503"))
        });
        let waiter = flights.acquire_or_join(&fp("b"), || async { Ok(1) });

        assert_eq!(waiter.role(), Role::Waiter);
        assert_eq!(leader.wait().await.unwrap_err().kind(), "ProviderError");
        assert_eq!(waiter.wait().await.unwrap_err().kind(), "ProviderError");
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_detached_waiter_does_not_cancel_leader() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let leader = flights.acquire_or_join(&fp("c"), || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(3)
        });
        let waiter = flights.acquire_or_join(&fp("c"), || async { Ok(0) });

        let timed_out = tokio::time::timeout(Duration::from_millis(10), waiter.wait()).await;
        assert!(timed_out.is_err());
        assert_eq!(flights.waiters(&fp("c")), Some(1));

        assert_eq!(leader.wait().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_panicking_task_releases_waiters() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let handle = flights.acquire_or_join(&fp("d"), || async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            panic!("boom")
        });

        assert_eq!(handle.wait().await.unwrap_err().kind(), "Internal");
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_fingerprints_run_independently() {
        let flights: SingleFlight<&'static str> = SingleFlight::new();
        let a = flights.acquire_or_join(&fp("x"), || async { Ok("x") });
        let b = flights.acquire_or_join(&fp("y"), || async { Ok("y") });
        assert_eq!(a.role(), Role::Leader);
        assert_eq!(b.role(), Role::Leader);
        assert_eq!(a.wait().await.unwrap(), "x");
        assert_eq!(b.wait().await.unwrap(), "y");
    }
}
