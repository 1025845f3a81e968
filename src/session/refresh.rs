//! Single-flight token refresh.
//!
//! At most one refresh cycle runs per coordinator. Callers that arrive while
//! a cycle is in flight join it and receive the same outcome; the slot goes
//! back to idle before any of them observes that outcome, so a 401 seen
//! afterwards starts a fresh cycle.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::RefreshFailure;

/// Fresh access token on success.
pub type RefreshOutcome = Result<String, RefreshFailure>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RefreshCoordinator {
    in_flight: Arc<Mutex<Option<InFlight>>>,
    waiters: Arc<AtomicUsize>,
    cycles: AtomicU64,
    timeout: Duration,
}

/// Keeps the waiter count honest when a caller is cancelled mid-wait.
struct WaiterGuard(Arc<AtomicUsize>);

impl WaiterGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RefreshCoordinator {
    /// A cycle that has not settled within `timeout` fails with
    /// `RefreshFailure::TimedOut`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(None)),
            waiters: Arc::new(AtomicUsize::new(0)),
            cycles: AtomicU64::new(0),
            timeout,
        }
    }

    /// Join the in-flight cycle, or start one with `start` if idle.
    ///
    /// `start` is invoked only by the caller that opens a new cycle.
    pub async fn refresh<F, Fut>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let cycle = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!(
                        waiters = self.waiters.load(Ordering::SeqCst),
                        "Joining in-flight token refresh"
                    );
                    existing.clone()
                }
                None => {
                    let cycle = self.open_cycle(start());
                    *slot = Some(cycle.clone());
                    cycle
                }
            }
        };

        let _waiter = WaiterGuard::enter(&self.waiters);
        cycle.await
    }

    fn open_cycle<Fut>(&self, work: Fut) -> InFlight
    where
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let number = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = Arc::clone(&self.in_flight);
        let timeout = self.timeout;
        tracing::debug!(cycle = number, "Starting token refresh");

        async move {
            let outcome = match tokio::time::timeout(timeout, work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RefreshFailure::TimedOut),
            };
            // Idle again before the outcome is delivered.
            lock(&slot).take();
            if let Err(failure) = &outcome {
                tracing::debug!(cycle = number, %failure, "Token refresh failed");
            }
            outcome
        }
        .boxed()
        .shared()
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Callers currently waiting on a cycle.
    pub fn waiting(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }

    /// Cycles started since construction.
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("waiting", &self.waiting())
            .field("cycles", &self.cycles_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_cycle() {
        let coordinator = Arc::new(RefreshCoordinator::new(Duration::from_secs(5)));
        let starts = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let starts = starts.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(|| {
                        starts.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok("at-new".to_string())
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "at-new");
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.cycles_started(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.waiting(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_delivered_to_every_waiter() {
        let coordinator = Arc::new(RefreshCoordinator::new(Duration::from_secs(5)));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(|| async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(RefreshFailure::Rejected(401))
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), Err(RefreshFailure::Rejected(401)));
        }
        assert_eq!(coordinator.cycles_started(), 1);
    }

    #[tokio::test]
    async fn test_settled_cycle_allows_a_new_one() {
        let coordinator = RefreshCoordinator::new(Duration::from_secs(5));

        let first = coordinator.refresh(|| async { Ok("one".to_string()) }).await;
        let second = coordinator.refresh(|| async { Ok("two".to_string()) }).await;

        assert_eq!(first.unwrap(), "one");
        assert_eq!(second.unwrap(), "two");
        assert_eq!(coordinator.cycles_started(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_refresh_times_out() {
        let coordinator = RefreshCoordinator::new(Duration::from_secs(15));
        let outcome = coordinator
            .refresh(|| std::future::pending::<RefreshOutcome>())
            .await;
        assert_eq!(outcome, Err(RefreshFailure::TimedOut));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_not_counted() {
        let coordinator = Arc::new(RefreshCoordinator::new(Duration::from_secs(5)));
        let waiting = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .refresh(|| async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok("late".to_string())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(coordinator.waiting(), 1);
        waiting.abort();
        let _ = waiting.await;
        assert_eq!(coordinator.waiting(), 0);
    }
}
