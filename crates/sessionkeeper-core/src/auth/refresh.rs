//! Single-flight coordination of token refreshes.
//!
//! Concurrent callers that find the session expired share one refresh
//! operation. The expiry check and the check-and-create of the shared handle
//! happen under the same lock, so a caller can never observe "expired" for a
//! refresh that has already settled. The operation runs on its own task, so it
//! settles even if every waiter goes away, and the slot is reset to idle before
//! any waiter observes the outcome.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::types::AuthenticationResult;

type RefreshOutcome = Result<AuthenticationResult, AuthError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

enum RefreshState {
    Idle,
    Pending(SharedRefresh),
}

/// Owns the at-most-one in-flight refresh of a session.
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
}

/// Resets the slot when the refresh task finishes, panics, or is dropped.
struct SettleGuard(Arc<Mutex<RefreshState>>);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        *lock(&self.0) = RefreshState::Idle;
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::Idle)),
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_pending(&self) -> bool {
        matches!(*lock(&self.state), RefreshState::Pending(_))
    }

    /// Join the in-flight refresh, or start one with `start` if none is pending.
    ///
    /// `needs_refresh` is evaluated under the slot lock. When it reports
    /// false, nothing is started or joined and `Ok(None)` is returned so the
    /// caller can take its direct path. `start` is only invoked when this call
    /// creates the operation; every caller that joins it, including the
    /// creator, resolves to the same outcome.
    pub async fn run_or_join<C, F, Fut>(
        &self,
        needs_refresh: C,
        start: F,
    ) -> Result<Option<AuthenticationResult>, AuthError>
    where
        C: FnOnce() -> Result<bool, AuthError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let shared = {
            let mut state = lock(&self.state);
            if !needs_refresh()? {
                return Ok(None);
            }
            let in_flight = match &*state {
                RefreshState::Pending(shared) => Some(shared.clone()),
                RefreshState::Idle => None,
            };
            match in_flight {
                Some(shared) => {
                    debug!("Joining in-flight token refresh");
                    shared
                }
                None => {
                    info!("Starting token refresh");
                    let operation = start();
                    let settle = SettleGuard(Arc::clone(&self.state));
                    // The slot lock is held until Pending is recorded, so the
                    // task cannot reset it before it is set.
                    let task = tokio::spawn(async move {
                        let _settle = settle;
                        operation.await
                    });
                    let shared = task
                        .map(|joined| match joined {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                warn!(error = %e, "Token refresh task did not complete");
                                Err(AuthError::Interrupted(e.to_string()))
                            }
                        })
                        .boxed()
                        .shared();
                    *state = RefreshState::Pending(shared.clone());
                    shared
                }
            }
        };

        shared.await.map(Some)
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::Authentication;
    use serde_json::Map;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn result(exp: i64) -> AuthenticationResult {
        let mut authentication = Authentication::default();
        authentication.payload.exp = Some(exp);
        AuthenticationResult {
            authentication,
            fields: Map::new(),
        }
    }

    fn expired() -> Result<bool, AuthError> {
        Ok(true)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_operation() {
        let coordinator = RefreshCoordinator::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let call = || {
            let starts = Arc::clone(&starts);
            let gate = Arc::clone(&gate);
            coordinator.run_or_join(expired, move || async move {
                starts.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(result(99))
            })
        };

        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (outcomes, ()) = tokio::join!(futures::future::join_all(vec![call(), call(), call()]), release);

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        for outcome in outcomes {
            assert_eq!(outcome.unwrap(), Some(result(99)));
        }
        assert!(!coordinator.is_pending());
    }

    #[tokio::test]
    async fn test_not_needed_starts_nothing() {
        let coordinator = RefreshCoordinator::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&starts);
        let outcome = coordinator
            .run_or_join(
                || Ok(false),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(result(1))
                },
            )
            .await;

        assert_eq!(outcome.unwrap(), None);
        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert!(!coordinator.is_pending());
    }

    #[tokio::test]
    async fn test_check_error_propagates_without_starting() {
        let coordinator = RefreshCoordinator::new();
        let outcome = coordinator
            .run_or_join(
                || Err(AuthError::Transport("store offline".into())),
                || async { Ok(result(1)) },
            )
            .await;

        assert_eq!(outcome.unwrap_err(), AuthError::Transport("store offline".into()));
        assert!(!coordinator.is_pending());
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_clears_slot() {
        let coordinator = RefreshCoordinator::new();
        let gate = Arc::new(Notify::new());

        let call = || {
            let gate = Arc::clone(&gate);
            coordinator.run_or_join(expired, move || async move {
                gate.notified().await;
                Err(AuthError::Credential("refresh token revoked".into()))
            })
        };

        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let ((a, b), ()) = tokio::join!(async { tokio::join!(call(), call()) }, release);

        let expected = AuthError::Credential("refresh token revoked".into());
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);
        assert!(!coordinator.is_pending());

        // A later refresh starts fresh
        let outcome = coordinator.run_or_join(expired, || async { Ok(result(7)) }).await;
        assert_eq!(outcome.unwrap(), Some(result(7)));
    }

    #[tokio::test]
    async fn test_sequential_refreshes_are_independent() {
        let coordinator = RefreshCoordinator::new();
        let starts = Arc::new(AtomicUsize::new(0));

        for exp in [1, 2] {
            let starts = Arc::clone(&starts);
            let outcome = coordinator
                .run_or_join(expired, move || async move {
                    starts.fetch_add(1, Ordering::SeqCst);
                    Ok(result(exp))
                })
                .await;
            assert_eq!(outcome.unwrap(), Some(result(exp)));
        }
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    fn explode() -> RefreshOutcome {
        panic!("refresh exploded")
    }

    #[tokio::test]
    async fn test_panicking_refresh_settles_as_interrupted() {
        let coordinator = RefreshCoordinator::new();
        let outcome = coordinator.run_or_join(expired, || async { explode() }).await;

        assert!(matches!(outcome, Err(AuthError::Interrupted(_))));
        assert!(!coordinator.is_pending());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_storm_across_workers_starts_once() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let expired = Arc::new(AtomicBool::new(true));
        let starts = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let expired = Arc::clone(&expired);
                let starts = Arc::clone(&starts);
                tokio::spawn(async move {
                    let check = Arc::clone(&expired);
                    coordinator
                        .run_or_join(
                            move || Ok(check.load(Ordering::SeqCst)),
                            move || async move {
                                starts.fetch_add(1, Ordering::SeqCst);
                                for _ in 0..10 {
                                    tokio::task::yield_now().await;
                                }
                                // Persisting the new token happens before settlement
                                expired.store(false, Ordering::SeqCst);
                                Ok(result(42))
                            },
                        )
                        .await
                })
            })
            .collect();

        for task in tasks {
            match task.await.unwrap().unwrap() {
                Some(outcome) => assert_eq!(outcome, result(42)),
                None => assert!(!expired.load(Ordering::SeqCst)),
            }
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_pending());
    }
}
