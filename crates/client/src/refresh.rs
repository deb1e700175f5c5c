//! Refresh coordination
//!
//! When a call fails because its access token was rejected, the first such
//! caller becomes the leader of a refresh cycle and performs the refresh
//! exchange. Every other caller that fails while the cycle is open is parked
//! in a FIFO queue instead of starting a second exchange. When the exchange
//! settles the queue is drained: on success each parked call is replayed
//! once with the new access token, on failure each is rejected and the
//! session is cleared.
//!
//! ```text
//!   Idle ──eligible 401──▶ Refreshing ──exchange settles──▶ Idle
//!                            │    ▲
//!                            └────┘ further eligible 401s are queued
//! ```

use crate::config::EndpointConfig;
use crate::dispatcher::{ApiRequest, ApiResponse, Dispatcher};
use crate::error::{ClientError, ErrorPayload, RefreshFailure};
use crate::store::SessionStore;
use crate::types::{RefreshRequest, RefreshResponse};
use futures::channel::oneshot;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// New access token, or why none could be obtained
type RefreshOutcome = Result<String, RefreshFailure>;

/// A call parked behind an in-flight refresh
struct PendingRequest {
    sequence: u64,
    path: String,
    notify: oneshot::Sender<RefreshOutcome>,
}

/// The single in-progress refresh and the calls waiting on it
#[derive(Default)]
struct RefreshCycle {
    queue: VecDeque<PendingRequest>,
    next_sequence: u64,
}

impl RefreshCycle {
    fn enqueue(&mut self, path: &str) -> oneshot::Receiver<RefreshOutcome> {
        let (notify, receiver) = oneshot::channel();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        debug!(sequence, path, "Queueing request behind refresh");
        self.queue.push_back(PendingRequest {
            sequence,
            path: path.to_string(),
            notify,
        });
        receiver
    }

    /// Release every parked call, oldest first
    fn drain(self, outcome: &RefreshOutcome) {
        for pending in self.queue {
            debug!(
                sequence = pending.sequence,
                path = %pending.path,
                ok = outcome.is_ok(),
                "Releasing queued request"
            );
            // The waiting future may have been dropped; nothing to deliver then
            let _ = pending.notify.send(outcome.clone());
        }
    }
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Coordinates refresh cycles for one client.
///
/// `None` in the cycle slot is the idle state; at most one cycle exists at a
/// time.
pub struct RefreshCoordinator {
    endpoints: EndpointConfig,
    cycle: Mutex<Option<RefreshCycle>>,
}

impl RefreshCoordinator {
    pub const fn new(endpoints: EndpointConfig) -> Self {
        Self {
            endpoints,
            cycle: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<RefreshCycle>> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a refresh exchange is in flight
    pub fn is_refreshing(&self) -> bool {
        self.lock().is_some()
    }

    /// Number of calls parked behind the in-flight refresh
    pub fn queued(&self) -> usize {
        self.lock().as_ref().map_or(0, |cycle| cycle.queue.len())
    }

    /// Whether `error` on `request` may start or join a refresh cycle
    pub fn is_eligible(
        &self,
        request: &ApiRequest,
        error: &ClientError,
        store: &SessionStore,
    ) -> bool {
        error.is_credential_error()
            && !request.is_retried()
            && store.refresh_token().is_some()
            && !self.endpoints.is_refresh_exempt(request.path())
    }

    /// Dispatch `request`, recovering once from a rejected access token.
    ///
    /// Anything that is not an eligible authorization failure is returned
    /// to the caller unchanged.
    pub async fn execute(
        &self,
        dispatcher: &Dispatcher,
        request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        match dispatcher.dispatch(&request).await {
            Err(error) if self.is_eligible(&request, &error, dispatcher.store()) => {
                self.recover(dispatcher, request).await
            }
            Err(error) => {
                debug!(path = %request.path(), error = %error, "API call error");
                Err(error)
            }
            ok => ok,
        }
    }

    async fn recover(
        &self,
        dispatcher: &Dispatcher,
        mut request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        let role = {
            let mut slot = self.lock();
            match slot.as_mut() {
                Some(cycle) => Role::Follower(cycle.enqueue(request.path())),
                None => {
                    *slot = Some(RefreshCycle::default());
                    Role::Leader
                }
            }
        };

        // Whatever happens next, this call is not allowed to trigger another refresh
        request.mark_retried();

        match role {
            Role::Leader => self.lead(dispatcher, request).await,
            Role::Follower(receiver) => match receiver.await {
                Ok(Ok(token)) => dispatcher.send(&request, Some(&token)).await,
                Ok(Err(failure)) => Err(ClientError::RefreshExhausted(failure)),
                Err(oneshot::Canceled) => {
                    Err(ClientError::RefreshExhausted(RefreshFailure::abandoned()))
                }
            },
        }
    }

    async fn lead(
        &self,
        dispatcher: &Dispatcher,
        request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        let guard = CycleGuard {
            coordinator: self,
            settled: false,
        };
        let store = dispatcher.store();

        let exchange = match store.refresh_token() {
            Some(refresh_token) => {
                info!("Attempting to refresh token");
                let result = self.exchange(dispatcher, &refresh_token).await;
                result.map(|response| (response, refresh_token))
            }
            None => Err(ClientError::AuthenticationFailed(ErrorPayload::with_detail(
                "no refresh token available",
            ))),
        };

        match exchange {
            Ok((response, previous_refresh)) => {
                let access = response.access;
                let refresh = response.refresh.unwrap_or(previous_refresh);
                store.set_tokens(Some(access.clone()), Some(refresh));
                info!("Token refreshed successfully");

                guard.settle(&Ok(access.clone()));
                dispatcher.send(&request, Some(&access)).await
            }
            Err(error) => {
                warn!(error = %error, "Unable to refresh token");
                let failure = RefreshFailure::from_error(&error);
                // Clear first so no released call can find the dead refresh token
                store.logout();
                guard.settle(&Err(failure.clone()));
                Err(ClientError::RefreshExhausted(failure))
            }
        }
    }

    /// Trade the refresh token for a new access token.
    ///
    /// Sent without a bearer credential and outside [`execute`](Self::execute)
    /// so a rejected refresh can never start another cycle.
    async fn exchange(
        &self,
        dispatcher: &Dispatcher,
        refresh_token: &str,
    ) -> Result<RefreshResponse, ClientError> {
        let request = ApiRequest::post(self.endpoints.refresh.as_str()).json(&RefreshRequest {
            refresh: refresh_token.to_string(),
        })?;
        dispatcher.send(&request, None).await?.json()
    }
}

/// Returns the coordinator to idle when the leading future finishes or is
/// dropped mid-exchange.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let cycle = self.coordinator.lock().take();
        if let Some(cycle) = cycle {
            cycle.drain(outcome);
        }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let cycle = self.coordinator.lock().take();
        if let Some(cycle) = cycle {
            warn!(queued = cycle.queue.len(), "Refresh abandoned before it settled");
            cycle.drain(&Err(RefreshFailure::abandoned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> RefreshFailure {
        RefreshFailure {
            status: Some(401),
            payload: ErrorPayload::with_detail("Token is invalid or expired"),
        }
    }

    #[test]
    fn eligibility_requires_every_condition() {
        let coordinator = RefreshCoordinator::new(EndpointConfig::default());
        let store = SessionStore::in_memory();
        let expired = ClientError::AuthenticationFailed(ErrorPayload::default());
        let request = ApiRequest::get("/plans/");

        // No refresh token yet
        assert!(!coordinator.is_eligible(&request, &expired, &store));

        store.set_tokens(Some("A1".into()), Some("R1".into()));
        assert!(coordinator.is_eligible(&request, &expired, &store));

        let forbidden = ClientError::Forbidden(ErrorPayload::default());
        assert!(!coordinator.is_eligible(&request, &forbidden, &store));

        let login = ApiRequest::post("/auth/login/");
        assert!(!coordinator.is_eligible(&login, &expired, &store));
        let refresh = ApiRequest::post("/auth/login/refresh/");
        assert!(!coordinator.is_eligible(&refresh, &expired, &store));

        let mut replayed = request;
        replayed.mark_retried();
        assert!(!coordinator.is_eligible(&replayed, &expired, &store));
    }

    #[test]
    fn drain_releases_in_fifo_order() {
        let mut cycle = RefreshCycle::default();
        let mut first = cycle.enqueue("/a/");
        let mut second = cycle.enqueue("/b/");
        assert_eq!(cycle.queue.len(), 2);
        assert_eq!(cycle.queue[0].sequence, 0);
        assert_eq!(cycle.queue[1].sequence, 1);

        cycle.drain(&Ok("A2".to_string()));
        assert_eq!(first.try_recv().unwrap(), Some(Ok("A2".to_string())));
        assert_eq!(second.try_recv().unwrap(), Some(Ok("A2".to_string())));
    }

    #[test]
    fn dropped_leader_rejects_queue_and_returns_to_idle() {
        let coordinator = RefreshCoordinator::new(EndpointConfig::default());
        *coordinator.lock() = Some(RefreshCycle::default());
        let mut parked = coordinator.lock().as_mut().unwrap().enqueue("/plans/");
        assert!(coordinator.is_refreshing());
        assert_eq!(coordinator.queued(), 1);

        drop(CycleGuard {
            coordinator: &coordinator,
            settled: false,
        });

        assert!(!coordinator.is_refreshing());
        assert_eq!(
            parked.try_recv().unwrap(),
            Some(Err(RefreshFailure::abandoned()))
        );
    }

    #[test]
    fn settled_guard_delivers_failure() {
        let coordinator = RefreshCoordinator::new(EndpointConfig::default());
        *coordinator.lock() = Some(RefreshCycle::default());
        let mut parked = coordinator.lock().as_mut().unwrap().enqueue("/plans/");

        let guard = CycleGuard {
            coordinator: &coordinator,
            settled: false,
        };
        guard.settle(&Err(failure()));

        assert!(!coordinator.is_refreshing());
        assert_eq!(parked.try_recv().unwrap(), Some(Err(failure())));
    }
}
