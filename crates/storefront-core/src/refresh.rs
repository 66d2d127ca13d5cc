//! Single-flight credential refresh.
//!
//! Any number of requests may hit a 401 at once. The [`RefreshCoordinator`]
//! makes sure they all wait on one refresh call and all receive its outcome.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::envelope;
use crate::error::{Error, RefreshError, TransportError};
use crate::traits::{
    Method, OutgoingRequest, RefreshBackend, RefreshedSession, SessionStore, Transport,
};
use crate::request::{AUTHORIZATION, lowercase_names};
use crate::types::AccessToken;

type SharedRefresh = Shared<BoxFuture<'static, Result<AccessToken, RefreshError>>>;

/// Coordinates credential refreshes across concurrent requests.
///
/// Cheap to clone; clones share the in-flight state.
///
/// While a refresh is running, every caller of
/// [`ensure_fresh_credential`](Self::ensure_fresh_credential) awaits the same
/// operation. The refresh runs on its own task, so a caller that gives up
/// waiting does not cancel it for the others.
///
/// On success the new token is written to the session store; on failure the
/// session is cleared. Either way the in-flight marker is reset before any
/// waiter observes the result. A refresh that panics counts as a failure.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    backend: Arc<dyn RefreshBackend>,
    session: Arc<dyn SessionStore>,
    in_flight: Mutex<Option<SharedRefresh>>,
    refreshes: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(backend: Arc<dyn RefreshBackend>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                backend,
                session,
                in_flight: Mutex::new(None),
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain a fresh access token, joining any refresh already in flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn ensure_fresh_credential(&self) -> Result<AccessToken, RefreshError> {
        self.ensure_fresh_credential_since(None).await
    }

    /// Like [`ensure_fresh_credential`](Self::ensure_fresh_credential), for a
    /// request that was rejected while carrying `rejected`.
    ///
    /// If no refresh is running and the session already holds a different
    /// token, another request refreshed in the meantime and that token is
    /// returned without calling the backend again.
    #[instrument(skip_all)]
    pub async fn ensure_fresh_credential_since(
        &self,
        rejected: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshError> {
        let refresh = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match in_flight.as_ref() {
                Some(refresh) => {
                    debug!("Joining in-flight refresh");
                    refresh.clone()
                }
                None => {
                    if let (Some(rejected), Some(current)) = (rejected, self.inner.session.get())
                        && &current != rejected
                    {
                        debug!("Session already refreshed");
                        return Ok(current);
                    }
                    let refresh = self.start();
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Number of refresh calls issued to the backend so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn start(&self) -> SharedRefresh {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run().await });

        async move {
            task.await.unwrap_or_else(|err| {
                warn!(error = %err, "Refresh task did not complete");
                Err(RefreshError::Aborted)
            })
        }
        .boxed()
        .shared()
    }
}

/// Settles a refresh when `run` returns or unwinds.
///
/// Always frees the in-flight slot. Clears the session unless the refresh
/// reached an outcome.
struct Settle<'a> {
    inner: &'a CoordinatorInner,
    completed: bool,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.inner.session.clear();
        }
        *self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CoordinatorInner {
    async fn run(&self) -> Result<AccessToken, RefreshError> {
        let count = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "Refreshing access token");
        let mut settle = Settle {
            inner: self,
            completed: false,
        };

        let result = match self.backend.refresh().await {
            Ok(refreshed) => {
                self.session.set(refreshed.access_token.clone());
                if self.session.user().is_none()
                    && let Some(user) = refreshed.user
                {
                    self.session.set_user(user);
                }
                debug!("Access token refreshed");
                Ok(refreshed.access_token)
            }
            Err(err) => {
                warn!(error = %err, "Refresh failed, clearing session");
                self.session.clear();
                Err(err)
            }
        };

        settle.completed = true;
        result
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

/// `data` payload of a refresh response.
#[derive(Debug, Deserialize)]
struct RefreshData {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<serde_json::Value>,
}

/// Refreshes by calling the refresh endpoint directly on the transport.
///
/// The request carries no `Authorization` header; the transport is expected
/// to supply the ambient refresh context (an http-only cookie).
pub struct EndpointRefresher {
    transport: Arc<dyn Transport>,
    url: String,
    timeout: Duration,
    headers: BTreeMap<String, String>,
}

impl EndpointRefresher {
    /// Build a refresher for the refresh endpoint described by `config`.
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Result<Self, Error> {
        let url = config.base_url.endpoint(&config.refresh_path, &[])?;
        let mut headers = lowercase_names(&config.default_headers);
        headers.remove(AUTHORIZATION);
        headers.insert("content-type".into(), "application/json".into());

        Ok(Self {
            transport,
            url,
            timeout: config.timeout,
            headers,
        })
    }
}

#[async_trait]
impl RefreshBackend for EndpointRefresher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn refresh(&self) -> Result<RefreshedSession, RefreshError> {
        let request = OutgoingRequest {
            method: Method::Post,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: Some(serde_json::json!({})),
            timeout: self.timeout,
        };

        let response = tokio::time::timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| TransportError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            })??;
        if response.status == 401 || response.status == 403 {
            return Err(RefreshError::Unauthorized);
        }

        let data = envelope::decode(Ok(response)).map_err(|e| RefreshError::Rejected {
            message: e.user_message(),
        })?;

        let data: RefreshData =
            serde_json::from_value(data).map_err(|e| RefreshError::Rejected {
                message: e.to_string(),
            })?;

        match data.access_token {
            Some(token) if !token.is_empty() => Ok(RefreshedSession {
                access_token: AccessToken::new(token),
                user: data.user,
            }),
            _ => Err(RefreshError::Rejected {
                message: "Refresh token failed".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;
    use crate::session::MemorySessionStore;
    use crate::traits::RawResponse;
    use crate::types::BaseUrl;

    struct CountingBackend {
        calls: AtomicUsize,
        outcome: Result<&'static str, RefreshError>,
        delay: Duration,
    }

    impl CountingBackend {
        fn new(outcome: Result<&'static str, RefreshError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
                delay: Duration::from_millis(100),
            })
        }
    }

    #[async_trait]
    impl RefreshBackend for CountingBackend {
        async fn refresh(&self) -> Result<RefreshedSession, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone().map(|token| RefreshedSession {
                access_token: AccessToken::new(token),
                user: Some(json!({"name": "Alice"})),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let backend = CountingBackend::new(Ok("fresh"));
        let session = Arc::new(MemorySessionStore::new());
        let coordinator = RefreshCoordinator::new(backend.clone(), session.clone());

        let results = futures_util::future::join_all(
            (0..8).map(|_| coordinator.ensure_fresh_credential()),
        )
        .await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.refresh_count(), 1);
        for result in results {
            assert_eq!(result.unwrap(), AccessToken::new("fresh"));
        }
        assert_eq!(session.get(), Some(AccessToken::new("fresh")));
        assert_eq!(session.user(), Some(json!({"name": "Alice"})));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_clears_session_and_reaches_every_waiter() {
        let backend = CountingBackend::new(Err(RefreshError::Unauthorized));
        let session = Arc::new(MemorySessionStore::with_session(
            AccessToken::new("stale"),
            None,
        ));
        let coordinator = RefreshCoordinator::new(backend.clone(), session.clone());

        let results = futures_util::future::join_all(
            (0..4).map(|_| coordinator.ensure_fresh_credential()),
        )
        .await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap_err(), RefreshError::Unauthorized);
        }
        assert!(session.get().is_none());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_refreshes_are_independent() {
        let backend = CountingBackend::new(Ok("fresh"));
        let session = Arc::new(MemorySessionStore::new());
        let coordinator = RefreshCoordinator::new(backend.clone(), session);

        coordinator.ensure_fresh_credential().await.unwrap();
        coordinator.ensure_fresh_credential().await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_rejection_reuses_newer_token() {
        let backend = CountingBackend::new(Ok("fresh"));
        let session = Arc::new(MemorySessionStore::with_session(
            AccessToken::new("already-refreshed"),
            None,
        ));
        let coordinator = RefreshCoordinator::new(backend.clone(), session);

        let token = coordinator
            .ensure_fresh_credential_since(Some(&AccessToken::new("old")))
            .await
            .unwrap();

        assert_eq!(token, AccessToken::new("already-refreshed"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_does_not_cancel_refresh() {
        let backend = CountingBackend::new(Ok("fresh"));
        let session = Arc::new(MemorySessionStore::new());
        let coordinator = RefreshCoordinator::new(backend.clone(), session.clone());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            coordinator.ensure_fresh_credential(),
        )
        .await;
        assert!(abandoned.is_err());

        let token = coordinator.ensure_fresh_credential().await.unwrap();
        assert_eq!(token, AccessToken::new("fresh"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// Panics on its first call, succeeds afterwards.
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RefreshBackend for PanicsOnce {
        async fn refresh(&self) -> Result<RefreshedSession, RefreshError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("refresh backend blew up");
            }
            Ok(RefreshedSession {
                access_token: AccessToken::new("fresh"),
                user: None,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_refresh_frees_slot_and_clears_session() {
        let backend = Arc::new(PanicsOnce {
            calls: AtomicUsize::new(0),
        });
        let session = Arc::new(MemorySessionStore::with_session(
            AccessToken::new("stale"),
            None,
        ));
        let coordinator = RefreshCoordinator::new(backend.clone(), session.clone());

        let first = coordinator.ensure_fresh_credential().await;
        assert_eq!(first.unwrap_err(), RefreshError::Aborted);
        assert!(!coordinator.is_refreshing());
        assert!(session.get().is_none());

        let token = coordinator.ensure_fresh_credential().await.unwrap();
        assert_eq!(token, AccessToken::new("fresh"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    struct StaticTransport {
        response: RawResponse,
        seen: Mutex<Vec<OutgoingRequest>>,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn send(&self, request: &OutgoingRequest) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn build_refresher(
        status: u16,
        body: serde_json::Value,
    ) -> (EndpointRefresher, Arc<StaticTransport>) {
        let transport = Arc::new(StaticTransport {
            response: RawResponse::json(status, &body),
            seen: Mutex::new(Vec::new()),
        });
        let config = ClientConfig::new(BaseUrl::new("http://localhost:8080/api").unwrap())
            .with_default_header("Authorization", "Bearer must-not-leak");
        let refresher = EndpointRefresher::new(transport.clone(), &config).unwrap();
        (refresher, transport)
    }

    #[tokio::test]
    async fn endpoint_refresher_posts_without_credential() {
        let (refresher, transport) = build_refresher(
            200,
            json!({"code": 0, "data": {"access_token": "new-token", "user": {"id": 1}}}),
        );

        let refreshed = refresher.refresh().await.unwrap();
        assert_eq!(refreshed.access_token, AccessToken::new("new-token"));
        assert_eq!(refreshed.user, Some(json!({"id": 1})));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::Post);
        assert_eq!(seen[0].url, "http://localhost:8080/api/refresh");
        assert!(seen[0].header("authorization").is_none());
    }

    #[tokio::test]
    async fn endpoint_refresher_rejects_missing_token() {
        let (refresher, _) = build_refresher(200, json!({"code": 0, "data": {}}));
        assert!(matches!(
            refresher.refresh().await,
            Err(RefreshError::Rejected { .. })
        ));

        let (refresher, _) =
            build_refresher(200, json!({"code": 1, "data": {"message": "expired"}}));
        assert_eq!(
            refresher.refresh().await.unwrap_err(),
            RefreshError::Rejected {
                message: "expired".into()
            }
        );
    }

    #[tokio::test]
    async fn endpoint_refresher_maps_401() {
        let (refresher, _) = build_refresher(401, json!({"code": 1}));
        assert_eq!(
            refresher.refresh().await.unwrap_err(),
            RefreshError::Unauthorized
        );
    }

    #[tokio::test]
    async fn endpoint_refresher_strips_mixed_case_credential() {
        let transport = Arc::new(StaticTransport {
            response: RawResponse::json(200, &json!({"code": 0, "data": {"access_token": "t"}})),
            seen: Mutex::new(Vec::new()),
        });
        let config: ClientConfig = serde_json::from_value(json!({
            "base_url": "http://localhost:8080/api",
            "timeout": 10000,
            "default_headers": {"Authorization": "Bearer must-not-leak", "X-Client": "cli"}
        }))
        .unwrap();
        let refresher = EndpointRefresher::new(transport.clone(), &config).unwrap();

        refresher.refresh().await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert!(
            seen[0]
                .headers
                .keys()
                .all(|name| !name.eq_ignore_ascii_case("authorization"))
        );
        assert_eq!(seen[0].header("x-client"), Some("cli"));
    }

    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _request: &OutgoingRequest) -> Result<RawResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RawResponse::json(200, &json!({"code": 0, "data": {}})))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn endpoint_refresher_enforces_timeout() {
        let config = ClientConfig::new(BaseUrl::new("http://localhost:8080/api").unwrap())
            .with_timeout(Duration::from_secs(5));
        let refresher = EndpointRefresher::new(Arc::new(StalledTransport), &config).unwrap();

        let started = tokio::time::Instant::now();
        let err = refresher.refresh().await.unwrap_err();

        assert!(matches!(err, RefreshError::Transport { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }
}
