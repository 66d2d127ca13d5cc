//! The request pipeline.
//!
//! Every API call goes through [`Pipeline::execute`], which drives one
//! [`RequestDescriptor`] through a strictly sequential state machine:
//!
//! 1. attach the current access token (or remove a stale one)
//! 2. send via the [`Transport`] and decode the envelope
//! 3. on 401, refresh once through the [`RefreshCoordinator`] and replay
//! 4. on a transient failure, back off and replay within the retry budget
//! 5. otherwise surface the error
//!
//! Replays are the same logical request run again, never in parallel with
//! itself.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::envelope;
use crate::error::{Error, ErrorKind, TransportError};
use crate::refresh::{EndpointRefresher, RefreshCoordinator};
use crate::request::{AUTHORIZATION, RequestDescriptor, lowercase_names};
use crate::session::MemorySessionStore;
use crate::traits::{
    Navigation, NavigationSink, NotificationSink, OutgoingRequest, RefreshBackend, SessionStore,
    TracingSink, Transport,
};
use crate::types::AccessToken;

/// The resilient request pipeline.
///
/// Cheap to clone; clones share the session, the coordinator and the sinks.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    coordinator: RefreshCoordinator,
    notifier: Arc<dyn NotificationSink>,
    navigator: Arc<dyn NavigationSink>,
}

impl Pipeline {
    /// Start building a pipeline around `transport`.
    pub fn builder(config: ClientConfig, transport: Arc<dyn Transport>) -> PipelineBuilder {
        PipelineBuilder {
            config,
            transport,
            session: None,
            refresh_backend: None,
            notifier: None,
            navigator: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the session store.
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Returns the refresh coordinator.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Run a request to completion and return the envelope `data`.
    ///
    /// # Errors
    ///
    /// Returns the classified failure once local recovery (one refresh, bounded
    /// retries) is exhausted. A failed refresh is reported as
    /// [`Error::SessionExpired`] after the session has been cleared.
    #[instrument(
        skip(self, request),
        fields(request_id = %request.id(), method = %request.method, target = %request.target)
    )]
    pub async fn execute(
        &self,
        mut request: RequestDescriptor,
    ) -> Result<serde_json::Value, Error> {
        let url = self
            .config
            .base_url
            .endpoint(&request.target, &request.query)?;

        loop {
            let (outgoing, sent_with) = self.prepare(&mut request, &url);
            debug!(
                attempt = request.attempt_count,
                replay = request.is_refresh_replay,
                "Sending request"
            );

            let outcome = self.send(&outgoing).await;
            let error = match envelope::decode(outcome) {
                Ok(data) => return Ok(data),
                Err(error) => error,
            };

            match error.kind() {
                ErrorKind::Unauthorized => {
                    if request.is_refresh_replay {
                        debug!("Unauthorized after refresh replay");
                        return Err(error);
                    }
                    if self.config.is_bootstrap(&request.target) {
                        debug!("Unauthorized on auth-bootstrap endpoint");
                        return Err(error);
                    }

                    match self
                        .coordinator
                        .ensure_fresh_credential_since(sent_with.as_ref())
                        .await
                    {
                        Ok(_) => {
                            request.is_refresh_replay = true;
                            debug!("Replaying with refreshed credential");
                        }
                        Err(refresh_error) => {
                            warn!(error = %refresh_error, "Session torn down");
                            self.navigator.navigate(Navigation::Login);
                            return Err(Error::SessionExpired(refresh_error));
                        }
                    }
                }
                ErrorKind::Forbidden => {
                    self.navigator.navigate(Navigation::Forbidden);
                    return Err(error);
                }
                ErrorKind::Transient => {
                    let retry = &self.config.retry;
                    if !retry.should_retry(&error, request.attempt_count) {
                        warn!(error = %error, attempts = request.attempt_count + 1, "Giving up");
                        self.notifier.notify(&error.user_message());
                        return Err(error);
                    }

                    let delay = retry.delay_for(request.attempt_count);
                    request.attempt_count += 1;
                    warn!(
                        error = %error,
                        retry = request.attempt_count,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                ErrorKind::Application | ErrorKind::Other => return Err(error),
            }
        }
    }

    /// Run a request and deserialize the envelope `data` into `T`.
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
    ) -> Result<T, Error> {
        let data = self.execute(request).await?;
        envelope::decode_data(data)
    }

    /// Re-read the session and build the wire request.
    ///
    /// Returns the token that was attached so a 401 can be matched against it.
    fn prepare(
        &self,
        request: &mut RequestDescriptor,
        url: &str,
    ) -> (OutgoingRequest, Option<AccessToken>) {
        let token = self.session.get();
        request.headers = lowercase_names(&request.headers);
        match &token {
            Some(token) => {
                request
                    .headers
                    .insert(AUTHORIZATION.to_string(), token.bearer());
            }
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }

        let mut headers = lowercase_names(&self.config.default_headers);
        headers.remove(AUTHORIZATION);
        headers.extend(
            request
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        if request.body.is_some() {
            headers
                .entry("content-type".to_string())
                .or_insert_with(|| "application/json".to_string());
        }

        let outgoing = OutgoingRequest {
            method: request.method,
            url: url.to_string(),
            headers,
            body: request.body.clone(),
            timeout: self.config.timeout,
        };
        (outgoing, token)
    }

    async fn send(
        &self,
        request: &OutgoingRequest,
    ) -> Result<crate::traits::RawResponse, TransportError> {
        match tokio::time::timeout(request.timeout, self.transport.send(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout {
                duration_ms: request.timeout.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("base_url", &self.config.base_url)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: Option<Arc<dyn SessionStore>>,
    refresh_backend: Option<Arc<dyn RefreshBackend>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    navigator: Option<Arc<dyn NavigationSink>>,
}

impl PipelineBuilder {
    /// Use a shared session store. Defaults to a fresh [`MemorySessionStore`].
    #[must_use]
    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Use a custom refresh backend. Defaults to [`EndpointRefresher`] on the
    /// pipeline's transport.
    #[must_use]
    pub fn refresh_backend(mut self, backend: Arc<dyn RefreshBackend>) -> Self {
        self.refresh_backend = Some(backend);
        self
    }

    /// Receive messages for terminal transient failures.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Receive navigation requests.
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn NavigationSink>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Validate the configuration and assemble the pipeline.
    pub fn build(self) -> Result<Pipeline, Error> {
        self.config.validate()?;

        let session: Arc<dyn SessionStore> = match self.session {
            Some(session) => session,
            None => Arc::new(MemorySessionStore::new()),
        };
        let backend: Arc<dyn RefreshBackend> = match self.refresh_backend {
            Some(backend) => backend,
            None => Arc::new(EndpointRefresher::new(
                Arc::clone(&self.transport),
                &self.config,
            )?),
        };
        let coordinator = RefreshCoordinator::new(backend, Arc::clone(&session));

        let notifier: Arc<dyn NotificationSink> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingSink),
        };
        let navigator: Arc<dyn NavigationSink> = match self.navigator {
            Some(navigator) => navigator,
            None => Arc::new(TracingSink),
        };

        Ok(Pipeline {
            config: Arc::new(self.config),
            transport: self.transport,
            session,
            coordinator,
            notifier,
            navigator,
        })
    }
}
