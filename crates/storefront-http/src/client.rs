//! High-level storefront client.

use std::sync::Arc;

use reqwest::cookie::CookieStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use storefront_core::envelope;
use storefront_core::{
    AccessToken, BaseUrl, ClientConfig, Credentials, Error, MemorySessionStore, NavigationSink,
    NotificationSink, Pipeline, RequestDescriptor, Result, SessionStore,
};

use crate::transport::ReqwestTransport;

const LOGIN: &str = "/login";
const REGISTER: &str = "/register";
const LOGOUT: &str = "/logout";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    confirm_password: &'a str,
}

/// `data` of a successful login or registration.
#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    #[serde(default)]
    user: Option<Value>,
}

/// Storefront API client.
///
/// Wraps a [`Pipeline`] over a [`ReqwestTransport`]. Clones share the
/// session, the cookie jar and the refresh coordinator.
///
/// # Example
///
/// ```no_run
/// use storefront_core::{BaseUrl, ClientConfig, Credentials};
/// use storefront_http::StorefrontClient;
///
/// # async fn example() -> storefront_core::Result<()> {
/// let config = ClientConfig::new(BaseUrl::new("https://shop.example.com/api")?);
/// let client = StorefrontClient::new(config)?;
///
/// client.login(&Credentials::new("alice@example.com", "secret")).await?;
/// let cart: serde_json::Value = client.get("/cart").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StorefrontClient {
    pipeline: Pipeline,
    transport: Arc<ReqwestTransport>,
}

impl StorefrontClient {
    /// Create a client with an in-memory session.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Create a client around an existing session store.
    pub fn with_session(config: ClientConfig, session: Arc<dyn SessionStore>) -> Result<Self> {
        Self::builder(config).session(session).build()
    }

    pub fn builder(config: ClientConfig) -> StorefrontClientBuilder {
        StorefrontClientBuilder {
            config,
            session: None,
            notifier: None,
            navigator: None,
        }
    }

    /// Returns the underlying pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the session store.
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        self.pipeline.session()
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &BaseUrl {
        &self.pipeline.config().base_url
    }

    /// Log in and store the returned access token and user.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Option<Value>> {
        let request = RequestDescriptor::post(LOGIN).with_json(&LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
        })?;

        let user = self.authenticate(request).await?;
        info!("Logged in");
        Ok(user)
    }

    /// Create an account and store the returned access token and user.
    #[instrument(skip(self, password, confirm_password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Option<Value>> {
        let request = RequestDescriptor::post(REGISTER).with_json(&RegisterRequest {
            name,
            email,
            password,
            confirm_password,
        })?;

        let user = self.authenticate(request).await?;
        info!("Registered");
        Ok(user)
    }

    /// Log out on the server, then drop the local session whatever the outcome.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let outcome = self
            .pipeline
            .execute(RequestDescriptor::post(LOGOUT))
            .await;
        self.session().clear();

        match outcome {
            Ok(_) => {
                info!("Logged out");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Server logout failed, local session cleared");
                Err(err)
            }
        }
    }

    /// Force a credential refresh, joining one already in progress.
    pub async fn refresh(&self) -> Result<AccessToken> {
        self.pipeline
            .coordinator()
            .ensure_fresh_credential()
            .await
            .map_err(Error::SessionExpired)
    }

    /// `GET target` and deserialize `data`.
    pub async fn get<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        self.pipeline.execute_as(RequestDescriptor::get(target)).await
    }

    /// `POST target` with a JSON body and deserialize `data`.
    pub async fn post<B, T>(&self, target: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = RequestDescriptor::post(target).with_json(body)?;
        self.pipeline.execute_as(request).await
    }

    /// `DELETE target` and deserialize `data`.
    pub async fn delete<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        self.pipeline
            .execute_as(RequestDescriptor::delete(target))
            .await
    }

    /// Run an arbitrary request and return the raw `data`.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<Value> {
        self.pipeline.execute(request).await
    }

    /// Cookies held for the API origin, formatted as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        self.transport
            .cookie_jar()
            .cookies(self.base_url().as_url())
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Load cookies previously exported with [`cookie_header`](Self::cookie_header).
    pub fn restore_cookies(&self, header: &str) {
        let url = self.base_url().as_url();
        let jar = self.transport.cookie_jar();
        for cookie in header.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            jar.add_cookie_str(cookie, url);
        }
        debug!("Cookies restored");
    }

    async fn authenticate(&self, request: RequestDescriptor) -> Result<Option<Value>> {
        let data = self.pipeline.execute(request).await?;
        let auth: AuthResponse = envelope::decode_data(data)?;
        if auth.access_token.is_empty() {
            return Err(Error::Decode {
                message: "response did not include an access token".into(),
            });
        }

        let session = self.session();
        session.set(AccessToken::new(auth.access_token));
        if let Some(user) = &auth.user {
            session.set_user(user.clone());
        }
        Ok(auth.user)
    }
}

/// Builder for [`StorefrontClient`].
pub struct StorefrontClientBuilder {
    config: ClientConfig,
    session: Option<Arc<dyn SessionStore>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    navigator: Option<Arc<dyn NavigationSink>>,
}

impl StorefrontClientBuilder {
    #[must_use]
    pub fn session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Route notifications and navigation requests to the given sinks.
    #[must_use]
    pub fn sinks(
        mut self,
        notifier: Arc<dyn NotificationSink>,
        navigator: Arc<dyn NavigationSink>,
    ) -> Self {
        self.notifier = Some(notifier);
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<StorefrontClient> {
        let transport = Arc::new(ReqwestTransport::new()?);
        let session: Arc<dyn SessionStore> = match self.session {
            Some(session) => session,
            None => Arc::new(MemorySessionStore::new()),
        };

        let mut builder = Pipeline::builder(self.config, transport.clone()).session(session);
        if let Some(notifier) = self.notifier {
            builder = builder.notifier(notifier);
        }
        if let Some(navigator) = self.navigator {
            builder = builder.navigator(navigator);
        }

        Ok(StorefrontClient {
            pipeline: builder.build()?,
            transport,
        })
    }
}
