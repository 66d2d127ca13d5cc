//! reqwest-backed transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use tracing::{instrument, trace};

use storefront_core::{Method, OutgoingRequest, RawResponse, Transport, TransportError};

/// HTTP transport over a shared `reqwest::Client`.
///
/// Cookies set by the backend (notably the refresh cookie) are kept in an
/// in-memory jar and sent back on every later request, including refresh.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    cookies: Arc<Jar>,
}

impl ReqwestTransport {
    /// Create a transport with an empty cookie jar.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_cookie_jar(Arc::new(Jar::default()))
    }

    /// Create a transport sharing an existing cookie jar.
    pub fn with_cookie_jar(cookies: Arc<Jar>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(|err| TransportError::Http {
                message: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self { client, cookies })
    }

    /// Returns the cookie jar.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &OutgoingRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| map_error(err, request.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| map_error(err, request.timeout))?;
        trace!(status, bytes = body.len(), "Response received");

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            duration_ms: timeout.as_millis() as u64,
        }
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_method() {
        assert_eq!(to_reqwest_method(Method::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest_method(Method::Delete), reqwest::Method::DELETE);
    }

    #[test]
    fn transport_creation() {
        let jar = Arc::new(Jar::default());
        let transport = ReqwestTransport::with_cookie_jar(Arc::clone(&jar)).unwrap();
        assert!(Arc::ptr_eq(transport.cookie_jar(), &jar));
    }
}
