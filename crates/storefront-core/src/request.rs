//! Per-call request descriptor.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::traits::Method;

/// Name of the header carrying the access credential.
pub const AUTHORIZATION: &str = "authorization";

/// Copy of `headers` with every name lowercased.
///
/// Names that collide after lowercasing keep the value of the last one in
/// map order.
pub(crate) fn lowercase_names(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// A single logical API call.
///
/// The descriptor is created once per call and travels through every replay
/// of that call, so retry and refresh state is per request rather than global.
#[derive(Clone)]
pub struct RequestDescriptor {
    id: Uuid,
    pub target: String,
    pub method: Method,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Number of transient-failure retries already performed.
    pub attempt_count: u32,
    /// Set once the call has been replayed after a credential refresh.
    pub is_refresh_replay: bool,
}

impl RequestDescriptor {
    /// Create a descriptor for `method` on `target` (a path such as `/cart`).
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            method,
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            attempt_count: 0,
            is_refresh_replay: false,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::Delete, target)
    }

    /// Correlation id, stable across replays.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a header. The name is lowercased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the value cannot be represented as JSON.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| Error::Decode {
            message: e.to_string(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("target", &self.target)
            .field("headers", &RedactedHeaders(&self.headers))
            .field("query", &self.query)
            .field("attempt_count", &self.attempt_count)
            .field("is_refresh_replay", &self.is_refresh_replay)
            .finish()
    }
}

/// Debug view of a header map that hides credential values.
pub(crate) struct RedactedHeaders<'a>(pub(crate) &'a BTreeMap<String, String>);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.0 {
            if name == AUTHORIZATION || name == "cookie" {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_authorization() {
        let request = RequestDescriptor::get("/cart")
            .with_header("Authorization", "Bearer secret-token")
            .with_header("X-Trace", "abc");
        let debug = format!("{:?}", request);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("abc"));
    }

    #[test]
    fn fresh_descriptor_has_no_retry_state() {
        let request = RequestDescriptor::post("/cart/save");
        assert_eq!(request.attempt_count, 0);
        assert!(!request.is_refresh_replay);
        assert_eq!(request.method, Method::Post);
    }

    #[test]
    fn clones_share_correlation_id() {
        let request = RequestDescriptor::get("/products").with_query("limit", 4);
        let replay = request.clone();
        assert_eq!(request.id(), replay.id());
        assert_eq!(replay.query, vec![("limit".to_string(), "4".to_string())]);
    }
}
