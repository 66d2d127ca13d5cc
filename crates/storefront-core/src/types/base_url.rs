//! Backend base URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated base URL for the storefront REST backend.
///
/// The URL may carry a path prefix (for example `/api`); request targets are
/// appended to it.
///
/// # Example
///
/// ```
/// use storefront_core::BaseUrl;
///
/// let base = BaseUrl::new("https://shop.example.com/api/").unwrap();
/// assert_eq!(
///     base.endpoint("/products", &[]).unwrap(),
///     "https://shop.example.com/api/products"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Create a new base URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed, is not absolute, has no
    /// host, or does not use `http`/`https`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::BaseUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        Ok(Self(url))
    }

    /// Returns the full URL for a request target and its query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is not valid.
    pub fn endpoint(&self, target: &str, query: &[(String, String)]) -> Result<String, Error> {
        let base = self.0.as_str().trim_end_matches('/');
        let joined = format!("{}/{}", base, target.trim_start_matches('/'));

        let mut url = Url::parse(&joined).map_err(|e| InvalidInputError::Target {
            value: target.to_string(),
            reason: e.to_string(),
        })?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        if scheme != "https" && scheme != "http" {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must use http or https".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BaseUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BaseUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let base = BaseUrl::new("https://shop.example.com").unwrap();
        assert_eq!(base.host(), Some("shop.example.com"));
    }

    #[test]
    fn plain_http_is_accepted() {
        let base = BaseUrl::new("http://localhost:8080/api").unwrap();
        assert_eq!(base.host(), Some("localhost"));
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let base = BaseUrl::new("http://localhost:8080/api").unwrap();
        assert_eq!(
            base.endpoint("/refresh", &[]).unwrap(),
            "http://localhost:8080/api/refresh"
        );
        assert_eq!(
            base.endpoint("cart", &[]).unwrap(),
            "http://localhost:8080/api/cart"
        );
    }

    #[test]
    fn endpoint_encodes_query() {
        let base = BaseUrl::new("https://shop.example.com/").unwrap();
        let query = vec![
            ("tag".to_string(), "is_new".to_string()),
            ("q".to_string(), "red shoes".to_string()),
        ];
        assert_eq!(
            base.endpoint("/products/tag", &query).unwrap(),
            "https://shop.example.com/products/tag?tag=is_new&q=red+shoes"
        );
    }

    #[test]
    fn invalid_scheme() {
        assert!(BaseUrl::new("ftp://shop.example.com").is_err());
        assert!(BaseUrl::new("file:///tmp/shop").is_err());
    }

    #[test]
    fn invalid_relative_url() {
        assert!(BaseUrl::new("/api/products").is_err());
    }

    #[test]
    fn roundtrips_through_serde() {
        let base: BaseUrl = serde_json::from_str("\"https://shop.example.com/api\"").unwrap();
        assert_eq!(base.as_str(), "https://shop.example.com/api");
        assert!(serde_json::from_str::<BaseUrl>("\"not a url\"").is_err());
    }
}
