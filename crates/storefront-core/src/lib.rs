//! storefront-core - Resilient request pipeline for the storefront REST API.
//!
//! Every network call goes through a [`Pipeline`], which attaches the access
//! token, refreshes it at most once per request when the backend answers 401
//! (sharing one refresh between all concurrently failing requests), retries
//! transient failures with bounded exponential backoff, and decodes the
//! `{ code, data }` response envelope into a single [`Error`] taxonomy.
//!
//! This crate is transport-agnostic; `storefront-http` provides the reqwest
//! transport.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_core::{BaseUrl, ClientConfig, Pipeline, RequestDescriptor, Transport};
//!
//! # async fn example(transport: Arc<dyn Transport>) -> Result<(), storefront_core::Error> {
//! let config = ClientConfig::new(BaseUrl::new("https://shop.example.com/api")?);
//! let pipeline = Pipeline::builder(config, transport).build()?;
//!
//! let products = pipeline
//!     .execute(RequestDescriptor::get("/products").with_query("limit", 4))
//!     .await?;
//! println!("{products}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod refresh;
pub mod request;
pub mod retry;
pub mod session;
pub mod traits;
pub mod types;

pub use config::ClientConfig;
pub use error::{Error, ErrorKind, RefreshError, TransientError, TransportError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use refresh::{EndpointRefresher, RefreshCoordinator};
pub use request::RequestDescriptor;
pub use retry::RetryPolicy;
pub use session::MemorySessionStore;
pub use traits::{
    Method, Navigation, NavigationSink, NotificationSink, OutgoingRequest, RawResponse,
    RefreshBackend, RefreshedSession, SessionStore, TracingSink, Transport,
};
pub use types::{AccessToken, BaseUrl, Credentials};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
