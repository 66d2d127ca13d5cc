//! storefront-http - reqwest transport and client facade for the storefront API.
//!
//! [`ReqwestTransport`] implements [`storefront_core::Transport`] over HTTP
//! with a cookie jar holding the refresh context. [`StorefrontClient`] wires it
//! into a [`storefront_core::Pipeline`] and adds the account calls.

mod client;
mod transport;

pub use client::{StorefrontClient, StorefrontClientBuilder};
pub use transport::ReqwestTransport;
