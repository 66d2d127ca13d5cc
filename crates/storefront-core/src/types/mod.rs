//! Validated value types used across the pipeline.

mod base_url;
mod credentials;
mod token;

pub use base_url::BaseUrl;
pub use credentials::Credentials;
pub use token::AccessToken;
