//! Notification and navigation callbacks.

use tracing::{info, warn};

/// Where the calling layer should send the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Access to a resource was denied.
    Forbidden,
    /// The session was torn down; the user must log in again.
    Login,
}

/// Receives human-readable messages for terminal transient failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Receives navigation requests on forbidden access and session teardown.
pub trait NavigationSink: Send + Sync {
    fn navigate(&self, destination: Navigation);
}

impl<F> NotificationSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

impl<F> NavigationSink for F
where
    F: Fn(Navigation) + Send + Sync,
{
    fn navigate(&self, destination: Navigation) {
        self(destination)
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str) {
        warn!(message, "Request failed");
    }
}

impl NavigationSink for TracingSink {
    fn navigate(&self, destination: Navigation) {
        info!(?destination, "Navigation requested");
    }
}
