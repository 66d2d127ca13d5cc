//! Terminal notification and navigation sinks.

use storefront_core::{Navigation, NavigationSink, NotificationSink};

use crate::output;

/// Prints pipeline notifications and navigation requests to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn notify(&self, message: &str) {
        output::error(message);
    }
}

impl NavigationSink for TerminalSink {
    fn navigate(&self, destination: Navigation) {
        match destination {
            Navigation::Forbidden => output::hint("Access denied"),
            Navigation::Login => output::hint("Session expired, run 'storefront login'"),
        }
    }
}
