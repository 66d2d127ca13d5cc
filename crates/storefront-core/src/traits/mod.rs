//! Seams between the pipeline and its external collaborators.

mod refresh;
mod session;
mod sink;
mod transport;

pub use refresh::{RefreshBackend, RefreshedSession};
pub use session::SessionStore;
pub use sink::{Navigation, NavigationSink, NotificationSink, TracingSink};
pub use transport::{Method, OutgoingRequest, RawResponse, Transport};
