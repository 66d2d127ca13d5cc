//! CLI session: a client wired to the persisted session file.

pub mod storage;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use storefront_core::{AccessToken, BaseUrl, ClientConfig, MemorySessionStore, SessionStore};
use storefront_http::StorefrontClient;

use crate::sinks::TerminalSink;
use storage::StoredSession;

/// A client plus the state needed to write the session back to disk.
pub struct CliSession {
    client: StorefrontClient,
    store: Arc<MemorySessionStore>,
    /// Whether the saved session was loaded into `store`.
    restored: bool,
}

impl CliSession {
    /// Build a client, restoring the saved session when it targets the same backend.
    ///
    /// The base URL comes from `--base-url`, then `STOREFRONT_API_URL`, then the
    /// saved session.
    pub fn open(base_url: Option<&str>) -> Result<Self> {
        let stored = storage::load_session().context("Failed to load session")?;

        let base_url = match base_url
            .map(str::to_string)
            .or_else(|| env::var("STOREFRONT_API_URL").ok())
            .or_else(|| stored.as_ref().map(|s| s.base_url.clone()))
        {
            Some(url) => BaseUrl::new(&url).context("Invalid API base URL")?,
            None => bail!("No API URL. Pass --base-url or set STOREFRONT_API_URL."),
        };

        let stored = stored.filter(|s| {
            BaseUrl::new(&s.base_url).is_ok_and(|saved| saved.as_str() == base_url.as_str())
        });

        let store = Arc::new(match &stored {
            Some(s) => {
                MemorySessionStore::with_session(AccessToken::new(&s.access_token), s.user.clone())
            }
            None => MemorySessionStore::new(),
        });

        let config = ClientConfig::new(base_url)
            .with_env_overrides()
            .context("Invalid client configuration")?;
        let client = StorefrontClient::builder(config)
            .session(store.clone())
            .sinks(Arc::new(TerminalSink), Arc::new(TerminalSink))
            .build()
            .context("Failed to build client")?;

        if let Some(cookies) = stored.as_ref().and_then(|s| s.cookies.as_deref()) {
            client.restore_cookies(cookies);
        }

        Ok(Self {
            client,
            store,
            restored: stored.is_some(),
        })
    }

    pub fn client(&self) -> &StorefrontClient {
        &self.client
    }

    /// Write the current session to disk.
    ///
    /// When logged out, the file is removed only if it held this backend's
    /// session. A session saved for another backend is left alone.
    pub fn persist(&self) -> Result<()> {
        let Some(token) = self.store.get() else {
            if self.restored {
                return storage::clear_session();
            }
            return Ok(());
        };

        let stored = StoredSession {
            base_url: self.client.base_url().to_string(),
            access_token: token.as_str().to_string(),
            user: self.store.user(),
            cookies: self.client.cookie_header(),
            saved_at: Utc::now(),
        };
        storage::save_session(&stored).context("Failed to save session")
    }

    /// Like [`persist`](Self::persist), but only reports failure as a warning.
    pub fn persist_quietly(&self) {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "Failed to update session file");
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.get().is_some()
    }
}
