//! Session storage for persisting login state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Stored session data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub base_url: String,
    pub access_token: String,
    #[serde(default)]
    pub user: Option<Value>,
    /// `Cookie` header value holding the refresh context.
    #[serde(default)]
    pub cookies: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Get the session file path.
fn session_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "storefront").context("Could not determine data directory")?;

    Ok(dirs.data_dir().join("session.json"))
}

/// Save a session to disk.
pub fn save_session(stored: &StoredSession) -> Result<()> {
    save_to(&session_path()?, stored)
}

/// Load a session from disk.
pub fn load_session() -> Result<Option<StoredSession>> {
    load_from(&session_path()?)
}

/// Clear the stored session.
pub fn clear_session() -> Result<()> {
    clear_at(&session_path()?)
}

fn save_to(path: &Path, stored: &StoredSession) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create data directory")?;
    }

    let json = serde_json::to_string_pretty(stored)?;
    fs::write(path, &json).context("Failed to write session file")?;

    // Set restrictive permissions (Unix only)
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

fn load_from(path: &Path) -> Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(path).context("Failed to read session file")?;
    let stored = serde_json::from_str(&json).context("Invalid session file")?;
    Ok(Some(stored))
}

fn clear_at(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).context("Failed to remove session file")?;
    }
    Ok(())
}
