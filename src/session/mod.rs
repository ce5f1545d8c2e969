//! Session store: the single holder of the current token, role and username.
//!
//! The store is an explicit, injectable object rather than ambient global
//! state, so tests run isolated and the HTTP client and auth adapter share
//! one instance via `Arc`. Persistence to disk is best-effort: failures are
//! logged and never propagated, and `clear` is idempotent.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The authenticated state carried between requests and across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: String,
    pub username: String,
}

/// Process-wide session cell with optional file persistence.
///
/// Reads and writes are last-write-wins; the surrounding environment issues
/// them from one logical context, so no discipline beyond the lock is needed.
pub struct SessionStore {
    inner: RwLock<Option<Session>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Create a store persisted at `path`, loading any session a previous
    /// run left behind.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = load_session(&path);
        Self {
            inner: RwLock::new(initial),
            path: Some(path),
        }
    }

    /// Create a store with no backing file. Used by tests and one-shot
    /// invocations that should not touch disk.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(None),
            path: None,
        }
    }

    /// Replace the current session and persist it.
    pub fn set(&self, token: &str, role: &str, username: &str) {
        let session = Session {
            token: token.to_string(),
            role: role.to_string(),
            username: username.to_string(),
        };
        if let Some(path) = &self.path {
            persist_session(path, &session);
        }
        *self.inner.write() = Some(session);
    }

    /// Drop the session and its backing file. Safe to call repeatedly.
    pub fn clear(&self) {
        *self.inner.write() = None;
        if let Some(path) = &self.path {
            if path.exists() {
                if let Err(err) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %err, "Failed to remove session file");
                }
            }
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().as_ref().map(|s| s.token.clone())
    }

    pub fn role(&self) -> Option<String> {
        self.inner.read().as_ref().map(|s| s.role.clone())
    }

    pub fn username(&self) -> Option<String> {
        self.inner.read().as_ref().map(|s| s.username.clone())
    }
}

fn load_session(path: &Path) -> Option<Session> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read session file");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(session) => {
            debug!(path = %path.display(), "Restored session from disk");
            Some(session)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Session file is malformed; ignoring");
            None
        }
    }
}

fn persist_session(path: &Path, session: &Session) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %err, "Failed to create session directory");
                return;
            }
        }
    }

    match serde_json::to_string_pretty(session) {
        Ok(raw) => {
            if let Err(err) = fs::write(path, raw) {
                warn!(path = %path.display(), error = %err, "Failed to persist session");
            }
        }
        Err(err) => warn!(error = %err, "Failed to serialize session"),
    }
}
