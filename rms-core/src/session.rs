//! Session token store.
//!
//! The realtime channel reads the bearer credential synchronously on every
//! connect. `SessionStore` keeps the token of the current session in memory
//! and falls back to a locally persisted token file, so a client restarted
//! with a still-valid token can reconnect without logging in again.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::RmsResult;

/// Synchronous source of the current bearer credential.
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` when the user is not authenticated.
    fn current_token(&self) -> Option<String>;
}

impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    fn current_token(&self) -> Option<String> {
        (**self).current_token()
    }
}

/// In-memory session token with a persisted fallback.
#[derive(Clone, Default)]
pub struct SessionStore {
    token: Arc<RwLock<Option<String>>>,
    persist_path: Option<PathBuf>,
}

impl SessionStore {
    /// Create a store backed by the given token file.
    pub fn new(persist_path: impl Into<PathBuf>) -> Self {
        Self {
            token: Arc::new(RwLock::new(None)),
            persist_path: Some(persist_path.into()),
        }
    }

    /// Create a store without persistence.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Location of the persisted token, if any.
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    /// Replace the in-memory token without touching disk.
    pub fn set_token(&self, token: Option<String>) {
        let token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Store the token in memory and persist it.
    pub fn login(&self, token: &str) -> RmsResult<()> {
        self.set_token(Some(token.to_string()));
        if let Some(path) = &self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, token.trim())?;
            debug!("session token persisted to {}", path.display());
        }
        Ok(())
    }

    /// Forget the token in memory and on disk.
    pub fn logout(&self) -> RmsResult<()> {
        self.set_token(None);
        if let Some(path) = &self.persist_path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn memory_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn persisted_token(&self) -> Option<String> {
        let path = self.persist_path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("failed to read session token from {}: {e}", path.display());
                None
            }
        }
    }
}

impl TokenProvider for SessionStore {
    fn current_token(&self) -> Option<String> {
        self.memory_token().or_else(|| self.persisted_token())
    }
}
