//! Client-side credential storage.
//!
//! Every backend request carries a bearer token read from a [`TokenStore`].
//! A missing token is a precondition failure: [`bearer_token`] returns
//! [`SignError::Auth`] and no request is attempted.

use crate::error::SignError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Persistent storage for the bearer credential.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, SignError>;
    fn save(&self, token: &str) -> Result<(), SignError>;
    fn clear(&self) -> Result<(), SignError>;
}

/// Read the credential or fail before any request is made.
pub fn bearer_token(store: &dyn TokenStore) -> Result<String, SignError> {
    match store.load()? {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(SignError::Auth {
            detail: "no access token is stored".into(),
        }),
    }
}

#[derive(Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// Token kept in a small JSON file (`{"token": "..."}`).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SignError {
        SignError::TokenStore {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, SignError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let file: TokenFile = serde_json::from_str(&raw).map_err(|e| {
            self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(Some(file.token))
    }

    fn save(&self, token: &str) -> Result<(), SignError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let body = serde_json::to_string(&TokenFile {
            token: token.to_string(),
        })
        .map_err(|e| SignError::Internal(format!("token serialisation: {e}")))?;

        // Write to a sibling temp file, then rename over the original.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!("Stored token at {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), SignError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-memory token, for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, SignError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, token: &str) -> Result<(), SignError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SignError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/token.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save("abc.def").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def"));
        assert_eq!(bearer_token(&store).unwrap(), "abc.def");

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn missing_token_is_an_auth_error() {
        let store = MemoryTokenStore::default();
        assert!(matches!(bearer_token(&store), Err(SignError::Auth { .. })));
        store.save("   ").unwrap();
        assert!(matches!(bearer_token(&store), Err(SignError::Auth { .. })));
    }

    #[test]
    fn corrupt_token_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(store.load(), Err(SignError::TokenStore { .. })));
    }
}
