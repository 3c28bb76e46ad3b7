use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::AuthConfig;
use crate::error::CredentialError;

/// Bearer token shared by every backend call. Opaque to the client.
#[derive(Debug, Default)]
pub struct CredentialStore {
    token: RwLock<Option<String>>,
    token_file: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(normalize(token)),
            token_file: None,
        }
    }

    /// Reads the token file if configured; an inline token wins over the file.
    pub fn load(config: &AuthConfig) -> Result<Self, CredentialError> {
        if let Some(token) = config.token.clone() {
            return Ok(Self {
                token: RwLock::new(normalize(Some(token))),
                token_file: config.token_file.clone(),
            });
        }

        match config.token_file.as_deref() {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let token = match std::fs::read_to_string(path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(CredentialError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        Ok(Self {
            token: RwLock::new(normalize(token)),
            token_file: Some(path.to_path_buf()),
        })
    }

    pub fn bearer(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.bearer().is_some()
    }

    /// Forgets the token after the backend rejected it, including the copy on disk.
    pub fn clear(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }

        if let Some(path) = &self.token_file {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!("Removed stored credential {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Failed to remove stored credential {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}

fn normalize(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
