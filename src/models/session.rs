use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::models::config::config_dir;
use crate::models::user::User;

/// Credential plus cached profile. Passed explicitly to whoever needs it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Session { token: Some(token.into()), user: Some(user) }
    }

    /// A whitespace-only token counts as logged out.
    pub fn is_authenticated(&self) -> bool {
        self.bearer().is_some()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Durable home of the session: one JSON file under the config directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    pub fn default_location() -> Result<Self, FeedError> {
        Ok(Self::new(config_dir()?.join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Session, FeedError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| FeedError::Session(format!("Failed to parse session file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::default()),
            Err(e) => Err(FeedError::Session(format!("Failed to read session file: {}", e))),
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), FeedError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| FeedError::Session(format!("Failed to create config directory: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)
            .map_err(|e| FeedError::Session(format!("Failed to write session file: {}", e)))?;
        tracing::debug!(path = ?self.path, "session saved");
        Ok(())
    }

    /// Drops the credential and the cached profile together.
    pub fn clear(&self) -> Result<(), FeedError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FeedError::Session(format!("Failed to remove session file: {}", e))),
        }
    }
}
