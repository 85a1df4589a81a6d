use std::io;
use thiserror::Error;
use serde::{Serialize, Deserialize};

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    /// Transport failure: the request never produced an HTTP response.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("Server rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    /// Client-side check failed before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Anyhow error: {0}")]
    Anyhow(String),
}

impl FeedError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        FeedError::Api { status, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        FeedError::Validation(message.into())
    }

    /// Missing, expired or malformed credential (flask-jwt answers 401 or 422).
    pub fn is_auth(&self) -> bool {
        matches!(self, FeedError::Api { status: 401 | 422, .. })
    }

    /// The server understood the request and refused it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, FeedError::Api { .. })
    }

    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            FeedError::Api { message, .. } if self.is_auth() => {
                format!("Session expired or invalid, please log in again ({message})")
            }
            FeedError::Api { message, .. } => message.clone(),
            FeedError::Validation(message) => message.clone(),
            FeedError::Network(_) => "Network error, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Json(err.to_string())
    }
}

impl From<io::Error> for FeedError {
    fn from(err: io::Error) -> Self {
        FeedError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::Json(err.to_string())
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::Config(format!("Invalid URL: {}", err))
    }
}

impl From<anyhow::Error> for FeedError {
    fn from(err: anyhow::Error) -> Self {
        FeedError::Anyhow(err.to_string())
    }
}

pub type Result<T, E = FeedError> = std::result::Result<T, E>;
