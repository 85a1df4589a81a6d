use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::error::FeedError;

pub const APP_DIR: &str = "feedtui";
pub const API_URL_ENV: &str = "FEEDTUI_API_URL";

/// Host root; the backend serves everything but login at the top level.
fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_login_path() -> String {
    "api/login".to_string()
}

fn default_avatar() -> String {
    crate::models::notification::DEFAULT_AVATAR.to_string()
}

fn default_highlight_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_toast_secs() -> u64 {
    4
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Login lives under its own prefix, relative to `api_url`.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_avatar")]
    pub default_avatar: String,
    #[serde(default = "default_highlight_secs")]
    pub highlight_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_toast_secs")]
    pub toast_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: default_api_url(),
            login_path: default_login_path(),
            default_avatar: default_avatar(),
            highlight_secs: default_highlight_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            toast_secs: default_toast_secs(),
        }
    }
}

/// `$XDG_CONFIG_HOME/feedtui`, falling back to `~/.config/feedtui`.
pub fn config_dir() -> Result<PathBuf, FeedError> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| FeedError::Config("Could not find home directory".to_string()))
}

pub fn cache_dir() -> Result<PathBuf, FeedError> {
    let dir = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| FeedError::Config("Could not find home directory".to_string()))?;
    fs::create_dir_all(&dir)
        .map_err(|e| FeedError::Config(format!("Failed to create cache directory: {}", e)))?;
    Ok(dir)
}

impl Config {
    pub fn path() -> Result<PathBuf, FeedError> {
        Ok(config_dir()?.join("config.json"))
    }

    /// Loads the user's config, applying the environment override.
    pub fn load() -> Result<Self, FeedError> {
        let mut config = Self::load_or_init(&Self::path()?)?;
        if let Ok(url) = env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_url = url.trim().to_string();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, FeedError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(FeedError::Config(format!("Failed to open config file at {:?}: {}", path, e)))
            }
        };

        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config JSON at {:?}", path))?;
        Ok(config)
    }

    /// Like `load_from`, but a first run writes the defaults out so they
    /// can be edited.
    pub fn load_or_init(path: &Path) -> Result<Self, FeedError> {
        let config = Self::load_from(path)?;
        if !path.exists() {
            match config.save_to(path) {
                Ok(()) => info!(?path, "wrote default config"),
                Err(e) => warn!(?path, error = %e, "could not write default config"),
            }
        }
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), FeedError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self)
            .context("Failed to serialize config to JSON")?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open conf file for writing at {:?}", path))?;

        file.write_all(json.as_bytes())
            .context("Failed to write config data")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), FeedError> {
        let url = Url::parse(&self.api_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FeedError::Config(format!("api_url must be http(s): {}", self.api_url)));
        }
        Ok(())
    }

    pub fn highlight(&self) -> Duration {
        Duration::from_secs(self.highlight_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn toast(&self) -> Duration {
        Duration::from_secs(self.toast_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.highlight(), Duration::from_secs(3));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let config = Config { api_url: "https://feed.example.com".into(), highlight_secs: 5, ..Config::default() };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedtui/config.json");
        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        fs::write(&path, r#"{"api_url": "https://edited.example"}"#).unwrap();
        let edited = Config::load_or_init(&path).unwrap();
        assert_eq!(edited.api_url, "https://edited.example");
        assert_eq!(edited.login_path, "api/login");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_url": "https://x.example"}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url, "https://x.example");
        assert_eq!(config.toast_secs, 4);
    }

    #[test]
    fn rejects_bad_urls() {
        let bad = Config { api_url: "not a url".into(), ..Config::default() };
        assert!(matches!(bad.validate(), Err(FeedError::Config(_))));
        let ftp = Config { api_url: "ftp://files.example".into(), ..Config::default() };
        assert!(ftp.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn garbage_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
