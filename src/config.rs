//! Chec credentials.
//!
//! Loaded from `~/.checrc`, a JSON file written by `chec login`. A missing or
//! empty file simply means nobody is logged in.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};

/// Errors that can occur while reading the credentials file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Stored credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys saved at login.
    #[serde(default)]
    pub keys: Vec<ApiKey>,

    /// Credentials for the real-time log feed.
    #[serde(default)]
    pub notifications: Option<NotificationCredentials>,
}

/// One API key issued to the logged in merchant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_sandbox: bool,
}

/// Key and channel token for the log feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCredentials {
    pub key: String,
    pub token: String,
}

impl Config {
    /// Load credentials from `~/.checrc`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoHome)?;
        Self::load_from(&path)
    }

    /// Load credentials from an explicit path.
    ///
    /// Corrupt JSON is treated as an empty config, the same as a missing file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        match serde_json::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt config");
                Ok(Self::default())
            }
        }
    }

    /// The config file path: `~/.checrc`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".checrc"))
    }

    /// Whether an API key is stored. Says nothing about whether it is still valid.
    pub fn is_logged_in(&self) -> bool {
        !self.keys.is_empty()
    }

    /// The stored secret key for live or sandbox mode.
    pub fn api_key(&self, sandbox: bool) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.kind == "secret" && k.is_sandbox == sandbox)
            .map(|k| k.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".checrc");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_is_logged_out() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join(".checrc")).unwrap();

        assert!(!config.is_logged_in());
        assert!(config.notifications.is_none());
    }

    #[test]
    fn empty_file_is_logged_out() {
        let (_dir, path) = write_config("");
        assert!(!Config::load_from(&path).unwrap().is_logged_in());
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let (_dir, path) = write_config("{not json");
        assert!(!Config::load_from(&path).unwrap().is_logged_in());
    }

    #[test]
    fn reads_keys_and_notifications() {
        let (_dir, path) = write_config(
            r#"{
                "keys": [
                    {"key": "pk_live", "type": "public", "is_sandbox": false},
                    {"key": "sk_test", "type": "secret", "is_sandbox": true},
                    {"key": "sk_live", "type": "secret", "is_sandbox": false}
                ],
                "notifications": {"key": "pusher-key", "token": "abc"}
            }"#,
        );
        let config = Config::load_from(&path).unwrap();

        assert!(config.is_logged_in());
        assert_eq!(config.api_key(false), Some("sk_live"));
        assert_eq!(config.api_key(true), Some("sk_test"));
        assert_eq!(
            config.notifications,
            Some(NotificationCredentials {
                key: "pusher-key".into(),
                token: "abc".into(),
            })
        );
    }
}
