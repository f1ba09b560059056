use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::backend::{CollectionPath, UserId};
use crate::error::ErrorCode;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CHECKMARK_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::InternalUnexpected,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_collection_root")]
    pub collection_root: String,
    #[serde(default = "default_items_segment")]
    pub items_segment: String,
    #[serde(default = "default_order_field")]
    pub order_field: String,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub default_section_header: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection_root: default_collection_root(),
            items_segment: default_items_segment(),
            order_field: default_order_field(),
            event_capacity: default_event_capacity(),
            default_section_header: String::new(),
        }
    }
}

impl SyncConfig {
    /// Item collection of `user` under the configured layout.
    #[must_use]
    pub fn collection_for(&self, user: &UserId) -> CollectionPath {
        CollectionPath::with_layout(&self.collection_root, user, &self.items_segment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            min_password_len: default_min_password_len(),
        }
    }
}

/// Load a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<ClientConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the config file location: an explicit path wins, then
/// `$CHECKMARK_CONFIG`, then the per-user config directory.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(raw) = env::var_os(CONFIG_ENV).filter(|raw| !raw.is_empty()) {
        return Some(PathBuf::from(raw));
    }

    dirs::config_dir().map(|dir| dir.join("checkmark/config.toml"))
}

pub fn resolve_config(explicit: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    match config_path(explicit) {
        Some(path) => load_config(&path),
        None => Ok(ClientConfig::default()),
    }
}

fn default_collection_root() -> String {
    CollectionPath::DEFAULT_ROOT.to_string()
}

fn default_items_segment() -> String {
    CollectionPath::DEFAULT_SEGMENT.to_string()
}

fn default_order_field() -> String {
    crate::model::item::field::UPDATED_AT.to_string()
}

const fn default_event_capacity() -> usize {
    64
}

const fn default_min_password_len() -> usize {
    6
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().expect("temp dir must be created");
        let cfg = load_config(&dir.path().join("config.toml")).expect("load should succeed");
        assert_eq!(cfg, ClientConfig::default());
        assert_eq!(cfg.sync.order_field, "updatedAt");
        assert_eq!(cfg.sync.default_section_header, "");
        assert_eq!(cfg.account.min_password_len, 6);
    }

    #[test]
    fn partial_config_keeps_remaining_defaults() {
        let dir = TempDir::new().expect("temp dir must be created");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[sync]
items_segment = "todos"
event_capacity = 8
"#,
        )
        .expect("write config");

        let cfg = load_config(&path).expect("parse");
        assert_eq!(cfg.sync.items_segment, "todos");
        assert_eq!(cfg.sync.event_capacity, 8);
        assert_eq!(cfg.sync.collection_root, "users");
        assert_eq!(
            cfg.sync.collection_for(&UserId::new("u1")).as_str(),
            "users/u1/todos"
        );
    }

    #[test]
    fn malformed_config_reports_parse_code() {
        let dir = TempDir::new().expect("temp dir must be created");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync\nitems_segment = 3").expect("write config");

        let err = load_config(&path).expect_err("parse must fail");
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/tmp/explicit-checkmark.toml");
        assert_eq!(config_path(Some(explicit.as_path())), Some(explicit));
    }
}
