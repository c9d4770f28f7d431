use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = ".config/axel/config.toml";
const DEFAULT_REPO_FILE: &str = "repos.txt";
const DEFAULT_TOKEN_PLACE_URL: &str = "http://localhost:5000/api/v1";

pub const ENV_CONFIG: &str = "AXEL_CONFIG";
pub const ENV_CAPTURE_DIR: &str = "AXEL_DISCORD_DIR";
pub const ENV_ENCRYPTION_KEY: &str = "AXEL_DISCORD_ENCRYPTION_KEY";
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const ENV_TOKEN_PLACE_URL: &str = "AXEL_TOKEN_PLACE_URL";
pub const ENV_TOKEN_PLACE_KEY: &str = "TOKEN_PLACE_API_KEY";
pub const ENV_REPO_FILE: &str = "AXEL_REPO_FILE";
pub const ENV_LOG_LEVEL: &str = "AXEL_LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxelConfig {
    pub log_level: String,
    pub repo_file: PathBuf,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub token_place: TokenPlaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: Option<String>,
    /// Explicit capture root. Must be writable when set.
    pub capture_dir: Option<PathBuf>,
    /// URL-safe base64 key; captures are written encrypted when present.
    pub encryption_key: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPlaceConfig {
    #[serde(default = "default_token_place_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_token_place_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            capture_dir: None,
            encryption_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for TokenPlaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_token_place_url(),
            api_key: None,
            timeout_ms: default_token_place_timeout_ms(),
        }
    }
}

impl Default for AxelConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            repo_file: PathBuf::from(DEFAULT_REPO_FILE),
            discord: DiscordConfig::default(),
            token_place: TokenPlaceConfig::default(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_token_place_url() -> String {
    DEFAULT_TOKEN_PLACE_URL.to_string()
}

fn default_token_place_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize default config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("config has invalid value: {0}")]
    ValidationFailed(String),
}

impl AxelConfig {
    pub fn resolve_path() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG)
            && !path.trim().is_empty()
        {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, raw).map_err(|source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load_or_create() -> Result<(Self, PathBuf, bool), ConfigError> {
        let path = Self::resolve_path();
        if path.exists() {
            let cfg = Self::load(&path)?;
            return Ok((cfg, path, false));
        }

        let cfg = Self::default();
        cfg.save(&path)?;
        Ok((cfg, path, true))
    }

    /// Overlays environment settings. `lookup` is injected so callers (and
    /// tests) decide where values come from; blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(dir) = get(ENV_CAPTURE_DIR) {
            self.discord.capture_dir = Some(PathBuf::from(expand_tilde(&dir)));
        }
        if let Some(key) = get(ENV_ENCRYPTION_KEY) {
            self.discord.encryption_key = Some(key);
        }
        if let Some(token) = get(ENV_DISCORD_TOKEN) {
            self.discord.token = Some(token);
        }
        if let Some(url) = get(ENV_TOKEN_PLACE_URL) {
            self.token_place.base_url = url;
        }
        if let Some(key) = get(ENV_TOKEN_PLACE_KEY) {
            self.token_place.api_key = Some(key);
        }
        if let Some(path) = get(ENV_REPO_FILE) {
            self.repo_file = PathBuf::from(expand_tilde(&path));
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "log_level cannot be empty".to_string(),
            ));
        }
        if self.repo_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "repo_file cannot be empty".to_string(),
            ));
        }
        if self.discord.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "discord.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.discord.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "discord.poll_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(dir) = &self.discord.capture_dir
            && dir.as_os_str().is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "discord.capture_dir cannot be empty if set".to_string(),
            ));
        }
        if self.token_place.timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "token_place.timeout_ms must be positive".to_string(),
            ));
        }
        Url::parse(self.token_place.base_url.trim()).map_err(|err| {
            ConfigError::ValidationFailed(format!(
                "token_place.base_url is not a valid URL ({}): {err}",
                self.token_place.base_url
            ))
        })?;
        Ok(())
    }
}

pub fn expand_tilde(path: &str) -> String {
    if path == "~" {
        return dirs::home_dir()
            .map(|home| home.display().to_string())
            .unwrap_or_else(|| path.to_string());
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest).display().to_string();
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = AxelConfig::default();
        cfg.apply_env_overrides(lookup_from(&[
            (ENV_CAPTURE_DIR, "/srv/captures"),
            (ENV_ENCRYPTION_KEY, "  key-material  "),
            (ENV_TOKEN_PLACE_URL, "https://token.example/api/v1"),
            (ENV_TOKEN_PLACE_KEY, "tp-key"),
        ]));

        assert_eq!(
            cfg.discord.capture_dir.as_deref(),
            Some(Path::new("/srv/captures"))
        );
        assert_eq!(cfg.discord.encryption_key.as_deref(), Some("key-material"));
        assert_eq!(cfg.token_place.base_url, "https://token.example/api/v1");
        assert_eq!(cfg.token_place.api_key.as_deref(), Some("tp-key"));
        assert!(cfg.discord.token.is_none());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = AxelConfig::default();
        cfg.discord.encryption_key = Some("from-file".to_string());
        cfg.apply_env_overrides(lookup_from(&[(ENV_ENCRYPTION_KEY, "   ")]));
        assert_eq!(cfg.discord.encryption_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn validate_rejects_bad_token_place_url() {
        let mut cfg = AxelConfig::default();
        cfg.token_place.base_url = "not a url".to_string();
        let err = cfg.validate().expect_err("must fail");
        assert!(err.to_string().contains("token_place.base_url"));
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        let mut cfg = AxelConfig::default();
        cfg.discord.capture_dir = Some(PathBuf::from("/tmp/axel"));
        cfg.save(&path).expect("save");

        let loaded = AxelConfig::load(&path).expect("load");
        assert_eq!(loaded.discord.capture_dir, cfg.discord.capture_dir);
        assert_eq!(loaded.token_place.timeout_ms, 10_000);
        loaded.validate().expect("defaults are valid");
    }
}
