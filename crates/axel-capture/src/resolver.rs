use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use axel_common::DiscordConfig;
use tracing::{debug, warn};

use crate::error::CaptureError;

/// Project-relative capture root used when no override is configured.
pub const DEFAULT_CAPTURE_DIR: &str = "local/discord";
const HOME_CAPTURE_DIR: &str = ".axel/discord";

/// Explicit capture settings; nothing below this reads the environment.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub dir_override: Option<PathBuf>,
    pub default_dir: PathBuf,
    pub home_dir: Option<PathBuf>,
    pub encryption_key: Option<String>,
}

impl CaptureConfig {
    pub fn from_discord(config: &DiscordConfig) -> Self {
        Self {
            dir_override: config.capture_dir.clone(),
            default_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            home_dir: dirs::home_dir().map(|home| home.join(HOME_CAPTURE_DIR)),
            encryption_key: config
                .encryption_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        }
    }

    /// Settings rooted at `dir` with no fallbacks, mostly for tests.
    pub fn at_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir_override: Some(dir.into()),
            default_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            home_dir: None,
            encryption_key: None,
        }
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }
}

/// Picks the capture root: the override (which must be usable), then the
/// project default, then the home directory.
pub fn resolve_capture_dir(config: &CaptureConfig) -> Result<PathBuf, CaptureError> {
    if let Some(dir) = &config.dir_override {
        if dir.exists() && !dir.is_dir() {
            return Err(CaptureError::Configuration {
                path: dir.clone(),
                reason: "path exists and is not a directory".to_string(),
            });
        }
        probe_writable(dir).map_err(|err| CaptureError::Configuration {
            path: dir.clone(),
            reason: err.to_string(),
        })?;
        debug!(dir = %dir.display(), "using capture directory override");
        return Ok(dir.clone());
    }

    let mut tried = vec![config.default_dir.clone()];
    match probe_writable(&config.default_dir) {
        Ok(()) => return Ok(config.default_dir.clone()),
        Err(err) => {
            warn!(
                dir = %config.default_dir.display(),
                error = %err,
                "default capture directory is not writable; falling back to home"
            );
        }
    }

    if let Some(home) = &config.home_dir {
        tried.push(home.clone());
        match probe_writable(home) {
            Ok(()) => return Ok(home.clone()),
            Err(err) => {
                warn!(dir = %home.display(), error = %err, "home capture directory is not writable");
            }
        }
    }

    Err(CaptureError::StorageUnavailable { tried })
}

/// Creates `dir` if needed, then writes and removes a marker file. Permission
/// bits are not trusted.
fn probe_writable(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut marker = tempfile::Builder::new()
        .prefix(".axel-write-probe-")
        .tempfile_in(dir)?;
    marker.write_all(b"ok")?;
    marker.flush()?;
    marker.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_leaves_no_marker_behind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("fresh/captures");
        probe_writable(&dir).expect("writable");
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).expect("read dir").count(), 0);
    }

    #[test]
    fn blank_encryption_key_is_treated_as_absent() {
        let discord = DiscordConfig {
            encryption_key: Some("   ".to_string()),
            ..DiscordConfig::default()
        };
        assert!(CaptureConfig::from_discord(&discord).encryption_key.is_none());
    }
}
