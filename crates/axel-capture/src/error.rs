use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the operation that hit them.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture directory {path} is unusable ({reason}); set AXEL_DISCORD_DIR to a writable path")]
    Configuration { path: PathBuf, reason: String },
    #[error("no writable capture directory (tried {}); set AXEL_DISCORD_DIR to a writable path", display_paths(.tried))]
    StorageUnavailable { tried: Vec<PathBuf> },
    #[error("AXEL_DISCORD_ENCRYPTION_KEY is invalid: {0}")]
    InvalidKey(#[from] axel_cipher::CipherError),
    #[error("capture I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("capture at {path} is neither decryptable nor valid UTF-8")]
    Undecodable { path: PathBuf },
}

/// Failures that are recorded and logged but never fail the primary
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoftFailure {
    #[error("history fetch failed: {0}")]
    TransientFetch(String),
    #[error("{path} did not decrypt with the configured key")]
    DecryptionMismatch { path: PathBuf },
    #[error("attachment {filename} was not saved: {reason}")]
    AttachmentDownload { filename: String, reason: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl CaptureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
