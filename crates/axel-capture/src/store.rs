use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use axel_cipher::{CaptureCipher, looks_encrypted};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, SoftFailure};
use crate::markdown::{self, sanitize_component};
use crate::model::{Capture, ChatMessage, SavedAttachment};
use crate::platform::AttachmentDownloader;
use crate::resolver::{CaptureConfig, resolve_capture_dir};

pub(crate) const CAPTURE_EXTENSION: &str = "md";

/// Result of decoding a capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Decrypted(String),
    Plaintext(String),
    Undecodable,
}

impl Decoded {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Decrypted(text) | Self::Plaintext(text) => Some(text),
            Self::Undecodable => None,
        }
    }
}

/// Tries the cipher first, then plain UTF-8, so encrypted and legacy
/// plaintext captures can share one directory. A token the cipher cannot
/// open is undecodable, never plaintext.
pub fn decode_bytes(bytes: &[u8], cipher: Option<&CaptureCipher>) -> Decoded {
    if let Some(cipher) = cipher
        && let Ok(plain) = cipher.decrypt(bytes)
    {
        return Decoded::Decrypted(String::from_utf8_lossy(&plain).into_owned());
    }
    if looks_encrypted(bytes) {
        return Decoded::Undecodable;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Decoded::Plaintext(text.to_string()),
        Err(_) => Decoded::Undecodable,
    }
}

#[derive(Debug, Clone)]
pub struct CaptureStore {
    root: PathBuf,
    cipher: Option<CaptureCipher>,
}

impl CaptureStore {
    /// Resolves the capture root and validates the key before anything is
    /// written.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let cipher = config
            .encryption_key
            .as_deref()
            .map(CaptureCipher::from_key)
            .transpose()?;
        let root = resolve_capture_dir(config)?;
        Ok(Self { root, cipher })
    }

    pub fn with_root(root: impl Into<PathBuf>, cipher: Option<CaptureCipher>) -> Self {
        Self {
            root: root.into(),
            cipher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.root.join(sanitize_component(channel))
    }

    /// `<root>/<channel>/<message_id>.md`, also for encrypted captures.
    pub fn capture_path(&self, channel: &str, message_id: &str) -> PathBuf {
        self.channel_dir(channel).join(format!(
            "{}.{CAPTURE_EXTENSION}",
            sanitize_component(message_id)
        ))
    }

    pub fn attachment_dir(&self, channel: &str, message_id: &str) -> PathBuf {
        self.channel_dir(channel)
            .join(sanitize_component(message_id))
    }

    /// Writes `capture`, replacing any earlier capture of the same message.
    pub fn save(&self, capture: &Capture) -> Result<PathBuf, CaptureError> {
        let dir = self.channel_dir(&capture.channel);
        fs::create_dir_all(&dir).map_err(|err| CaptureError::io(&dir, err))?;
        let path = self.capture_path(&capture.channel, &capture.message_id);

        let rendered = markdown::render(capture);
        let payload = match &self.cipher {
            Some(cipher) => cipher.encrypt(rendered.as_bytes())?.into_bytes(),
            None => rendered.into_bytes(),
        };
        fs::write(&path, payload).map_err(|err| CaptureError::io(&path, err))?;
        info!(
            path = %path.display(),
            encrypted = self.is_encrypted(),
            "capture saved"
        );
        Ok(path)
    }

    /// Downloads every attachment of `message` into its per-message
    /// directory. Each failure is recorded and the rest continue.
    pub fn save_attachments<D>(
        &self,
        downloader: &D,
        message: &ChatMessage,
    ) -> (Vec<SavedAttachment>, Vec<SoftFailure>)
    where
        D: AttachmentDownloader + ?Sized,
    {
        let mut saved = Vec::new();
        let mut failures = Vec::new();
        if message.attachments.is_empty() {
            return (saved, failures);
        }

        let (channel, _) = message.channel.metadata();
        let dir = self.attachment_dir(&channel, &message.id);
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %err, "cannot create attachment directory");
            for attachment in &message.attachments {
                failures.push(SoftFailure::AttachmentDownload {
                    filename: attachment.filename.clone(),
                    reason: err.to_string(),
                });
            }
            return (saved, failures);
        }

        let message_dir = sanitize_component(&message.id);
        let mut used: HashSet<String> = HashSet::new();
        for (index, attachment) in message.attachments.iter().enumerate() {
            let base = Path::new(&attachment.filename)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("attachment-{}", index + 1));
            let mut file_name = sanitize_component(&base);
            if !used.insert(file_name.clone()) {
                file_name = format!("{}-{file_name}", index + 1);
                used.insert(file_name.clone());
            }

            let destination = dir.join(&file_name);
            match downloader.download(attachment, &destination) {
                Ok(()) => {
                    debug!(path = %destination.display(), "attachment saved");
                    saved.push(SavedAttachment {
                        display_name: attachment.filename.clone(),
                        relative_path: format!("{message_dir}/{file_name}"),
                    });
                }
                Err(err) => {
                    warn!(
                        filename = %attachment.filename,
                        error = %err,
                        "attachment download failed"
                    );
                    failures.push(SoftFailure::AttachmentDownload {
                        filename: attachment.filename.clone(),
                        reason: format!("{err:#}"),
                    });
                }
            }
        }
        (saved, failures)
    }

    pub fn decode(&self, path: &Path) -> Result<Decoded, CaptureError> {
        let bytes = fs::read(path).map_err(|err| CaptureError::io(path, err))?;
        let decoded = decode_bytes(&bytes, self.cipher.as_ref());
        match &decoded {
            Decoded::Plaintext(_) if self.cipher.is_some() => {
                debug!(path = %path.display(), "capture read as legacy plaintext");
            }
            Decoded::Undecodable => {
                let failure = SoftFailure::DecryptionMismatch {
                    path: path.to_path_buf(),
                };
                warn!(%failure, "skipping undecodable capture");
            }
            _ => {}
        }
        Ok(decoded)
    }

    /// Dual-mode read: decrypted text, or the file as plaintext.
    pub fn read(&self, path: &Path) -> Result<String, CaptureError> {
        self.decode(path)?
            .into_text()
            .ok_or_else(|| CaptureError::Undecodable {
                path: path.to_path_buf(),
            })
    }
}
