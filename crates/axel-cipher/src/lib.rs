use std::fmt;

use base64::Engine;
use base64::prelude::BASE64_URL_SAFE;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use thiserror::Error;

const TOKEN_VERSION: u8 = 1;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
/// Fernet: version, timestamp, IV, one AES block, HMAC.
const FERNET_VERSION: u8 = 0x80;
const FERNET_MIN_LEN: usize = 1 + 8 + 16 + 16 + 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption key must be 32 bytes of URL-safe base64: {0}")]
    InvalidKey(String),
    #[error("not an encrypted capture token: {0}")]
    Malformed(&'static str),
    #[error("failed to decrypt capture token (wrong key?)")]
    Decrypt,
    #[error("failed to encrypt capture payload")]
    Encrypt,
}

/// Symmetric at-rest cipher for capture files.
///
/// Tokens are URL-safe base64 of `version || nonce || ciphertext`, so a whole
/// markdown document becomes one opaque ASCII line.
#[derive(Clone)]
pub struct CaptureCipher {
    key: [u8; KEY_LEN],
}

impl fmt::Debug for CaptureCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureCipher").finish_non_exhaustive()
    }
}

/// Returns fresh key material in the encoding `CaptureCipher::from_key` expects.
pub fn generate_key() -> String {
    let mut key = [0_u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    BASE64_URL_SAFE.encode(key)
}

/// Returns true when `bytes` have the shape of an encrypted capture token,
/// either ours or a Fernet token, whatever key it was sealed with.
pub fn looks_encrypted(bytes: &[u8]) -> bool {
    let Ok(raw) = BASE64_URL_SAFE.decode(bytes.trim_ascii()) else {
        return false;
    };
    match raw.first() {
        Some(&TOKEN_VERSION) => raw.len() >= 1 + NONCE_LEN + TAG_LEN,
        Some(&FERNET_VERSION) => raw.len() >= FERNET_MIN_LEN,
        _ => false,
    }
}

impl CaptureCipher {
    pub fn from_key(encoded: &str) -> Result<Self, CipherError> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(CipherError::InvalidKey("key is empty".to_string()));
        }
        let decoded = BASE64_URL_SAFE
            .decode(trimmed)
            .map_err(|err| CipherError::InvalidKey(err.to_string()))?;
        if decoded.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "decoded length is {}",
                decoded.len()
            )));
        }
        let mut key = [0_u8; KEY_LEN];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let mut nonce = [0_u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        raw.push(TOKEN_VERSION);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);
        Ok(BASE64_URL_SAFE.encode(raw))
    }

    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>, CipherError> {
        let token = token.trim_ascii();
        let raw = BASE64_URL_SAFE
            .decode(token)
            .map_err(|_| CipherError::Malformed("invalid base64"))?;
        if raw.len() <= 1 + NONCE_LEN {
            return Err(CipherError::Malformed("token too short"));
        }
        if raw[0] != TOKEN_VERSION {
            return Err(CipherError::Malformed("unsupported token version"));
        }
        let (nonce, ciphertext) = raw[1..].split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)
    }
}
