//! Symmetric token sealing.
//!
//! Upstream tokens are the only secret the system persists. They are stored
//! as `sealed:<hex(nonce || ciphertext)>` under XChaCha20-Poly1305 with a key
//! derived as BLAKE3(MASTER_KEY). The prefix doubles as the codec signature:
//! a stored value without it is a plain token from an older install and gets
//! re-sealed in place on first read.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Codec signature carried by every sealed token.
pub const SEALED_PREFIX: &str = "sealed:";

const NONCE_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum SealError {
    #[error("sealed token is not valid hex")]
    BadHex,

    #[error("sealed token is truncated")]
    Truncated,

    #[error("sealed token failed authentication (wrong MASTER_KEY?)")]
    AuthFailed,

    #[error("decrypted token is not UTF-8")]
    BadUtf8,
}

/// A process-wide codec bound to one master key.
pub struct TokenCodec {
    cipher: XChaCha20Poly1305,
}

impl TokenCodec {
    /// Derive the cipher key as BLAKE3 of the raw master-key bytes. Any
    /// non-empty passphrase works; the hash stretches it to 32 bytes.
    pub fn new(master_key: &[u8]) -> Self {
        let key = Zeroizing::new(*blake3::hash(master_key).as_bytes());
        let cipher = XChaCha20Poly1305::new(key.as_slice().into());
        Self { cipher }
    }

    pub fn is_sealed(stored: &str) -> bool {
        stored.starts_with(SEALED_PREFIX)
    }

    pub fn seal(&self, token: &str) -> String {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, token.as_bytes())
            .expect("XChaCha20-Poly1305 encryption is infallible for in-memory buffers");

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        format!("{SEALED_PREFIX}{}", hex::encode(blob))
    }

    pub fn open(&self, stored: &str) -> Result<String, SealError> {
        let body = stored.strip_prefix(SEALED_PREFIX).unwrap_or(stored);
        let blob = hex::decode(body).map_err(|_| SealError::BadHex)?;
        if blob.len() <= NONCE_LEN {
            return Err(SealError::Truncated);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);

        let plain = Zeroizing::new(
            self.cipher
                .decrypt(nonce, ciphertext)
                .map_err(|_| SealError::AuthFailed)?,
        );
        String::from_utf8(plain.to_vec()).map_err(|_| SealError::BadUtf8)
    }
}

/// One-shot helpers for callers that do not keep a codec around.
pub fn seal_token(master_key: &[u8], token: &str) -> String {
    TokenCodec::new(master_key).seal(token)
}

pub fn open_token(master_key: &[u8], stored: &str) -> Result<String, SealError> {
    TokenCodec::new(master_key).open(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let codec = TokenCodec::new(b"test master key");
        let sealed = codec.seal("uXyz-personal-token");
        assert!(sealed.starts_with(SEALED_PREFIX));
        assert_eq!(codec.open(&sealed).unwrap(), "uXyz-personal-token");
    }

    #[test]
    fn sealing_is_randomized() {
        let codec = TokenCodec::new(b"k");
        assert_ne!(codec.seal("t"), codec.seal("t"));
    }

    #[test]
    fn wrong_key_fails_auth() {
        let sealed = seal_token(b"right key", "secret");
        assert!(matches!(
            open_token(b"wrong key", &sealed),
            Err(SealError::AuthFailed)
        ));
    }

    #[test]
    fn plain_value_is_detected_as_unsealed() {
        assert!(!TokenCodec::is_sealed("uPlainToken"));
        assert!(TokenCodec::is_sealed("sealed:00ff"));
    }
}
