// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Symmetric Encryption (XChaCha20-Poly1305)
//!
//! The "secretbox" construction used throughout the crate. Two shapes are
//! offered:
//!
//! - [`seal_with_nonce`] / [`open_with_nonce`]: nonce and ciphertext kept
//!   apart, for wire formats that carry them in separate fields.
//! - [`encrypt`] / [`decrypt`]: self-describing blob
//!   `algorithm_tag (1 byte) || nonce (24 bytes) || ciphertext || tag (16 bytes)`
//!   for opaque at-rest storage.
//!
//! Every call draws a fresh 24-byte nonce from the system RNG; nonces are
//! never accepted from callers on the sealing side.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Encryption error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed: data may be corrupted or wrong key")]
    DecryptionFailed,
    #[error("Ciphertext too short")]
    CiphertextTooShort,
    #[error("Unsupported algorithm tag: {0:#04x}")]
    UnsupportedAlgorithm(u8),
    #[error("System random number generator failed")]
    RandomFailed,
}

/// Algorithm tag for XChaCha20-Poly1305.
const ALG_TAG_XCHACHA20: u8 = 0x02;

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;
/// Authentication tag size.
pub const TAG_SIZE: usize = 16;
/// Symmetric key size.
pub const KEY_SIZE: usize = 32;

/// Fills a fixed-size array from the system RNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], EncryptionError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; N];
    rng.fill(&mut bytes)
        .map_err(|_| EncryptionError::RandomFailed)?;
    Ok(bytes)
}

/// 256-bit symmetric encryption key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose key bytes in debug output
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl SymmetricKey {
    /// Generates a new random symmetric key.
    pub fn generate() -> Result<Self, EncryptionError> {
        Ok(SymmetricKey {
            bytes: random_bytes::<KEY_SIZE>()?,
        })
    }

    /// Creates a key from raw bytes.
    ///
    /// The caller remains responsible for wiping its own copy of `bytes`.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        SymmetricKey { bytes }
    }

    /// Creates a key from a slice, failing unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().ok()?;
        Some(SymmetricKey { bytes })
    }

    /// Returns a reference to the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.bytes).into())
    }
}

/// Encrypts `plaintext` under a freshly generated nonce.
///
/// Returns `(nonce, ciphertext || tag)`. `aad` is authenticated but not
/// encrypted; pass `&[]` when there is nothing to bind.
pub fn seal_with_nonce(
    key: &SymmetricKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; NONCE_SIZE], Vec<u8>), EncryptionError> {
    let nonce_bytes = random_bytes::<NONCE_SIZE>()?;
    let ciphertext = key
        .cipher()
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypts and authenticates `ciphertext || tag` under `nonce`.
///
/// Any tag mismatch, including one caused by a different `aad`, is reported
/// as [`EncryptionError::DecryptionFailed`].
pub fn open_with_nonce(
    key: &SymmetricKey,
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if nonce.len() != NONCE_SIZE {
        return Err(EncryptionError::DecryptionFailed);
    }
    if ciphertext.len() < TAG_SIZE {
        return Err(EncryptionError::CiphertextTooShort);
    }

    key.cipher()
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptionFailed)
}

/// Encrypts data into the self-describing tagged format.
///
/// Output format: `0x02 || nonce (24 bytes) || ciphertext || tag (16 bytes)`
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let (nonce, ciphertext) = seal_with_nonce(key, plaintext, &[])?;

    let mut output = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    output.push(ALG_TAG_XCHACHA20);
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

/// Decrypts data produced by [`encrypt`].
pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let (&tag, rest) = data
        .split_first()
        .ok_or(EncryptionError::CiphertextTooShort)?;

    if tag != ALG_TAG_XCHACHA20 {
        return Err(EncryptionError::UnsupportedAlgorithm(tag));
    }
    if rest.len() < NONCE_SIZE + TAG_SIZE {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
    open_with_nonce(key, nonce, ciphertext, &[])
}

// INLINE_TEST_REQUIRED: Tests private ALG_TAG_XCHACHA20 framing
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_format_layout() {
        let key = SymmetricKey::generate().unwrap();
        let ciphertext = encrypt(&key, b"hello").unwrap();

        assert_eq!(ciphertext[0], ALG_TAG_XCHACHA20);
        assert_eq!(ciphertext.len(), 1 + NONCE_SIZE + 5 + TAG_SIZE);
    }

    #[test]
    fn test_unknown_algorithm_tag_rejected() {
        let key = SymmetricKey::generate().unwrap();
        let mut ciphertext = encrypt(&key, b"hello").unwrap();
        ciphertext[0] = 0x01;

        assert_eq!(
            decrypt(&key, &ciphertext),
            Err(EncryptionError::UnsupportedAlgorithm(0x01))
        );
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let key = SymmetricKey::generate().unwrap();
        let (nonce, ciphertext) = seal_with_nonce(&key, b"secret", b"context-a").unwrap();

        assert!(open_with_nonce(&key, &nonce, &ciphertext, b"context-a").is_ok());
        assert_eq!(
            open_with_nonce(&key, &nonce, &ciphertext, b"context-b"),
            Err(EncryptionError::DecryptionFailed)
        );
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = SymmetricKey::generate().unwrap();
        let (n1, c1) = seal_with_nonce(&key, b"same", &[]).unwrap();
        let (n2, c2) = seal_with_nonce(&key, b"same", &[]).unwrap();

        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SymmetricKey::from_bytes([0x42; 32]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
    }
}
