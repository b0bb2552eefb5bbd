// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Authenticated Public-Key Encryption ("box")
//!
//! `X25519(sender_private, recipient_public)` → HKDF-SHA256 → XChaCha20-Poly1305.
//!
//! Both parties derive the same box key: the DH result is symmetric and the
//! HKDF info binds the two public keys in sorted order. Only the holder of
//! either private key can open the box, and a successful open proves the
//! ciphertext was produced by the other key holder.

use ring::hkdf::{Salt, HKDF_SHA256};
use thiserror::Error;
use zeroize::Zeroize;

use super::encryption::{
    open_with_nonce, seal_with_nonce, EncryptionError, SymmetricKey, NONCE_SIZE,
};
use super::keys::{PrivateKey, PUBLIC_KEY_SIZE};

/// Domain separation label for box keys.
const BOX_KEY_INFO: &[u8] = b"CommEazy_Box_v1";

/// Box error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoxError {
    #[error("Key agreement failed: invalid public key")]
    InvalidPublicKey,
    #[error("Key derivation failed")]
    KeyDerivation,
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

/// Nonce and ciphertext produced by [`seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Derives the shared box key for a (private, public) pairing.
fn box_key(
    our_private: &PrivateKey,
    their_public: &[u8; PUBLIC_KEY_SIZE],
) -> Result<SymmetricKey, BoxError> {
    let shared = our_private
        .diffie_hellman(their_public)
        .ok_or(BoxError::InvalidPublicKey)?;

    let our_public = our_private.public_key();
    let (low, high) = if our_public.as_slice() <= their_public.as_slice() {
        (&our_public, their_public)
    } else {
        (their_public, &our_public)
    };

    let salt = Salt::new(HKDF_SHA256, &[]);
    let prk = salt.extract(&shared[..]);
    let info: [&[u8]; 3] = [BOX_KEY_INFO, low, high];
    let okm = prk
        .expand(&info, HKDF_SHA256)
        .map_err(|_| BoxError::KeyDerivation)?;

    let mut key_bytes = [0u8; 32];
    okm.fill(&mut key_bytes)
        .map_err(|_| BoxError::KeyDerivation)?;
    let key = SymmetricKey::from_bytes(key_bytes);
    key_bytes.zeroize();

    Ok(key)
}

/// Encrypts `plaintext` from `sender` to `recipient_public` under a fresh nonce.
pub fn seal(
    sender: &PrivateKey,
    recipient_public: &[u8; PUBLIC_KEY_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedBox, BoxError> {
    let key = box_key(sender, recipient_public)?;
    let (nonce, ciphertext) = seal_with_nonce(&key, plaintext, aad)?;
    Ok(SealedBox { nonce, ciphertext })
}

/// Decrypts a box addressed to `recipient` from `sender_public`.
///
/// A wrong sender key, wrong recipient key, altered `aad` or altered
/// ciphertext all surface as `Encryption(DecryptionFailed)`.
pub fn open(
    recipient: &PrivateKey,
    sender_public: &[u8; PUBLIC_KEY_SIZE],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, BoxError> {
    let key = box_key(recipient, sender_public)?;
    Ok(open_with_nonce(&key, nonce, ciphertext, aad)?)
}
