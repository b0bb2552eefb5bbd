// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! X25519 Key Material
//!
//! The long-term identity key pair and the private-key wrapper shared by the
//! identity, cipher and device-link modules.

use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// X25519 private key size.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// An X25519 private scalar, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; PRIVATE_KEY_SIZE],
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl PrivateKey {
    /// Generates a new random private key.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        PrivateKey {
            bytes: secret.to_bytes(),
        }
    }

    /// Creates a private key from raw bytes.
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_SIZE]) -> Self {
        PrivateKey { bytes }
    }

    /// Creates a private key from a slice, failing unless it is 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; PRIVATE_KEY_SIZE] = bytes.try_into().ok()?;
        Some(PrivateKey { bytes })
    }

    /// Returns the raw private key bytes.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.bytes
    }

    /// Derives the matching public key (scalar multiplication of the base point).
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let secret = StaticSecret::from(self.bytes);
        *DalekPublicKey::from(&secret).as_bytes()
    }

    /// Computes the X25519 shared secret with `their_public`.
    ///
    /// Returns `None` for low-order public keys, which would yield an
    /// all-zero, attacker-predictable secret.
    pub(crate) fn diffie_hellman(
        &self,
        their_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> Option<Zeroizing<[u8; 32]>> {
        let secret = StaticSecret::from(self.bytes);
        let shared = secret.diffie_hellman(&DalekPublicKey::from(*their_public));

        if !shared.was_contributory() {
            return None;
        }
        Some(Zeroizing::new(shared.to_bytes()))
    }
}

/// Converts an untrusted byte slice into a public key.
pub fn public_key_from_slice(bytes: &[u8]) -> Option<[u8; PUBLIC_KEY_SIZE]> {
    bytes.try_into().ok()
}

/// A long-term X25519 identity key pair.
///
/// Equality is constant-time over both halves.
#[derive(Clone)]
pub struct KeyPair {
    public_key: [u8; PUBLIC_KEY_SIZE],
    private_key: PrivateKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &base64_preview(&self.public_key))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        let public_eq = self.public_key[..].ct_eq(&other.public_key[..]);
        let private_eq = self.private_key.bytes[..].ct_eq(&other.private_key.bytes[..]);
        (public_eq & private_eq).into()
    }
}

impl Eq for KeyPair {}

impl KeyPair {
    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    /// Builds a key pair from a private key, deriving the public half.
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        KeyPair {
            public_key: private_key.public_key(),
            private_key,
        }
    }

    /// Builds a key pair from both halves, rejecting a public key that does
    /// not belong to the private key.
    pub fn from_parts(public_key: &[u8], private_key: PrivateKey) -> Option<Self> {
        let derived = Self::from_private_key(private_key);
        if public_key.ct_eq(&derived.public_key[..]).into() {
            Some(derived)
        } else {
            None
        }
    }

    /// Returns the public key bytes.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    /// Returns the private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Serializes the pair as `public_key || private_key`.
    ///
    /// The buffer is wiped when dropped; only ever encrypt it.
    pub fn to_secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(PUBLIC_KEY_SIZE + PRIVATE_KEY_SIZE));
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.private_key.bytes);
        out
    }

    /// Parses `public_key || private_key`, validating that the halves match.
    pub fn from_secret_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE + PRIVATE_KEY_SIZE {
            return None;
        }
        let (public_key, private_key) = bytes.split_at(PUBLIC_KEY_SIZE);
        Self::from_parts(public_key, PrivateKey::from_slice(private_key)?)
    }
}

fn base64_preview(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    BASE64.encode(bytes)
}
