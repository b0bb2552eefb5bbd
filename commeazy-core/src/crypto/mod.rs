// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod encryption;
pub mod keys;
pub mod password_kdf;
pub mod public_box;

pub use encryption::{
    decrypt, encrypt, open_with_nonce, random_bytes, seal_with_nonce, EncryptionError,
    SymmetricKey, NONCE_SIZE,
};
pub use keys::{public_key_from_slice, KeyPair, PrivateKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use password_kdf::{derive_key_argon2id, KdfParams, PasswordKdfError};
pub use public_box::{open, seal, BoxError, SealedBox};
