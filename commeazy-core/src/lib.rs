// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! CommEazy Core Library
//!
//! Identity key management, PIN-protected key backup, device linking and
//! multi-recipient content encryption.
//! Randomness and key derivation use the audited `ring` crate; authenticated
//! encryption is XChaCha20-Poly1305.

pub mod cipher;
pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod storage;

pub use cipher::{
    select_mode, CipherError, ContentCipher, EncryptedPayload, Envelope, PayloadBody, PayloadMode,
    Recipient, RECIPIENT_THRESHOLD,
};
pub use config::CoreConfig;
pub use crypto::{KdfParams, KeyPair, PrivateKey, SymmetricKey};
pub use error::{CoreError, CoreResult};
pub use exchange::{
    import_key_bundle, verification_code_for, DeviceLinkBundle, DeviceLinkProtocol,
    DeviceLinkQRData, DeviceLinkSession, EphemeralKeyPair, ExchangeError, LinkedProfile,
    SessionStatus,
};
pub use identity::{BackupCodec, EncryptedBackup, IdentityError, KeyManager};
#[cfg(feature = "secure-storage")]
pub use storage::PlatformKeyring;
pub use storage::{FileKeyStore, KeyStore, MemoryKeyStore, StorageError};
