// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! PIN-Protected Identity Backup
//!
//! The private key is encrypted with XChaCha20-Poly1305 under a key derived
//! from the user's PIN with Argon2id. The public key is never stored in the
//! backup; restore re-derives it from the private key.
//!
//! Record (JSON): `{salt, iv, encrypted, version}` with base64 byte fields.

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::{IdentityError, KeyManager};
use crate::config::CoreConfig;
use crate::crypto::{
    derive_key_argon2id, open_with_nonce, random_bytes, seal_with_nonce, KdfParams, KeyPair,
    PrivateKey,
};
use crate::storage::KeyStore;

/// Backup format: Argon2id at the default cost + XChaCha20-Poly1305, private key only.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Same layout as [`BACKUP_FORMAT_VERSION`] with the minimal Argon2id cost of
/// [`KdfParams::insecure_for_tests`]. Only written by codecs configured with
/// those parameters.
pub const LOW_COST_BACKUP_FORMAT_VERSION: u32 = 0;

/// Minimum PIN length in characters.
pub const MIN_PIN_LENGTH: usize = 4;

/// Salt length for the PIN KDF.
const SALT_SIZE: usize = 16;

/// Checks that a PIN meets the minimum length.
pub fn validate_pin(pin: &str) -> Result<(), IdentityError> {
    if pin.chars().count() < MIN_PIN_LENGTH {
        return Err(IdentityError::WeakPin);
    }
    Ok(())
}

/// Encrypted, PIN-decryptable record of the identity private key.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBackup {
    #[serde_as(as = "Base64")]
    pub salt: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub iv: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub encrypted: Vec<u8>,
    pub version: u32,
}

impl EncryptedBackup {
    /// Serializes the record to JSON.
    pub fn to_json(&self) -> Result<String, IdentityError> {
        serde_json::to_string(self).map_err(|_| IdentityError::BackupFailed)
    }

    /// Parses a record from JSON.
    ///
    /// Malformed input is reported as [`IdentityError::RestoreFailed`], the
    /// same as a wrong PIN.
    pub fn from_json(json: &str) -> Result<Self, IdentityError> {
        serde_json::from_str(json).map_err(|_| IdentityError::RestoreFailed)
    }
}

/// Argon2id cost fixed by each backup format version.
pub fn kdf_params_for_version(version: u32) -> Option<KdfParams> {
    match version {
        BACKUP_FORMAT_VERSION => Some(KdfParams::default()),
        LOW_COST_BACKUP_FORMAT_VERSION => Some(KdfParams::insecure_for_tests()),
        _ => None,
    }
}

/// The format version whose Argon2id cost is exactly `params`.
pub fn version_for_kdf_params(params: &KdfParams) -> Option<u32> {
    [BACKUP_FORMAT_VERSION, LOW_COST_BACKUP_FORMAT_VERSION]
        .into_iter()
        .find(|&version| kdf_params_for_version(version).as_ref() == Some(params))
}

/// Additional data binding the ciphertext to its format version.
fn backup_aad(version: u32) -> [u8; 4] {
    version.to_be_bytes()
}

/// Creates and restores PIN-protected backups of the identity private key.
///
/// The codec's KDF cost only selects the format version it writes. Restoring
/// always uses the cost fixed by the backup's own version.
#[derive(Debug, Clone, Default)]
pub struct BackupCodec {
    kdf: KdfParams,
}

impl BackupCodec {
    /// Creates a codec using the configured KDF cost.
    pub fn new(config: &CoreConfig) -> Self {
        Self::with_params(config.kdf)
    }

    /// Creates a codec with explicit KDF cost parameters.
    ///
    /// Parameters that match no format version make [`Self::create_backup`]
    /// fail with [`IdentityError::UnsupportedKdfParams`].
    pub fn with_params(kdf: KdfParams) -> Self {
        BackupCodec { kdf }
    }

    /// The format version this codec writes, if its KDF cost has one.
    pub fn format_version(&self) -> Option<u32> {
        version_for_kdf_params(&self.kdf)
    }

    /// Encrypts the current private key under `pin`.
    ///
    /// Fails with [`IdentityError::NotInitialized`] if `keys` holds no pair.
    pub fn create_backup<S: KeyStore>(
        &self,
        keys: &KeyManager<S>,
        pin: &str,
    ) -> Result<EncryptedBackup, IdentityError> {
        validate_pin(pin)?;
        let version = self.format_version().ok_or(IdentityError::UnsupportedKdfParams)?;
        let pair = keys.key_pair()?;

        let salt = random_bytes::<SALT_SIZE>().map_err(|_| IdentityError::BackupFailed)?;
        let key = derive_key_argon2id(pin.as_bytes(), &salt, &self.kdf)
            .map_err(|_| IdentityError::BackupFailed)?;

        let (iv, encrypted) =
            seal_with_nonce(&key, pair.private_key().as_bytes(), &backup_aad(version))
                .map_err(|_| IdentityError::BackupFailed)?;
        drop(key);

        info!(version, "created identity backup");
        Ok(EncryptedBackup {
            salt: salt.to_vec(),
            iv: iv.to_vec(),
            encrypted,
            version,
        })
    }

    /// Decrypts a backup without touching any key store.
    ///
    /// Every failure is [`IdentityError::RestoreFailed`]: a wrong PIN, a
    /// corrupted record and an unknown version are indistinguishable.
    pub fn recover_key_pair(
        &self,
        pin: &str,
        backup: &EncryptedBackup,
    ) -> Result<KeyPair, IdentityError> {
        let Some(params) = kdf_params_for_version(backup.version) else {
            warn!(version = backup.version, "unsupported backup version");
            return Err(IdentityError::RestoreFailed);
        };

        let key = derive_key_argon2id(pin.as_bytes(), &backup.salt, &params)
            .map_err(|_| IdentityError::RestoreFailed)?;

        let plaintext = open_with_nonce(
            &key,
            &backup.iv,
            &backup.encrypted,
            &backup_aad(backup.version),
        )
        .map(Zeroizing::new);
        drop(key);

        let plaintext = plaintext.map_err(|_| {
            warn!("identity backup restore failed");
            IdentityError::RestoreFailed
        })?;

        let private_key = PrivateKey::from_slice(&plaintext).ok_or(IdentityError::RestoreFailed)?;
        Ok(KeyPair::from_private_key(private_key))
    }

    /// Decrypts a backup, persists the recovered pair and adopts it.
    pub fn restore_backup<S: KeyStore>(
        &self,
        keys: &mut KeyManager<S>,
        pin: &str,
        backup: &EncryptedBackup,
    ) -> Result<KeyPair, IdentityError> {
        let pair = self.recover_key_pair(pin, backup)?;
        let installed = keys.install_key_pair(pair)?;
        info!("restored identity key pair from backup");
        Ok(installed.clone())
    }
}

// INLINE_TEST_REQUIRED: Tests private SALT_SIZE and AAD binding
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyStore;

    fn codec() -> BackupCodec {
        BackupCodec::with_params(KdfParams::insecure_for_tests())
    }

    fn initialized_manager() -> KeyManager<MemoryKeyStore> {
        let mut keys = KeyManager::new(MemoryKeyStore::new());
        keys.generate_key_pair().unwrap();
        keys
    }

    #[test]
    fn test_backup_fields() {
        let keys = initialized_manager();
        let backup = codec().create_backup(&keys, "2468").unwrap();

        assert_eq!(backup.salt.len(), SALT_SIZE);
        assert_eq!(backup.iv.len(), 24);
        assert_eq!(backup.encrypted.len(), 32 + 16);
        assert_eq!(backup.version, LOW_COST_BACKUP_FORMAT_VERSION);
    }

    #[test]
    fn test_versions_map_to_fixed_params() {
        assert_eq!(kdf_params_for_version(BACKUP_FORMAT_VERSION), Some(KdfParams::default()));
        assert_eq!(
            kdf_params_for_version(LOW_COST_BACKUP_FORMAT_VERSION),
            Some(KdfParams::insecure_for_tests())
        );
        assert_eq!(kdf_params_for_version(7), None);

        assert_eq!(BackupCodec::default().format_version(), Some(BACKUP_FORMAT_VERSION));
        assert_eq!(codec().format_version(), Some(LOW_COST_BACKUP_FORMAT_VERSION));
    }

    #[test]
    fn test_unversioned_params_cannot_back_up() {
        let keys = initialized_manager();
        let custom = BackupCodec::with_params(KdfParams {
            memory_kib: 2048,
            ..KdfParams::insecure_for_tests()
        });

        assert_eq!(custom.format_version(), None);
        assert!(matches!(
            custom.create_backup(&keys, "2468"),
            Err(IdentityError::UnsupportedKdfParams)
        ));
    }

    #[test]
    fn test_backup_salts_differ() {
        let keys = initialized_manager();
        let a = codec().create_backup(&keys, "2468").unwrap();
        let b = codec().create_backup(&keys, "2468").unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted, b.encrypted);
    }

    #[test]
    fn test_version_is_authenticated() {
        let keys = initialized_manager();
        let backup = codec().create_backup(&keys, "2468").unwrap();

        let key = derive_key_argon2id(b"2468", &backup.salt, &KdfParams::insecure_for_tests())
            .unwrap();
        let other = backup_aad(BACKUP_FORMAT_VERSION);
        let own = backup_aad(backup.version);
        assert!(open_with_nonce(&key, &backup.iv, &backup.encrypted, &other).is_err());
        assert!(open_with_nonce(&key, &backup.iv, &backup.encrypted, &own).is_ok());
    }

    #[test]
    fn test_short_pin_rejected() {
        let keys = initialized_manager();
        assert!(matches!(
            codec().create_backup(&keys, "123"),
            Err(IdentityError::WeakPin)
        ));
    }

    #[test]
    fn test_uninitialized_manager_cannot_back_up() {
        let keys = KeyManager::new(MemoryKeyStore::new());
        assert!(matches!(
            codec().create_backup(&keys, "2468"),
            Err(IdentityError::NotInitialized)
        ));
    }

    #[test]
    fn test_json_shape() {
        let keys = initialized_manager();
        let backup = codec().create_backup(&keys, "2468").unwrap();
        let value: serde_json::Value = serde_json::from_str(&backup.to_json().unwrap()).unwrap();

        assert!(value["salt"].is_string());
        assert!(value["iv"].is_string());
        assert!(value["encrypted"].is_string());
        assert_eq!(value["version"], LOW_COST_BACKUP_FORMAT_VERSION);
    }
}
