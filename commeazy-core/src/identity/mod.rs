// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Identity Key Management
//!
//! Owns the user's long-term X25519 key pair and keeps it in sync with the
//! [`KeyStore`]. The manager is an explicit value owned by the caller; there
//! is no process-wide instance.

pub mod backup;

pub use backup::{
    kdf_params_for_version, validate_pin, version_for_kdf_params, BackupCodec, EncryptedBackup,
    BACKUP_FORMAT_VERSION, LOW_COST_BACKUP_FORMAT_VERSION, MIN_PIN_LENGTH,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CoreConfig, DEFAULT_IDENTITY_KEY_PREFIX};
use crate::crypto::{KeyPair, PrivateKey};
use crate::storage::{KeyStore, StorageError};

/// Identity-related errors.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity key pair not initialized")]
    NotInitialized,
    #[error("Stored identity key material is corrupt")]
    CorruptKeyMaterial,
    #[error("PIN too short: requires at least 4 characters")]
    WeakPin,
    #[error("Backup encryption failed")]
    BackupFailed,
    #[error("KDF parameters match no backup format version")]
    UnsupportedKdfParams,
    #[error("Invalid backup or wrong PIN")]
    RestoreFailed,
    #[error("Key store error: {0}")]
    Storage(#[from] StorageError),
}

/// Holds the identity key pair and persists it through a [`KeyStore`].
pub struct KeyManager<S: KeyStore> {
    store: S,
    key_pair: Option<KeyPair>,
    public_entry: String,
    private_entry: String,
}

impl<S: KeyStore> KeyManager<S> {
    /// Creates an uninitialized manager using the default entry names.
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, DEFAULT_IDENTITY_KEY_PREFIX)
    }

    /// Creates an uninitialized manager using the configured entry names.
    pub fn with_config(store: S, config: &CoreConfig) -> Self {
        Self::with_prefix(store, &config.identity_key_prefix)
    }

    fn with_prefix(store: S, prefix: &str) -> Self {
        KeyManager {
            store,
            key_pair: None,
            public_entry: format!("{prefix}.public"),
            private_entry: format!("{prefix}.private"),
        }
    }

    /// Generates a fresh key pair, persists both halves and adopts it.
    ///
    /// Overwrites any previously stored identity key pair.
    pub fn generate_key_pair(&mut self) -> Result<&KeyPair, IdentityError> {
        let pair = KeyPair::generate();
        info!(entry = %self.public_entry, "generated new identity key pair");
        self.install_key_pair(pair)
    }

    /// Persists `pair` and makes it the current identity.
    ///
    /// Used by backup restore and device-link import. If either half fails to
    /// persist, both entries are put back as they were and the current pair
    /// stays in place.
    pub fn install_key_pair(&mut self, pair: KeyPair) -> Result<&KeyPair, IdentityError> {
        let previous_public = self.store.get(&self.public_entry)?;
        let previous_private = self.store.get(&self.private_entry)?;

        let written = self
            .store
            .set(&self.public_entry, pair.public_key())
            .and_then(|()| {
                self.store
                    .set(&self.private_entry, pair.private_key().as_bytes())
            });

        if let Err(e) = written {
            warn!(entry = %self.public_entry, "persisting identity key pair failed, rolling back");
            self.restore_entry(&self.public_entry, previous_public.as_deref().map(Vec::as_slice));
            self.restore_entry(&self.private_entry, previous_private.as_deref().map(Vec::as_slice));
            return Err(e.into());
        }
        debug!(entry = %self.public_entry, "persisted identity key pair");

        Ok(self.key_pair.insert(pair))
    }

    /// Puts `name` back to `previous`, deleting it if it did not exist.
    fn restore_entry(&self, name: &str, previous: Option<&[u8]>) {
        let restored = match previous {
            Some(value) => self.store.set(name, value),
            None => self.store.delete(name),
        };
        if let Err(e) = restored {
            warn!(entry = %name, error = %e, "could not roll back identity entry");
        }
    }

    /// Loads the key pair from the store.
    ///
    /// Returns `Ok(false)` and stays uninitialized when nothing is stored.
    /// A half-present or inconsistent pair is [`IdentityError::CorruptKeyMaterial`].
    pub fn load_from_store(&mut self) -> Result<bool, IdentityError> {
        let public = self.store.get(&self.public_entry)?;
        let private = self.store.get(&self.private_entry)?;

        let (public, private) = match (public, private) {
            (None, None) => {
                debug!(entry = %self.public_entry, "no stored identity key pair");
                return Ok(false);
            }
            (Some(public), Some(private)) => (public, private),
            _ => {
                warn!(entry = %self.public_entry, "identity key pair only partially stored");
                return Err(IdentityError::CorruptKeyMaterial);
            }
        };

        let private_key =
            PrivateKey::from_slice(&private).ok_or(IdentityError::CorruptKeyMaterial)?;
        let pair = KeyPair::from_parts(&public, private_key).ok_or_else(|| {
            warn!(entry = %self.public_entry, "stored public key does not match private key");
            IdentityError::CorruptKeyMaterial
        })?;

        self.key_pair = Some(pair);
        info!(entry = %self.public_entry, "loaded identity key pair");
        Ok(true)
    }

    /// Returns whether a key pair is loaded.
    pub fn has_key_pair(&self) -> bool {
        self.key_pair.is_some()
    }

    /// Returns the current key pair.
    pub fn key_pair(&self) -> Result<&KeyPair, IdentityError> {
        self.key_pair.as_ref().ok_or(IdentityError::NotInitialized)
    }

    /// Returns the current public key.
    pub fn get_public_key(&self) -> Result<[u8; 32], IdentityError> {
        Ok(*self.key_pair()?.public_key())
    }

    /// Deletes the stored pair and forgets the in-memory copy.
    pub fn clear(&mut self) -> Result<(), IdentityError> {
        self.store.delete(&self.private_entry)?;
        self.store.delete(&self.public_entry)?;
        self.key_pair = None;
        info!(entry = %self.public_entry, "cleared identity key pair");
        Ok(())
    }

    /// Returns the underlying key store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyStore;
    use std::sync::Arc;

    #[test]
    fn test_new_manager_is_uninitialized() {
        let manager = KeyManager::new(MemoryKeyStore::new());
        assert!(!manager.has_key_pair());
        assert!(matches!(
            manager.get_public_key(),
            Err(IdentityError::NotInitialized)
        ));
    }

    #[test]
    fn test_entry_names_follow_prefix() {
        let config = CoreConfig::default().with_identity_key_prefix("acct7");
        let mut manager = KeyManager::with_config(MemoryKeyStore::new(), &config);
        manager.generate_key_pair().unwrap();

        assert!(manager.store().contains("acct7.public").unwrap());
        assert!(manager.store().contains("acct7.private").unwrap());
    }

    #[test]
    fn test_partial_store_is_corrupt() {
        let store = Arc::new(MemoryKeyStore::new());
        let mut first = KeyManager::new(Arc::clone(&store));
        first.generate_key_pair().unwrap();
        store.delete("commeazy.identity.private").unwrap();

        let mut second = KeyManager::new(store);
        assert!(matches!(
            second.load_from_store(),
            Err(IdentityError::CorruptKeyMaterial)
        ));
        assert!(!second.has_key_pair());
    }

    #[test]
    fn test_mismatched_halves_are_corrupt() {
        let store = Arc::new(MemoryKeyStore::new());
        let other = KeyPair::generate();
        let mut first = KeyManager::new(Arc::clone(&store));
        first.generate_key_pair().unwrap();
        store
            .set("commeazy.identity.public", other.public_key())
            .unwrap();

        let mut second = KeyManager::new(store);
        assert!(matches!(
            second.load_from_store(),
            Err(IdentityError::CorruptKeyMaterial)
        ));
    }
}
