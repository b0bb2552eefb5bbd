// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Key Store Implementations
//!
//! [`KeyStore`] is the only persistence the core relies on. Three backends:
//! - [`MemoryKeyStore`]: process-local, for tests and ephemeral sessions
//! - [`FileKeyStore`]: one encrypted file per entry, for platforms without a keychain
//! - `PlatformKeyring`: OS keychain via the `keyring` crate (feature `secure-storage`)

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ring::digest;
use zeroize::Zeroizing;

use super::StorageError;
use crate::crypto::SymmetricKey;

/// Secure storage for raw key bytes.
///
/// Implementations should prefer hardware- or biometry-backed storage when
/// the platform offers it:
/// - iOS/macOS: Keychain / Secure Enclave
/// - Android: Keystore
/// - Linux: Secret Service (GNOME Keyring, KDE Wallet)
/// - Windows: Credential Manager
pub trait KeyStore: Send + Sync {
    /// Loads the value stored under `name`, or `None` if absent.
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError>;

    /// Stores `value` under `name`, replacing any previous value.
    fn set(&self, name: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Removes `name`. Removing an absent entry is not an error.
    fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Checks whether `name` is present.
    fn contains(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.get(name)?.is_some())
    }
}

impl<S: KeyStore + ?Sized> KeyStore for Arc<S> {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).set(name, value)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        (**self).delete(name)
    }
}

/// In-memory key store. Values are wiped when replaced, removed or dropped.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Zeroizing<Vec<u8>>>>, StorageError> {
        self.keys
            .lock()
            .map_err(|_| StorageError::Backend("memory key store lock poisoned".into()))
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        self.lock()?
            .insert(name.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.lock()?.remove(name);
        Ok(())
    }
}

/// Platform keyring implementation using the `keyring` crate.
/// Available when the `secure-storage` feature is enabled.
#[cfg(feature = "secure-storage")]
pub struct PlatformKeyring {
    service: String,
}

#[cfg(feature = "secure-storage")]
impl PlatformKeyring {
    /// Creates a new platform keyring accessor.
    ///
    /// # Arguments
    /// * `service` - The service name to use for keychain entries (e.g., "commeazy")
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| StorageError::Backend(format!("Keyring error: {}", e)))
    }
}

#[cfg(feature = "secure-storage")]
impl KeyStore for PlatformKeyring {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        match self.entry(name)?.get_secret() {
            Ok(secret) => Ok(Some(Zeroizing::new(secret))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Backend(format!(
                "Failed to load from keychain: {}",
                e
            ))),
        }
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entry(name)?
            .set_secret(value)
            .map_err(|e| StorageError::Backend(format!("Failed to save to keychain: {}", e)))
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Backend(format!(
                "Failed to delete from keychain: {}",
                e
            ))),
        }
    }
}

/// File-based key storage (fallback when no keychain is available).
///
/// Each entry is a separate file encrypted under a caller-supplied wrapping
/// key, so key bytes never reach disk in the clear.
pub struct FileKeyStore {
    path: PathBuf,
    wrapping_key: SymmetricKey,
}

impl FileKeyStore {
    /// Creates a new file-based key store.
    ///
    /// # Arguments
    /// * `path` - Directory where entries will be stored
    /// * `wrapping_key` - Key used to encrypt stored entries
    pub fn new(path: PathBuf, wrapping_key: SymmetricKey) -> Self {
        Self { path, wrapping_key }
    }

    /// File holding `name`: the hex SHA-256 of the name, so distinct names
    /// never share a file and no name can leave the directory.
    fn entry_path(&self, name: &str) -> PathBuf {
        let hashed = digest::digest(&digest::SHA256, name.as_bytes());
        self.path.join(format!("{}.key", hex::encode(hashed.as_ref())))
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        let file_path = self.entry_path(name);
        if !file_path.exists() {
            return Ok(None);
        }

        let encrypted = std::fs::read(&file_path)?;
        let value = crate::crypto::decrypt(&self.wrapping_key, &encrypted)
            .map_err(|e| StorageError::Encryption(format!("Decryption failed: {}", e)))?;

        Ok(Some(Zeroizing::new(value)))
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.path)?;

        let encrypted = crate::crypto::encrypt(&self.wrapping_key, value)
            .map_err(|e| StorageError::Encryption(format!("Encryption failed: {}", e)))?;

        std::fs::write(self.entry_path(name), &encrypted)?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let file_path = self.entry_path(name);
        if file_path.exists() {
            std::fs::remove_file(&file_path)?;
        }
        Ok(())
    }
}
