// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core Error Types
//!
//! Unified error type over the per-module errors.

use thiserror::Error;

use crate::cipher::CipherError;
use crate::crypto::{BoxError, EncryptionError, PasswordKdfError};
use crate::exchange::ExchangeError;
use crate::identity::IdentityError;
use crate::storage::StorageError;

/// Unified error type for CommEazy core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Identity key management or backup failed.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Content encryption or decryption failed.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Device linking failed.
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Key store operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Symmetric encryption failed.
    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    /// Public-key box failed.
    #[error("box error: {0}")]
    Box(#[from] BoxError),

    /// PIN key derivation failed.
    #[error("key derivation error: {0}")]
    Kdf(#[from] PasswordKdfError),
}

impl CoreError {
    /// No identity key pair is loaded.
    pub fn is_not_initialized(&self) -> bool {
        matches!(
            self,
            CoreError::Identity(IdentityError::NotInitialized)
                | CoreError::Cipher(CipherError::NotInitialized)
        )
    }

    /// Ciphertext was tampered with or keys did not match.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Cipher(CipherError::AuthenticationFailure)
                | CoreError::Exchange(ExchangeError::AuthenticationFailure)
        )
    }

    /// The device link session is gone or timed out.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            CoreError::Exchange(ExchangeError::SessionExpired | ExchangeError::NoActiveSession)
        )
    }
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
