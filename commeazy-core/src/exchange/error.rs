// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exchange Error Types

use thiserror::Error;

/// Errors that can occur while linking a device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("No active device link session")]
    NoActiveSession,

    #[error("Device link session has expired")]
    SessionExpired,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Invalid QR code format")]
    InvalidQRFormat,

    #[error("Device name must not be empty")]
    InvalidDeviceName,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Counterpart key does not match the connected device")]
    CounterpartMismatch,

    #[error("Key bundle authentication failed")]
    AuthenticationFailure,

    #[error("Key bundle contains an inconsistent key pair")]
    InvalidKeyBundle,

    #[error("Cryptographic operation failed")]
    CryptoError,

    #[error("Serialization failed")]
    SerializationFailed,
}
