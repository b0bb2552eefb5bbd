// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! PIN-Based Key Derivation
//!
//! Argon2id turns a low-entropy PIN into a 32-byte symmetric key.
//!
//! Default parameters: m=64MB, t=3, p=4 (OWASP recommended). A single
//! derivation takes hundreds of milliseconds; keep it off latency-sensitive
//! paths.

use zeroize::Zeroize;

use super::SymmetricKey;

/// Argon2id memory cost in KiB (64 MB).
const ARGON2_M_COST: u32 = 65536;
/// Argon2id time cost (iterations).
const ARGON2_T_COST: u32 = 3;
/// Argon2id parallelism.
const ARGON2_P_COST: u32 = 4;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            memory_kib: ARGON2_M_COST,
            iterations: ARGON2_T_COST,
            parallelism: ARGON2_P_COST,
        }
    }
}

impl KdfParams {
    /// Minimal Argon2id cost for unit tests. Offers no brute-force resistance.
    pub fn insecure_for_tests() -> Self {
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derives a 32-byte symmetric key from a password or PIN using Argon2id.
pub fn derive_key_argon2id(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<SymmetricKey, PasswordKdfError> {
    let argon_params = argon2::Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| PasswordKdfError::DerivationFailed(e.to_string()))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    let mut key_bytes = [0u8; 32];
    let result = argon2.hash_password_into(password, salt, &mut key_bytes);
    if let Err(e) = result {
        key_bytes.zeroize();
        return Err(PasswordKdfError::DerivationFailed(e.to_string()));
    }

    let key = SymmetricKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Password KDF error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordKdfError {
    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),
}
