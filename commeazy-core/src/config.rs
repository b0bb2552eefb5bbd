// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core Configuration

use std::time::Duration;

use crate::crypto::KdfParams;

/// Default device-link session lifetime (5 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Default tolerance for QR timestamps ahead of the local clock.
pub const DEFAULT_MAX_QR_CLOCK_SKEW: Duration = Duration::from_secs(30);

/// Default prefix for identity entries in the key store.
pub const DEFAULT_IDENTITY_KEY_PREFIX: &str = "commeazy.identity";

/// Configuration shared by the key manager, backup codec and device linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// How long a device-link session stays valid after creation.
    pub session_timeout: Duration,

    /// How far in the future a scanned QR timestamp may lie.
    pub max_qr_clock_skew: Duration,

    /// Argon2id cost for new PIN backups. Selects the backup format version;
    /// restore always uses the cost fixed by the backup's own version.
    pub kdf: KdfParams,

    /// Key store entries are `<prefix>.public` and `<prefix>.private`.
    pub identity_key_prefix: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            max_qr_clock_skew: DEFAULT_MAX_QR_CLOCK_SKEW,
            kdf: KdfParams::default(),
            identity_key_prefix: DEFAULT_IDENTITY_KEY_PREFIX.to_string(),
        }
    }
}

impl CoreConfig {
    /// Sets the device-link session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Sets the accepted clock skew for scanned QR codes.
    pub fn with_max_qr_clock_skew(mut self, skew: Duration) -> Self {
        self.max_qr_clock_skew = skew;
        self
    }

    /// Sets the Argon2id cost parameters.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Sets the key store prefix for identity entries.
    pub fn with_identity_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identity_key_prefix = prefix.into();
        self
    }

    /// Session timeout in milliseconds, saturating at `u64::MAX`.
    pub fn session_timeout_ms(&self) -> u64 {
        u64::try_from(self.session_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// QR clock skew in milliseconds, saturating at `u64::MAX`.
    pub fn max_qr_clock_skew_ms(&self) -> u64 {
        u64::try_from(self.max_qr_clock_skew.as_millis()).unwrap_or(u64::MAX)
    }
}
