// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secure Key Storage
//!
//! The narrow keystore interface the core consumes. Platform enclaves and
//! keychains live behind [`KeyStore`]; the core never touches them directly.

mod error;
pub mod secure;

pub use error::StorageError;
#[cfg(feature = "secure-storage")]
pub use secure::PlatformKeyring;
pub use secure::{FileKeyStore, KeyStore, MemoryKeyStore};
