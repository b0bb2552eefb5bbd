// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Exchange
//!
//! Provisioning a second device with the account's identity key pair.

pub mod device_link;
mod error;

pub use device_link::{
    import_key_bundle, verification_code_for, DeviceLinkBundle, DeviceLinkProtocol,
    DeviceLinkQRData, DeviceLinkSession, EphemeralKeyPair, LinkedProfile, SessionStatus,
    QR_FORMAT_VERSION,
};
pub use error::ExchangeError;
