// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Linking Protocol
//!
//! Provisions a new device with the account's identity key pair. The existing
//! (primary) device shows a QR code carrying a fresh ephemeral X25519 public
//! key; the new (secondary) device scans it and answers with its own
//! ephemeral public key. The primary then boxes the identity key pair from
//! its ephemeral private key to the secondary's ephemeral public key.
//!
//! Session states only move forward:
//! `Pending -> Connected -> Completed`, or `Pending | Connected -> Expired`.
//! Expiry is checked lazily whenever the session is touched. The session's
//! ephemeral private key is wiped as soon as a terminal state is reached.

use std::time::{SystemTime, UNIX_EPOCH};

use ring::digest::{Context, SHA256};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroize;

use super::ExchangeError;
use crate::config::CoreConfig;
use crate::crypto::{self, public_key_from_slice, BoxError, KeyPair, PrivateKey, PUBLIC_KEY_SIZE};

/// Version of the link QR payload.
pub const QR_FORMAT_VERSION: u32 = 1;

/// Domain separation label for verification codes.
const VERIFICATION_CODE_LABEL: &[u8] = b"CommEazy_LinkCode_v1";

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Device link QR payload.
///
/// JSON: `{version, sessionId, publicKey (base64), deviceName, timestamp (ms)}`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLinkQRData {
    pub version: u32,
    pub session_id: String,
    #[serde_as(as = "Base64")]
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    pub device_name: String,
    pub timestamp: u64,
}

/// Account profile transferred alongside the keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedProfile {
    #[serde(rename = "jid")]
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub language: String,
}

impl LinkedProfile {
    /// Canonical bytes authenticated together with the encrypted keys.
    fn aad(&self) -> Result<Vec<u8>, ExchangeError> {
        serde_json::to_vec(self).map_err(|_| ExchangeError::SerializationFailed)
    }
}

/// Encrypted identity key pair plus profile, sent primary to secondary.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLinkBundle {
    #[serde_as(as = "Base64")]
    pub encrypted_keys: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub nonce: Vec<u8>,
    pub profile: LinkedProfile,
}

impl DeviceLinkBundle {
    pub fn to_json(&self) -> Result<String, ExchangeError> {
        serde_json::to_string(self).map_err(|_| ExchangeError::SerializationFailed)
    }

    pub fn from_json(json: &str) -> Result<Self, ExchangeError> {
        serde_json::from_str(json).map_err(|_| ExchangeError::SerializationFailed)
    }
}

/// Single-use X25519 key pair for one linking attempt.
#[derive(Debug)]
pub struct EphemeralKeyPair {
    public_key: [u8; PUBLIC_KEY_SIZE],
    private_key: PrivateKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let private_key = PrivateKey::generate();
        EphemeralKeyPair {
            public_key: private_key.public_key(),
            private_key,
        }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    /// Gives up the private half, e.g. to pass it to [`import_key_bundle`].
    pub fn into_private_key(self) -> PrivateKey {
        self.private_key
    }
}

/// Lifecycle state of a device link session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// QR shown, no counterpart yet
    Pending,
    /// Counterpart's ephemeral key recorded
    Connected,
    /// Key bundle produced
    Completed,
    /// Timed out before completion
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Expired)
    }

    /// Whether `self -> next` is a valid forward transition.
    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Pending, SessionStatus::Connected)
                | (SessionStatus::Connected, SessionStatus::Completed)
                | (SessionStatus::Pending, SessionStatus::Expired)
                | (SessionStatus::Connected, SessionStatus::Expired)
        )
    }
}

/// Primary-side state for one linking attempt.
#[derive(Debug)]
pub struct DeviceLinkSession {
    session_id: String,
    device_name: String,
    ephemeral_public: [u8; PUBLIC_KEY_SIZE],
    ephemeral_private: Option<PrivateKey>,
    counterpart_public: Option<[u8; PUBLIC_KEY_SIZE]>,
    created_at: u64,
    status: SessionStatus,
}

impl DeviceLinkSession {
    fn new(device_name: String, ephemeral: EphemeralKeyPair, created_at: u64) -> Self {
        DeviceLinkSession {
            session_id: Uuid::new_v4().to_string(),
            device_name,
            ephemeral_public: ephemeral.public_key,
            ephemeral_private: Some(ephemeral.private_key),
            counterpart_public: None,
            created_at,
            status: SessionStatus::Pending,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn ephemeral_public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.ephemeral_public
    }

    pub fn counterpart_public_key(&self) -> Option<&[u8; PUBLIC_KEY_SIZE]> {
        self.counterpart_public.as_ref()
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Whether the ephemeral private key is still held.
    pub fn holds_private_key(&self) -> bool {
        self.ephemeral_private.is_some()
    }

    fn is_timed_out(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > timeout_ms
    }

    fn advance(&mut self, next: SessionStatus) -> Result<(), ExchangeError> {
        if !self.status.can_advance_to(next) {
            return Err(ExchangeError::InvalidState(format!(
                "{:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.wipe_private_key();
        }
        debug!(session_id = %self.session_id, status = ?next, "device link session advanced");
        Ok(())
    }

    fn wipe_private_key(&mut self) {
        if let Some(mut key) = self.ephemeral_private.take() {
            key.zeroize();
        }
    }
}

/// Six-digit code both devices can display to confirm they hold the same
/// pair of ephemeral public keys. Symmetric in its arguments.
pub fn verification_code_for(a: &[u8; PUBLIC_KEY_SIZE], b: &[u8; PUBLIC_KEY_SIZE]) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };

    let mut ctx = Context::new(&SHA256);
    ctx.update(VERIFICATION_CODE_LABEL);
    ctx.update(low);
    ctx.update(high);
    let digest = ctx.finish();

    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&digest.as_ref()[..4]);
    let value = u32::from_be_bytes(prefix) % 1_000_000;
    format!("{value:06}")
}

/// Drives the primary side of device linking and validates scanned QR codes
/// on the secondary side.
#[derive(Debug, Default)]
pub struct DeviceLinkProtocol {
    config: CoreConfig,
    session: Option<DeviceLinkSession>,
}

impl DeviceLinkProtocol {
    pub fn new(config: CoreConfig) -> Self {
        DeviceLinkProtocol {
            config,
            session: None,
        }
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<&DeviceLinkSession> {
        self.session.as_ref()
    }

    /// Starts a new `Pending` session and returns its QR payload as JSON.
    ///
    /// Any previous session is discarded and its key wiped.
    pub fn generate_link_qr(&mut self, device_name: &str) -> Result<String, ExchangeError> {
        self.generate_link_qr_at(device_name, now_ms())
    }

    /// Starts a new session with an explicit creation time (for testing).
    pub fn generate_link_qr_at(
        &mut self,
        device_name: &str,
        now_ms: u64,
    ) -> Result<String, ExchangeError> {
        if device_name.trim().is_empty() {
            return Err(ExchangeError::InvalidDeviceName);
        }
        self.cancel_session();

        let session = DeviceLinkSession::new(
            device_name.to_string(),
            EphemeralKeyPair::generate(),
            now_ms,
        );
        let qr = DeviceLinkQRData {
            version: QR_FORMAT_VERSION,
            session_id: session.session_id.clone(),
            public_key: session.ephemeral_public,
            device_name: session.device_name.clone(),
            timestamp: now_ms,
        };
        let json = serde_json::to_string(&qr).map_err(|_| ExchangeError::SerializationFailed)?;

        debug!(session_id = %session.session_id, "started device link session");
        self.session = Some(session);
        Ok(json)
    }

    /// Validates a scanned QR payload.
    ///
    /// Returns `None` for anything malformed, of an unknown version, older
    /// than the session timeout or too far in the future.
    pub fn parse_scanned_qr(&self, qr: &str) -> Option<DeviceLinkQRData> {
        self.parse_scanned_qr_at(qr, now_ms())
    }

    /// Validates a scanned QR payload against an explicit clock (for testing).
    pub fn parse_scanned_qr_at(&self, qr: &str, now_ms: u64) -> Option<DeviceLinkQRData> {
        let data: DeviceLinkQRData = match serde_json::from_str(qr) {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "rejected malformed link QR");
                return None;
            }
        };

        if data.version != QR_FORMAT_VERSION {
            debug!(version = data.version, "rejected link QR with unsupported version");
            return None;
        }
        if data.session_id.trim().is_empty() || data.device_name.trim().is_empty() {
            debug!("rejected link QR with empty fields");
            return None;
        }
        if now_ms.saturating_sub(data.timestamp) > self.config.session_timeout_ms() {
            debug!(session_id = %data.session_id, "rejected expired link QR");
            return None;
        }
        if data.timestamp > now_ms.saturating_add(self.config.max_qr_clock_skew_ms()) {
            debug!(session_id = %data.session_id, "rejected link QR from the future");
            return None;
        }

        Some(data)
    }

    /// Records the secondary device's ephemeral public key (`Pending -> Connected`).
    ///
    /// Connecting again with the same key is a no-op.
    pub fn connect(&mut self, counterpart_public_key: &[u8]) -> Result<(), ExchangeError> {
        self.connect_at(counterpart_public_key, now_ms())
    }

    pub fn connect_at(
        &mut self,
        counterpart_public_key: &[u8],
        now_ms: u64,
    ) -> Result<(), ExchangeError> {
        let counterpart =
            public_key_from_slice(counterpart_public_key).ok_or(ExchangeError::InvalidPublicKey)?;
        let session = self.active_session_at(now_ms)?;
        record_counterpart(session, counterpart)
    }

    /// Encrypts `user_keys` for the connected secondary device and completes
    /// the session.
    ///
    /// A `Pending` session is connected to `counterpart_public_key` first. A
    /// `Connected` session only accepts the key it was connected with.
    pub fn create_key_bundle(
        &mut self,
        user_keys: &KeyPair,
        profile: LinkedProfile,
        counterpart_public_key: &[u8],
    ) -> Result<DeviceLinkBundle, ExchangeError> {
        self.create_key_bundle_at(user_keys, profile, counterpart_public_key, now_ms())
    }

    pub fn create_key_bundle_at(
        &mut self,
        user_keys: &KeyPair,
        profile: LinkedProfile,
        counterpart_public_key: &[u8],
        now_ms: u64,
    ) -> Result<DeviceLinkBundle, ExchangeError> {
        let counterpart =
            public_key_from_slice(counterpart_public_key).ok_or(ExchangeError::InvalidPublicKey)?;
        let session = self.active_session_at(now_ms)?;
        record_counterpart(session, counterpart)?;

        let aad = profile.aad()?;
        let sealed = {
            let private = session
                .ephemeral_private
                .as_ref()
                .ok_or(ExchangeError::NoActiveSession)?;
            let secret = user_keys.to_secret_bytes();
            crypto::seal(private, &counterpart, &secret, &aad).map_err(|e| match e {
                BoxError::InvalidPublicKey => ExchangeError::InvalidPublicKey,
                _ => ExchangeError::CryptoError,
            })?
        };

        session.advance(SessionStatus::Completed)?;
        info!(session_id = %session.session_id, "exported identity key pair to linked device");

        Ok(DeviceLinkBundle {
            encrypted_keys: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
            profile,
        })
    }

    /// Whether a session exists, is not terminal and has not timed out.
    ///
    /// A timed-out session is moved to `Expired` as a side effect.
    pub fn is_session_valid(&mut self) -> bool {
        self.is_session_valid_at(now_ms())
    }

    pub fn is_session_valid_at(&mut self, now_ms: u64) -> bool {
        self.active_session_at(now_ms).is_ok()
    }

    /// Wipes the ephemeral private key and discards the session.
    pub fn cancel_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.wipe_private_key();
            debug!(session_id = %session.session_id, "discarded device link session");
        }
    }

    /// Short code over both ephemeral public keys, for the user to compare
    /// with the one shown on the secondary device.
    pub fn verification_code(&self) -> Result<String, ExchangeError> {
        let session = self.session.as_ref().ok_or(ExchangeError::NoActiveSession)?;
        let counterpart = session
            .counterpart_public
            .as_ref()
            .ok_or_else(|| ExchangeError::InvalidState("no device connected".into()))?;
        Ok(verification_code_for(&session.ephemeral_public, counterpart))
    }

    /// Renders a QR payload as a text image for terminals.
    pub fn render_qr(qr: &str) -> Result<String, ExchangeError> {
        use qrcode::QrCode;

        let code = QrCode::new(qr.as_bytes()).map_err(|_| ExchangeError::InvalidQRFormat)?;
        Ok(code
            .render()
            .light_color(' ')
            .dark_color('█')
            .quiet_zone(false)
            .build())
    }

    fn active_session_at(&mut self, now_ms: u64) -> Result<&mut DeviceLinkSession, ExchangeError> {
        let timeout_ms = self.config.session_timeout_ms();
        let session = self.session.as_mut().ok_or(ExchangeError::NoActiveSession)?;

        match session.status {
            SessionStatus::Completed => return Err(ExchangeError::NoActiveSession),
            SessionStatus::Expired => return Err(ExchangeError::SessionExpired),
            SessionStatus::Pending | SessionStatus::Connected => {}
        }

        if session.is_timed_out(now_ms, timeout_ms) {
            session.advance(SessionStatus::Expired)?;
            return Err(ExchangeError::SessionExpired);
        }
        Ok(session)
    }
}

fn record_counterpart(
    session: &mut DeviceLinkSession,
    counterpart: [u8; PUBLIC_KEY_SIZE],
) -> Result<(), ExchangeError> {
    match session.counterpart_public {
        Some(known) if known == counterpart => Ok(()),
        Some(_) => {
            warn!(session_id = %session.session_id, "counterpart key differs from connected device");
            Err(ExchangeError::CounterpartMismatch)
        }
        None => {
            let private = session
                .ephemeral_private
                .as_ref()
                .ok_or(ExchangeError::NoActiveSession)?;
            if private.diffie_hellman(&counterpart).is_none() {
                warn!(session_id = %session.session_id, "rejected low-order counterpart key");
                return Err(ExchangeError::InvalidPublicKey);
            }
            session.counterpart_public = Some(counterpart);
            session.advance(SessionStatus::Connected)
        }
    }
}

/// Decrypts a key bundle on the secondary device.
///
/// `my_ephemeral_private` is consumed and wiped before returning, whatever
/// the outcome.
pub fn import_key_bundle(
    bundle: &DeviceLinkBundle,
    counterpart_public_key: &[u8],
    my_ephemeral_private: PrivateKey,
) -> Result<KeyPair, ExchangeError> {
    let mut private = my_ephemeral_private;
    let result = open_bundle(bundle, counterpart_public_key, &private);
    private.zeroize();
    result
}

fn open_bundle(
    bundle: &DeviceLinkBundle,
    counterpart_public_key: &[u8],
    private: &PrivateKey,
) -> Result<KeyPair, ExchangeError> {
    let counterpart =
        public_key_from_slice(counterpart_public_key).ok_or(ExchangeError::InvalidPublicKey)?;
    let aad = bundle.profile.aad()?;

    let secret = crypto::open(
        private,
        &counterpart,
        &bundle.nonce,
        &bundle.encrypted_keys,
        &aad,
    )
    .map(zeroize::Zeroizing::new)
    .map_err(|_| {
        warn!("device link bundle authentication failed");
        ExchangeError::AuthenticationFailure
    })?;

    let pair = KeyPair::from_secret_bytes(&secret).ok_or_else(|| {
        warn!("device link bundle holds an inconsistent key pair");
        ExchangeError::InvalidKeyBundle
    })?;
    info!("imported identity key pair from linked device");
    Ok(pair)
}

// INLINE_TEST_REQUIRED: Tests private session fields and VERIFICATION_CODE_LABEL-derived codes
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    fn profile() -> LinkedProfile {
        LinkedProfile {
            id: "31612345678@commeazy.local".into(),
            name: "Oma Els".into(),
            phone_number: "+31612345678".into(),
            language: "nl".into(),
        }
    }

    fn started() -> (DeviceLinkProtocol, String) {
        let mut protocol = DeviceLinkProtocol::default();
        let qr = protocol.generate_link_qr_at("iPad", T0).unwrap();
        (protocol, qr)
    }

    // =============================================================================
    // QR payload
    // =============================================================================

    #[test]
    fn test_qr_json_fields() {
        let (protocol, qr) = started();
        let value: serde_json::Value = serde_json::from_str(&qr).unwrap();
        let session = protocol.session().unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["sessionId"], session.session_id());
        assert_eq!(value["deviceName"], "iPad");
        assert_eq!(value["timestamp"], T0);
        assert!(value["publicKey"].is_string());
    }

    #[test]
    fn test_empty_device_name_rejected() {
        let mut protocol = DeviceLinkProtocol::default();
        assert_eq!(
            protocol.generate_link_qr_at("  ", T0),
            Err(ExchangeError::InvalidDeviceName)
        );
        assert!(protocol.session().is_none());
    }

    #[test]
    fn test_parse_timeout_boundary() {
        let (protocol, qr) = started();

        assert!(protocol.parse_scanned_qr_at(&qr, T0 + 300_000).is_some());
        assert!(protocol.parse_scanned_qr_at(&qr, T0 + 300_001).is_none());
    }

    #[test]
    fn test_parse_rejects_future_timestamp() {
        let (protocol, qr) = started();

        assert!(protocol.parse_scanned_qr_at(&qr, T0 - 30_000).is_some());
        assert!(protocol.parse_scanned_qr_at(&qr, T0 - 30_001).is_none());
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let (protocol, qr) = started();
        let mut value: serde_json::Value = serde_json::from_str(&qr).unwrap();

        let mut wrong_version = value.clone();
        wrong_version["version"] = 2.into();
        assert!(protocol
            .parse_scanned_qr_at(&wrong_version.to_string(), T0)
            .is_none());

        let mut wrong_type = value.clone();
        wrong_type["timestamp"] = "yesterday".into();
        assert!(protocol
            .parse_scanned_qr_at(&wrong_type.to_string(), T0)
            .is_none());

        let mut short_key = value.clone();
        short_key["publicKey"] = "AAAA".into();
        assert!(protocol
            .parse_scanned_qr_at(&short_key.to_string(), T0)
            .is_none());

        value["sessionId"] = "".into();
        assert!(protocol.parse_scanned_qr_at(&value.to_string(), T0).is_none());

        assert!(protocol.parse_scanned_qr_at("not json", T0).is_none());
    }

    // =============================================================================
    // Session lifecycle
    // =============================================================================

    #[test]
    fn test_transition_table() {
        use SessionStatus::*;

        assert!(Pending.can_advance_to(Connected));
        assert!(Connected.can_advance_to(Completed));
        assert!(Pending.can_advance_to(Expired));
        assert!(Connected.can_advance_to(Expired));

        assert!(!Pending.can_advance_to(Completed));
        assert!(!Connected.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Expired));
        assert!(!Expired.can_advance_to(Connected));
    }

    #[test]
    fn test_connect_moves_to_connected() {
        let (mut protocol, _) = started();
        let secondary = EphemeralKeyPair::generate();

        protocol.connect_at(secondary.public_key(), T0 + 1).unwrap();
        let session = protocol.session().unwrap();
        assert_eq!(session.status(), SessionStatus::Connected);
        assert_eq!(session.counterpart_public_key(), Some(secondary.public_key()));

        // Idempotent for the same key
        protocol.connect_at(secondary.public_key(), T0 + 2).unwrap();
    }

    #[test]
    fn test_low_order_connect_keeps_pending() {
        let (mut protocol, _) = started();

        assert_eq!(
            protocol.connect_at(&[0u8; 32], T0 + 1),
            Err(ExchangeError::InvalidPublicKey)
        );
        assert_eq!(protocol.session().unwrap().status(), SessionStatus::Pending);
        assert!(protocol.session().unwrap().counterpart_public_key().is_none());
    }

    #[test]
    fn test_bundle_for_other_counterpart_rejected() {
        let (mut protocol, _) = started();
        let secondary = EphemeralKeyPair::generate();
        let intruder = EphemeralKeyPair::generate();
        protocol.connect_at(secondary.public_key(), T0 + 1).unwrap();

        let result = protocol.create_key_bundle_at(
            &KeyPair::generate(),
            profile(),
            intruder.public_key(),
            T0 + 2,
        );
        assert_eq!(result, Err(ExchangeError::CounterpartMismatch));
        assert_eq!(protocol.session().unwrap().status(), SessionStatus::Connected);
    }

    #[test]
    fn test_completion_wipes_private_key() {
        let (mut protocol, _) = started();
        let secondary = EphemeralKeyPair::generate();
        assert!(protocol.session().unwrap().holds_private_key());

        protocol
            .create_key_bundle_at(&KeyPair::generate(), profile(), secondary.public_key(), T0 + 1)
            .unwrap();

        let session = protocol.session().unwrap();
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(!session.holds_private_key());
        assert!(!protocol.is_session_valid_at(T0 + 2));
    }

    #[test]
    fn test_second_bundle_after_completion_fails() {
        let (mut protocol, _) = started();
        let secondary = EphemeralKeyPair::generate();
        let keys = KeyPair::generate();

        protocol
            .create_key_bundle_at(&keys, profile(), secondary.public_key(), T0 + 1)
            .unwrap();
        assert_eq!(
            protocol.create_key_bundle_at(&keys, profile(), secondary.public_key(), T0 + 2),
            Err(ExchangeError::NoActiveSession)
        );
    }

    #[test]
    fn test_lazy_expiry() {
        let (mut protocol, _) = started();

        assert!(protocol.is_session_valid_at(T0 + 300_000));
        assert!(!protocol.is_session_valid_at(T0 + 300_001));

        let session = protocol.session().unwrap();
        assert_eq!(session.status(), SessionStatus::Expired);
        assert!(!session.holds_private_key());

        let secondary = EphemeralKeyPair::generate();
        assert_eq!(
            protocol.create_key_bundle_at(
                &KeyPair::generate(),
                profile(),
                secondary.public_key(),
                T0 + 300_002
            ),
            Err(ExchangeError::SessionExpired)
        );
    }

    #[test]
    fn test_custom_timeout() {
        let config = CoreConfig::default().with_session_timeout(Duration::from_secs(10));
        let mut protocol = DeviceLinkProtocol::new(config);
        protocol.generate_link_qr_at("Pixel", T0).unwrap();

        assert!(protocol.is_session_valid_at(T0 + 10_000));
        assert!(!protocol.is_session_valid_at(T0 + 10_001));
    }

    #[test]
    fn test_cancel_discards_session() {
        let (mut protocol, _) = started();
        protocol.cancel_session();

        assert!(protocol.session().is_none());
        assert!(!protocol.is_session_valid_at(T0));
        assert_eq!(
            protocol.connect_at(EphemeralKeyPair::generate().public_key(), T0),
            Err(ExchangeError::NoActiveSession)
        );
    }

    #[test]
    fn test_new_qr_replaces_session() {
        let (mut protocol, _) = started();
        let first = protocol.session().unwrap().session_id().to_string();

        protocol.generate_link_qr_at("iPad", T0 + 5).unwrap();
        let second = protocol.session().unwrap();
        assert_ne!(second.session_id(), first);
        assert_eq!(second.status(), SessionStatus::Pending);
    }

    // =============================================================================
    // Bundle
    // =============================================================================

    #[test]
    fn test_bundle_profile_is_authenticated() {
        let (mut protocol, qr) = started();
        let qr_data = protocol.parse_scanned_qr_at(&qr, T0).unwrap();
        let secondary = EphemeralKeyPair::generate();

        let mut bundle = protocol
            .create_key_bundle_at(&KeyPair::generate(), profile(), secondary.public_key(), T0 + 1)
            .unwrap();
        bundle.profile.phone_number = "+31600000000".into();

        assert_eq!(
            import_key_bundle(&bundle, &qr_data.public_key, secondary.into_private_key()),
            Err(ExchangeError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_bundle_json_fields() {
        let (mut protocol, _) = started();
        let secondary = EphemeralKeyPair::generate();
        let bundle = protocol
            .create_key_bundle_at(&KeyPair::generate(), profile(), secondary.public_key(), T0 + 1)
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        assert!(value["encryptedKeys"].is_string());
        assert!(value["nonce"].is_string());
        assert_eq!(value["profile"]["jid"], "31612345678@commeazy.local");
        assert_eq!(value["profile"]["phoneNumber"], "+31612345678");
        assert_eq!(value["profile"]["language"], "nl");
    }

    #[test]
    fn test_import_rejects_short_counterpart_key() {
        let bundle = DeviceLinkBundle {
            encrypted_keys: vec![0; 80],
            nonce: vec![0; 24],
            profile: profile(),
        };
        assert_eq!(
            import_key_bundle(&bundle, &[1u8; 16], PrivateKey::generate()),
            Err(ExchangeError::InvalidPublicKey)
        );
    }

    // =============================================================================
    // Verification code
    // =============================================================================

    #[test]
    fn test_verification_code_matches_both_sides() {
        let (mut protocol, qr) = started();
        let qr_data = protocol.parse_scanned_qr_at(&qr, T0).unwrap();
        let secondary = EphemeralKeyPair::generate();
        protocol.connect_at(secondary.public_key(), T0 + 1).unwrap();

        let primary_code = protocol.verification_code().unwrap();
        let secondary_code = verification_code_for(secondary.public_key(), &qr_data.public_key);

        assert_eq!(primary_code, secondary_code);
        assert_eq!(primary_code.len(), 6);
        assert!(primary_code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_verification_code_needs_counterpart() {
        let (protocol, _) = started();
        assert!(matches!(
            protocol.verification_code(),
            Err(ExchangeError::InvalidState(_))
        ));
    }

    #[test]
    fn test_render_qr() {
        let (_, qr) = started();
        let image = DeviceLinkProtocol::render_qr(&qr).unwrap();
        assert!(image.contains('█'));
        assert!(image.lines().count() > 20);
    }
}
