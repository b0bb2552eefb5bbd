// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Multi-Recipient Content Encryption
//!
//! Content is encrypted for a set of recipients under one of three modes,
//! selected purely from the recipient count:
//!
//! | Recipients | Mode           | Layout                                          |
//! |------------|----------------|-------------------------------------------------|
//! | 1          | `Direct`       | one box addressed by recipient id               |
//! | 2..=8      | `EncryptToAll` | one box of the full content per recipient id    |
//! | > 8        | `SharedKey`    | content under a random message key, key boxed per recipient id |
//!
//! Every box is sender-authenticated: decryption with the wrong sender public
//! key fails. Each box binds the mode and its recipient id as additional
//! data, so an envelope cannot be replayed under another id or mode.

mod payload;

pub use payload::{
    DirectEnvelope, EncryptedPayload, Envelope, PayloadBody, PayloadMode, RecipientEnvelopes,
    SharedKeyEnvelope, METADATA_RECIPIENTS, METADATA_VERSION, PAYLOAD_FORMAT_VERSION,
};

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{
    self, open_with_nonce, public_key_from_slice, seal_with_nonce, BoxError, KeyPair,
    SymmetricKey, PUBLIC_KEY_SIZE,
};
use crate::identity::KeyManager;
use crate::storage::KeyStore;

/// Largest recipient count that still boxes the full content per recipient.
pub const RECIPIENT_THRESHOLD: usize = 8;

/// Content encryption errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Identity key pair not initialized")]
    NotInitialized,
    #[error("At least one recipient is required")]
    NoRecipients,
    #[error("Duplicate recipient id: {0}")]
    DuplicateRecipient(String),
    #[error("Invalid public key for recipient: {0}")]
    InvalidPublicKey(String),
    #[error("No envelope for this recipient")]
    NoEnvelopeForRecipient,
    #[error("Authentication failed")]
    AuthenticationFailure,
    #[error("Unknown payload mode: {0}")]
    UnknownMode(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Encryption failed")]
    EncryptionFailed,
}

/// Picks the encryption mode for `recipient_count` recipients.
///
/// Returns `None` for zero recipients.
pub fn select_mode(recipient_count: usize) -> Option<PayloadMode> {
    match recipient_count {
        0 => None,
        1 => Some(PayloadMode::Direct),
        n if n <= RECIPIENT_THRESHOLD => Some(PayloadMode::EncryptToAll),
        _ => Some(PayloadMode::SharedKey),
    }
}

/// A recipient: opaque id and X25519 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: String,
    pub public_key: Vec<u8>,
}

impl Recipient {
    pub fn new(id: impl Into<String>, public_key: impl Into<Vec<u8>>) -> Self {
        Recipient {
            id: id.into(),
            public_key: public_key.into(),
        }
    }
}

/// Additional data for a box addressed to `recipient_id` under `mode`.
fn envelope_aad(mode: PayloadMode, recipient_id: &str) -> Vec<u8> {
    let mode = mode.as_str().as_bytes();
    let mut aad = Vec::with_capacity(mode.len() + 1 + recipient_id.len());
    aad.extend_from_slice(mode);
    aad.push(0);
    aad.extend_from_slice(recipient_id.as_bytes());
    aad
}

/// Additional data for the shared content ciphertext.
const SHARED_CONTENT_AAD: &[u8] = b"SharedKey";

/// Encrypts and decrypts content as the local identity.
///
/// `local_id` is the id this identity is addressed by in payloads; it is
/// used on decryption to find this identity's envelope.
pub struct ContentCipher<'k, S: KeyStore> {
    keys: &'k KeyManager<S>,
    local_id: String,
}

impl<'k, S: KeyStore> ContentCipher<'k, S> {
    pub fn new(keys: &'k KeyManager<S>, local_id: impl Into<String>) -> Self {
        ContentCipher {
            keys,
            local_id: local_id.into(),
        }
    }

    /// The id this identity is addressed by.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Encrypts `plaintext` for `recipients`.
    ///
    /// Recipient ids must be unique and every public key must be a valid
    /// 32-byte X25519 key.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[Recipient],
    ) -> Result<EncryptedPayload, CipherError> {
        let pair = self
            .keys
            .key_pair()
            .map_err(|_| CipherError::NotInitialized)?;
        let mode = select_mode(recipients.len()).ok_or(CipherError::NoRecipients)?;
        let resolved = resolve_recipients(recipients)?;

        let body = match mode {
            PayloadMode::Direct => {
                let (id, public_key) = &resolved[0];
                let envelope = box_for(pair, id, public_key, mode, plaintext)?;
                PayloadBody::Direct(DirectEnvelope {
                    recipient_id: id.to_string(),
                    envelope,
                })
            }
            PayloadMode::EncryptToAll => {
                let mut envelopes = BTreeMap::new();
                for (id, public_key) in &resolved {
                    let envelope = box_for(pair, id, public_key, mode, plaintext)?;
                    envelopes.insert(id.to_string(), envelope);
                }
                PayloadBody::EncryptToAll(RecipientEnvelopes { envelopes })
            }
            PayloadMode::SharedKey => {
                let message_key =
                    SymmetricKey::generate().map_err(|_| CipherError::EncryptionFailed)?;
                let (nonce, ciphertext) =
                    seal_with_nonce(&message_key, plaintext, SHARED_CONTENT_AAD)
                        .map_err(|_| CipherError::EncryptionFailed)?;

                let mut wrapped_keys = BTreeMap::new();
                for (id, public_key) in &resolved {
                    let wrapped = box_for(pair, id, public_key, mode, message_key.as_bytes())?;
                    wrapped_keys.insert(id.to_string(), wrapped);
                }
                drop(message_key);

                PayloadBody::SharedKey(SharedKeyEnvelope {
                    nonce: nonce.to_vec(),
                    ciphertext,
                    wrapped_keys,
                })
            }
        };

        debug!(%mode, recipients = recipients.len(), "encrypted content");
        Ok(EncryptedPayload {
            body,
            metadata: BTreeMap::from([
                (
                    METADATA_VERSION.to_string(),
                    PAYLOAD_FORMAT_VERSION.to_string(),
                ),
                (METADATA_RECIPIENTS.to_string(), recipients.len().to_string()),
            ]),
        })
    }

    /// Decrypts a payload sent by the holder of `sender_public_key`.
    pub fn decrypt(
        &self,
        payload: &EncryptedPayload,
        sender_public_key: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let pair = self
            .keys
            .key_pair()
            .map_err(|_| CipherError::NotInitialized)?;
        let sender = public_key_from_slice(sender_public_key)
            .ok_or_else(|| CipherError::InvalidPublicKey("sender".into()))?;
        let mode = payload.mode();

        let plaintext = match &payload.body {
            PayloadBody::Direct(direct) => {
                if direct.recipient_id != self.local_id {
                    return Err(CipherError::NoEnvelopeForRecipient);
                }
                self.open_envelope(pair, &sender, mode, &direct.envelope)?
            }
            PayloadBody::EncryptToAll(all) => {
                let envelope = all
                    .envelopes
                    .get(&self.local_id)
                    .ok_or(CipherError::NoEnvelopeForRecipient)?;
                self.open_envelope(pair, &sender, mode, envelope)?
            }
            PayloadBody::SharedKey(shared) => {
                let wrapped = shared
                    .wrapped_keys
                    .get(&self.local_id)
                    .ok_or(CipherError::NoEnvelopeForRecipient)?;
                let key_bytes =
                    Zeroizing::new(self.open_envelope(pair, &sender, mode, wrapped)?);
                let message_key =
                    SymmetricKey::from_slice(&key_bytes).ok_or(CipherError::AuthenticationFailure)?;

                open_with_nonce(
                    &message_key,
                    &shared.nonce,
                    &shared.ciphertext,
                    SHARED_CONTENT_AAD,
                )
                .map_err(|_| {
                    warn!(%mode, "shared content authentication failed");
                    CipherError::AuthenticationFailure
                })?
            }
        };

        debug!(%mode, "decrypted content");
        Ok(plaintext)
    }

    fn open_envelope(
        &self,
        pair: &KeyPair,
        sender: &[u8; PUBLIC_KEY_SIZE],
        mode: PayloadMode,
        envelope: &Envelope,
    ) -> Result<Vec<u8>, CipherError> {
        crypto::open(
            pair.private_key(),
            sender,
            &envelope.nonce,
            &envelope.ciphertext,
            &envelope_aad(mode, &self.local_id),
        )
        .map_err(|_| {
            warn!(%mode, "envelope authentication failed");
            CipherError::AuthenticationFailure
        })
    }
}

/// Validates recipients and parses their public keys.
fn resolve_recipients(
    recipients: &[Recipient],
) -> Result<Vec<(&str, [u8; PUBLIC_KEY_SIZE])>, CipherError> {
    let mut seen = HashSet::with_capacity(recipients.len());
    recipients
        .iter()
        .map(|recipient| {
            if !seen.insert(recipient.id.as_str()) {
                return Err(CipherError::DuplicateRecipient(recipient.id.clone()));
            }
            let public_key = public_key_from_slice(&recipient.public_key)
                .ok_or_else(|| CipherError::InvalidPublicKey(recipient.id.clone()))?;
            Ok((recipient.id.as_str(), public_key))
        })
        .collect()
}

/// Boxes `plaintext` from `sender` to one recipient.
fn box_for(
    sender: &KeyPair,
    recipient_id: &str,
    recipient_public: &[u8; PUBLIC_KEY_SIZE],
    mode: PayloadMode,
    plaintext: &[u8],
) -> Result<Envelope, CipherError> {
    let sealed = crypto::seal(
        sender.private_key(),
        recipient_public,
        plaintext,
        &envelope_aad(mode, recipient_id),
    )
    .map_err(|e| match e {
        BoxError::InvalidPublicKey => CipherError::InvalidPublicKey(recipient_id.to_string()),
        _ => CipherError::EncryptionFailed,
    })?;

    Ok(Envelope {
        nonce: sealed.nonce.to_vec(),
        ciphertext: sealed.ciphertext,
    })
}
