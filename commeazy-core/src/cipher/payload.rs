// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Encrypted Payload Format
//!
//! In memory a payload is a closed sum type ([`PayloadBody`]); on the wire it
//! is `{mode, data, metadata}` where `mode` names the variant and `data` is
//! the variant's JSON object. The `mode` string is untrusted input and is
//! only ever turned into a variant by [`EncryptedPayload::from_json`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use super::CipherError;

/// Metadata key holding the payload format version.
pub const METADATA_VERSION: &str = "version";
/// Metadata key holding the recipient count at encryption time.
pub const METADATA_RECIPIENTS: &str = "recipients";

/// Current payload format version.
pub const PAYLOAD_FORMAT_VERSION: u32 = 1;

/// Encryption strategy, chosen from the recipient count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadMode {
    /// One recipient, one box.
    Direct,
    /// 2..=8 recipients, one box of the full content per recipient.
    EncryptToAll,
    /// More than 8 recipients, content encrypted once, message key boxed per recipient.
    SharedKey,
}

impl PayloadMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadMode::Direct => "Direct",
            PayloadMode::EncryptToAll => "EncryptToAll",
            PayloadMode::SharedKey => "SharedKey",
        }
    }

    /// Parses a wire name.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "Direct" => Some(PayloadMode::Direct),
            "EncryptToAll" => Some(PayloadMode::EncryptToAll),
            "SharedKey" => Some(PayloadMode::SharedKey),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nonce and authenticated ciphertext for a single recipient.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde_as(as = "Base64")]
    pub nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
}

/// `Direct` body: the content boxed for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectEnvelope {
    pub recipient_id: String,
    pub envelope: Envelope,
}

/// `EncryptToAll` body: the content boxed once per recipient id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientEnvelopes {
    pub envelopes: BTreeMap<String, Envelope>,
}

/// `SharedKey` body: content under a message key, message key boxed per recipient id.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedKeyEnvelope {
    #[serde_as(as = "Base64")]
    pub nonce: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
    pub wrapped_keys: BTreeMap<String, Envelope>,
}

/// Mode-specific payload structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadBody {
    Direct(DirectEnvelope),
    EncryptToAll(RecipientEnvelopes),
    SharedKey(SharedKeyEnvelope),
}

impl PayloadBody {
    /// The mode this body was produced under.
    pub fn mode(&self) -> PayloadMode {
        match self {
            PayloadBody::Direct(_) => PayloadMode::Direct,
            PayloadBody::EncryptToAll(_) => PayloadMode::EncryptToAll,
            PayloadBody::SharedKey(_) => PayloadMode::SharedKey,
        }
    }
}

/// Content encrypted for one or more recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub body: PayloadBody,
    /// Advisory metadata. Not authenticated; never used for dispatch.
    pub metadata: BTreeMap<String, String>,
}

/// Wire representation.
#[derive(Serialize, Deserialize)]
struct RawPayload {
    mode: String,
    data: serde_json::Value,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl EncryptedPayload {
    /// The encryption mode.
    pub fn mode(&self) -> PayloadMode {
        self.body.mode()
    }

    /// Ids of every recipient with an envelope in this payload.
    pub fn recipient_ids(&self) -> Vec<&str> {
        match &self.body {
            PayloadBody::Direct(direct) => vec![direct.recipient_id.as_str()],
            PayloadBody::EncryptToAll(all) => all.envelopes.keys().map(String::as_str).collect(),
            PayloadBody::SharedKey(shared) => {
                shared.wrapped_keys.keys().map(String::as_str).collect()
            }
        }
    }

    /// Serializes to `{mode, data, metadata}` JSON.
    pub fn to_json(&self) -> Result<String, CipherError> {
        let data = match &self.body {
            PayloadBody::Direct(direct) => serde_json::to_value(direct),
            PayloadBody::EncryptToAll(all) => serde_json::to_value(all),
            PayloadBody::SharedKey(shared) => serde_json::to_value(shared),
        }
        .map_err(|e| CipherError::MalformedPayload(e.to_string()))?;

        let raw = RawPayload {
            mode: self.mode().as_str().to_string(),
            data,
            metadata: self.metadata.clone(),
        };
        serde_json::to_string(&raw).map_err(|e| CipherError::MalformedPayload(e.to_string()))
    }

    /// Parses `{mode, data, metadata}` JSON.
    ///
    /// An unrecognized `mode` is [`CipherError::UnknownMode`]; a `data`
    /// object that does not match its mode is [`CipherError::MalformedPayload`].
    pub fn from_json(json: &str) -> Result<Self, CipherError> {
        let raw: RawPayload =
            serde_json::from_str(json).map_err(|e| CipherError::MalformedPayload(e.to_string()))?;

        let mode = PayloadMode::parse(&raw.mode).ok_or(CipherError::UnknownMode(raw.mode))?;
        let malformed = |e: serde_json::Error| CipherError::MalformedPayload(e.to_string());

        let body = match mode {
            PayloadMode::Direct => {
                PayloadBody::Direct(serde_json::from_value(raw.data).map_err(malformed)?)
            }
            PayloadMode::EncryptToAll => {
                PayloadBody::EncryptToAll(serde_json::from_value(raw.data).map_err(malformed)?)
            }
            PayloadMode::SharedKey => {
                PayloadBody::SharedKey(serde_json::from_value(raw.data).map_err(malformed)?)
            }
        };

        Ok(EncryptedPayload {
            body,
            metadata: raw.metadata,
        })
    }
}
