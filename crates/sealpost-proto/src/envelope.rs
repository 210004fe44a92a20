//! The message envelope.
//!
//! On the wire the envelope is a CBOR map with single-letter keys:
//!
//! ```text
//! {
//!   v: version,
//!   i: iv (16 bytes),
//!   a: app namespace,
//!   l: blind flag,
//!   s: { i: sender identity (41 bytes), d: device id (8 bytes) },
//!   r: [ { i: recipient identity, k: wrapped conversation key,
//!          s: key-binding signature, d: encrypted secret block }, ... ],
//!   d: encrypted body,
//! }
//! ```
//!
//! [`Envelope`] is the validated, typed view. The serde structs stay private
//! so that every envelope handed to callers has correctly sized fields.
//!
//! # Invariants
//!
//! - Canonical form: [`Envelope::decode`] re-encodes what it parsed and
//!   rejects input that does not match byte for byte. Two byte strings that
//!   decode to the same envelope are therefore identical, which keeps the
//!   whole-envelope hash usable for duplicate detection.
//! - At least one recipient block.

use std::fmt;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    identity::HashedIdentity,
};

/// Size of the shared CBC initialization vector.
pub const IV_SIZE: usize = 16;

/// Size of a device id on the wire.
pub const DEVICE_ID_SIZE: usize = 8;

/// Identifier of a single device belonging to an identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Big-endian wire form.
    pub const fn to_bytes(self) -> [u8; DEVICE_ID_SIZE] {
        self.0.to_be_bytes()
    }

    /// Parse the big-endian wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; DEVICE_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| ProtocolError::field_length("s.d", DEVICE_ID_SIZE, bytes.len()))?;
        Ok(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:016x})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Who sent the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderBlock {
    /// Sender identity at the frame of its signing key
    pub identity: HashedIdentity,
    /// Sending device
    pub device: DeviceId,
}

/// Per-recipient key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientBlock {
    /// Recipient identity at the frame of its encryption key
    pub identity: HashedIdentity,
    /// Conversation key wrapped for `identity` by the encryption scheme
    pub encrypted_key: Vec<u8>,
    /// Sender signature over `SHA-256(encrypted_key || device)`
    pub signature: Vec<u8>,
    /// Secret block encrypted under the conversation key
    pub secret: Vec<u8>,
}

/// A complete, structurally valid envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Format version
    pub version: u32,
    /// IV shared by the body and every secret block
    pub iv: [u8; IV_SIZE],
    /// Application namespace
    pub app: Vec<u8>,
    /// Whether the recipient list is hidden from recipients
    pub blind: bool,
    /// Sender identity and device
    pub sender: SenderBlock,
    /// One block per recipient, in sender order
    pub recipients: Vec<RecipientBlock>,
    /// Body encrypted under the message key
    pub body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireSender {
    #[serde(rename = "i", with = "serde_bytes")]
    identity: Vec<u8>,
    #[serde(rename = "d", with = "serde_bytes")]
    device: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireRecipient {
    #[serde(rename = "i", with = "serde_bytes")]
    identity: Vec<u8>,
    #[serde(rename = "k", with = "serde_bytes")]
    encrypted_key: Vec<u8>,
    #[serde(rename = "s", with = "serde_bytes")]
    signature: Vec<u8>,
    #[serde(rename = "d", with = "serde_bytes")]
    secret: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "v")]
    version: u32,
    #[serde(rename = "i", with = "serde_bytes")]
    iv: Vec<u8>,
    #[serde(rename = "a", with = "serde_bytes")]
    app: Vec<u8>,
    #[serde(rename = "l")]
    blind: bool,
    #[serde(rename = "s")]
    sender: WireSender,
    #[serde(rename = "r")]
    recipients: Vec<WireRecipient>,
    #[serde(rename = "d", with = "serde_bytes")]
    body: Vec<u8>,
}

impl Envelope {
    /// Encode to CBOR.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let wire = self.to_wire();
        let mut writer = dst.writer();
        ciborium::ser::into_writer(&wire, &mut writer)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Encode to a fresh buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode and validate an envelope.
    ///
    /// # Security
    ///
    /// The size check runs before the CBOR parser sees the input. Every fixed
    /// size field is checked and identities are parsed, so the returned value
    /// needs no further structural validation.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EnvelopeTooLarge` if `bytes` exceeds `max_size`
    /// - `ProtocolError::CborDecode` if the CBOR is malformed
    /// - `ProtocolError::CorruptIdentity` if an identity cannot be parsed
    /// - `ProtocolError::InvalidField` for wrong field sizes, an empty
    ///   recipient list or a non-canonical encoding
    pub fn decode(bytes: &[u8], max_size: usize) -> Result<Self> {
        if bytes.len() > max_size {
            return Err(ProtocolError::EnvelopeTooLarge { size: bytes.len(), max: max_size });
        }

        let wire: WireEnvelope =
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))?;

        let envelope = Self::from_wire(wire)?;

        if envelope.to_vec()? != bytes {
            return Err(ProtocolError::InvalidField {
                field: "envelope",
                reason: "non-canonical encoding".to_string(),
            });
        }

        Ok(envelope)
    }

    /// Identities of all recipient blocks, in order.
    pub fn recipient_identities(&self) -> Vec<HashedIdentity> {
        self.recipients.iter().map(|r| r.identity).collect()
    }

    fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            version: self.version,
            iv: self.iv.to_vec(),
            app: self.app.clone(),
            blind: self.blind,
            sender: WireSender {
                identity: self.sender.identity.to_bytes().to_vec(),
                device: self.sender.device.to_bytes().to_vec(),
            },
            recipients: self
                .recipients
                .iter()
                .map(|r| WireRecipient {
                    identity: r.identity.to_bytes().to_vec(),
                    encrypted_key: r.encrypted_key.clone(),
                    signature: r.signature.clone(),
                    secret: r.secret.clone(),
                })
                .collect(),
            body: self.body.clone(),
        }
    }

    fn from_wire(wire: WireEnvelope) -> Result<Self> {
        let iv: [u8; IV_SIZE] = wire
            .iv
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::field_length("i", IV_SIZE, wire.iv.len()))?;

        let sender = SenderBlock {
            identity: HashedIdentity::from_bytes(&wire.sender.identity)?,
            device: DeviceId::from_bytes(&wire.sender.device)?,
        };

        if wire.recipients.is_empty() {
            return Err(ProtocolError::InvalidField {
                field: "r",
                reason: "no recipients".to_string(),
            });
        }

        let recipients = wire
            .recipients
            .into_iter()
            .map(|r| {
                Ok(RecipientBlock {
                    identity: HashedIdentity::from_bytes(&r.identity)?,
                    encrypted_key: r.encrypted_key,
                    signature: r.signature,
                    secret: r.secret,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: wire.version,
            iv,
            app: wire.app,
            blind: wire.blind,
            sender,
            recipients,
            body: wire.body,
        })
    }
}
