//! Per-recipient secret block.
//!
//! Each recipient block carries, encrypted under that recipient's
//! conversation key, the message key for the body, the body-signature hash
//! and the sequence number the sender assigned to that recipient.
//!
//! The block is encrypted with zero-byte padding, so the decrypted plaintext
//! may end in up to 15 zero bytes. CBOR items are self-delimiting, which lets
//! [`SecretBlock::decode`] accept the padded plaintext directly. It checks that
//! everything after the item is zero.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Size of the body-signature hash.
pub const BODY_HASH_SIZE: usize = 32;

/// Size of the per-message symmetric key.
pub const MESSAGE_KEY_SIZE: usize = 16;

/// Decrypted contents of a recipient block's `d` field.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBlock {
    /// SHA-256 binding the body hash, app, blind flag and (unless blind) the
    /// recipient list
    pub body_hash: [u8; BODY_HASH_SIZE],
    /// Key the body is encrypted under
    pub message_key: [u8; MESSAGE_KEY_SIZE],
    /// Sequence number the sender assigned to this recipient
    pub sequence_number: i64,
}

impl std::fmt::Debug for SecretBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBlock")
            .field("body_hash", &hex::encode(self.body_hash))
            .field("message_key", &"<redacted>")
            .field("sequence_number", &self.sequence_number)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct WireSecret {
    #[serde(rename = "h", with = "serde_bytes")]
    body_hash: Vec<u8>,
    #[serde(rename = "k", with = "serde_bytes")]
    message_key: Vec<u8>,
    #[serde(rename = "q")]
    sequence_number: i64,
}

impl SecretBlock {
    /// Encode to CBOR (unpadded).
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let wire = WireSecret {
            body_hash: self.body_hash.to_vec(),
            message_key: self.message_key.to_vec(),
            sequence_number: self.sequence_number,
        };

        let mut out = Vec::with_capacity(64);
        ciborium::ser::into_writer(&wire, &mut out)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(out)
    }

    /// Decode from a zero-padded plaintext.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if the CBOR is malformed
    /// - `ProtocolError::InvalidField` for wrongly sized fields, or if the
    ///   bytes following the item are not all zero
    pub fn decode(padded: &[u8]) -> Result<Self> {
        let wire: WireSecret = ciborium::de::from_reader(padded)
            .map_err(|e| ProtocolError::CborDecode(e.to_string()))?;

        let body_hash: [u8; BODY_HASH_SIZE] = wire
            .body_hash
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::field_length("h", BODY_HASH_SIZE, wire.body_hash.len()))?;

        let message_key: [u8; MESSAGE_KEY_SIZE] =
            wire.message_key.as_slice().try_into().map_err(|_| {
                ProtocolError::field_length("k", MESSAGE_KEY_SIZE, wire.message_key.len())
            })?;

        let block = Self { body_hash, message_key, sequence_number: wire.sequence_number };

        let canonical = block.to_vec()?;
        let padding_ok = padded.starts_with(&canonical)
            && padded[canonical.len()..].iter().all(|&b| b == 0);
        if !padding_ok {
            return Err(ProtocolError::InvalidField {
                field: "secret",
                reason: "non-canonical encoding or non-zero padding".to_string(),
            });
        }

        Ok(block)
    }
}
