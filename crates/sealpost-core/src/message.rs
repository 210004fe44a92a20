//! Message types on either side of the codec.

use sealpost_crypto::sha256;
use sealpost_proto::{AppObject, DeviceId, HashedIdentity};

use crate::{
    error::DiscardMessage,
    store::{DeviceRecordId, IdentityRecordId, SequenceStatus},
};

/// Row id of an envelope in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedId(pub u64);

/// Application message to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sending persona (any frame; rebound to its signature epoch)
    pub from: HashedIdentity,
    /// Recipients (any frame; rebound to their encryption epochs)
    pub recipients: Vec<HashedIdentity>,
    /// Plaintext body
    pub data: Vec<u8>,
    /// SHA-256 of `data`
    pub hash: [u8; 32],
    /// Hide the recipient list from recipients
    pub blind: bool,
    /// Application namespace
    pub app: Vec<u8>,
}

impl OutgoingMessage {
    /// Non-blind message; computes the data hash.
    pub fn new(
        from: HashedIdentity,
        recipients: Vec<HashedIdentity>,
        data: Vec<u8>,
        app: impl Into<Vec<u8>>,
    ) -> Self {
        let hash = sha256(&data);
        Self { from, recipients, data, hash, blind: false, app: app.into() }
    }

    /// Message whose body is an encoded [`AppObject`].
    pub fn with_object(
        from: HashedIdentity,
        recipients: Vec<HashedIdentity>,
        object: &AppObject,
        app: impl Into<Vec<u8>>,
    ) -> Result<Self, crate::TransportError> {
        let data = object.to_vec().map_err(crate::TransportError::invalid_message)?;
        Ok(Self::new(from, recipients, data, app))
    }

    /// Mark the message blind.
    #[must_use]
    pub fn blind(mut self) -> Self {
        self.blind = true;
        self
    }
}

/// Sequence number observed for one persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaSequence {
    /// Persona the secret block was addressed to
    pub persona: HashedIdentity,
    /// Sequence number the sender assigned
    pub sequence_number: i64,
    /// How it relates to earlier messages from the same device
    pub status: SequenceStatus,
}

/// Successfully decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Envelope row this came from
    pub id: EncodedId,
    /// Our identities the envelope was addressed to, in envelope order
    pub personas: Vec<HashedIdentity>,
    /// Sender identity as declared on the wire
    pub from_identity: HashedIdentity,
    /// Sender identity row
    pub from_identity_record: IdentityRecordId,
    /// Sending device
    pub from_device: DeviceId,
    /// Sending device row
    pub from_device_record: DeviceRecordId,
    /// Full recipient list, or only `personas` for blind messages
    pub recipients: Vec<HashedIdentity>,
    /// SHA-256 of the raw envelope
    pub hash: [u8; 32],
    /// Decrypted body
    pub data: Vec<u8>,
    /// One entry per persona, same order as `personas`
    pub sequences: Vec<PersonaSequence>,
    /// Whether the recipient list was hidden
    pub blind: bool,
    /// Application namespace
    pub app: Vec<u8>,
}

impl IncomingMessage {
    /// Sequence number assigned to the first persona.
    pub fn sequence_number(&self) -> i64 {
        self.sequences.first().map_or(0, |s| s.sequence_number)
    }

    /// Sequence status of the first persona.
    pub fn sequence_status(&self) -> SequenceStatus {
        self.sequences.first().map_or(SequenceStatus::First, |s| s.status)
    }

    /// Parse the body as an [`AppObject`].
    ///
    /// # Errors
    ///
    /// - `DiscardMessage::BadObjFormat` if the body is not a valid object
    pub fn object(&self) -> Result<AppObject, DiscardMessage> {
        AppObject::decode(&self.data)
            .map_err(|e| DiscardMessage::BadObjFormat { reason: e.to_string() })
    }
}

/// What the store knows about a processed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMetadata {
    /// Sender identity
    pub from_identity: HashedIdentity,
    /// Sending device
    pub from_device: DeviceId,
    /// SHA-256 of the envelope bytes
    pub hash: [u8; 32],
    /// First 8 bytes of `hash`, big-endian
    pub short_hash: u64,
    /// Whether the envelope was fully handled
    pub processed: bool,
}

/// Envelope row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// Row id
    pub id: EncodedId,
    /// Serialized envelope
    pub encoded: Vec<u8>,
    /// Whether we produced it
    pub outbound: bool,
    /// Filled in once the envelope is encoded or successfully decoded
    pub metadata: Option<EncodedMetadata>,
}
