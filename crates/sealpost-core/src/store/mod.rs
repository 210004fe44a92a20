//! Secret store contract.
//!
//! Everything the codec persists goes through [`SecretStore`]: user keys,
//! cached conversation secrets, identity and device rows, sequence counters
//! and the envelope table. The trait is synchronous and object safe; the codec
//! only ever sees `&dyn SecretStore`.
//!
//! # Transactions
//!
//! [`SecretStore::begin`] returns a [`StoreTransaction`] guard. Its effects
//! become visible only on [`StoreTransaction::commit`]; dropping the guard
//! discards them. While a transaction is open the caller must not call other
//! `SecretStore` methods, since an implementation may hold its lock for the
//! life of the guard.
//!
//! # Secret cache
//!
//! Conversation secrets are computed at most once per pair in the common case.
//! Two callers racing on a miss may both compute one, but
//! `insert_*_secret_if_absent` persists only the first and returns it to
//! every caller, so all envelopes for a pair agree on one key.

mod error;

pub use error::StoreError;
use sealpost_crypto::{EncryptionScheme, SignatureScheme, SymmetricKey, UserKey};
use sealpost_proto::{DeviceId, HashedIdentity};

use crate::message::{EncodedId, EncodedMessage, EncodedMetadata};

/// Row id of an identity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityRecordId(pub u64);

/// Row id of a device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceRecordId(pub u64);

/// How an identity row should be marked when upserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityClaim {
    /// Seen on the wire, not necessarily a contact
    Unclaimed,
    /// A persona we hold keys for, or a confirmed contact
    Claimed,
}

/// Cache key for a secret we send under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutgoingSecretKey {
    /// Our identity at its signature epoch
    pub me: HashedIdentity,
    /// Recipient at its encryption epoch
    pub you: HashedIdentity,
}

/// Conversation secret for sending from `me` to `you`.
#[derive(Debug, Clone)]
pub struct OutgoingSecret {
    /// Our identity; its frame is the signature epoch
    pub me: HashedIdentity,
    /// Recipient; its frame is the encryption epoch
    pub you: HashedIdentity,
    /// Conversation key
    pub key: SymmetricKey,
    /// `key` wrapped for `you`
    pub encrypted_key: Vec<u8>,
    /// Our signature over `SHA-256(encrypted_key || device)`
    pub signature: Vec<u8>,
}

impl OutgoingSecret {
    /// Cache key this secret is stored under.
    pub const fn cache_key(&self) -> OutgoingSecretKey {
        OutgoingSecretKey { me: self.me, you: self.you }
    }
}

/// Cache key for a secret we received under.
///
/// Includes the wrapped key and its signature so a cached entry is only
/// served for the exact bytes that were verified and unwrapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncomingSecretKey {
    /// Our persona at the envelope's encryption epoch
    pub me: HashedIdentity,
    /// Sender at its signature epoch
    pub you: HashedIdentity,
    /// Sending device
    pub device: DeviceId,
    /// Wrapped conversation key as received
    pub encrypted_key: Vec<u8>,
    /// Key-binding signature as received
    pub signature: Vec<u8>,
}

/// Conversation secret for receiving from `you` on `me`.
#[derive(Debug, Clone)]
pub struct IncomingSecret {
    /// Cache key fields, as verified
    pub id: IncomingSecretKey,
    /// Unwrapped conversation key
    pub key: SymmetricKey,
}

/// Outcome of recording a received sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// First message seen from this device to this persona
    First,
    /// Exactly one past the previous number
    InOrder,
    /// Numbers between the previous one and this one were never seen
    Gap {
        /// Number that should have arrived next
        expected: i64,
        /// Number that did arrive
        received: i64,
    },
    /// At or below the highest number already seen (reordered delivery)
    Stale {
        /// Highest number seen so far
        latest: i64,
        /// Number that arrived
        received: i64,
    },
}

impl SequenceStatus {
    /// Classify `received` against the highest number seen so far.
    pub fn classify(latest: Option<i64>, received: i64) -> Self {
        match latest {
            None => Self::First,
            Some(latest) if latest.checked_add(1) == Some(received) => Self::InOrder,
            Some(latest) if received > latest => Self::Gap { expected: latest + 1, received },
            Some(latest) => Self::Stale { latest, received },
        }
    }

    /// Whether messages may be missing.
    pub const fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }
}

/// Envelope row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEncoded {
    /// Serialized envelope
    pub encoded: Vec<u8>,
    /// Whether we produced it
    pub outbound: bool,
    /// Metadata, if known at insert time
    pub metadata: Option<EncodedMetadata>,
}

/// Persistent state used by the codec.
pub trait SecretStore: Send + Sync {
    /// Scheme used to wrap and unwrap conversation keys.
    fn encryption_scheme(&self) -> &dyn EncryptionScheme;

    /// Scheme used to sign and verify key bindings.
    fn signature_scheme(&self) -> &dyn SignatureScheme;

    /// This device.
    fn device_id(&self) -> DeviceId;

    /// Frame at which `identity` currently signs.
    fn signature_epoch(&self, identity: &HashedIdentity) -> Result<i64, StoreError>;

    /// Frame at which `identity` should currently be encrypted to.
    fn encryption_epoch(&self, identity: &HashedIdentity) -> Result<i64, StoreError>;

    /// Signing key for `identity` at exactly its frame.
    fn signature_key(&self, identity: &HashedIdentity) -> Result<Option<UserKey>, StoreError>;

    /// Decryption key for `identity` at exactly its frame.
    fn encryption_key(&self, identity: &HashedIdentity) -> Result<Option<UserKey>, StoreError>;

    /// Persist a signing key, keyed by its identity and frame.
    fn store_signature_key(&self, key: UserKey) -> Result<(), StoreError>;

    /// Persist a decryption key, keyed by its identity and frame.
    fn store_encryption_key(&self, key: UserKey) -> Result<(), StoreError>;

    /// Cached outgoing secret for the pair.
    fn lookup_outgoing_secret(
        &self,
        key: &OutgoingSecretKey,
    ) -> Result<Option<OutgoingSecret>, StoreError>;

    /// Insert unless a secret for the pair exists. Returns the stored one.
    fn insert_outgoing_secret_if_absent(
        &self,
        secret: OutgoingSecret,
    ) -> Result<OutgoingSecret, StoreError>;

    /// Cached incoming secret for exactly these wire bytes.
    fn lookup_incoming_secret(
        &self,
        key: &IncomingSecretKey,
    ) -> Result<Option<IncomingSecret>, StoreError>;

    /// Insert unless an entry for the key exists. Returns the stored one.
    fn insert_incoming_secret_if_absent(
        &self,
        secret: IncomingSecret,
    ) -> Result<IncomingSecret, StoreError>;

    /// Whether `identity` (ignoring frame) is one of our personas.
    fn is_owned(&self, identity: &HashedIdentity) -> Result<bool, StoreError>;

    /// Upsert an identity row keyed by its stable key.
    ///
    /// `Claimed` upgrades an unclaimed row; `Unclaimed` never downgrades.
    fn ensure_identity(
        &self,
        identity: &HashedIdentity,
        claim: IdentityClaim,
    ) -> Result<IdentityRecordId, StoreError>;

    /// Upsert a device row belonging to `identity`.
    fn ensure_device(
        &self,
        identity: IdentityRecordId,
        device: DeviceId,
    ) -> Result<DeviceRecordId, StoreError>;

    /// Whether messages from `identity` are refused.
    fn is_blacklisted(&self, identity: IdentityRecordId) -> Result<bool, StoreError>;

    /// Whether an envelope with this hash was already accepted.
    fn have_hash(&self, hash: &[u8; 32]) -> Result<bool, StoreError>;

    /// Record raw bytes from the transport, returning the new row.
    fn insert_received(&self, encoded: Vec<u8>) -> Result<EncodedMessage, StoreError>;

    /// Open a transaction.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;
}

/// Scoped group of writes that commit together or not at all.
pub trait StoreTransaction {
    /// Current counter for the (`sender`, `recipient`) pair, then increment.
    ///
    /// Both sides are keyed by stable key, so the counter survives frame
    /// rollover and each local persona numbers its own stream. The first
    /// value for a pair is 0.
    fn next_sequence_number(
        &mut self,
        sender: &HashedIdentity,
        recipient: &HashedIdentity,
    ) -> Result<i64, StoreError>;

    /// Insert an envelope row.
    fn insert_encoded(&mut self, row: NewEncoded) -> Result<EncodedId, StoreError>;

    /// Mark `hash` as accepted by envelope `id`.
    ///
    /// Returns `false` if another envelope already claimed it.
    fn claim_hash(&mut self, hash: [u8; 32], id: EncodedId) -> Result<bool, StoreError>;

    /// Record that `device` sent `sequence` to `persona`.
    fn record_received_sequence(
        &mut self,
        device: DeviceRecordId,
        persona: IdentityRecordId,
        sequence: i64,
    ) -> Result<SequenceStatus, StoreError>;

    /// Replace the metadata of envelope `id`.
    fn update_encoded_metadata(
        &mut self,
        id: EncodedId,
        metadata: EncodedMetadata,
    ) -> Result<(), StoreError>;

    /// Make every staged write visible.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
