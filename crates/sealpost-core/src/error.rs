//! Error types for the envelope codec.
//!
//! Three layers, from most to least specific:
//!
//! - [`DiscardMessage`]: this envelope will never be accepted. Drop it and
//!   move on; nothing else is affected.
//! - [`NeedsKey`]: a user key is missing. Fetch it and retry the same
//!   message.
//! - [`TransportError`]: everything the codec can return, including store,
//!   scheme and provider failures and caller mistakes.

use sealpost_crypto::{ProviderError, SchemeError};
use sealpost_proto::{DeviceId, HashedIdentity};
use thiserror::Error;

use crate::store::StoreError;

/// Reasons to drop an envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscardMessage {
    /// An identity uses an authority that cannot send or receive
    #[error("invalid authority for {identity}")]
    InvalidAuthority {
        /// Offending identity
        identity: HashedIdentity,
    },

    /// None of the recipient blocks belong to us
    #[error("message is not addressed to any local identity")]
    NotToMe,

    /// Envelope was already processed
    #[error("duplicate envelope {} from device {device}", hex::encode(.hash))]
    Duplicate {
        /// SHA-256 of the raw envelope
        hash: [u8; 32],
        /// Sending device
        device: DeviceId,
    },

    /// Sender is blacklisted
    #[error("sender {identity} is blacklisted")]
    Blacklist {
        /// Sender identity
        identity: HashedIdentity,
    },

    /// Envelope could not be parsed or decrypted
    #[error("corrupted envelope: {reason}")]
    Corrupted {
        /// What failed
        reason: String,
    },

    /// Key binding or body hash did not verify
    #[error("bad signature: {reason}")]
    BadSignature {
        /// What failed
        reason: String,
    },

    /// Body decrypted but is not a well-formed application object
    #[error("bad object format: {reason}")]
    BadObjFormat {
        /// What failed
        reason: String,
    },
}

impl DiscardMessage {
    pub(crate) fn corrupted(reason: impl std::fmt::Display) -> Self {
        Self::Corrupted { reason: reason.to_string() }
    }

    pub(crate) fn bad_signature(reason: impl std::fmt::Display) -> Self {
        Self::BadSignature { reason: reason.to_string() }
    }
}

/// A user key required to continue is not in the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NeedsKey {
    /// Signing key for a sending identity
    #[error("missing signature key for {identity}")]
    Signature {
        /// Identity (at its signature epoch) lacking a key
        identity: HashedIdentity,
    },

    /// Decryption key for a receiving identity
    #[error("missing encryption key for {identity}")]
    Encryption {
        /// Identity (at the envelope's frame) lacking a key
        identity: HashedIdentity,
    },
}

impl NeedsKey {
    /// Identity whose key is missing.
    pub const fn identity(&self) -> &HashedIdentity {
        match self {
            Self::Signature { identity } | Self::Encryption { identity } => identity,
        }
    }
}

/// Any failure of an encode, decode or key fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Envelope must be dropped
    #[error(transparent)]
    Discard(#[from] DiscardMessage),

    /// Retry once the key is available
    #[error(transparent)]
    NeedsKey(#[from] NeedsKey),

    /// Secret store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Identity-based scheme failure while producing output
    #[error("scheme error: {0}")]
    Scheme(#[from] SchemeError),

    /// Identity provider failure
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Caller passed a message that cannot be encoded
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// What is wrong with it
        reason: String,
    },

    /// Codec configuration is unusable
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong with it
        reason: String,
    },
}

impl TransportError {
    /// Whether retrying later (possibly after fetching keys) can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NeedsKey(_) => true,
            Self::Store(err) => err.is_transient(),
            Self::Provider(err) => err.is_transient(),
            Self::Discard(_)
            | Self::Scheme(_)
            | Self::InvalidMessage { .. }
            | Self::Config { .. } => false,
        }
    }

    /// The discard reason, if this error means the envelope is dropped.
    pub const fn as_discard(&self) -> Option<&DiscardMessage> {
        match self {
            Self::Discard(reason) => Some(reason),
            _ => None,
        }
    }

    pub(crate) fn invalid_message(reason: impl std::fmt::Display) -> Self {
        Self::InvalidMessage { reason: reason.to_string() }
    }
}
