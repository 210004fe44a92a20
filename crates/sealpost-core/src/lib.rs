//! Sealpost envelope codec.
//!
//! Turns an [`OutgoingMessage`] into envelope bytes for any number of
//! identity-addressed recipients and turns received bytes back into an
//! [`IncomingMessage`], or a typed reason to drop them.
//!
//! # Architecture
//!
//! The codec owns no state. Keys, cached conversation secrets, sequence
//! counters and seen-envelope hashes live behind the [`SecretStore`] trait,
//! and randomness comes from an [`Environment`]. Both are injected, so the
//! same pipeline runs against a real database in production and against a
//! seeded in-memory store in simulation.
//!
//! ```text
//! OutgoingMessage ──▶ MessageEncoder ──▶ envelope bytes ──▶ (transport)
//!                          │                                    │
//!                          ▼                                    ▼
//!                     SecretStore  ◀────────────────────  MessageDecoder ──▶ IncomingMessage
//! ```
//!
//! # Failure model
//!
//! Nothing in the pipeline panics on hostile input. Per-message problems are
//! [`DiscardMessage`] reasons, missing keys are [`NeedsKey`] (retry after
//! [`fetch_user_keys`]), and store or scheme failures are surfaced as
//! [`TransportError`]. Store mutations that must happen together run inside a
//! single [`StoreTransaction`] so a failure leaves no partial state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod env;
pub mod error;
pub mod keys;
pub mod message;
pub mod store;

pub use config::CodecConfig;
pub use decoder::MessageDecoder;
pub use encoder::MessageEncoder;
pub use env::{Environment, SystemEnv};
pub use error::{DiscardMessage, NeedsKey, TransportError};
pub use keys::fetch_user_keys;
pub use message::{
    EncodedId, EncodedMessage, EncodedMetadata, IncomingMessage, OutgoingMessage, PersonaSequence,
};
pub use store::{
    DeviceRecordId, IdentityClaim, IdentityRecordId, IncomingSecret, IncomingSecretKey,
    NewEncoded, OutgoingSecret, OutgoingSecretKey, SecretStore, SequenceStatus, StoreError,
    StoreTransaction,
};
