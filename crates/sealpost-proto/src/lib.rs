//! Wire format for sealpost message envelopes.
//!
//! An envelope is a CBOR map with single-letter field names. It carries a
//! shared IV, the sender's hashed identity and device, one block per recipient
//! (identity, wrapped conversation key, key-binding signature and an encrypted
//! secret block) and the encrypted body.
//!
//! Identities never travel in the clear. Every identity on the wire is a
//! [`HashedIdentity`]: an authority tag, the SHA-256 of the principal and the
//! temporal frame the key material belongs to.
//!
//! # Security
//!
//! Decoding enforces a size limit before CBOR parsing and validates every
//! fixed-size field. A decoded envelope is structurally valid only; nothing in
//! this crate authenticates or decrypts it.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod identity;
pub mod object;
pub mod secret;

pub use envelope::{DeviceId, Envelope, RecipientBlock, SenderBlock};
pub use errors::{ProtocolError, Result};
pub use identity::{Authority, HashedIdentity, Identity, StableKey};
pub use object::AppObject;
pub use secret::SecretBlock;
