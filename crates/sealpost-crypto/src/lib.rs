//! Sealpost Cryptographic Primitives
//!
//! Building blocks for sealpost envelopes. Everything here is a pure function
//! of its inputs: callers supply random bytes, which keeps encoding
//! deterministic under test.
//!
//! # Key Hierarchy
//!
//! ```text
//! Identity-based scheme (per identity + temporal frame)
//!        │
//!        ▼
//! Conversation Key (per sender/recipient pair, cached by the store)
//!        │  AES-128-CBC, zero padding
//!        ▼
//! Secret Block {body hash, message key, sequence number}
//!        │
//!        ▼
//! Message Key (per message) ── AES-128-CBC, PKCS7 ──▶ Body
//! ```
//!
//! # Security
//!
//! Authenticity does not come from the symmetric layer. The sender signs
//! `SHA-256(encrypted_key || device)` with its identity-based signing key, and
//! the secret block carries a hash over the body and its context that the
//! receiver recomputes and compares in constant time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod digest;
pub mod error;
pub mod keys;
pub mod provider;
pub mod scheme;
pub mod symmetric;
pub mod unverified;

pub use digest::{body_signature_hash, constant_time_eq, key_binding_hash, sha256, short_hash};
pub use error::{CryptoError, ProviderError, SchemeError};
pub use keys::{ConversationKey, MasterKey, SYMMETRIC_KEY_SIZE, SymmetricKey, UserKey};
pub use provider::{IdentityProvider, MasterKeyProvider};
pub use scheme::{ENTROPY_SIZE, EncryptionScheme, SignatureScheme};
pub use unverified::UnverifiedScheme;
