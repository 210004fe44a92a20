//! Identity-based encryption and signature scheme contracts.
//!
//! A party's public key is its [`HashedIdentity`]: authority, principal hash
//! and temporal frame. Schemes are pluggable and deterministic. Randomness is
//! an explicit input.

use sealpost_proto::HashedIdentity;

use crate::{
    error::SchemeError,
    keys::{ConversationKey, SymmetricKey, UserKey},
};

/// Bytes of caller-supplied entropy consumed per conversation key.
pub const ENTROPY_SIZE: usize = 32;

/// Identity-based encryption of conversation keys.
pub trait EncryptionScheme: Send + Sync {
    /// Extract the decryption key for `identity`.
    ///
    /// # Errors
    ///
    /// - `SchemeError::NoMasterKey` if this instance only has public
    ///   parameters
    fn user_key(&self, identity: &HashedIdentity) -> Result<UserKey, SchemeError>;

    /// Generate a conversation key and wrap it for `recipient`.
    ///
    /// Deterministic in `entropy`.
    fn random_conversation_key(
        &self,
        recipient: &HashedIdentity,
        entropy: &[u8; ENTROPY_SIZE],
    ) -> Result<ConversationKey, SchemeError>;

    /// Unwrap a conversation key with the recipient's user key.
    ///
    /// Fails closed: a key extracted for any other identity or frame, or a
    /// modified ciphertext, is an error.
    fn decrypt_conversation_key(
        &self,
        user_key: &UserKey,
        encrypted: &[u8],
    ) -> Result<SymmetricKey, SchemeError>;
}

/// Identity-based signatures.
pub trait SignatureScheme: Send + Sync {
    /// Extract the signing key for `identity`.
    fn user_key(&self, identity: &HashedIdentity) -> Result<UserKey, SchemeError>;

    /// Sign `data` as `identity`.
    ///
    /// # Errors
    ///
    /// - `SchemeError::KeyMismatch` if `user_key` belongs to another identity
    fn sign(
        &self,
        identity: &HashedIdentity,
        user_key: &UserKey,
        data: &[u8],
    ) -> Result<Vec<u8>, SchemeError>;

    /// Check `signature` over `data` against `identity`.
    fn verify(&self, identity: &HashedIdentity, signature: &[u8], data: &[u8]) -> bool;
}
