//! Key material wrappers.
//!
//! Every type here zeroizes its bytes on drop and redacts them from `Debug`.

use std::fmt;

use sealpost_proto::HashedIdentity;
use zeroize::Zeroize;

/// AES-128 key size.
pub const SYMMETRIC_KEY_SIZE: usize = 16;

/// AES-128 key for conversation keys and message keys.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse from a slice of exactly [`SYMMETRIC_KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Scheme master secret, able to extract any identity's user key.
#[derive(Clone)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    /// Wrap master secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw master secret.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Private key extracted for one identity at one temporal frame.
///
/// Opaque to everything but the scheme that produced it. The identity is kept
/// alongside so that schemes can refuse a key used for the wrong identity.
#[derive(Clone, PartialEq, Eq)]
pub struct UserKey {
    identity: HashedIdentity,
    bytes: Vec<u8>,
}

impl UserKey {
    /// Wrap scheme-specific key bytes for `identity`.
    pub fn new(identity: HashedIdentity, bytes: impl Into<Vec<u8>>) -> Self {
        Self { identity, bytes: bytes.into() }
    }

    /// Identity (including frame) this key was extracted for.
    pub const fn identity(&self) -> &HashedIdentity {
        &self.identity
    }

    /// Scheme-specific key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserKey")
            .field("identity", &self.identity)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl Drop for UserKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Freshly generated conversation key and its wrapped form.
#[derive(Debug, Clone)]
pub struct ConversationKey {
    /// Symmetric key protecting secret blocks for one recipient
    pub raw: SymmetricKey,
    /// `raw` wrapped for the recipient identity
    pub encrypted: Vec<u8>,
}
