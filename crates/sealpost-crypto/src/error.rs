//! Error types for cryptographic operations.

use thiserror::Error;

/// Symmetric layer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Ciphertext could not be decrypted or its padding is invalid
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// What went wrong
        reason: String,
    },
}

/// Identity-based scheme failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    /// User key extraction needs the master key, which this scheme lacks
    #[error("no master key available")]
    NoMasterKey,

    /// Key does not belong to the identity it was used for
    #[error("user key mismatch: key is for {key}, operation is for {requested}")]
    KeyMismatch {
        /// Identity the key was extracted for
        key: String,
        /// Identity the operation targeted
        requested: String,
    },

    /// Wrapped conversation key could not be unwrapped
    #[error("conversation key decryption failed: {reason}")]
    DecryptionFailed {
        /// What went wrong
        reason: String,
    },

    /// Key bytes are malformed
    #[error("invalid key material: {reason}")]
    InvalidKey {
        /// What was wrong with the key
        reason: String,
    },
}

/// Failures fetching user keys from an identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider rejected our credentials
    #[error("authentication failed: {reason}")]
    Auth {
        /// Provider's explanation
        reason: String,
    },

    /// Transient failure, the same request may succeed later
    #[error("provider unavailable, retry: {reason}")]
    NeedsRetry {
        /// Provider's explanation
        reason: String,
    },

    /// Provider sent an out-of-band challenge that must complete first
    #[error("two-phase verification pending: {reason}")]
    TwoPhase {
        /// Provider's explanation
        reason: String,
    },

    /// Local key derivation failed
    #[error(transparent)]
    Scheme(#[from] SchemeError),
}

impl ProviderError {
    /// Whether retrying the same request can succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NeedsRetry { .. })
    }
}
