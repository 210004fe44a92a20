//! Identity providers: where user keys come from.
//!
//! In deployment a provider authenticates the principal (email round trip,
//! OAuth, SMS code) and returns the user keys for the requested frame. The
//! envelope codec never calls a provider directly. Keys are fetched ahead of
//! time and placed in the secret store.

use std::sync::Arc;

use sealpost_proto::HashedIdentity;

use crate::{
    error::ProviderError,
    keys::UserKey,
    scheme::{EncryptionScheme, SignatureScheme},
};

/// Source of user keys for identities we own.
pub trait IdentityProvider: Send + Sync {
    /// Signing key for `identity`.
    fn signature_key(&self, identity: &HashedIdentity) -> Result<UserKey, ProviderError>;

    /// Decryption key for `identity`.
    fn encryption_key(&self, identity: &HashedIdentity) -> Result<UserKey, ProviderError>;
}

/// Provider that extracts keys locally from a scheme holding the master key.
#[derive(Clone)]
pub struct MasterKeyProvider {
    encryption: Arc<dyn EncryptionScheme>,
    signature: Arc<dyn SignatureScheme>,
}

impl MasterKeyProvider {
    /// Extract through the given schemes.
    pub fn new(encryption: Arc<dyn EncryptionScheme>, signature: Arc<dyn SignatureScheme>) -> Self {
        Self { encryption, signature }
    }
}

impl std::fmt::Debug for MasterKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyProvider").finish_non_exhaustive()
    }
}

impl IdentityProvider for MasterKeyProvider {
    fn signature_key(&self, identity: &HashedIdentity) -> Result<UserKey, ProviderError> {
        Ok(self.signature.user_key(identity)?)
    }

    fn encryption_key(&self, identity: &HashedIdentity) -> Result<UserKey, ProviderError> {
        Ok(self.encryption.user_key(identity)?)
    }
}
