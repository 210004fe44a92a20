//! Moving user keys from an identity provider into the store.

use sealpost_crypto::{IdentityProvider, SchemeError, UserKey};
use sealpost_proto::HashedIdentity;

use crate::{error::TransportError, store::SecretStore};

/// Ensure the store holds the signing key for `identity` at its signature
/// epoch and the decryption key at its encryption epoch.
///
/// Keys already present are not fetched again. Call this after an encode or
/// decode fails with `NeedsKey`, passing the identity the error names; the
/// frame of `identity` is ignored in favour of the store's epochs, except
/// that the decryption key for exactly `identity`'s frame is also fetched so
/// envelopes sealed under an older frame can be opened.
///
/// # Errors
///
/// - `TransportError::Provider` if the provider cannot supply a key
/// - `TransportError::Scheme` if the provider returns a key for a different
///   identity or frame; nothing is stored in that case
/// - `TransportError::Store` if the store cannot persist it
pub fn fetch_user_keys(
    provider: &dyn IdentityProvider,
    store: &dyn SecretStore,
    identity: &HashedIdentity,
) -> Result<(), TransportError> {
    let signing = identity.at(store.signature_epoch(identity)?);
    if store.signature_key(&signing)?.is_none() {
        let key = for_identity(provider.signature_key(&signing)?, &signing)?;
        store.store_signature_key(key)?;
        tracing::debug!(identity = %signing, "Fetched signature key");
    }

    let current = identity.at(store.encryption_epoch(identity)?);
    let mut frames = vec![current];
    if *identity != current {
        frames.push(*identity);
    }
    for target in frames {
        if store.encryption_key(&target)?.is_none() {
            let key = for_identity(provider.encryption_key(&target)?, &target)?;
            store.store_encryption_key(key)?;
            tracing::debug!(identity = %target, "Fetched encryption key");
        }
    }

    Ok(())
}

fn for_identity(key: UserKey, requested: &HashedIdentity) -> Result<UserKey, TransportError> {
    if key.identity() != requested {
        tracing::warn!(key = %key.identity(), requested = %requested, "Provider returned key for wrong identity");
        return Err(SchemeError::KeyMismatch {
            key: key.identity().to_string(),
            requested: requested.to_string(),
        }
        .into());
    }
    Ok(key)
}
