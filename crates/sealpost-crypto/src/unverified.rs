//! Deterministic scheme for tests and simulation.
//!
//! Its public parameters double as the master secret, so anyone holding them
//! can extract any identity's keys. Hence "unverified": it exercises every
//! code path of a real identity-based scheme without its security.
//!
//! - User keys: `HKDF-SHA256(params, label || identity bytes)`
//! - Conversation keys: 16 bytes from HKDF over the caller's entropy, wrapped
//!   as `nonce(24) || XChaCha20-Poly1305(user key, nonce, raw, aad = identity)`
//! - Signatures: Ed25519 under a seed derived like a user key

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use hkdf::Hkdf;
use sealpost_proto::HashedIdentity;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    error::SchemeError,
    keys::{ConversationKey, MasterKey, SYMMETRIC_KEY_SIZE, SymmetricKey, UserKey},
    scheme::{ENTROPY_SIZE, EncryptionScheme, SignatureScheme},
};

const ENCRYPTION_LABEL: &[u8] = b"sealpostIbeV1";
const SIGNATURE_LABEL: &[u8] = b"sealpostIbsV1";
const CONVERSATION_KEY_LABEL: &[u8] = b"sealpostConversationKey";
const CONVERSATION_NONCE_LABEL: &[u8] = b"sealpostConversationNonce";

const NONCE_SIZE: usize = 24;

/// Fixed public test parameters.
const TEST_PARAMETERS: [u8; 32] = *b"sealpost unverified test params!";

/// Deterministic encryption and signature scheme.
#[derive(Debug, Clone)]
pub struct UnverifiedScheme {
    params: MasterKey,
    has_master: bool,
}

impl UnverifiedScheme {
    /// Scheme over the built-in test parameters, with the master key.
    pub fn with_test_parameters() -> Self {
        Self::with_master_key(MasterKey::new(TEST_PARAMETERS))
    }

    /// Scheme able to extract user keys.
    pub fn with_master_key(master: MasterKey) -> Self {
        Self { params: master, has_master: true }
    }

    /// Scheme holding only public parameters: it can wrap keys and verify
    /// signatures but [`EncryptionScheme::user_key`] fails with
    /// `NoMasterKey`.
    pub fn from_public_parameters(params: impl Into<Vec<u8>>) -> Self {
        Self { params: MasterKey::new(params), has_master: false }
    }

    /// Public parameters of the built-in test setup.
    pub fn test_parameters() -> [u8; 32] {
        TEST_PARAMETERS
    }

    fn derive(&self, label: &[u8], identity: &HashedIdentity) -> [u8; 32] {
        let hkdf = Hkdf::<Sha256>::new(None, self.params.as_bytes());

        let mut info = Vec::with_capacity(label.len() + 41);
        info.extend_from_slice(label);
        info.extend_from_slice(&identity.to_bytes());

        let mut out = [0u8; 32];
        let Ok(()) = hkdf.expand(&info, &mut out) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };
        out
    }

    fn extract(&self, label: &[u8], identity: &HashedIdentity) -> Result<UserKey, SchemeError> {
        if !self.has_master {
            return Err(SchemeError::NoMasterKey);
        }
        let mut seed = self.derive(label, identity);
        let key = UserKey::new(*identity, seed.to_vec());
        seed.zeroize();
        Ok(key)
    }

    fn signing_key(seed: &[u8]) -> Result<SigningKey, SchemeError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| SchemeError::InvalidKey { reason: format!("signing seed is {} bytes", seed.len()) })?;
        Ok(SigningKey::from_bytes(&seed))
    }
}

impl EncryptionScheme for UnverifiedScheme {
    fn user_key(&self, identity: &HashedIdentity) -> Result<UserKey, SchemeError> {
        self.extract(ENCRYPTION_LABEL, identity)
    }

    fn random_conversation_key(
        &self,
        recipient: &HashedIdentity,
        entropy: &[u8; ENTROPY_SIZE],
    ) -> Result<ConversationKey, SchemeError> {
        let hkdf = Hkdf::<Sha256>::new(None, entropy);
        let mut raw = [0u8; SYMMETRIC_KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        let Ok(()) = hkdf.expand(CONVERSATION_KEY_LABEL, &mut raw) else {
            unreachable!("16 bytes is a valid HKDF-SHA256 output length");
        };
        let Ok(()) = hkdf.expand(CONVERSATION_NONCE_LABEL, &mut nonce) else {
            unreachable!("24 bytes is a valid HKDF-SHA256 output length");
        };

        let mut wrapping_key = self.derive(ENCRYPTION_LABEL, recipient);
        let cipher = XChaCha20Poly1305::new((&wrapping_key).into());
        wrapping_key.zeroize();

        let aad = recipient.to_bytes();
        let Ok(sealed) = cipher.encrypt(XNonce::from_slice(&nonce), Payload { msg: &raw, aad: &aad })
        else {
            unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };

        let mut encrypted = Vec::with_capacity(NONCE_SIZE + sealed.len());
        encrypted.extend_from_slice(&nonce);
        encrypted.extend_from_slice(&sealed);

        let key = ConversationKey { raw: SymmetricKey::new(raw), encrypted };
        raw.zeroize();
        Ok(key)
    }

    fn decrypt_conversation_key(
        &self,
        user_key: &UserKey,
        encrypted: &[u8],
    ) -> Result<SymmetricKey, SchemeError> {
        if encrypted.len() < NONCE_SIZE {
            return Err(SchemeError::DecryptionFailed {
                reason: format!("wrapped key is {} bytes", encrypted.len()),
            });
        }
        let key_bytes: &[u8; 32] = user_key
            .as_bytes()
            .try_into()
            .map_err(|_| SchemeError::InvalidKey { reason: "user key is not 32 bytes".to_string() })?;

        let (nonce, sealed) = encrypted.split_at(NONCE_SIZE);
        let cipher = XChaCha20Poly1305::new(key_bytes.into());
        let aad = user_key.identity().to_bytes();

        let mut raw = cipher
            .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad: &aad })
            .map_err(|_| SchemeError::DecryptionFailed { reason: "authentication failed".to_string() })?;

        let key = SymmetricKey::from_slice(&raw).ok_or_else(|| SchemeError::DecryptionFailed {
            reason: format!("conversation key is {} bytes", raw.len()),
        });
        raw.zeroize();
        key
    }
}

impl SignatureScheme for UnverifiedScheme {
    fn user_key(&self, identity: &HashedIdentity) -> Result<UserKey, SchemeError> {
        self.extract(SIGNATURE_LABEL, identity)
    }

    fn sign(
        &self,
        identity: &HashedIdentity,
        user_key: &UserKey,
        data: &[u8],
    ) -> Result<Vec<u8>, SchemeError> {
        if user_key.identity() != identity {
            return Err(SchemeError::KeyMismatch {
                key: user_key.identity().to_string(),
                requested: identity.to_string(),
            });
        }
        let signing_key = Self::signing_key(user_key.as_bytes())?;
        Ok(signing_key.sign(data).to_bytes().to_vec())
    }

    fn verify(&self, identity: &HashedIdentity, signature: &[u8], data: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        let mut seed = self.derive(SIGNATURE_LABEL, identity);
        let verifying_key = SigningKey::from_bytes(&seed).verifying_key();
        seed.zeroize();

        verifying_key.verify(data, &signature).is_ok()
    }
}
