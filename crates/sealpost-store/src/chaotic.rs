//! Chaotic store wrapper for fault injection testing
//!
//! Delegates to an underlying store but fails operations at a configured
//! rate, including operations inside transactions and the commit itself. A
//! failed commit drops the inner transaction, so its writes roll back.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use sealpost_core::{
    DeviceRecordId, EncodedId, EncodedMessage, EncodedMetadata, IdentityClaim, IdentityRecordId,
    IncomingSecret, IncomingSecretKey, NewEncoded, OutgoingSecret, OutgoingSecretKey,
    SecretStore, SequenceStatus, StoreError, StoreTransaction,
};
use sealpost_crypto::{EncryptionScheme, SignatureScheme, UserKey};
use sealpost_proto::{DeviceId, HashedIdentity};

/// Store wrapper that randomly injects `StoreError::Io` failures
///
/// Scheme accessors and `device_id` never fail; every other operation,
/// transactional or not, draws from a seeded LCG so chaos runs are
/// reproducible.
#[derive(Clone)]
pub struct ChaoticStore<S: SecretStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Number of injected failures so far
    failures: Arc<Mutex<usize>>,
}

/// Linear congruential generator for chaos decisions.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: SecretStore> ChaoticStore<S> {
    /// Wrap `inner`, failing with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x5EA1_9057_C4A0_5000)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of failures injected so far.
    pub fn failure_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.failures.lock().expect("failures mutex poisoned")
    }

    /// `Err` with probability `failure_rate`.
    fn chaos(&self, operation: &'static str) -> Result<(), StoreError> {
        #[allow(clippy::expect_used)]
        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if !fail {
            return Ok(());
        }

        #[allow(clippy::expect_used)]
        let mut failures = self.failures.lock().expect("failures mutex poisoned");
        *failures += 1;
        tracing::trace!(operation, "Injected store failure");
        Err(StoreError::Io(format!("chaotic failure injection in {operation}")))
    }
}

impl<S: SecretStore> SecretStore for ChaoticStore<S> {
    fn encryption_scheme(&self) -> &dyn EncryptionScheme {
        self.inner.encryption_scheme()
    }

    fn signature_scheme(&self) -> &dyn SignatureScheme {
        self.inner.signature_scheme()
    }

    fn device_id(&self) -> DeviceId {
        self.inner.device_id()
    }

    fn signature_epoch(&self, identity: &HashedIdentity) -> Result<i64, StoreError> {
        self.chaos("signature_epoch")?;
        self.inner.signature_epoch(identity)
    }

    fn encryption_epoch(&self, identity: &HashedIdentity) -> Result<i64, StoreError> {
        self.chaos("encryption_epoch")?;
        self.inner.encryption_epoch(identity)
    }

    fn signature_key(&self, identity: &HashedIdentity) -> Result<Option<UserKey>, StoreError> {
        self.chaos("signature_key")?;
        self.inner.signature_key(identity)
    }

    fn encryption_key(&self, identity: &HashedIdentity) -> Result<Option<UserKey>, StoreError> {
        self.chaos("encryption_key")?;
        self.inner.encryption_key(identity)
    }

    fn store_signature_key(&self, key: UserKey) -> Result<(), StoreError> {
        self.chaos("store_signature_key")?;
        self.inner.store_signature_key(key)
    }

    fn store_encryption_key(&self, key: UserKey) -> Result<(), StoreError> {
        self.chaos("store_encryption_key")?;
        self.inner.store_encryption_key(key)
    }

    fn lookup_outgoing_secret(
        &self,
        key: &OutgoingSecretKey,
    ) -> Result<Option<OutgoingSecret>, StoreError> {
        self.chaos("lookup_outgoing_secret")?;
        self.inner.lookup_outgoing_secret(key)
    }

    fn insert_outgoing_secret_if_absent(
        &self,
        secret: OutgoingSecret,
    ) -> Result<OutgoingSecret, StoreError> {
        self.chaos("insert_outgoing_secret_if_absent")?;
        self.inner.insert_outgoing_secret_if_absent(secret)
    }

    fn lookup_incoming_secret(
        &self,
        key: &IncomingSecretKey,
    ) -> Result<Option<IncomingSecret>, StoreError> {
        self.chaos("lookup_incoming_secret")?;
        self.inner.lookup_incoming_secret(key)
    }

    fn insert_incoming_secret_if_absent(
        &self,
        secret: IncomingSecret,
    ) -> Result<IncomingSecret, StoreError> {
        self.chaos("insert_incoming_secret_if_absent")?;
        self.inner.insert_incoming_secret_if_absent(secret)
    }

    fn is_owned(&self, identity: &HashedIdentity) -> Result<bool, StoreError> {
        self.chaos("is_owned")?;
        self.inner.is_owned(identity)
    }

    fn ensure_identity(
        &self,
        identity: &HashedIdentity,
        claim: IdentityClaim,
    ) -> Result<IdentityRecordId, StoreError> {
        self.chaos("ensure_identity")?;
        self.inner.ensure_identity(identity, claim)
    }

    fn ensure_device(
        &self,
        identity: IdentityRecordId,
        device: DeviceId,
    ) -> Result<DeviceRecordId, StoreError> {
        self.chaos("ensure_device")?;
        self.inner.ensure_device(identity, device)
    }

    fn is_blacklisted(&self, identity: IdentityRecordId) -> Result<bool, StoreError> {
        self.chaos("is_blacklisted")?;
        self.inner.is_blacklisted(identity)
    }

    fn have_hash(&self, hash: &[u8; 32]) -> Result<bool, StoreError> {
        self.chaos("have_hash")?;
        self.inner.have_hash(hash)
    }

    fn insert_received(&self, encoded: Vec<u8>) -> Result<EncodedMessage, StoreError> {
        self.chaos("insert_received")?;
        self.inner.insert_received(encoded)
    }

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        self.chaos("begin")?;
        let inner = self.inner.begin()?;
        Ok(Box::new(ChaoticTransaction { inner, chaos: self }))
    }
}

struct ChaoticTransaction<'a, S: SecretStore> {
    inner: Box<dyn StoreTransaction + 'a>,
    chaos: &'a ChaoticStore<S>,
}

impl<S: SecretStore> StoreTransaction for ChaoticTransaction<'_, S> {
    fn next_sequence_number(
        &mut self,
        sender: &HashedIdentity,
        recipient: &HashedIdentity,
    ) -> Result<i64, StoreError> {
        self.chaos.chaos("next_sequence_number")?;
        self.inner.next_sequence_number(sender, recipient)
    }

    fn insert_encoded(&mut self, row: NewEncoded) -> Result<EncodedId, StoreError> {
        self.chaos.chaos("insert_encoded")?;
        self.inner.insert_encoded(row)
    }

    fn claim_hash(&mut self, hash: [u8; 32], id: EncodedId) -> Result<bool, StoreError> {
        self.chaos.chaos("claim_hash")?;
        self.inner.claim_hash(hash, id)
    }

    fn record_received_sequence(
        &mut self,
        device: DeviceRecordId,
        persona: IdentityRecordId,
        sequence: i64,
    ) -> Result<SequenceStatus, StoreError> {
        self.chaos.chaos("record_received_sequence")?;
        self.inner.record_received_sequence(device, persona, sequence)
    }

    fn update_encoded_metadata(
        &mut self,
        id: EncodedId,
        metadata: EncodedMetadata,
    ) -> Result<(), StoreError> {
        self.chaos.chaos("update_encoded_metadata")?;
        self.inner.update_encoded_metadata(id, metadata)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.chaos.chaos("commit")?;
        this.inner.commit()
    }
}
