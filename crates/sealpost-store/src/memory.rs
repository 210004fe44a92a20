#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use sealpost_core::{
    DeviceRecordId, EncodedId, EncodedMessage, EncodedMetadata, IdentityClaim, IdentityRecordId,
    IncomingSecret, IncomingSecretKey, NewEncoded, OutgoingSecret, OutgoingSecretKey,
    SecretStore, SequenceStatus, StoreError, StoreTransaction,
};
use sealpost_crypto::{EncryptionScheme, SignatureScheme, UnverifiedScheme, UserKey};
use sealpost_proto::{DeviceId, HashedIdentity, StableKey};

/// In-memory secret store for testing and simulation
///
/// All state sits behind one `Arc<Mutex<>>`, so clones share it. A
/// transaction holds the lock from `begin` until it is committed or dropped,
/// which serializes transactions against each other and against every other
/// method. Poisoned locks surface as `StoreError::Io`.
///
/// Epochs: every identity signs and is encrypted to at the store's current
/// frame unless an encryption epoch override is set for it.
#[derive(Clone)]
pub struct MemoryStore {
    device: DeviceId,
    encryption: Arc<dyn EncryptionScheme>,
    signature: Arc<dyn SignatureScheme>,
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    current_frame: i64,
    encryption_epochs: HashMap<StableKey, i64>,

    signature_keys: HashMap<HashedIdentity, UserKey>,
    encryption_keys: HashMap<HashedIdentity, UserKey>,

    outgoing: HashMap<OutgoingSecretKey, OutgoingSecret>,
    incoming: HashMap<IncomingSecretKey, IncomingSecret>,

    owned: HashSet<StableKey>,
    identities: HashMap<StableKey, IdentityRow>,
    next_identity_id: u64,
    devices: HashMap<(IdentityRecordId, DeviceId), DeviceRecordId>,
    next_device_id: u64,
    blacklist: HashSet<IdentityRecordId>,

    encoded: BTreeMap<EncodedId, EncodedMessage>,
    next_encoded_id: u64,
    claimed_hashes: HashMap<[u8; 32], EncodedId>,

    /// Next sequence number to assign per (sender, recipient)
    outbound_sequences: HashMap<(StableKey, StableKey), i64>,
    /// Highest sequence number seen per (device, persona)
    received_sequences: HashMap<(DeviceRecordId, IdentityRecordId), i64>,
}

struct IdentityRow {
    id: IdentityRecordId,
    claimed: bool,
}

impl MemoryStore {
    /// Empty store for `device` using the given schemes.
    pub fn new(
        device: DeviceId,
        encryption: Arc<dyn EncryptionScheme>,
        signature: Arc<dyn SignatureScheme>,
    ) -> Self {
        Self {
            device,
            encryption,
            signature,
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                next_identity_id: 1,
                next_device_id: 1,
                next_encoded_id: 1,
                ..MemoryStoreInner::default()
            })),
        }
    }

    /// Empty store using [`UnverifiedScheme::with_test_parameters`].
    pub fn unverified(device: DeviceId) -> Self {
        let scheme = Arc::new(UnverifiedScheme::with_test_parameters());
        Self::new(device, scheme.clone(), scheme)
    }

    /// Mark `identity` (any frame) as one of our personas.
    pub fn add_owned(&self, identity: &HashedIdentity) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.owned.insert(identity.stable_key());
        inner.ensure_identity(identity, IdentityClaim::Claimed);
        Ok(())
    }

    /// Set the frame used for all signature and encryption epochs.
    pub fn set_frame(&self, frame: i64) -> Result<(), StoreError> {
        self.lock()?.current_frame = frame;
        Ok(())
    }

    /// Encrypt to `identity` at `frame` regardless of the current frame.
    pub fn set_encryption_epoch(&self, identity: &HashedIdentity, frame: i64) -> Result<(), StoreError> {
        self.lock()?.encryption_epochs.insert(identity.stable_key(), frame);
        Ok(())
    }

    /// Refuse all further messages from `identity`.
    pub fn blacklist(&self, identity: &HashedIdentity) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let id = inner.ensure_identity(identity, IdentityClaim::Unclaimed);
        inner.blacklist.insert(id);
        Ok(())
    }

    /// Stored envelope row.
    pub fn encoded(&self, id: EncodedId) -> Result<Option<EncodedMessage>, StoreError> {
        Ok(self.lock()?.encoded.get(&id).cloned())
    }

    /// Number of envelope rows, inbound and outbound.
    pub fn encoded_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.encoded.len())
    }

    /// Outbound envelope rows in insertion order.
    pub fn outbound(&self) -> Result<Vec<EncodedMessage>, StoreError> {
        Ok(self.lock()?.encoded.values().filter(|m| m.outbound).cloned().collect())
    }

    /// Number of cached (outgoing, incoming) conversation secrets.
    pub fn secret_counts(&self) -> Result<(usize, usize), StoreError> {
        let inner = self.lock()?;
        Ok((inner.outgoing.len(), inner.incoming.len()))
    }

    /// Next sequence number `sender` would assign to `recipient`.
    pub fn next_sequence_for(
        &self,
        sender: &HashedIdentity,
        recipient: &HashedIdentity,
    ) -> Result<i64, StoreError> {
        let key = (sender.stable_key(), recipient.stable_key());
        Ok(self.lock()?.outbound_sequences.get(&key).copied().unwrap_or(0))
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Io("memory store mutex poisoned".to_string()))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("device", &self.device).finish_non_exhaustive()
    }
}

impl MemoryStoreInner {
    fn ensure_identity(&mut self, identity: &HashedIdentity, claim: IdentityClaim) -> IdentityRecordId {
        let next_id = &mut self.next_identity_id;
        let row = self.identities.entry(identity.stable_key()).or_insert_with(|| {
            let id = IdentityRecordId(*next_id);
            *next_id += 1;
            IdentityRow { id, claimed: false }
        });
        if claim == IdentityClaim::Claimed {
            row.claimed = true;
        }
        row.id
    }

    fn allocate_encoded_id(&mut self) -> EncodedId {
        let id = EncodedId(self.next_encoded_id);
        self.next_encoded_id += 1;
        id
    }
}

impl SecretStore for MemoryStore {
    fn encryption_scheme(&self) -> &dyn EncryptionScheme {
        self.encryption.as_ref()
    }

    fn signature_scheme(&self) -> &dyn SignatureScheme {
        self.signature.as_ref()
    }

    fn device_id(&self) -> DeviceId {
        self.device
    }

    fn signature_epoch(&self, _identity: &HashedIdentity) -> Result<i64, StoreError> {
        Ok(self.lock()?.current_frame)
    }

    fn encryption_epoch(&self, identity: &HashedIdentity) -> Result<i64, StoreError> {
        let inner = self.lock()?;
        Ok(inner.encryption_epochs.get(&identity.stable_key()).copied().unwrap_or(inner.current_frame))
    }

    fn signature_key(&self, identity: &HashedIdentity) -> Result<Option<UserKey>, StoreError> {
        Ok(self.lock()?.signature_keys.get(identity).cloned())
    }

    fn encryption_key(&self, identity: &HashedIdentity) -> Result<Option<UserKey>, StoreError> {
        Ok(self.lock()?.encryption_keys.get(identity).cloned())
    }

    fn store_signature_key(&self, key: UserKey) -> Result<(), StoreError> {
        self.lock()?.signature_keys.insert(*key.identity(), key);
        Ok(())
    }

    fn store_encryption_key(&self, key: UserKey) -> Result<(), StoreError> {
        self.lock()?.encryption_keys.insert(*key.identity(), key);
        Ok(())
    }

    fn lookup_outgoing_secret(
        &self,
        key: &OutgoingSecretKey,
    ) -> Result<Option<OutgoingSecret>, StoreError> {
        Ok(self.lock()?.outgoing.get(key).cloned())
    }

    fn insert_outgoing_secret_if_absent(
        &self,
        secret: OutgoingSecret,
    ) -> Result<OutgoingSecret, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.outgoing.entry(secret.cache_key()).or_insert(secret).clone())
    }

    fn lookup_incoming_secret(
        &self,
        key: &IncomingSecretKey,
    ) -> Result<Option<IncomingSecret>, StoreError> {
        Ok(self.lock()?.incoming.get(key).cloned())
    }

    fn insert_incoming_secret_if_absent(
        &self,
        secret: IncomingSecret,
    ) -> Result<IncomingSecret, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.incoming.entry(secret.id.clone()).or_insert(secret).clone())
    }

    fn is_owned(&self, identity: &HashedIdentity) -> Result<bool, StoreError> {
        Ok(self.lock()?.owned.contains(&identity.stable_key()))
    }

    fn ensure_identity(
        &self,
        identity: &HashedIdentity,
        claim: IdentityClaim,
    ) -> Result<IdentityRecordId, StoreError> {
        Ok(self.lock()?.ensure_identity(identity, claim))
    }

    fn ensure_device(
        &self,
        identity: IdentityRecordId,
        device: DeviceId,
    ) -> Result<DeviceRecordId, StoreError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if !inner.identities.values().any(|row| row.id == identity) {
            return Err(StoreError::NotFound { what: format!("identity record {}", identity.0) });
        }
        let next_id = &mut inner.next_device_id;
        let id = *inner.devices.entry((identity, device)).or_insert_with(|| {
            let id = DeviceRecordId(*next_id);
            *next_id += 1;
            id
        });
        Ok(id)
    }

    fn is_blacklisted(&self, identity: IdentityRecordId) -> Result<bool, StoreError> {
        Ok(self.lock()?.blacklist.contains(&identity))
    }

    fn have_hash(&self, hash: &[u8; 32]) -> Result<bool, StoreError> {
        Ok(self.lock()?.claimed_hashes.contains_key(hash))
    }

    fn insert_received(&self, encoded: Vec<u8>) -> Result<EncodedMessage, StoreError> {
        let mut inner = self.lock()?;
        let id = inner.allocate_encoded_id();
        let row = EncodedMessage { id, encoded, outbound: false, metadata: None };
        inner.encoded.insert(id, row.clone());
        Ok(row)
    }

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let inner = self.lock()?;
        let next_encoded_id = inner.next_encoded_id;
        Ok(Box::new(MemoryTransaction { inner, staged: Staged { next_encoded_id, ..Staged::default() } }))
    }
}

/// Writes held back until commit.
#[derive(Default)]
struct Staged {
    outbound_sequences: HashMap<(StableKey, StableKey), i64>,
    encoded: BTreeMap<EncodedId, EncodedMessage>,
    next_encoded_id: u64,
    claimed_hashes: HashMap<[u8; 32], EncodedId>,
    received_sequences: HashMap<(DeviceRecordId, IdentityRecordId), i64>,
    metadata: Vec<(EncodedId, EncodedMetadata)>,
}

struct MemoryTransaction<'a> {
    inner: MutexGuard<'a, MemoryStoreInner>,
    staged: Staged,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn next_sequence_number(
        &mut self,
        sender: &HashedIdentity,
        recipient: &HashedIdentity,
    ) -> Result<i64, StoreError> {
        let key = (sender.stable_key(), recipient.stable_key());
        let current = match self.staged.outbound_sequences.get(&key) {
            Some(&staged) => staged,
            None => self.inner.outbound_sequences.get(&key).copied().unwrap_or(0),
        };
        let next = current.checked_add(1).ok_or_else(|| StoreError::Conflict {
            reason: format!("sequence counter from {sender} to {recipient} exhausted"),
        })?;
        self.staged.outbound_sequences.insert(key, next);
        Ok(current)
    }

    fn insert_encoded(&mut self, row: NewEncoded) -> Result<EncodedId, StoreError> {
        let id = EncodedId(self.staged.next_encoded_id);
        self.staged.next_encoded_id += 1;
        self.staged.encoded.insert(
            id,
            EncodedMessage { id, encoded: row.encoded, outbound: row.outbound, metadata: row.metadata },
        );
        Ok(id)
    }

    fn claim_hash(&mut self, hash: [u8; 32], id: EncodedId) -> Result<bool, StoreError> {
        if self.inner.claimed_hashes.contains_key(&hash) || self.staged.claimed_hashes.contains_key(&hash) {
            return Ok(false);
        }
        self.staged.claimed_hashes.insert(hash, id);
        Ok(true)
    }

    fn record_received_sequence(
        &mut self,
        device: DeviceRecordId,
        persona: IdentityRecordId,
        sequence: i64,
    ) -> Result<SequenceStatus, StoreError> {
        let key = (device, persona);
        let latest = self
            .staged
            .received_sequences
            .get(&key)
            .or_else(|| self.inner.received_sequences.get(&key))
            .copied();

        let status = SequenceStatus::classify(latest, sequence);
        self.staged.received_sequences.insert(key, latest.map_or(sequence, |l| l.max(sequence)));
        Ok(status)
    }

    fn update_encoded_metadata(
        &mut self,
        id: EncodedId,
        metadata: EncodedMetadata,
    ) -> Result<(), StoreError> {
        if !self.inner.encoded.contains_key(&id) && !self.staged.encoded.contains_key(&id) {
            return Err(StoreError::NotFound { what: format!("encoded message {}", id.0) });
        }
        self.staged.metadata.push((id, metadata));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { mut inner, staged } = *self;

        inner.outbound_sequences.extend(staged.outbound_sequences);
        inner.encoded.extend(staged.encoded);
        inner.next_encoded_id = inner.next_encoded_id.max(staged.next_encoded_id);
        inner.claimed_hashes.extend(staged.claimed_hashes);
        inner.received_sequences.extend(staged.received_sequences);
        for (id, metadata) in staged.metadata {
            if let Some(row) = inner.encoded.get_mut(&id) {
                row.metadata = Some(metadata);
            }
        }
        Ok(())
    }
}
