//! Message decoder.
//!
//! Each stage is a possible exit. Cheap structural checks run first and
//! anything touching keys runs last, so hostile input costs as little as
//! possible.
//!
//! | Stage | Failure |
//! |---|---|
//! | Parse envelope | `Corrupted` |
//! | Find our personas | `NotToMe`, `Corrupted` for a future frame |
//! | Resolve sender | `InvalidAuthority`, `Blacklist` |
//! | Seen hash | `Duplicate` |
//! | Validate recipients | `InvalidAuthority` |
//! | Key binding signature | `BadSignature` |
//! | Persona user key | `NeedsKey::Encryption` |
//! | Unwrap conversation key | `Corrupted` |
//! | Open secret block | `Corrupted` |
//! | Decrypt body | `Corrupted` |
//! | Compare body hash | `BadSignature` |
//! | Claim hash on commit | `Duplicate` |
//!
//! The final stage claims the envelope hash, records sequence numbers and
//! marks the row processed in a single transaction.

use sealpost_crypto::{
    SymmetricKey, body_signature_hash, constant_time_eq, key_binding_hash, sha256, short_hash,
    symmetric::{decrypt_pkcs7, decrypt_zero_padded},
};
use sealpost_proto::{DeviceId, Envelope, HashedIdentity, RecipientBlock, SecretBlock};

use crate::{
    config::CodecConfig,
    error::{DiscardMessage, NeedsKey, TransportError},
    message::{EncodedMessage, EncodedMetadata, IncomingMessage, PersonaSequence},
    store::{IdentityClaim, IncomingSecret, IncomingSecretKey, SecretStore},
};

/// Turns received envelopes into messages.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    config: CodecConfig,
}

/// A recipient block addressed to us, opened.
struct OpenedBlock {
    persona: HashedIdentity,
    secret: SecretBlock,
}

impl MessageDecoder {
    /// Decoder with a validated config.
    ///
    /// # Errors
    ///
    /// - `TransportError::Config` if `config` fails validation
    pub fn new(config: CodecConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Config in use.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Record raw transport bytes in the store, then decode them.
    pub fn receive(
        &self,
        store: &dyn SecretStore,
        raw: Vec<u8>,
    ) -> Result<IncomingMessage, TransportError> {
        let row = store.insert_received(raw)?;
        self.decode(store, &row)
    }

    /// Decode a stored envelope row.
    ///
    /// # Errors
    ///
    /// - `TransportError::Discard` when the envelope must be dropped
    /// - `TransportError::NeedsKey` when a persona's decryption key for the
    ///   envelope's frame is missing; retry after fetching it
    /// - `TransportError::Store` on store failures
    pub fn decode(
        &self,
        store: &dyn SecretStore,
        message: &EncodedMessage,
    ) -> Result<IncomingMessage, TransportError> {
        let result = self.decode_envelope(store, message);
        match &result {
            Err(TransportError::Discard(reason)) => {
                tracing::warn!(id = message.id.0, reason = %reason, "Discarded envelope");
            },
            Err(TransportError::NeedsKey(missing)) => {
                tracing::debug!(id = message.id.0, missing = %missing, "Envelope waiting for key");
            },
            Err(_) | Ok(_) => {},
        }
        result
    }

    fn decode_envelope(
        &self,
        store: &dyn SecretStore,
        message: &EncodedMessage,
    ) -> Result<IncomingMessage, TransportError> {
        let raw = message.encoded.as_slice();

        let envelope =
            Envelope::decode(raw, self.config.max_envelope_size).map_err(DiscardMessage::corrupted)?;
        if envelope.version != self.config.envelope_version {
            return Err(DiscardMessage::corrupted(format!(
                "envelope version {} not supported",
                envelope.version
            ))
            .into());
        }

        let mut persona_blocks = Vec::new();
        for block in &envelope.recipients {
            if !store.is_owned(&block.identity)? {
                continue;
            }
            // Key binding does not cover the identity, so a frame from the
            // future can only come from tampering.
            let current = store.encryption_epoch(&block.identity)?;
            if block.identity.temporal_frame() > current {
                return Err(DiscardMessage::corrupted(format!(
                    "recipient block for {} is ahead of frame {current}",
                    block.identity
                ))
                .into());
            }
            persona_blocks.push(block);
        }
        if persona_blocks.is_empty() {
            return Err(DiscardMessage::NotToMe.into());
        }

        let sender = envelope.sender.identity;
        let device = envelope.sender.device;
        require_addressable(&sender)?;

        let from_identity_record = store.ensure_identity(&sender, IdentityClaim::Unclaimed)?;
        let from_device_record = store.ensure_device(from_identity_record, device)?;
        if store.is_blacklisted(from_identity_record)? {
            return Err(DiscardMessage::Blacklist { identity: sender }.into());
        }

        let hash = sha256(raw);
        if store.have_hash(&hash)? {
            return Err(DiscardMessage::Duplicate { hash, device }.into());
        }

        let all_recipients = envelope.recipient_identities();
        let personas: Vec<HashedIdentity> = persona_blocks.iter().map(|b| b.identity).collect();
        let recipients = if envelope.blind { personas.clone() } else { all_recipients.clone() };

        for recipient in &recipients {
            require_addressable(recipient)?;
        }
        if !envelope.blind {
            for recipient in &all_recipients {
                if !personas.contains(recipient) {
                    store.ensure_identity(recipient, IdentityClaim::Unclaimed)?;
                }
            }
        }
        let persona_records = personas
            .iter()
            .map(|p| store.ensure_identity(p, IdentityClaim::Claimed))
            .collect::<Result<Vec<_>, _>>()?;

        let mut opened = Vec::with_capacity(persona_blocks.len());
        for block in persona_blocks {
            let conversation_key = incoming_secret(store, &sender, device, block)?;
            let plaintext = decrypt_zero_padded(&conversation_key, &envelope.iv, &block.secret)
                .map_err(DiscardMessage::corrupted)?;
            let secret = SecretBlock::decode(&plaintext).map_err(DiscardMessage::corrupted)?;
            opened.push(OpenedBlock { persona: block.identity, secret });
        }

        let Some(first) = opened.first() else {
            return Err(DiscardMessage::NotToMe.into());
        };
        if opened.iter().any(|o| !constant_time_eq(&o.secret.message_key, &first.secret.message_key))
        {
            return Err(DiscardMessage::corrupted("secret blocks disagree on message key").into());
        }

        let message_key = SymmetricKey::new(first.secret.message_key);
        let data = decrypt_pkcs7(&message_key, &envelope.iv, &envelope.body)
            .map_err(DiscardMessage::corrupted)?;

        let expected = body_signature_hash(&sha256(&data), &envelope.app, envelope.blind, &all_recipients);
        if opened.iter().any(|o| !constant_time_eq(&o.secret.body_hash, &expected)) {
            return Err(DiscardMessage::bad_signature("body hash mismatch").into());
        }

        let mut tx = store.begin()?;
        if !tx.claim_hash(hash, message.id)? {
            return Err(DiscardMessage::Duplicate { hash, device }.into());
        }

        let mut sequences = Vec::with_capacity(opened.len());
        for (block, persona_record) in opened.iter().zip(&persona_records) {
            let sequence_number = block.secret.sequence_number;
            let status =
                tx.record_received_sequence(from_device_record, *persona_record, sequence_number)?;
            if status.is_gap() {
                tracing::warn!(
                    from = %sender,
                    device = %device,
                    persona = %block.persona,
                    status = ?status,
                    "Sequence gap, messages may be missing"
                );
            }
            sequences.push(PersonaSequence { persona: block.persona, sequence_number, status });
        }

        tx.update_encoded_metadata(
            message.id,
            EncodedMetadata {
                from_identity: sender,
                from_device: device,
                hash,
                short_hash: short_hash(&hash),
                processed: true,
            },
        )?;

        tx.commit().inspect_err(|e| {
            tracing::error!(hash = %hex::encode(hash), error = %e, "Failed to commit decoded envelope");
        })?;

        tracing::debug!(
            hash = %hex::encode(hash),
            from = %sender,
            device = %device,
            personas = personas.len(),
            blind = envelope.blind,
            "Decoded envelope"
        );

        Ok(IncomingMessage {
            id: message.id,
            personas,
            from_identity: sender,
            from_identity_record,
            from_device: device,
            from_device_record,
            recipients,
            hash,
            data,
            sequences,
            blind: envelope.blind,
            app: envelope.app,
        })
    }
}

fn require_addressable(identity: &HashedIdentity) -> Result<(), DiscardMessage> {
    if identity.authority().is_network_addressable() {
        Ok(())
    } else {
        Err(DiscardMessage::InvalidAuthority { identity: *identity })
    }
}

/// Conversation key for `block`, from the cache or by verifying and
/// unwrapping it.
fn incoming_secret(
    store: &dyn SecretStore,
    sender: &HashedIdentity,
    device: DeviceId,
    block: &RecipientBlock,
) -> Result<SymmetricKey, TransportError> {
    let id = IncomingSecretKey {
        me: block.identity,
        you: *sender,
        device,
        encrypted_key: block.encrypted_key.clone(),
        signature: block.signature.clone(),
    };
    if let Some(cached) = store.lookup_incoming_secret(&id)? {
        return Ok(cached.key);
    }

    let binding = key_binding_hash(&block.encrypted_key, device);
    if !store.signature_scheme().verify(sender, &block.signature, &binding) {
        return Err(DiscardMessage::bad_signature("key binding signature does not verify").into());
    }

    let user_key = store
        .encryption_key(&block.identity)?
        .ok_or(NeedsKey::Encryption { identity: block.identity })?;

    let key = store
        .encryption_scheme()
        .decrypt_conversation_key(&user_key, &block.encrypted_key)
        .map_err(DiscardMessage::corrupted)?;

    tracing::debug!(from = %sender, to = %block.identity, "Unwrapped incoming conversation secret");

    Ok(store.insert_incoming_secret_if_absent(IncomingSecret { id, key })?.key)
}
