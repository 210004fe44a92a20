//! Message encoder.
//!
//! # Pipeline
//!
//! 1. Validate the message against the config: recipients present and
//!    addressable, limits respected.
//! 2. Draw a shared IV and a fresh message key from the environment.
//! 3. Rebind the sender to its signature epoch and each recipient to its
//!    encryption epoch.
//! 4. Fetch or create the outgoing secret for every (sender, recipient) pair.
//!    This happens before the transaction opens because it may call back into
//!    the store.
//! 5. Encrypt the body under the message key.
//! 6. In one transaction: assign per-recipient sequence numbers, seal each
//!    secret block, serialize the envelope and insert the outbound row.
//!
//! A failure at any step leaves the store as it was, apart from cached
//! conversation secrets, which are valid regardless of whether this message
//! is ever sent.

use std::collections::HashSet;

use sealpost_crypto::{
    ENTROPY_SIZE, SymmetricKey, body_signature_hash, key_binding_hash, sha256, short_hash,
    symmetric::{encrypt_pkcs7, encrypt_zero_padded},
};
use sealpost_proto::{
    Envelope, HashedIdentity, ProtocolError, RecipientBlock, SecretBlock, SenderBlock,
    envelope::IV_SIZE, secret::MESSAGE_KEY_SIZE,
};

use crate::{
    config::CodecConfig,
    env::Environment,
    error::{DiscardMessage, NeedsKey, TransportError},
    message::{EncodedMessage, EncodedMetadata, OutgoingMessage},
    store::{NewEncoded, OutgoingSecret, OutgoingSecretKey, SecretStore},
};

/// Produces envelopes from outgoing messages.
#[derive(Debug, Clone)]
pub struct MessageEncoder<E: Environment> {
    config: CodecConfig,
    env: E,
}

impl<E: Environment> MessageEncoder<E> {
    /// Encoder with a validated config.
    ///
    /// # Errors
    ///
    /// - `TransportError::Config` if `config` fails validation
    pub fn new(config: CodecConfig, env: E) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self { config, env })
    }

    /// Config in use.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode `message` and record it as outbound.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidMessage` for an empty or oversized
    ///   recipient list, an oversized body or an oversized envelope
    /// - `DiscardMessage::InvalidAuthority` if the sender or a recipient is
    ///   not network addressable
    /// - `NeedsKey::Signature` if the store has no signing key for the sender
    ///   at its signature epoch
    /// - `TransportError::Store` / `TransportError::Scheme` on collaborator
    ///   failures
    pub fn encode(
        &self,
        store: &dyn SecretStore,
        message: &OutgoingMessage,
    ) -> Result<EncodedMessage, TransportError> {
        self.validate(message)?;

        let iv: [u8; IV_SIZE] = self.env.random_array();
        let message_key = SymmetricKey::new(self.env.random_array::<MESSAGE_KEY_SIZE>());

        let device = store.device_id();
        let me = message.from.at(store.signature_epoch(&message.from)?);

        let recipients = message
            .recipients
            .iter()
            .map(|r| Ok(r.at(store.encryption_epoch(r)?)))
            .collect::<Result<Vec<HashedIdentity>, TransportError>>()?;

        let body_hash = body_signature_hash(&message.hash, &message.app, message.blind, &recipients);

        let secrets = recipients
            .iter()
            .map(|you| self.outgoing_secret(store, &me, you))
            .collect::<Result<Vec<_>, _>>()?;

        let body = encrypt_pkcs7(&message_key, &iv, &message.data);

        let mut tx = store.begin()?;

        let mut blocks = Vec::with_capacity(secrets.len());
        for secret in &secrets {
            let sequence_number = tx.next_sequence_number(&me, &secret.you)?;
            let plaintext = SecretBlock {
                body_hash,
                message_key: *message_key.as_bytes(),
                sequence_number,
            }
            .to_vec()
            .map_err(TransportError::invalid_message)?;

            blocks.push(RecipientBlock {
                identity: secret.you,
                encrypted_key: secret.encrypted_key.clone(),
                signature: secret.signature.clone(),
                secret: encrypt_zero_padded(&secret.key, &iv, &plaintext),
            });
        }

        let envelope = Envelope {
            version: self.config.envelope_version,
            iv,
            app: message.app.clone(),
            blind: message.blind,
            sender: SenderBlock { identity: me, device },
            recipients: blocks,
            body,
        };

        let encoded = envelope.to_vec().map_err(TransportError::invalid_message)?;
        if encoded.len() > self.config.max_envelope_size {
            return Err(TransportError::invalid_message(ProtocolError::EnvelopeTooLarge {
                size: encoded.len(),
                max: self.config.max_envelope_size,
            }));
        }

        let hash = sha256(&encoded);
        let metadata = EncodedMetadata {
            from_identity: me,
            from_device: device,
            hash,
            short_hash: short_hash(&hash),
            processed: true,
        };

        let id = tx.insert_encoded(NewEncoded {
            encoded: encoded.clone(),
            outbound: true,
            metadata: Some(metadata.clone()),
        })?;

        tx.commit().inspect_err(|e| {
            tracing::error!(hash = %hex::encode(hash), error = %e, "Failed to commit encoded envelope");
        })?;

        tracing::debug!(
            hash = %hex::encode(hash),
            from = %me,
            recipients = recipients.len(),
            device = %device,
            size = encoded.len(),
            "Encoded envelope"
        );

        Ok(EncodedMessage { id, encoded, outbound: true, metadata: Some(metadata) })
    }

    fn validate(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        if message.recipients.is_empty() {
            return Err(TransportError::invalid_message("no recipients"));
        }
        if message.recipients.len() > self.config.max_recipients {
            return Err(TransportError::invalid_message(format!(
                "{} recipients exceeds maximum {}",
                message.recipients.len(),
                self.config.max_recipients
            )));
        }
        if message.data.len() > self.config.max_body_size {
            return Err(TransportError::invalid_message(format!(
                "body of {} bytes exceeds maximum {}",
                message.data.len(),
                self.config.max_body_size
            )));
        }
        if message.hash != sha256(&message.data) {
            return Err(TransportError::invalid_message("hash does not match data"));
        }

        for identity in std::iter::once(&message.from).chain(&message.recipients) {
            if !identity.authority().is_network_addressable() {
                return Err(DiscardMessage::InvalidAuthority { identity: *identity }.into());
            }
        }

        let mut seen = HashSet::with_capacity(message.recipients.len());
        if let Some(repeated) = message.recipients.iter().find(|r| !seen.insert(r.stable_key())) {
            return Err(TransportError::invalid_message(format!("duplicate recipient {repeated}")));
        }
        Ok(())
    }

    fn outgoing_secret(
        &self,
        store: &dyn SecretStore,
        me: &HashedIdentity,
        you: &HashedIdentity,
    ) -> Result<OutgoingSecret, TransportError> {
        let key = OutgoingSecretKey { me: *me, you: *you };
        if let Some(secret) = store.lookup_outgoing_secret(&key)? {
            return Ok(secret);
        }

        let signing_key =
            store.signature_key(me)?.ok_or(NeedsKey::Signature { identity: *me })?;

        let entropy: [u8; ENTROPY_SIZE] = self.env.random_array();
        let conversation = store.encryption_scheme().random_conversation_key(you, &entropy)?;

        let binding = key_binding_hash(&conversation.encrypted, store.device_id());
        let signature = store.signature_scheme().sign(me, &signing_key, &binding)?;

        tracing::debug!(from = %me, to = %you, "Created outgoing conversation secret");

        let secret = OutgoingSecret {
            me: *me,
            you: *you,
            key: conversation.raw,
            encrypted_key: conversation.encrypted,
            signature,
        };
        Ok(store.insert_outgoing_secret_if_absent(secret)?)
    }
}
