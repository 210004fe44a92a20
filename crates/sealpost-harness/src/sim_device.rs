//! Simulated device: one store, one set of personas, encoder and decoder.

use std::sync::Arc;

use sealpost_core::{
    CodecConfig, EncodedMessage, IncomingMessage, MessageDecoder, MessageEncoder,
    OutgoingMessage, SecretStore, TransportError, fetch_user_keys,
};
use sealpost_crypto::{IdentityProvider, MasterKeyProvider, UnverifiedScheme};
use sealpost_proto::{Authority, DeviceId, HashedIdentity};
use sealpost_store::MemoryStore;

use crate::SeededEnv;

/// Application namespace used by [`SimDevice::send`].
pub const SIM_APP: &[u8] = b"sealpost.sim";

/// A device taking part in a simulation.
///
/// Every device built from the same scheme parameters can exchange envelopes
/// with every other. The store's frame follows the environment clock; call
/// [`SimDevice::sync_frame`] after advancing it.
pub struct SimDevice {
    identity: HashedIdentity,
    store: MemoryStore,
    env: SeededEnv,
    encoder: MessageEncoder<SeededEnv>,
    decoder: MessageDecoder,
    provider: MasterKeyProvider,
}

impl SimDevice {
    /// Device owning the email persona `principal`, keys provisioned.
    pub fn new(principal: &str, device: u64, env: &SeededEnv) -> Result<Self, TransportError> {
        let sim = Self::without_keys(principal, device, env)?;
        sim.provision(&sim.identity)?;
        Ok(sim)
    }

    /// Device owning `principal` but holding no user keys yet.
    pub fn without_keys(principal: &str, device: u64, env: &SeededEnv) -> Result<Self, TransportError> {
        Self::with_config(principal, device, env, CodecConfig::default())
    }

    /// Device with a custom codec config and no user keys.
    pub fn with_config(
        principal: &str,
        device: u64,
        env: &SeededEnv,
        config: CodecConfig,
    ) -> Result<Self, TransportError> {
        let scheme = Arc::new(UnverifiedScheme::with_test_parameters());
        let store = MemoryStore::new(DeviceId(device), scheme.clone(), scheme.clone());
        let provider = MasterKeyProvider::new(scheme.clone(), scheme);

        let frame = config.current_frame(env);
        store.set_frame(frame)?;
        let identity = HashedIdentity::from_principal(Authority::Email, principal, frame);
        store.add_owned(&identity)?;

        Ok(Self {
            identity,
            store,
            env: env.clone(),
            encoder: MessageEncoder::new(config.clone(), env.clone())?,
            decoder: MessageDecoder::new(config)?,
            provider,
        })
    }

    /// Primary persona at the current frame.
    pub fn identity(&self) -> HashedIdentity {
        self.identity
    }

    /// Backing store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Add another owned persona and provision its keys.
    pub fn add_persona(
        &self,
        authority: Authority,
        principal: &str,
    ) -> Result<HashedIdentity, TransportError> {
        let persona = HashedIdentity::from_principal(authority, principal, self.identity.temporal_frame());
        self.store.add_owned(&persona)?;
        self.provision(&persona)?;
        tracing::debug!(device = %self.store.device_id(), persona = %persona, "Added persona");
        Ok(persona)
    }

    /// Fetch the keys for `identity` into the store.
    pub fn provision(&self, identity: &HashedIdentity) -> Result<(), TransportError> {
        fetch_user_keys(&self.provider, &self.store, identity)
    }

    /// Key source used by [`SimDevice::provision`].
    pub fn provider(&self) -> &dyn IdentityProvider {
        &self.provider
    }

    /// Recompute the frame from the environment clock.
    pub fn sync_frame(&mut self) -> Result<i64, TransportError> {
        let frame = self.encoder.config().current_frame(&self.env);
        self.store.set_frame(frame)?;
        if frame != self.identity.temporal_frame() {
            tracing::debug!(device = %self.store.device_id(), from = self.identity.temporal_frame(), to = frame, "Frame advanced");
        }
        self.identity = self.identity.at(frame);
        Ok(frame)
    }

    /// Send `data` from the primary persona.
    pub fn send(
        &self,
        recipients: &[HashedIdentity],
        data: &[u8],
    ) -> Result<EncodedMessage, TransportError> {
        let message = OutgoingMessage::new(self.identity, recipients.to_vec(), data.to_vec(), SIM_APP);
        self.send_message(&message)
    }

    /// Encode an arbitrary message.
    pub fn send_message(&self, message: &OutgoingMessage) -> Result<EncodedMessage, TransportError> {
        self.encoder.encode(&self.store, message)
    }

    /// Receive raw envelope bytes.
    pub fn receive(&self, raw: &[u8]) -> Result<IncomingMessage, TransportError> {
        self.decoder.receive(&self.store, raw.to_vec())
    }

    /// Retry decoding a previously received row.
    pub fn retry(&self, row: &EncodedMessage) -> Result<IncomingMessage, TransportError> {
        self.decoder.decode(&self.store, row)
    }

    /// Decode a row through another store view of this device (e.g. a
    /// fault injecting wrapper around [`SimDevice::store`]).
    pub fn decode_via(
        &self,
        store: &dyn SecretStore,
        row: &EncodedMessage,
    ) -> Result<IncomingMessage, TransportError> {
        self.decoder.decode(store, row)
    }

    /// Encode through another store view of this device.
    pub fn send_via(
        &self,
        store: &dyn SecretStore,
        recipients: &[HashedIdentity],
        data: &[u8],
    ) -> Result<EncodedMessage, TransportError> {
        let message = OutgoingMessage::new(self.identity, recipients.to_vec(), data.to_vec(), SIM_APP);
        self.encoder.encode(store, &message)
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("identity", &self.identity)
            .field("device", &self.store.device_id())
            .finish_non_exhaustive()
    }
}
