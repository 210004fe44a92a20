//! Codec configuration.

use crate::{env::Environment, error::TransportError};

/// Envelope format version produced and accepted by this codec.
pub const ENVELOPE_VERSION: u32 = 0;

/// Default upper bound on serialized envelope size (1 MiB).
pub const DEFAULT_MAX_ENVELOPE_SIZE: usize = 1024 * 1024;

/// Default upper bound on plaintext body size (512 KiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 512 * 1024;

/// Default upper bound on recipients per envelope.
pub const DEFAULT_MAX_RECIPIENTS: usize = 256;

/// Default temporal frame length: 30 days.
pub const DEFAULT_EPOCH_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;

/// Limits and constants shared by encoder and decoder.
///
/// Built once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Version written into and required of every envelope
    pub envelope_version: u32,
    /// Serialized envelopes above this size are rejected before parsing
    pub max_envelope_size: usize,
    /// Maximum recipient blocks per envelope
    pub max_recipients: usize,
    /// Maximum plaintext body size accepted for encoding
    pub max_body_size: usize,
    /// Length of one temporal frame in seconds
    pub epoch_period_secs: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            envelope_version: ENVELOPE_VERSION,
            max_envelope_size: DEFAULT_MAX_ENVELOPE_SIZE,
            max_recipients: DEFAULT_MAX_RECIPIENTS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            epoch_period_secs: DEFAULT_EPOCH_PERIOD_SECS,
        }
    }
}

impl CodecConfig {
    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// - `TransportError::Config` if any limit is zero or the body limit
    ///   exceeds the envelope limit
    pub fn validate(&self) -> Result<(), TransportError> {
        let fail = |reason: &str| Err(TransportError::Config { reason: reason.to_string() });

        if self.max_envelope_size == 0 {
            return fail("max_envelope_size must be positive");
        }
        if self.max_recipients == 0 {
            return fail("max_recipients must be positive");
        }
        if self.max_body_size == 0 || self.max_body_size > self.max_envelope_size {
            return fail("max_body_size must be positive and at most max_envelope_size");
        }
        if self.epoch_period_secs == 0 {
            return fail("epoch_period_secs must be positive");
        }
        Ok(())
    }

    /// Temporal frame containing `unix_secs`.
    pub fn temporal_frame(&self, unix_secs: u64) -> i64 {
        sealpost_proto::identity::temporal_frame(unix_secs, self.epoch_period_secs)
    }

    /// Temporal frame for the environment's current time.
    pub fn current_frame(&self, env: &impl Environment) -> i64 {
        self.temporal_frame(env.wall_clock_secs())
    }
}
