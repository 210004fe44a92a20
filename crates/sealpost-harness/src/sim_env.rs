//! Seeded environment with a virtual clock.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealpost_core::Environment;

/// Default virtual start time: 2024-01-01T00:00:00Z.
pub const DEFAULT_START_SECS: u64 = 1_704_067_200;

/// Deterministic environment.
///
/// Clones share the RNG and clock, so several devices driven from one
/// `SeededEnv` draw from a single reproducible stream.
#[derive(Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock_secs: Arc<AtomicU64>,
}

impl SeededEnv {
    /// Environment seeded with `seed`, clock at [`DEFAULT_START_SECS`].
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock_secs: Arc::new(AtomicU64::new(DEFAULT_START_SECS)),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance_secs(&self, secs: u64) {
        self.clock_secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the virtual clock.
    pub fn set_clock_secs(&self, secs: u64) {
        self.clock_secs.store(secs, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SeededEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededEnv")
            .field("clock_secs", &self.clock_secs.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Environment for SeededEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("SeededEnv RNG mutex poisoned").fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        self.clock_secs.load(Ordering::SeqCst)
    }
}
