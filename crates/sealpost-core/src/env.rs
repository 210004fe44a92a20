//! Environment abstraction for deterministic testing.
//!
//! The codec needs randomness (IVs, message keys, conversation key entropy)
//! and the wall clock (temporal frames). Routing both through [`Environment`]
//! lets simulation replace them with a seeded RNG and a virtual clock.

/// Source of randomness and time.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a simulated environment produces the same sequence
///   of bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    fn wall_clock_secs(&self) -> u64;

    /// Fixed-size array of random bytes.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        u64::from_be_bytes(self.random_array())
    }
}

/// Production environment using the OS RNG and system clock.
///
/// # Panics
///
/// Panics if the OS RNG fails. Continuing without working randomness would
/// produce predictable keys and IVs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();
        let a: [u8; 32] = env.random_array();
        let b: [u8; 32] = env.random_array();
        assert_ne!(a, b, "Random bytes should differ");
    }

    #[test]
    fn system_env_clock_is_past_2020() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_577_836_800);
    }
}
