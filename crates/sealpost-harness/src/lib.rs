//! Deterministic simulation harness for sealpost.
//!
//! [`SeededEnv`] replaces the OS RNG and wall clock with a ChaCha RNG and a
//! virtual clock, and [`SimDevice`] bundles a persona, an in-memory store and
//! the codec so tests can exchange envelopes between devices in a few lines.
//! Two runs with the same seed produce byte-identical envelopes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_device;
pub mod sim_env;

pub use sim_device::SimDevice;
pub use sim_env::SeededEnv;
