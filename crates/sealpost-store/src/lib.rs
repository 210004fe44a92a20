//! Secret store implementations for sealpost.
//!
//! - [`MemoryStore`]: complete in-memory implementation of the store
//!   contract, with transactions that stage writes and apply them on commit.
//!   Used by tests and simulation.
//! - [`ChaoticStore`]: wrapper that fails operations at a configured rate,
//!   for checking that the codec never leaves partial state behind.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chaotic;
mod memory;

pub use chaotic::ChaoticStore;
pub use memory::MemoryStore;
