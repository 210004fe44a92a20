//! Fuzz target for the full decode pipeline
//!
//! # Strategy
//!
//! - Raw bytes: arbitrary input through the decoder
//! - Mutations: a genuine envelope with bytes flipped, truncated or extended
//! - Replays: the genuine envelope delivered more than once
//!
//! # Invariants
//!
//! - NEVER panic
//! - Hostile input yields a discard or, when a recipient frame was moved to
//!   an earlier frame, a missing key; never a store error
//! - Anything accepted carries the exact plaintext that was sent
//! - Each distinct envelope is accepted at most once

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealpost_core::TransportError;
use sealpost_harness::{SeededEnv, SimDevice};

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    body: Vec<u8>,
    deliveries: Vec<Delivery>,
}

#[derive(Debug, Arbitrary)]
enum Delivery {
    Raw(Vec<u8>),
    Genuine,
    Flip { index: u16, mask: u8 },
    Truncate { len: u16 },
    Extend(Vec<u8>),
}

fuzz_target!(|scenario: Scenario| {
    let env = SeededEnv::new(scenario.seed);
    let alice = SimDevice::new("a@x.com", 1, &env).expect("alice");
    let bob = SimDevice::new("b@x.com", 2, &env).expect("bob");

    let Ok(sent) = alice.send(&[bob.identity()], &scenario.body) else {
        return;
    };
    let genuine = sent.encoded;

    let mut accepted = HashSet::new();
    for delivery in scenario.deliveries.into_iter().take(16) {
        let raw = match delivery {
            Delivery::Raw(bytes) => bytes,
            Delivery::Genuine => genuine.clone(),
            Delivery::Flip { index, mask } => {
                let mut bytes = genuine.clone();
                let index = usize::from(index) % bytes.len();
                bytes[index] ^= mask;
                bytes
            },
            Delivery::Truncate { len } => genuine[..usize::from(len).min(genuine.len())].to_vec(),
            Delivery::Extend(tail) => [genuine.as_slice(), &tail].concat(),
        };

        match bob.receive(&raw) {
            Ok(incoming) => {
                assert_eq!(incoming.data, scenario.body);
                assert_eq!(incoming.from_identity, alice.identity());
                assert!(accepted.insert(incoming.hash), "envelope accepted twice");
            },
            Err(TransportError::Discard(_) | TransportError::NeedsKey(_)) => {},
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
});
