//! Fuzz target for envelope parsing
//!
//! # Strategy
//!
//! - Raw bytes: arbitrary input straight into the parser
//! - Size limit: random limits below and above the input length
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Input over the limit is rejected before parsing
//! - Anything accepted re-encodes to exactly the input bytes

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealpost_proto::{Envelope, ProtocolError};

#[derive(Debug, Arbitrary)]
struct Input {
    max_size: u16,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let max_size = usize::from(input.max_size);
    match Envelope::decode(&input.bytes, max_size) {
        Ok(envelope) => {
            assert!(input.bytes.len() <= max_size);
            assert!(!envelope.recipients.is_empty());
            let reencoded = envelope.to_vec().expect("accepted envelope must re-encode");
            assert_eq!(reencoded, input.bytes);
        },
        Err(ProtocolError::EnvelopeTooLarge { size, max }) => {
            assert_eq!(size, input.bytes.len());
            assert!(size > max);
        },
        Err(_) => {},
    }
});
