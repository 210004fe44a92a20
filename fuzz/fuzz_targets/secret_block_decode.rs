//! Fuzz target for decrypted secret block parsing
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary plaintext
//! - Accepted blocks re-encode to a prefix of the input followed by zeros

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealpost_proto::SecretBlock;

fuzz_target!(|bytes: &[u8]| {
    if let Ok(block) = SecretBlock::decode(bytes) {
        let canonical = block.to_vec().expect("accepted block must re-encode");
        assert!(bytes.starts_with(&canonical));
        assert!(bytes[canonical.len()..].iter().all(|&b| b == 0));
    }
});
