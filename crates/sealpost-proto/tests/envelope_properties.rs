//! Property-based tests for identities, envelopes and secret blocks
//!
//! Round trips are covered by unit tests; these properties target the parsing
//! edges: arbitrary input never panics, canonical form is enforced and
//! zero padding is always tolerated.

use proptest::prelude::*;
use sealpost_proto::{
    Authority, DeviceId, Envelope, HashedIdentity, ProtocolError, RecipientBlock, SecretBlock,
    SenderBlock,
};

fn arbitrary_authority() -> impl Strategy<Value = Authority> {
    prop::sample::select(Authority::ALL.to_vec())
}

fn arbitrary_identity() -> impl Strategy<Value = HashedIdentity> {
    (arbitrary_authority(), any::<[u8; 32]>(), any::<i64>())
        .prop_map(|(authority, hash, frame)| HashedIdentity::new(authority, hash, frame))
}

fn arbitrary_recipient() -> impl Strategy<Value = RecipientBlock> {
    (
        arbitrary_identity(),
        prop::collection::vec(any::<u8>(), 0..96),
        prop::collection::vec(any::<u8>(), 0..80),
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(identity, encrypted_key, signature, secret)| RecipientBlock {
            identity,
            encrypted_key,
            signature,
            secret,
        })
}

fn arbitrary_envelope() -> impl Strategy<Value = Envelope> {
    (
        any::<[u8; 16]>(),
        prop::collection::vec(any::<u8>(), 0..16),
        any::<bool>(),
        arbitrary_identity(),
        any::<u64>(),
        prop::collection::vec(arbitrary_recipient(), 1..5),
        prop::collection::vec(any::<u8>(), 0..256),
    )
        .prop_map(|(iv, app, blind, sender, device, recipients, body)| Envelope {
            version: 0,
            iv,
            app,
            blind,
            sender: SenderBlock { identity: sender, device: DeviceId(device) },
            recipients,
            body,
        })
}

#[test]
fn prop_identity_bytes_roundtrip() {
    proptest!(|(identity in arbitrary_identity())| {
        let bytes = identity.to_bytes();
        prop_assert_eq!(bytes.len(), 41);
        prop_assert_eq!(HashedIdentity::from_bytes(&bytes).unwrap(), identity);
    });
}

#[test]
fn prop_identity_wrong_length_is_corrupt() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..100))| {
        prop_assume!(bytes.len() != 41);
        let is_corrupt = matches!(
            HashedIdentity::from_bytes(&bytes),
            Err(ProtocolError::CorruptIdentity { .. })
        );
        prop_assert!(is_corrupt);
    });
}

#[test]
fn prop_stable_equality_ignores_frame() {
    proptest!(|(identity in arbitrary_identity(), other_frame in any::<i64>())| {
        let moved = identity.at(other_frame);
        prop_assert!(identity.equals_stable(&moved));
        prop_assert_eq!(identity == moved, identity.temporal_frame() == other_frame);
        prop_assert_eq!(identity.stable_key(), moved.stable_key());
    });
}

#[test]
fn prop_envelope_decode_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..512))| {
        let _ = Envelope::decode(&bytes, 4096);
    });
}

#[test]
fn prop_envelope_trailing_bytes_rejected() {
    proptest!(|(envelope in arbitrary_envelope(), tail in prop::collection::vec(any::<u8>(), 1..8))| {
        let mut bytes = envelope.to_vec().unwrap();
        prop_assert_eq!(Envelope::decode(&bytes, usize::MAX).unwrap(), envelope);

        bytes.extend_from_slice(&tail);
        prop_assert!(Envelope::decode(&bytes, usize::MAX).is_err());
    });
}

#[test]
fn prop_envelope_size_limit_checked_first() {
    proptest!(|(envelope in arbitrary_envelope())| {
        let bytes = envelope.to_vec().unwrap();
        let too_large = matches!(
            Envelope::decode(&bytes, bytes.len() - 1),
            Err(ProtocolError::EnvelopeTooLarge { .. })
        );
        prop_assert!(too_large);
    });
}

#[test]
fn prop_secret_block_accepts_any_zero_padding() {
    proptest!(|(
        body_hash in any::<[u8; 32]>(),
        message_key in any::<[u8; 16]>(),
        sequence_number in any::<i64>(),
        pad in 0usize..16,
    )| {
        let block = SecretBlock { body_hash, message_key, sequence_number };
        let mut plaintext = block.to_vec().unwrap();
        plaintext.resize(plaintext.len() + pad, 0);

        prop_assert_eq!(SecretBlock::decode(&plaintext).unwrap(), block);
    });
}
