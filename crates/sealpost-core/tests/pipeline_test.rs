//! End-to-end encode/decode tests between simulated devices
//!
//! Covers the happy path and every discard reason the decoder can produce,
//! plus the store side effects (sequence counters, secret cache, hash claims)
//! each path is expected to leave behind.

use sealpost_core::{
    CodecConfig, DiscardMessage, NeedsKey, OutgoingMessage, SecretStore, SequenceStatus,
    TransportError,
};
use sealpost_harness::{SeededEnv, SimDevice};
use sealpost_proto::{Authority, AppObject, DeviceId, Envelope, HashedIdentity};

struct Trio {
    alice: SimDevice,
    bob: SimDevice,
    carol: SimDevice,
}

fn trio(seed: u64) -> Trio {
    let env = SeededEnv::new(seed);
    Trio {
        alice: SimDevice::new("a@x.com", 1, &env).unwrap(),
        bob: SimDevice::new("b@x.com", 2, &env).unwrap(),
        carol: SimDevice::new("c@x.com", 3, &env).unwrap(),
    }
}

fn discard(result: Result<impl std::fmt::Debug, TransportError>) -> DiscardMessage {
    match result {
        Err(TransportError::Discard(reason)) => reason,
        other => panic!("expected discard, got {other:?}"),
    }
}

/// Decode, edit and re-encode an envelope.
fn rewrite(encoded: &[u8], edit: impl FnOnce(&mut Envelope)) -> Vec<u8> {
    let mut envelope = Envelope::decode(encoded, usize::MAX).unwrap();
    edit(&mut envelope);
    envelope.to_vec().unwrap()
}

#[test]
fn round_trip_to_two_recipients() {
    let Trio { alice, bob, carol } = trio(1);

    let sent = alice.send(&[bob.identity(), carol.identity()], b"hello").unwrap();
    assert!(sent.outbound);

    let at_bob = bob.receive(&sent.encoded).unwrap();
    assert_eq!(at_bob.data, b"hello");
    assert_eq!(at_bob.from_identity, alice.identity());
    assert_eq!(at_bob.from_device, DeviceId(1));
    assert_eq!(at_bob.personas, vec![bob.identity()]);
    assert_eq!(at_bob.recipients, vec![bob.identity(), carol.identity()]);
    assert_eq!(at_bob.sequence_number(), 0);
    assert_eq!(at_bob.sequence_status(), SequenceStatus::First);
    assert!(!at_bob.blind);

    let at_carol = carol.receive(&sent.encoded).unwrap();
    assert_eq!(at_carol.data, b"hello");
    assert_eq!(at_carol.hash, at_bob.hash);

    let metadata = sent.metadata.unwrap();
    assert_eq!(metadata.hash, at_bob.hash);
    assert_eq!(metadata.short_hash, u64::from_be_bytes(at_bob.hash[..8].try_into().unwrap()));
}

#[test]
fn decoded_row_is_marked_processed() {
    let Trio { alice, bob, .. } = trio(2);

    let sent = alice.send(&[bob.identity()], b"hello").unwrap();
    let incoming = bob.receive(&sent.encoded).unwrap();

    let row = bob.store().encoded(incoming.id).unwrap().unwrap();
    assert!(!row.outbound);
    let metadata = row.metadata.unwrap();
    assert!(metadata.processed);
    assert_eq!(metadata.from_identity, alice.identity());
    assert_eq!(metadata.from_device, DeviceId(1));
}

#[test]
fn resubmission_is_duplicate() {
    let Trio { alice, bob, .. } = trio(3);

    let sent = alice.send(&[bob.identity()], b"hello").unwrap();
    let first = bob.receive(&sent.encoded).unwrap();

    let reason = discard(bob.receive(&sent.encoded));
    assert_eq!(reason, DiscardMessage::Duplicate { hash: first.hash, device: DeviceId(1) });
}

#[test]
fn flipped_body_byte_is_rejected() {
    let Trio { alice, bob, .. } = trio(4);
    let sent = alice.send(&[bob.identity()], b"hello, this spans more than one block").unwrap();

    for index in [0, 5, 16] {
        let tampered = rewrite(&sent.encoded, |e| e.body[index] ^= 0x01);
        let reason = discard(bob.receive(&tampered));
        assert!(
            matches!(reason, DiscardMessage::Corrupted { .. } | DiscardMessage::BadSignature { .. }),
            "{reason:?}"
        );
    }

    // The untouched envelope is still accepted afterwards
    assert_eq!(bob.receive(&sent.encoded).unwrap().data, b"hello, this spans more than one block");
}

#[test]
fn tampered_encrypted_key_fails_signature() {
    let Trio { alice, bob, .. } = trio(5);
    let sent = alice.send(&[bob.identity()], b"hello").unwrap();

    // Warm the incoming cache with the genuine key first
    bob.receive(&sent.encoded).unwrap();

    let tampered = rewrite(&sent.encoded, |e| {
        e.recipients[0].encrypted_key[0] ^= 0x01;
    });
    assert!(matches!(discard(bob.receive(&tampered)), DiscardMessage::BadSignature { .. }));
}

#[test]
fn dropped_recipient_breaks_body_hash() {
    let Trio { alice, bob, carol } = trio(6);
    let sent = alice.send(&[bob.identity(), carol.identity()], b"hello").unwrap();

    let narrowed = rewrite(&sent.encoded, |e| {
        e.recipients.retain(|r| r.identity.equals_stable(&bob.identity()));
    });
    assert!(matches!(discard(bob.receive(&narrowed)), DiscardMessage::BadSignature { .. }));
}

#[test]
fn blind_message_hides_other_recipients() {
    let Trio { alice, bob, carol } = trio(7);
    let message =
        OutgoingMessage::new(alice.identity(), vec![bob.identity(), carol.identity()], b"psst".to_vec(), "chat")
            .blind();
    let sent = alice.send_message(&message).unwrap();

    let at_bob = bob.receive(&sent.encoded).unwrap();
    assert!(at_bob.blind);
    assert_eq!(at_bob.recipients, vec![bob.identity()]);

    let at_carol = carol.receive(&sent.encoded).unwrap();
    assert_eq!(at_carol.recipients, vec![carol.identity()]);
    assert_eq!(at_carol.data, b"psst");
}

#[test]
fn blind_message_tolerates_recipient_removal() {
    let Trio { alice, bob, carol } = trio(8);
    let message =
        OutgoingMessage::new(alice.identity(), vec![bob.identity(), carol.identity()], b"psst".to_vec(), "chat")
            .blind();
    let sent = alice.send_message(&message).unwrap();

    let narrowed = rewrite(&sent.encoded, |e| {
        e.recipients.retain(|r| r.identity.equals_stable(&bob.identity()));
    });
    assert_eq!(bob.receive(&narrowed).unwrap().data, b"psst");
}

#[test]
fn encoder_rejects_local_and_empty_recipients() {
    let Trio { alice, bob, .. } = trio(9);
    let local = HashedIdentity::from_principal(Authority::Local, "me", alice.identity().temporal_frame());

    let reason = discard(alice.send(&[bob.identity(), local], b"x"));
    assert_eq!(reason, DiscardMessage::InvalidAuthority { identity: local });

    assert!(matches!(alice.send(&[], b"x"), Err(TransportError::InvalidMessage { .. })));
    assert!(matches!(
        alice.send(&[bob.identity(), bob.identity()], b"x"),
        Err(TransportError::InvalidMessage { .. })
    ));

    // Nothing was recorded for the rejected sends
    assert_eq!(alice.store().encoded_count().unwrap(), 0);
    assert_eq!(alice.store().next_sequence_for(&alice.identity(), &bob.identity()).unwrap(), 0);
}

#[test]
fn future_frame_on_own_block_is_corrupted() {
    let Trio { alice, bob, .. } = trio(28);
    let sent = alice.send(&[bob.identity()], b"x").unwrap();

    let ahead = bob.identity().at(bob.identity().temporal_frame() + 1);
    let forged = rewrite(&sent.encoded, |e| e.recipients[0].identity = ahead);

    assert!(matches!(discard(bob.receive(&forged)), DiscardMessage::Corrupted { .. }));
    assert!(bob.store().encryption_key(&ahead).unwrap().is_none());

    // The genuine envelope is unaffected
    assert_eq!(bob.receive(&sent.encoded).unwrap().data, b"x");
}

#[test]
fn decoder_rejects_local_sender() {
    let Trio { alice, bob, .. } = trio(10);
    let sent = alice.send(&[bob.identity()], b"x").unwrap();

    let local = HashedIdentity::from_principal(Authority::Local, "a@x.com", 0);
    let forged = rewrite(&sent.encoded, |e| e.sender.identity = local);

    assert_eq!(discard(bob.receive(&forged)), DiscardMessage::InvalidAuthority { identity: local });
}

#[test]
fn decoder_rejects_local_recipient() {
    let Trio { alice, bob, carol } = trio(11);
    let sent = alice.send(&[bob.identity(), carol.identity()], b"x").unwrap();

    let local = HashedIdentity::from_principal(Authority::Local, "c@x.com", 0);
    let forged = rewrite(&sent.encoded, |e| e.recipients[1].identity = local);

    assert_eq!(discard(bob.receive(&forged)), DiscardMessage::InvalidAuthority { identity: local });
}

#[test]
fn not_addressed_to_me() {
    let Trio { alice, bob, carol } = trio(12);
    let sent = alice.send(&[carol.identity()], b"x").unwrap();

    assert_eq!(discard(bob.receive(&sent.encoded)), DiscardMessage::NotToMe);
}

#[test]
fn blacklisted_sender() {
    let Trio { alice, bob, .. } = trio(13);
    bob.store().blacklist(&alice.identity()).unwrap();

    let sent = alice.send(&[bob.identity()], b"x").unwrap();
    assert_eq!(
        discard(bob.receive(&sent.encoded)),
        DiscardMessage::Blacklist { identity: alice.identity() }
    );
}

#[test]
fn garbage_is_corrupted() {
    let Trio { bob, .. } = trio(14);
    assert!(matches!(discard(bob.receive(b"not cbor")), DiscardMessage::Corrupted { .. }));
    assert!(matches!(discard(bob.receive(&[])), DiscardMessage::Corrupted { .. }));
}

#[test]
fn version_mismatch_is_corrupted() {
    let env = SeededEnv::new(15);
    let alice = SimDevice::new("a@x.com", 1, &env).unwrap();
    let bob = SimDevice::with_config(
        "b@x.com",
        2,
        &env,
        CodecConfig { envelope_version: 1, ..CodecConfig::default() },
    )
    .unwrap();
    bob.provision(&bob.identity()).unwrap();

    let sent = alice.send(&[bob.identity()], b"x").unwrap();
    assert!(matches!(discard(bob.receive(&sent.encoded)), DiscardMessage::Corrupted { .. }));
}

#[test]
fn missing_signature_key_leaves_no_trace() {
    let env = SeededEnv::new(16);
    let alice = SimDevice::without_keys("a@x.com", 1, &env).unwrap();
    let bob = SimDevice::new("b@x.com", 2, &env).unwrap();

    let err = alice.send(&[bob.identity()], b"x").unwrap_err();
    assert_eq!(err, TransportError::NeedsKey(NeedsKey::Signature { identity: alice.identity() }));
    assert!(err.is_transient());
    assert_eq!(alice.store().encoded_count().unwrap(), 0);
    assert_eq!(alice.store().secret_counts().unwrap(), (0, 0));

    alice.provision(&alice.identity()).unwrap();
    let sent = alice.send(&[bob.identity()], b"x").unwrap();
    assert_eq!(bob.receive(&sent.encoded).unwrap().sequence_number(), 0);
}

#[test]
fn missing_encryption_key_then_retry() {
    let env = SeededEnv::new(17);
    let alice = SimDevice::new("a@x.com", 1, &env).unwrap();
    let bob = SimDevice::without_keys("b@x.com", 2, &env).unwrap();

    let sent = alice.send(&[bob.identity()], b"later").unwrap();
    let row = bob.store().insert_received(sent.encoded.clone()).unwrap();

    let err = bob.retry(&row).unwrap_err();
    assert_eq!(err, TransportError::NeedsKey(NeedsKey::Encryption { identity: bob.identity() }));
    assert!(!bob.store().have_hash(&sealpost_crypto::sha256(&sent.encoded)).unwrap());

    bob.provision(&bob.identity()).unwrap();
    assert_eq!(bob.retry(&row).unwrap().data, b"later");
}

#[test]
fn conversation_secret_is_reused() {
    let Trio { alice, bob, .. } = trio(18);

    let first = alice.send(&[bob.identity()], b"one").unwrap();
    let second = alice.send(&[bob.identity()], b"two").unwrap();
    assert_eq!(alice.store().secret_counts().unwrap(), (1, 0));

    let first_env = Envelope::decode(&first.encoded, usize::MAX).unwrap();
    let second_env = Envelope::decode(&second.encoded, usize::MAX).unwrap();
    assert_eq!(first_env.recipients[0].encrypted_key, second_env.recipients[0].encrypted_key);
    assert_eq!(first_env.recipients[0].signature, second_env.recipients[0].signature);
    assert_ne!(first_env.iv, second_env.iv);

    bob.receive(&first.encoded).unwrap();
    bob.receive(&second.encoded).unwrap();
    assert_eq!(bob.store().secret_counts().unwrap(), (0, 1));
}

#[test]
fn sequence_numbers_are_per_recipient_and_monotonic() {
    let Trio { alice, bob, carol } = trio(19);

    let numbers: Vec<i64> = (0..3)
        .map(|i| {
            let sent = alice.send(&[bob.identity()], &[i]).unwrap();
            bob.receive(&sent.encoded).unwrap().sequence_number()
        })
        .collect();
    assert_eq!(numbers, vec![0, 1, 2]);

    let sent = alice.send(&[carol.identity(), bob.identity()], b"both").unwrap();
    assert_eq!(carol.receive(&sent.encoded).unwrap().sequence_number(), 0);
    let at_bob = bob.receive(&sent.encoded).unwrap();
    assert_eq!(at_bob.sequence_number(), 3);
    assert_eq!(at_bob.sequence_status(), SequenceStatus::InOrder);
}

#[test]
fn gaps_are_reported_not_fatal() {
    let Trio { alice, bob, .. } = trio(20);
    let sent: Vec<_> = (0..3).map(|i| alice.send(&[bob.identity()], &[i]).unwrap()).collect();

    assert_eq!(bob.receive(&sent[0].encoded).unwrap().sequence_status(), SequenceStatus::First);
    assert_eq!(
        bob.receive(&sent[2].encoded).unwrap().sequence_status(),
        SequenceStatus::Gap { expected: 1, received: 2 }
    );
    let late = bob.receive(&sent[1].encoded).unwrap();
    assert_eq!(late.data, vec![1]);
    assert_eq!(late.sequence_status(), SequenceStatus::Stale { latest: 2, received: 1 });
}

#[test]
fn sender_personas_number_their_streams_independently() {
    let Trio { alice, bob, .. } = trio(27);
    let phone = alice.add_persona(Authority::Phone, "+15550111").unwrap();

    let first = alice.send(&[bob.identity()], b"as email").unwrap();
    let from_phone = OutgoingMessage::new(phone, vec![bob.identity()], b"as phone".to_vec(), "chat");
    let second = alice.send_message(&from_phone).unwrap();
    let third = alice.send(&[bob.identity()], b"email again").unwrap();

    let at_bob = bob.receive(&first.encoded).unwrap();
    assert_eq!((at_bob.sequence_number(), at_bob.sequence_status()), (0, SequenceStatus::First));

    let at_bob = bob.receive(&second.encoded).unwrap();
    assert_eq!(at_bob.from_identity, phone);
    assert_eq!((at_bob.sequence_number(), at_bob.sequence_status()), (0, SequenceStatus::First));

    let at_bob = bob.receive(&third.encoded).unwrap();
    assert_eq!((at_bob.sequence_number(), at_bob.sequence_status()), (1, SequenceStatus::InOrder));

    assert_eq!(alice.store().next_sequence_for(&alice.identity(), &bob.identity()).unwrap(), 2);
    assert_eq!(alice.store().next_sequence_for(&phone, &bob.identity()).unwrap(), 1);
}

#[test]
fn multiple_personas_on_one_device() {
    let Trio { alice, bob, .. } = trio(21);
    let phone = bob.add_persona(Authority::Phone, "+15550100").unwrap();

    let sent = alice.send(&[bob.identity(), phone], b"both of you").unwrap();
    let incoming = bob.receive(&sent.encoded).unwrap();

    assert_eq!(incoming.personas, vec![bob.identity(), phone]);
    assert_eq!(incoming.sequences.len(), 2);
    assert!(incoming.sequences.iter().all(|s| s.sequence_number == 0));
    assert!(incoming.sequences.iter().all(|s| s.status == SequenceStatus::First));
}

#[test]
fn object_bodies() {
    let Trio { alice, bob, .. } = trio(22);
    let object = AppObject::new("text").with_json(r#"{"text":"hello"}"#).with_int_key(3);
    let message = OutgoingMessage::with_object(alice.identity(), vec![bob.identity()], &object, "chat").unwrap();

    let sent = alice.send_message(&message).unwrap();
    let incoming = bob.receive(&sent.encoded).unwrap();
    assert_eq!(incoming.object().unwrap(), object);
    assert_eq!(incoming.app, b"chat");

    let plain = alice.send(&[bob.identity()], b"\xffnot an object").unwrap();
    let incoming = bob.receive(&plain.encoded).unwrap();
    assert!(matches!(incoming.object(), Err(DiscardMessage::BadObjFormat { .. })));
}

#[test]
fn oversized_messages_rejected_by_encoder() {
    let env = SeededEnv::new(23);
    let config = CodecConfig { max_body_size: 64, max_recipients: 1, ..CodecConfig::default() };
    let alice = SimDevice::with_config("a@x.com", 1, &env, config).unwrap();
    alice.provision(&alice.identity()).unwrap();
    let bob = SimDevice::new("b@x.com", 2, &env).unwrap();
    let carol = SimDevice::new("c@x.com", 3, &env).unwrap();

    assert!(matches!(alice.send(&[bob.identity()], &[0; 65]), Err(TransportError::InvalidMessage { .. })));
    assert!(matches!(
        alice.send(&[bob.identity(), carol.identity()], b"x"),
        Err(TransportError::InvalidMessage { .. })
    ));
    assert!(alice.send(&[bob.identity()], &[0; 64]).is_ok());
}

#[test]
fn oversized_envelope_rejected_by_decoder() {
    let env = SeededEnv::new(24);
    let alice = SimDevice::new("a@x.com", 1, &env).unwrap();
    let config = CodecConfig { max_envelope_size: 256, max_body_size: 128, ..CodecConfig::default() };
    let bob = SimDevice::with_config("b@x.com", 2, &env, config).unwrap();
    bob.provision(&bob.identity()).unwrap();

    let sent = alice.send(&[bob.identity()], &[7; 512]).unwrap();
    assert!(matches!(discard(bob.receive(&sent.encoded)), DiscardMessage::Corrupted { .. }));
}

#[test]
fn mismatched_hash_rejected() {
    let Trio { alice, bob, .. } = trio(25);
    let mut message = OutgoingMessage::new(alice.identity(), vec![bob.identity()], b"x".to_vec(), "chat");
    message.hash = [0; 32];
    assert!(matches!(alice.send_message(&message), Err(TransportError::InvalidMessage { .. })));
}
