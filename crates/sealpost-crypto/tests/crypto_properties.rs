//! Property-based tests for the symmetric layer and the unverified scheme

use proptest::prelude::*;
use sealpost_crypto::{
    EncryptionScheme, SignatureScheme, SymmetricKey, UnverifiedScheme, body_signature_hash,
    symmetric::{decrypt_pkcs7, decrypt_zero_padded, encrypt_pkcs7, encrypt_zero_padded},
};
use sealpost_proto::{Authority, HashedIdentity};

fn arbitrary_identity() -> impl Strategy<Value = HashedIdentity> {
    (prop::sample::select(Authority::ALL.to_vec()), any::<[u8; 32]>(), any::<i64>())
        .prop_map(|(authority, hash, frame)| HashedIdentity::new(authority, hash, frame))
}

#[test]
fn prop_pkcs7_roundtrip() {
    proptest!(|(
        key in any::<[u8; 16]>(),
        iv in any::<[u8; 16]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..300),
    )| {
        let key = SymmetricKey::new(key);
        let ciphertext = encrypt_pkcs7(&key, &iv, &plaintext);
        prop_assert_eq!(ciphertext.len() % 16, 0);
        prop_assert!(ciphertext.len() > plaintext.len());
        prop_assert_eq!(decrypt_pkcs7(&key, &iv, &ciphertext).unwrap(), plaintext);
    });
}

#[test]
fn prop_zero_padded_decrypt_is_plaintext_plus_zeros() {
    proptest!(|(
        key in any::<[u8; 16]>(),
        iv in any::<[u8; 16]>(),
        plaintext in prop::collection::vec(any::<u8>(), 1..200),
    )| {
        let key = SymmetricKey::new(key);
        let ciphertext = encrypt_zero_padded(&key, &iv, &plaintext);
        let decrypted = decrypt_zero_padded(&key, &iv, &ciphertext).unwrap();

        prop_assert!(decrypted.len() - plaintext.len() < 16);
        prop_assert_eq!(&decrypted[..plaintext.len()], plaintext.as_slice());
        prop_assert!(decrypted[plaintext.len()..].iter().all(|&b| b == 0));
    });
}

#[test]
fn prop_conversation_key_binds_recipient() {
    let scheme = UnverifiedScheme::with_test_parameters();
    proptest!(|(recipient in arbitrary_identity(), other in arbitrary_identity(), entropy in any::<[u8; 32]>())| {
        let key = scheme.random_conversation_key(&recipient, &entropy).unwrap();

        let own = EncryptionScheme::user_key(&scheme, &recipient).unwrap();
        prop_assert_eq!(scheme.decrypt_conversation_key(&own, &key.encrypted).unwrap(), key.raw);

        prop_assume!(other != recipient);
        let foreign = EncryptionScheme::user_key(&scheme, &other).unwrap();
        prop_assert!(scheme.decrypt_conversation_key(&foreign, &key.encrypted).is_err());
    });
}

#[test]
fn prop_signature_binds_identity_and_data() {
    let scheme = UnverifiedScheme::with_test_parameters();
    proptest!(|(signer in arbitrary_identity(), data in prop::collection::vec(any::<u8>(), 0..64), flip in any::<usize>())| {
        let key = SignatureScheme::user_key(&scheme, &signer).unwrap();
        let mut signature = scheme.sign(&signer, &key, &data).unwrap();
        prop_assert!(scheme.verify(&signer, &signature, &data));

        let index = flip % signature.len();
        signature[index] ^= 0x80;
        prop_assert!(!scheme.verify(&signer, &signature, &data));
    });
}

#[test]
fn prop_body_hash_binds_recipient_list() {
    proptest!(|(
        data_hash in any::<[u8; 32]>(),
        recipients in prop::collection::vec(arbitrary_identity(), 1..4),
        extra in arbitrary_identity(),
    )| {
        let base = body_signature_hash(&data_hash, b"chat", false, &recipients);
        let mut widened = recipients.clone();
        widened.push(extra);
        prop_assert_ne!(base, body_signature_hash(&data_hash, b"chat", false, &widened));
        prop_assert_eq!(
            body_signature_hash(&data_hash, b"chat", true, &recipients),
            body_signature_hash(&data_hash, b"chat", true, &widened)
        );
    });
}
