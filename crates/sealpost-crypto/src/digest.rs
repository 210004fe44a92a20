//! SHA-256 digests used by the envelope layer.

use sealpost_proto::{DeviceId, HashedIdentity};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// First 8 bytes of a digest as a big-endian integer.
///
/// Used as a compact index key for envelopes. Not collision resistant.
pub fn short_hash(hash: &[u8; 32]) -> u64 {
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(prefix)
}

/// Hash signed by the sender to bind a wrapped conversation key to a device.
///
/// `SHA-256(encrypted_key || device_id as 8 bytes big-endian)`
pub fn key_binding_hash(encrypted_key: &[u8], device: DeviceId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(encrypted_key);
    hasher.update(device.to_bytes());
    hasher.finalize().into()
}

/// Hash carried in every secret block and recomputed by the receiver.
///
/// `SHA-256(data_hash || app || blind || recipients...)` where `blind` is one
/// byte and the recipients' canonical identity bytes are appended in envelope
/// order only for non-blind messages.
pub fn body_signature_hash(
    data_hash: &[u8; 32],
    app: &[u8],
    blind: bool,
    recipients: &[HashedIdentity],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data_hash);
    hasher.update(app);
    hasher.update([u8::from(blind)]);
    if !blind {
        for recipient in recipients {
            hasher.update(recipient.to_bytes());
        }
    }
    hasher.finalize().into()
}

/// Compare two byte strings without early exit on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use sealpost_proto::Authority;

    use super::*;

    #[test]
    fn constant_time_eq_matches_eq() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"sane"));
        assert!(!constant_time_eq(b"same", b"sam"));
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256(b"abc"),
            hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn short_hash_is_big_endian_prefix() {
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&hex!("0102030405060708"));
        hash[8] = 0xFF;
        assert_eq!(short_hash(&hash), 0x0102_0304_0506_0708);
    }

    #[test]
    fn key_binding_depends_on_device() {
        let a = key_binding_hash(b"wrapped", DeviceId(1));
        let b = key_binding_hash(b"wrapped", DeviceId(2));
        assert_ne!(a, b);

        let mut manual = b"wrapped".to_vec();
        manual.extend_from_slice(&1u64.to_be_bytes());
        assert_eq!(a, sha256(&manual));
    }

    #[test]
    fn blind_hash_ignores_recipients() {
        let data_hash = sha256(b"hello");
        let b = HashedIdentity::from_principal(Authority::Email, "b@x.com", 0);
        let c = HashedIdentity::from_principal(Authority::Email, "c@x.com", 0);

        assert_eq!(
            body_signature_hash(&data_hash, b"app", true, &[b]),
            body_signature_hash(&data_hash, b"app", true, &[b, c])
        );
        assert_ne!(
            body_signature_hash(&data_hash, b"app", false, &[b]),
            body_signature_hash(&data_hash, b"app", false, &[b, c])
        );
        assert_ne!(
            body_signature_hash(&data_hash, b"app", false, &[b, c]),
            body_signature_hash(&data_hash, b"app", false, &[c, b])
        );
    }

    #[test]
    fn hash_covers_app_and_blind_flag() {
        let data_hash = sha256(b"hello");
        let base = body_signature_hash(&data_hash, b"app", true, &[]);
        assert_ne!(base, body_signature_hash(&data_hash, b"other", true, &[]));
        assert_ne!(base, body_signature_hash(&data_hash, b"app", false, &[]));
    }
}
