//! AES-128-CBC for secret blocks and bodies.
//!
//! Secret blocks use zero-byte padding. Decryption keeps the trailing zeros
//! because the padding is ambiguous: a CBOR item may itself end in `0x00`.
//! The secret block decoder is self-delimiting and checks the tail.
//!
//! Bodies use PKCS7 padding.
//!
//! Neither mode authenticates. Integrity comes from the signed key binding
//! and the body hash carried inside the secret block.

use aes::Aes128;
use cbc::cipher::{
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
    block_padding::{NoPadding, Pkcs7, ZeroPadding},
};
use sealpost_proto::envelope::IV_SIZE;

use crate::{error::CryptoError, keys::SymmetricKey};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size.
pub const BLOCK_SIZE: usize = 16;

/// Encrypt with zero-byte padding up to the block boundary.
pub fn encrypt_zero_padded(key: &SymmetricKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.as_bytes().into(), iv.into())
        .encrypt_padded_vec_mut::<ZeroPadding>(plaintext)
}

/// Decrypt a zero-padded ciphertext. The padding is left in place.
///
/// # Errors
///
/// - `DecryptionFailed` if the ciphertext is empty or not block aligned
pub fn decrypt_zero_padded(
    key: &SymmetricKey,
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_block_aligned(ciphertext)?;

    Aes128CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed { reason: "invalid block layout".to_string() })
}

/// Encrypt with PKCS7 padding.
pub fn encrypt_pkcs7(key: &SymmetricKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.as_bytes().into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt and strip PKCS7 padding.
///
/// # Errors
///
/// - `DecryptionFailed` if the ciphertext is not block aligned or the
///   padding is invalid (wrong key, wrong IV or tampering)
pub fn decrypt_pkcs7(
    key: &SymmetricKey,
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_block_aligned(ciphertext)?;

    Aes128CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed { reason: "invalid padding".to_string() })
}

fn check_block_aligned(ciphertext: &[u8]) -> Result<(), CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::DecryptionFailed {
            reason: format!("ciphertext length {} is not a positive multiple of {BLOCK_SIZE}", ciphertext.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    const KEY: SymmetricKey = SymmetricKey::new(hex!("2b7e151628aed2a6abf7158809cf4f3c"));
    const IV: [u8; IV_SIZE] = hex!("000102030405060708090a0b0c0d0e0f");

    #[test]
    fn nist_cbc_aes128_first_block() {
        // SP 800-38A F.2.1
        let plaintext = hex!("6bc1bee22e409f96e93d7e117393172a");
        let ciphertext = encrypt_zero_padded(&KEY, &IV, &plaintext);
        assert_eq!(ciphertext, hex!("7649abac8119b246cee98e9b12e9197d"));
    }

    #[test]
    fn zero_padding_keeps_trailing_zeros() {
        let plaintext = [1, 2, 3, 0];
        let ciphertext = encrypt_zero_padded(&KEY, &IV, &plaintext);
        assert_eq!(ciphertext.len(), BLOCK_SIZE);

        let decrypted = decrypt_zero_padded(&KEY, &IV, &ciphertext).unwrap();
        assert_eq!(decrypted.len(), BLOCK_SIZE);
        assert_eq!(&decrypted[..4], &plaintext);
        assert!(decrypted[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn pkcs7_roundtrip_adds_full_block_when_aligned() {
        let plaintext = [0x42u8; 32];
        let ciphertext = encrypt_pkcs7(&KEY, &IV, &plaintext);
        assert_eq!(ciphertext.len(), 48);
        assert_eq!(decrypt_pkcs7(&KEY, &IV, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn pkcs7_empty_plaintext() {
        let ciphertext = encrypt_pkcs7(&KEY, &IV, b"");
        assert_eq!(ciphertext.len(), BLOCK_SIZE);
        assert!(decrypt_pkcs7(&KEY, &IV, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn misaligned_ciphertext_rejected() {
        assert!(decrypt_pkcs7(&KEY, &IV, &[0; 15]).is_err());
        assert!(decrypt_zero_padded(&KEY, &IV, &[0; 17]).is_err());
        assert!(decrypt_zero_padded(&KEY, &IV, &[]).is_err());
    }
}
