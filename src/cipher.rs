//! `CipherSuite` (spec.md §4.2): fixed primitive wrappers. These constants
//! are part of the wire contract and are deliberately not configurable —
//! callers cannot swap AES for ChaCha or SHA-1 for SHA-256 here.
//!
//! Grounded on `other_examples/.../wdv3-src-crypto-rsa.rs.rs` (RustCrypto
//! `rsa` crate OAEP/PKCS1v15 usage) and `.../wdv3-src-crypto-aes.rs.rs`
//! (AES-CBC shape), reworked onto the `cbc`/`aes` crate pairing so PKCS#7
//! padding is handled by the block-mode crate rather than by hand.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rsa::{
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    sha2::Sha256,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha1::Sha1;
use sha2::Digest;
use signature::{RandomizedSigner, Verifier};

use crate::error::{CommunicatorError, Result, RsaOpError};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha1 = Hmac<Sha1>;

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const HMAC_KEY_LEN: usize = 16;
pub const CIPHER_NAME: &str = "aes_128_cbc";

/// SHA-256 digest (spec.md §4.2).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// RSA-OAEP (MGF1-SHA1, the RustCrypto default) wrap under the peer's
/// public key (spec.md §4.3 step 5).
pub fn rsa_oaep_encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut rng = rand::rngs::OsRng;
    public_key
        .encrypt(&mut rng, Oaep::new::<Sha1>(), plaintext)
        .map_err(|e| CommunicatorError::from(RsaOpError::from(e)))
}

/// RSA-OAEP unwrap under our own private key (spec.md §4.4 step 1).
pub fn rsa_oaep_decrypt(private_key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    private_key
        .decrypt(Oaep::new::<Sha1>(), ciphertext)
        .map_err(|e| CommunicatorError::from(RsaOpError::from(e)))
}

/// RSA-PKCS1v1.5(SHA-256) signature over already-digested data (spec.md
/// §4.3 step 3: "sign SHA-256(serialized_props)"). Takes the raw message
/// and hashes internally — callers must not pre-hash (the signing key
/// hashes once, as `rsa::pkcs1v15::SigningKey` expects raw message bytes).
pub fn rsa_pkcs1_sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let mut rng = rand::rngs::OsRng;
    let signature = signing_key
        .try_sign_with_rng(&mut rng, message)
        .map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;
    let bytes: Box<[u8]> = signature.into();
    Ok(bytes.into_vec())
}

/// RSA-PKCS1v1.5(SHA-256) signature verification (spec.md §4.5, §4.8).
pub fn rsa_pkcs1_verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    let signature =
        Signature::try_from(signature).map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|e| CommunicatorError::BadIdentity(e.to_string()))
}

/// AES-128-CBC encrypt with PKCS#7 padding (spec.md §4.2, §4.3 step 6,
/// §4.6 step 7).
pub fn aes_cbc_encrypt(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// AES-128-CBC decrypt with PKCS#7 unpadding (spec.md §4.4 step 2, §4.7
/// step 6). Fails if the ciphertext is not block-aligned or the padding is
/// invalid.
pub fn aes_cbc_decrypt(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CommunicatorError::InvalidCipher)
}

/// HMAC-SHA1(hmac_key, data) (spec.md §4.2, §3 invariant 3, §4.8).
pub fn hmac_sha1(hmac_key: &[u8; HMAC_KEY_LEN], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(hmac_key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time HMAC comparison (spec.md §3 invariant 3).
pub fn hmac_sha1_verify(hmac_key: &[u8; HMAC_KEY_LEN], data: &[u8], expected: &[u8]) -> bool {
    let mut mac = HmacSha1::new_from_slice(hmac_key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.verify_slice(expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::generate_identity;

    #[test]
    fn aes_cbc_round_trips() {
        let key = [7u8; KEY_LEN];
        let iv = [9u8; IV_LEN];
        let plaintext = b"a message that is not block aligned";
        let ciphertext = aes_cbc_encrypt(&key, &iv, plaintext);
        assert_eq!(aes_cbc_decrypt(&key, &iv, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn hmac_verify_rejects_tampered_data() {
        let key = [1u8; HMAC_KEY_LEN];
        let mac = hmac_sha1(&key, b"hello");
        assert!(hmac_sha1_verify(&key, b"hello", &mac));
        assert!(!hmac_sha1_verify(&key, b"hellO", &mac));
    }

    #[test]
    fn rsa_oaep_round_trips() {
        let identity = generate_identity("alice", &crate::collaborators::OsCsprng);
        let public = identity.private_key().to_public_key();
        let ciphertext = rsa_oaep_encrypt(&public, b"session key material").unwrap();
        let plaintext = rsa_oaep_decrypt(identity.private_key(), &ciphertext).unwrap();
        assert_eq!(plaintext, b"session key material");
    }

    #[test]
    fn rsa_pkcs1_signature_round_trips_and_detects_tampering() {
        let identity = generate_identity("bob", &crate::collaborators::OsCsprng);
        let public = identity.private_key().to_public_key();
        let signature = rsa_pkcs1_sign(identity.private_key(), b"serialized props").unwrap();
        assert!(rsa_pkcs1_verify(&public, b"serialized props", &signature).is_ok());
        assert!(rsa_pkcs1_verify(&public, b"tampered props", &signature).is_err());
    }
}
