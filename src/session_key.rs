//! `SessionKey` construction (local) and parse/verify (remote) — spec.md
//! §4.3, §4.4, §4.5.
//!
//! Grounded on `nl_wallet_mdoc::utils::crypto::SessionKey`, which is built
//! one way locally (from an ephemeral DH exchange) and represents the same
//! concept when received; generalized here from ECDH+HKDF to RSA-OAEP wrap
//! + RSA-PKCS1 sign, since this protocol's peers authenticate via RSA
//! certificates rather than ephemeral ECDH.

use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    cipher,
    collaborators::{Csprng, MetricsSink, PublicKeyDirectory},
    error::{CommunicatorError, Result},
    identity,
    metrics::RSA_OPERATIONS,
    wire::{self, CipherMetadata, CipherProperties},
};

/// The raw symmetric material (spec.md §3 invariant 1: each is 128 bits).
/// Zeroized on drop — cached `SessionKey`s hold key material in memory for
/// as long as their cache entry lives (spec.md §5).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKeys {
    pub key: [u8; cipher::KEY_LEN],
    pub iv: [u8; cipher::IV_LEN],
    pub hmac_key: [u8; cipher::HMAC_KEY_LEN],
}

/// A freshly derived (or received) per-peer symmetric keying bundle, plus
/// its wrapped envelope and attribution metadata (spec.md §3's
/// `SessionKey`).
#[derive(Clone)]
pub struct SessionKey {
    pub props: SymmetricKeys,
    /// The exact bytes that were RSA-OAEP-wrapped / RSA-PKCS1-signed; kept
    /// verbatim so re-verification never depends on re-serializing.
    serialized_props: Vec<u8>,
    pub wrapped_props: Vec<u8>,
    pub cipher_metadata: Option<CipherMetadata>,
    pub wrapped_metadata: Option<Vec<u8>>,
    /// True by construction for a locally built `SessionKey`; false for a
    /// received one until `verify` succeeds (spec.md §3's invariant).
    pub signature_verified: bool,
}

impl SessionKey {
    /// Builds a fresh `SessionKey` for sending to `destination_cn` (spec.md
    /// §4.3). `source_cn` is attributed in the `CipherMetadata` so the peer
    /// can recognize us once it learns our public key.
    pub fn build_local(
        source_cn: &str,
        destination_cn: &str,
        private_key: &RsaPrivateKey,
        directory: &dyn PublicKeyDirectory,
        csprng: &dyn Csprng,
        metrics: &dyn MetricsSink,
    ) -> Result<Self> {
        let key: [u8; cipher::KEY_LEN] = csprng
            .bytes(cipher::KEY_LEN)
            .try_into()
            .expect("Csprng::bytes returns exactly the requested length");
        let iv: [u8; cipher::IV_LEN] = csprng
            .bytes(cipher::IV_LEN)
            .try_into()
            .expect("Csprng::bytes returns exactly the requested length");
        let hmac_key: [u8; cipher::HMAC_KEY_LEN] = csprng
            .bytes(cipher::HMAC_KEY_LEN)
            .try_into()
            .expect("Csprng::bytes returns exactly the requested length");
        let props = SymmetricKeys { key, iv, hmac_key };

        let serialized_props = wire::serialize(&CipherProperties {
            name: cipher::CIPHER_NAME.to_owned(),
            key: props.key.to_vec().into(),
            iv: props.iv.to_vec().into(),
            hmac_key: props.hmac_key.to_vec().into(),
        })?;

        let signature = cipher::rsa_pkcs1_sign(private_key, &serialized_props)?;
        let metadata = CipherMetadata {
            source: source_cn.to_owned(),
            signature: signature.into(),
        };
        let serialized_metadata = wire::serialize(&metadata)?;

        let destination_key_der = directory
            .get(destination_cn)
            .map_err(|_| CommunicatorError::UnknownPeer(destination_cn.to_owned()))?;
        let destination_key = identity::public_key_from_der(&destination_key_der)?;
        let wrapped_props = cipher::rsa_oaep_encrypt(&destination_key, &serialized_props)?;
        metrics.inc(RSA_OPERATIONS);

        let wrapped_metadata = cipher::aes_cbc_encrypt(&props.key, &props.iv, &serialized_metadata);

        Ok(SessionKey {
            props,
            serialized_props,
            wrapped_props,
            cipher_metadata: Some(metadata),
            wrapped_metadata: Some(wrapped_metadata),
            signature_verified: true,
        })
    }

    /// Unwraps a received `ClientCommunication`'s cipher envelope (spec.md
    /// §4.4). For wire version < 3 `cipher_metadata` stays `None`: the
    /// sender is not attributed until the inner `SignedMessageList` is
    /// decoded (spec.md §4.7 step 9).
    pub fn parse_remote(
        api_version: u32,
        encrypted_cipher: &[u8],
        encrypted_cipher_metadata: Option<&[u8]>,
        private_key: &RsaPrivateKey,
        directory: &dyn PublicKeyDirectory,
        metrics: &dyn MetricsSink,
    ) -> Result<Self> {
        let serialized_props = cipher::rsa_oaep_decrypt(private_key, encrypted_cipher)?;
        let cipher_props: CipherProperties = wire::deserialize(&serialized_props)?;

        let props = SymmetricKeys {
            key: cipher_props
                .key
                .into_vec()
                .try_into()
                .map_err(|_| CommunicatorError::InvalidCipher)?,
            iv: cipher_props
                .iv
                .into_vec()
                .try_into()
                .map_err(|_| CommunicatorError::InvalidCipher)?,
            hmac_key: cipher_props
                .hmac_key
                .into_vec()
                .try_into()
                .map_err(|_| CommunicatorError::InvalidCipher)?,
        };

        let mut session_key = SessionKey {
            props,
            serialized_props,
            wrapped_props: encrypted_cipher.to_vec(),
            cipher_metadata: None,
            wrapped_metadata: encrypted_cipher_metadata.map(|b| b.to_vec()),
            signature_verified: false,
        };

        if api_version >= 3 {
            let encrypted_metadata = encrypted_cipher_metadata.ok_or(CommunicatorError::InvalidCipher)?;
            let serialized_metadata =
                cipher::aes_cbc_decrypt(&session_key.props.key, &session_key.props.iv, encrypted_metadata)?;
            let metadata: CipherMetadata = wire::deserialize(&serialized_metadata)?;
            session_key.cipher_metadata = Some(metadata);
            session_key.verify(directory, metrics);
        }

        Ok(session_key)
    }

    /// Signature verification (spec.md §4.5). An unknown-source lookup
    /// failure is swallowed: `signature_verified` stays `false` and a later
    /// call (once the peer's certificate is known) may succeed — this is a
    /// deliberate, documented contract (spec.md §9), not an oversight.
    pub fn verify(&mut self, directory: &dyn PublicKeyDirectory, metrics: &dyn MetricsSink) {
        let Some(metadata) = &self.cipher_metadata else {
            return;
        };
        if metadata.signature.is_empty() {
            return;
        }
        let Ok(source_key_der) = directory.get(&metadata.source) else {
            return;
        };
        let Ok(source_key) = identity::public_key_from_der(&source_key_der) else {
            return;
        };
        if cipher::rsa_pkcs1_verify(&source_key, &self.serialized_props, &metadata.signature).is_ok() {
            self.signature_verified = true;
            metrics.inc(RSA_OPERATIONS);
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.cipher_metadata.as_ref().map(|m| m.source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collaborators::OsCsprng, directory::InMemoryDirectory, metrics::CountingMetrics,
        test_support::generate_identity,
    };

    fn put_into(directory: &InMemoryDirectory, cn: &str, der: Vec<u8>) {
        directory.put(cn, der);
    }

    #[test]
    fn local_session_key_is_verified_by_construction() {
        let alice = generate_identity("alice", &OsCsprng);
        let bob = generate_identity("bob", &OsCsprng);
        let directory = InMemoryDirectory::new(64);
        put_into(&directory, "bob", bob.public_key_der().unwrap());

        let metrics = CountingMetrics::new();
        let session_key = SessionKey::build_local(
            alice.common_name(),
            "bob",
            alice.private_key(),
            &directory,
            &OsCsprng,
            &metrics,
        )
        .unwrap();

        assert!(session_key.signature_verified);
        assert_eq!(metrics.get(RSA_OPERATIONS), 1);
    }

    #[test]
    fn remote_parse_defers_verification_until_source_is_known() {
        let alice = generate_identity("alice", &OsCsprng);
        let bob = generate_identity("bob", &OsCsprng);
        let directory = InMemoryDirectory::new(64);
        put_into(&directory, "bob", bob.public_key_der().unwrap());

        let metrics = CountingMetrics::new();
        let local = SessionKey::build_local(
            alice.common_name(),
            "bob",
            alice.private_key(),
            &directory,
            &OsCsprng,
            &metrics,
        )
        .unwrap();

        // Bob receives it but does not yet know Alice's public key.
        let empty_directory = InMemoryDirectory::new(64);
        let mut remote = SessionKey::parse_remote(
            3,
            &local.wrapped_props,
            local.wrapped_metadata.as_deref(),
            bob.private_key(),
            &empty_directory,
            &metrics,
        )
        .unwrap();
        assert!(!remote.signature_verified);

        // Once Alice's certificate arrives, a retried verify succeeds.
        put_into(&empty_directory, "alice", alice.public_key_der().unwrap());
        remote.verify(&empty_directory, &metrics);
        assert!(remote.signature_verified);
    }
}
