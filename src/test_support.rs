//! Test fixtures: self-signed RSA identities, cheap enough to generate
//! per-test. Gated behind `cfg(test)` / the `mock` feature so it never
//! ships in a release build, mirroring how `nl_wallet_mdoc`'s `generate`
//! feature gates its own `rcgen`-based certificate fixtures.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_RSA_SHA256};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;

use crate::collaborators::Csprng;
use crate::identity::Identity;

/// Key size small enough for tests to generate many identities quickly.
/// Production identities are expected to be provisioned out-of-band at a
/// real key size (2048+ bits); this crate never generates identity keys
/// itself outside of tests.
const TEST_KEY_BITS: usize = 1024;

/// Builds a self-signed RSA identity for `cn`, usable directly with
/// `PublicKeyDirectory::put(cn, identity.public_key_der()?)`.
pub fn generate_identity(cn: &str, csprng: &dyn Csprng) -> Identity {
    let _ = csprng; // key generation uses its own RNG; kept for call-site symmetry
    let private_key =
        RsaPrivateKey::new(&mut rand::rngs::OsRng, TEST_KEY_BITS).expect("RSA key generation failed");

    let pkcs8_der = private_key
        .to_pkcs8_der()
        .expect("PKCS8 encoding failed")
        .as_bytes()
        .to_vec();
    let key_pair = KeyPair::from_der(&pkcs8_der).expect("rcgen rejected the RSA key pair");

    let mut params = CertificateParams::new(Vec::new());
    params.alg = &PKCS_RSA_SHA256;
    params.key_pair = Some(key_pair);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;

    let cert = rcgen::Certificate::from_params(params).expect("self-signed certificate generation failed");
    let certificate_pem = cert.serialize_pem().expect("certificate PEM serialization failed");
    let private_key_pem = private_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .expect("PKCS1 PEM encoding failed")
        .to_string();

    Identity::from_pem(&private_key_pem, &certificate_pem).expect("generated identity failed to parse")
}
