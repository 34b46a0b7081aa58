//! An endpoint's RSA identity: certificate plus private key (spec.md §3).
//!
//! Grounded on `nl_wallet_mdoc::utils::x509::Certificate`, which unifies
//! PEM/DER parsing behind a single typed wrapper; generalized here from
//! ECDSA to RSA since that is what spec.md §1 mandates for this wire
//! protocol.

use rsa::{
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey},
    pkcs8::DecodePublicKey,
    RsaPrivateKey, RsaPublicKey,
};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{CommunicatorError, Result};

/// `source_cn` / `destination_cn` throughout the rest of the crate.
pub type CommonName = String;

/// `{ pem_private_key, pem_certificate, common_name }` from spec.md §3.
/// `common_name` is derived once, at construction, from the certificate's
/// Subject CN (spec.md §3, §4.1's `cn_of`).
pub struct Identity {
    private_key: RsaPrivateKey,
    certificate_der: Vec<u8>,
    common_name: CommonName,
}

impl Identity {
    /// Parses a PEM-encoded PKCS#1 RSA private key and a PEM-encoded X.509
    /// certificate, deriving `common_name` from the certificate's Subject.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(private_key_pem)
            .map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;

        let (_, pem) = x509_parser::pem::parse_x509_pem(certificate_pem.as_bytes())
            .map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;
        let common_name = common_name_of_der(&pem.contents)?;

        Ok(Identity {
            private_key,
            certificate_der: pem.contents,
            common_name,
        })
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// The identity's own public key, in PKCS#1 DER, suitable for
    /// `PublicKeyDirectory::put`.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        public_key_to_der(&self.private_key.to_public_key())
    }
}

/// Extracts the Subject common name from a DER-encoded certificate
/// (`cn_of`, spec.md §4.1). Fails with `NoCommonName` if there is no CN
/// attribute in the Subject (`NO_CN`).
pub fn common_name_of_der(cert_der: &[u8]) -> Result<CommonName> {
    let (_, cert) =
        X509Certificate::from_der(cert_der).map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_owned())
        .ok_or(CommunicatorError::NoCommonName)
}

/// Extracts the RSA public key embedded in a DER-encoded certificate's
/// `SubjectPublicKeyInfo` (`pub_key_of`, spec.md §4.1), returned as PKCS#1
/// DER to match `Identity::public_key_der`/`public_key_from_der` elsewhere
/// in this module. Decodes the full SPKI DER rather than assuming anything
/// about the inner BIT STRING's content octets, the same way
/// `nl_wallet_mdoc::utils::x509::Certificate::public_key` decodes
/// `cert.public_key().raw` instead of reaching into `subject_public_key`.
pub fn public_key_of_der(cert_der: &[u8]) -> Result<Vec<u8>> {
    let (_, cert) =
        X509Certificate::from_der(cert_der).map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;
    let public_key = RsaPublicKey::from_public_key_der(cert.public_key().raw)
        .map_err(|e| CommunicatorError::BadIdentity(e.to_string()))?;
    public_key_to_der(&public_key)
}

pub(crate) fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    key.to_pkcs1_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| CommunicatorError::BadIdentity(e.to_string()))
}

pub(crate) fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(der).map_err(|e| CommunicatorError::BadIdentity(e.to_string()))
}
