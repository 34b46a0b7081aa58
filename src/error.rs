//! Error taxonomy for the communicator, with a metric-name table attached to
//! each fatal variant (spec.md §7, §9).

use thiserror::Error;

/// Every error the communicator can surface. Authentication failure is
/// deliberately *not* represented here: an unauthenticated batch is a
/// successful decode with an `AuthState::Unauthenticated` attribute, not an
/// error (spec.md §7 "Recovery policy").
#[derive(Debug, Error)]
pub enum CommunicatorError {
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u32),

    #[error("frame carries no encrypted_cipher; plaintext frames are rejected")]
    PlaintextRejected,

    #[error("RSA unwrap of the session key failed: {0}")]
    Decryption(#[from] RsaOpError),

    #[error("cipher properties key/iv/hmac_key have the wrong length")]
    InvalidCipher,

    #[error("decoding failed: {0}")]
    Decoding(#[source] DecodingError),

    #[error("HMAC-SHA1 over the encrypted payload did not match")]
    HmacMismatch,

    #[error("destination {0:?} has no known public key")]
    UnknownPeer(String),

    #[error("certificate has no Subject common name")]
    NoCommonName,

    #[error("public key for common name {0:?} was not found in the directory")]
    NoCertificate(String),

    #[error("identity private key could not be used: {0}")]
    BadIdentity(String),
}

/// RSA operations fail as a unit (wrong padding, wrong key, corrupted
/// ciphertext) — the underlying `rsa` crate intentionally does not
/// distinguish these outcomes, to avoid a padding-oracle side channel.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RsaOpError(pub String);

impl From<rsa::Error> for RsaOpError {
    fn from(err: rsa::Error) -> Self {
        RsaOpError(err.to_string())
    }
}

impl From<rsa::Error> for CommunicatorError {
    fn from(err: rsa::Error) -> Self {
        CommunicatorError::Decryption(RsaOpError::from(err))
    }
}

/// Inner-message decoding failures: zlib inflate, CBOR parse, unknown
/// compression scheme.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("zlib inflate failed: {0}")]
    Inflate(String),

    #[error("CBOR deserialization failed: {0}")]
    Cbor(String),

    #[error("unknown compression scheme tag {0}")]
    UnknownCompression(u8),
}

impl From<DecodingError> for CommunicatorError {
    fn from(err: DecodingError) -> Self {
        CommunicatorError::Decoding(err)
    }
}

/// Metric counter name a fatal error increments, per spec.md §7's table.
/// Only `DECRYPTION_ERROR` and `DECODING_ERROR` carry a dedicated counter;
/// the rest are fatal without a metric of their own. `grr_client_unknown`
/// and `grr_rekey_error` are *not* raised as errors at all — they are
/// incremented directly during authentication (see `session_key.rs` /
/// `codec.rs`) because an unknown peer yields `UNAUTHENTICATED`, not a
/// failure.
impl CommunicatorError {
    pub fn counter_name(&self) -> Option<&'static str> {
        match self {
            CommunicatorError::Decryption(_) | CommunicatorError::InvalidCipher => {
                Some(crate::metrics::DECRYPTION_ERROR)
            }
            CommunicatorError::Decoding(_) => Some(crate::metrics::DECODING_ERROR),
            CommunicatorError::UnsupportedVersion(_)
            | CommunicatorError::PlaintextRejected
            | CommunicatorError::HmacMismatch
            | CommunicatorError::UnknownPeer(_)
            | CommunicatorError::NoCommonName
            | CommunicatorError::NoCertificate(_)
            | CommunicatorError::BadIdentity(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommunicatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decryption_errors_map_to_the_decryption_counter() {
        let err = CommunicatorError::Decryption(RsaOpError("bad padding".to_owned()));
        assert_matches!(err.counter_name(), Some("grr_decryption_error"));
    }

    #[test]
    fn unknown_peer_has_no_dedicated_counter() {
        let err = CommunicatorError::UnknownPeer("bob".to_owned());
        assert_matches!(err.counter_name(), None);
    }
}
