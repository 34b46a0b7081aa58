//! External collaborator interfaces (spec.md §1, §6). These are deliberately
//! thin traits: the communicator depends on them, but none of their real
//! implementations (a networked certificate directory, a production RNG
//! pool, an application message codec tied to a concrete message type)
//! belong in this crate.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::error::{CommunicatorError, Result};

/// Maps a peer common name to its RSA public key (spec.md §4.1).
pub trait PublicKeyDirectory: Send + Sync {
    fn put(&self, cn: &str, public_key_der: Vec<u8>);

    /// Fails with `NoCertificate` if `cn` is unknown (`NO_CERT`).
    fn get(&self, cn: &str) -> Result<Vec<u8>>;
}

/// Produces microsecond-resolution timestamps (spec.md §3's
/// `SignedMessageList.timestamp`, §6's `clock.now_micros()`).
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// A cryptographically secure source of randomness (spec.md §6's
/// `csprng.bytes(n)`), used both for fresh key material and as a sink that
/// absorbs ciphertext entropy on decode (spec.md §4.7 step 4).
pub trait Csprng: Send + Sync {
    fn bytes(&self, n: usize) -> Vec<u8>;

    /// Best-effort entropy feed; not a correctness step (spec.md §4.7 step 4).
    fn feed(&self, _data: &[u8]) {}
}

/// Serializes and deserializes a batch of opaque application messages
/// (spec.md §1's "application message codec"). `M` is the host's message
/// type; this crate never inspects message contents.
pub trait MessageCodec<M>: Send + Sync {
    fn encode_batch(&self, messages: &[M]) -> Result<Vec<u8>>;
    fn decode_batch(&self, bytes: &[u8]) -> Result<Vec<M>>;
}

/// `std::time::SystemTime`-backed clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_micros() as u64
    }
}

/// `rand::rngs::OsRng`-backed CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCsprng;

impl Csprng for OsCsprng {
    fn bytes(&self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        rand::rngs::OsRng.fill_bytes(&mut buf);
        buf
    }
}

/// A `MessageCodec` for any message type that is a flat byte blob — the
/// simplest case, and the one the integration tests exercise. Batches are
/// CBOR-encoded as a `Vec<Vec<u8>>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl MessageCodec<Vec<u8>> for BytesCodec {
    fn encode_batch(&self, messages: &[Vec<u8>]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::into_writer(&messages, &mut out)
            .map_err(|e| CommunicatorError::from(crate::error::DecodingError::Cbor(e.to_string())))?;
        Ok(out)
    }

    fn decode_batch(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
        ciborium::from_reader(bytes)
            .map_err(|e| CommunicatorError::from(crate::error::DecodingError::Cbor(e.to_string())))
    }
}
