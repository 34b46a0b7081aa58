//! `FrameCodec` (spec.md §4.6–§4.8): encodes and decodes the outer
//! `ClientCommunication`, including the opportunistic zlib compression,
//! the version-2/version-3 branch, and HMAC/signature authentication.
//!
//! Grounded on the compress-then-wrap pipeline shape of
//! `nl_wallet_mdoc::utils::crypto::SessionData::encrypt`/`decrypt`, split
//! into the two wire-version branches spec.md §4.6–§4.7 require. zlib
//! compression via `flate2`, grounded on
//! `evgeniy-scherbina-lpd/wire/Cargo.toml`'s own zlib dependency.

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression as FlateLevel};
use std::io::{Read, Write};
use tracing::{debug, warn};

use crate::{
    cipher,
    collaborators::{Csprng, MetricsSink, PublicKeyDirectory},
    config::CompressionPolicy,
    error::{CommunicatorError, DecodingError, Result},
    identity::Identity,
    metrics::{AUTHENTICATED_MESSAGES, UNAUTHENTICATED_MESSAGES},
    session_key::SessionKey,
    wire::{self, ClientCommunication, Compression, SignedMessageList},
};

/// Per-message attribution (spec.md §4.7 step 9, §4.8; not an error —
/// callers decide whether to act on `Unauthenticated`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

pub struct DecodedFrame {
    /// The (decompressed) serialized application-message batch; callers
    /// hand this to their `MessageCodec`.
    pub message_list: Vec<u8>,
    pub timestamp: u64,
    pub source: Option<String>,
    pub auth_state: AuthState,
}

fn zlib_compress(raw: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), FlateLevel::default());
    encoder.write_all(raw).expect("writing to an in-memory buffer cannot fail");
    encoder.finish().expect("writing to an in-memory buffer cannot fail")
}

fn zlib_decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CommunicatorError::from(DecodingError::Inflate(e.to_string())))?;
    Ok(out)
}

/// Encodes one batch (already serialized by the caller's `MessageCodec`)
/// into a `ClientCommunication` (spec.md §4.6). The destination
/// `SessionKey` must already be resolved (cached or freshly built) by the
/// caller — cache ownership belongs to `Communicator`, not this module.
#[allow(clippy::too_many_arguments)]
pub fn encode_frame(
    api_version: u32,
    timestamp: u64,
    identity: &Identity,
    session_key: &SessionKey,
    raw_batch: &[u8],
    compression_policy: CompressionPolicy,
    csprng: &dyn Csprng,
) -> Result<ClientCommunication> {
    if api_version != 2 && api_version != 3 {
        return Err(CommunicatorError::UnsupportedVersion(api_version));
    }

    let (message_list, compression) = match compression_policy {
        CompressionPolicy::Zcompress => {
            let compressed = zlib_compress(raw_batch);
            if compressed.len() < raw_batch.len() {
                (compressed, Compression::Zcompression)
            } else {
                (raw_batch.to_vec(), Compression::Uncompressed)
            }
        }
        CompressionPolicy::Uncompressed => (raw_batch.to_vec(), Compression::Uncompressed),
    };

    let mut signed_message_list = SignedMessageList {
        timestamp,
        compression: compression as u8,
        message_list: message_list.into(),
        source: None,
        signature: None,
    };

    if api_version == 2 {
        let digest_input = signed_message_list.message_list.as_slice();
        let signature = cipher::rsa_pkcs1_sign(identity.private_key(), digest_input)?;
        signed_message_list.source = Some(identity.common_name().to_owned());
        signed_message_list.signature = Some(signature.into());
    }

    let plain = wire::serialize(&signed_message_list)?;

    let (encrypted, outer_iv, hmac) = if api_version == 3 {
        let iv: [u8; cipher::IV_LEN] = csprng
            .bytes(cipher::IV_LEN)
            .try_into()
            .expect("Csprng::bytes returns exactly the requested length");
        let encrypted = cipher::aes_cbc_encrypt(&session_key.props.key, &iv, &plain);
        let hmac = cipher::hmac_sha1(&session_key.props.hmac_key, &encrypted);
        (encrypted, Some(iv.to_vec()), Some(hmac))
    } else {
        let encrypted = cipher::aes_cbc_encrypt(&session_key.props.key, &session_key.props.iv, &plain);
        (encrypted, None, None)
    };

    Ok(ClientCommunication {
        api_version,
        encrypted_cipher: session_key.wrapped_props.clone().into(),
        encrypted_cipher_metadata: session_key.wrapped_metadata.clone().map(Into::into),
        iv: outer_iv.map(Into::into),
        encrypted: encrypted.into(),
        hmac: hmac.map(Into::into),
    })
}

/// Decodes an already-parsed outer frame, given the resolved `SessionKey`
/// (cached or freshly built by `Communicator`) and the sender's previously
/// emitted nonce for replay defense (spec.md §4.7, §4.8).
pub fn decode_frame(
    outer: &ClientCommunication,
    session_key: &mut SessionKey,
    last_sent_timestamp: u64,
    directory: &dyn PublicKeyDirectory,
    metrics: &dyn MetricsSink,
) -> Result<DecodedFrame> {
    let iv: [u8; cipher::IV_LEN] = match &outer.iv {
        Some(iv) if !iv.is_empty() => iv
            .as_slice()
            .try_into()
            .map_err(|_| CommunicatorError::InvalidCipher)?,
        _ => session_key.props.iv,
    };

    let plain = cipher::aes_cbc_decrypt(&session_key.props.key, &iv, &outer.encrypted)?;
    let signed_message_list: SignedMessageList = wire::deserialize(&plain)?;
    debug!(
        api_version = outer.api_version,
        timestamp = signed_message_list.timestamp,
        "decoded inner signed message list"
    );

    let compression = Compression::try_from(signed_message_list.compression)?;
    let message_list = match compression {
        Compression::Zcompression => zlib_decompress(&signed_message_list.message_list)?,
        Compression::Uncompressed => signed_message_list.message_list.to_vec(),
    };

    let mut auth_state = authenticate(outer, session_key, &signed_message_list, directory, metrics)?;

    if auth_state == AuthState::Authenticated && signed_message_list.timestamp != last_sent_timestamp {
        warn!(
            timestamp = signed_message_list.timestamp,
            last_sent_timestamp, "replayed or stale timestamp; forcing unauthenticated"
        );
        auth_state = AuthState::Unauthenticated;
    }

    debug!(?auth_state, "frame decoded");
    metrics.inc(match auth_state {
        AuthState::Authenticated => AUTHENTICATED_MESSAGES,
        AuthState::Unauthenticated => UNAUTHENTICATED_MESSAGES,
    });

    let source = session_key
        .source()
        .map(str::to_owned)
        .or(signed_message_list.source);

    Ok(DecodedFrame {
        message_list,
        timestamp: signed_message_list.timestamp,
        source,
        auth_state,
    })
}

/// Authentication (spec.md §4.8), independent of the replay check (applied
/// by the caller on the returned state).
fn authenticate(
    outer: &ClientCommunication,
    session_key: &mut SessionKey,
    signed_message_list: &SignedMessageList,
    directory: &dyn PublicKeyDirectory,
    metrics: &dyn MetricsSink,
) -> Result<AuthState> {
    if outer.api_version == 2 {
        let (Some(source), Some(signature)) =
            (&signed_message_list.source, &signed_message_list.signature)
        else {
            return Ok(AuthState::Unauthenticated);
        };
        let Ok(source_key_der) = directory.get(source) else {
            warn!(source = %source, "unknown v2 sender; treating batch as unauthenticated");
            metrics.inc(crate::metrics::CLIENT_UNKNOWN);
            return Ok(AuthState::Unauthenticated);
        };
        let source_key = crate::identity::public_key_from_der(&source_key_der)?;
        if cipher::rsa_pkcs1_verify(&source_key, &signed_message_list.message_list, signature).is_ok() {
            metrics.inc(crate::metrics::RSA_OPERATIONS);
            return Ok(AuthState::Authenticated);
        }
        warn!(source = %source, "v2 signature verification failed");
        return Ok(AuthState::Unauthenticated);
    }

    // Version 3: HMAC over the ciphertext is load-bearing; a mismatch is
    // fatal, not merely unauthenticated (spec.md §3 invariant 3).
    let expected_hmac = outer.hmac.as_deref().ok_or(CommunicatorError::HmacMismatch)?;
    if !cipher::hmac_sha1_verify(&session_key.props.hmac_key, &outer.encrypted, expected_hmac) {
        warn!("HMAC-SHA1 over encrypted payload did not match");
        return Err(CommunicatorError::HmacMismatch);
    }

    if !session_key.signature_verified {
        session_key.verify(directory, metrics);
    }

    if session_key.signature_verified {
        Ok(AuthState::Authenticated)
    } else {
        warn!("session key signature still unverified after retry; batch is unauthenticated");
        metrics.inc(crate::metrics::REKEY_ERROR);
        Ok(AuthState::Unauthenticated)
    }
}
