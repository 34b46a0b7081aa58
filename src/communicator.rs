//! `Communicator` (spec.md §1–§2): the orchestrator. Owns an `Identity`,
//! the sender-side destination cache, the receiver-side envelope cache,
//! and the `last_sent_timestamp` replay-defense state, and wires the
//! `FrameCodec` functions to the injected collaborators.
//!
//! Grounded on `nl_wallet_mdoc::utils::crypto::SessionData`'s role as the
//! single encrypt/decrypt entry point backed by a cache of established
//! sessions, generalized to two independent caches (spec.md §3's
//! destination cache and envelope cache serve different lifetimes and
//! different keys).

use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::Mutex,
    time::Instant,
};

use lru::LruCache;
use tracing::{debug, warn};

use crate::{
    codec::{self, AuthState},
    collaborators::{Clock, Csprng, MessageCodec, MetricsSink, PublicKeyDirectory},
    config::CommunicatorConfig,
    error::{CommunicatorError, Result},
    identity::Identity,
    session_key::SessionKey,
    wire::{self, ClientCommunication},
};

struct DestinationCacheEntry {
    session_key: SessionKey,
    inserted_at: Instant,
}

/// A decoded batch plus its attribution (spec.md §4.7 step 10).
pub struct Decoded<M> {
    pub messages: Vec<M>,
    pub source: Option<String>,
    pub timestamp: u64,
    pub auth_state: AuthState,
}

/// The orchestrator (spec.md §1's `Communicator`). Not `Sync` by itself —
/// wrap in a `Mutex` (or one per connection) if shared across threads, the
/// same way a host would guard any other stateful session object.
pub struct Communicator {
    identity: Identity,
    config: CommunicatorConfig,
    directory: Box<dyn PublicKeyDirectory>,
    clock: Box<dyn Clock>,
    csprng: Box<dyn Csprng>,
    metrics: Box<dyn MetricsSink>,

    /// Sender-side: one `SessionKey` per destination, refreshed once
    /// `destination_cache_ttl` elapses (spec.md §3, §4.3).
    destination_cache: Mutex<HashMap<String, DestinationCacheEntry>>,
    /// Receiver-side: one `SessionKey` per distinct `encrypted_cipher`
    /// envelope seen, bounded to `envelope_cache_capacity` (spec.md §3,
    /// §4.4 step 3).
    envelope_cache: Mutex<LruCache<Vec<u8>, SessionKey>>,
    /// The timestamp this `Communicator` most recently emitted in an
    /// encoded frame; used to detect replayed decodes (spec.md §4.8).
    last_sent_timestamp: Mutex<u64>,
}

impl Communicator {
    pub fn new(
        identity: Identity,
        config: CommunicatorConfig,
        directory: Box<dyn PublicKeyDirectory>,
        clock: Box<dyn Clock>,
        csprng: Box<dyn Csprng>,
        metrics: Box<dyn MetricsSink>,
    ) -> Self {
        let envelope_capacity =
            NonZeroUsize::new(config.envelope_cache_capacity.max(1)).expect("capacity is at least 1");
        Communicator {
            identity,
            config,
            directory,
            clock,
            csprng,
            metrics,
            destination_cache: Mutex::new(HashMap::new()),
            envelope_cache: Mutex::new(LruCache::new(envelope_capacity)),
            last_sent_timestamp: Mutex::new(0),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Direct access to the replay-defense nonce, for hosts that need to
    /// seed it explicitly (e.g. a challenge/response handshake where the
    /// peer is expected to echo a timestamp we have not yet sent via
    /// `encode`).
    pub fn last_sent_timestamp(&self) -> &Mutex<u64> {
        &self.last_sent_timestamp
    }

    /// Learns a peer's public key, e.g. freshly fetched from a directory
    /// service outside this crate (spec.md §4.1).
    pub fn learn_peer(&self, cn: &str, public_key_der: Vec<u8>) {
        self.directory.put(cn, public_key_der);
    }

    /// Encodes one batch of application messages for `destination_cn`
    /// (spec.md §4.6). Returns the serialized `ClientCommunication` and the
    /// timestamp stamped into it.
    pub fn encode<M>(
        &self,
        codec: &dyn MessageCodec<M>,
        messages: &[M],
        destination_cn: &str,
        api_version: Option<u32>,
    ) -> Result<(Vec<u8>, u64)> {
        let api_version = api_version.unwrap_or(self.config.default_api_version);
        let timestamp = self.clock.now_micros();

        let session_key = self.resolve_destination_session_key(destination_cn)?;
        let raw_batch = codec.encode_batch(messages)?;

        let frame = codec::encode_frame(
            api_version,
            timestamp,
            &self.identity,
            &session_key,
            &raw_batch,
            self.config.compression,
            self.csprng.as_ref(),
        )?;

        *self.last_sent_timestamp.lock().unwrap() = timestamp;

        Ok((wire::serialize(&frame)?, timestamp))
    }

    /// Decodes a received `ClientCommunication` (spec.md §4.7). The batch's
    /// `AuthState` reflects both signature/HMAC validity and the replay
    /// check against this `Communicator`'s own `last_sent_timestamp`.
    pub fn decode<M>(&self, codec: &dyn MessageCodec<M>, bytes: &[u8]) -> Result<Decoded<M>> {
        let outer: ClientCommunication = wire::deserialize(bytes)?;
        debug!(api_version = outer.api_version, frame_len = bytes.len(), "decoding frame");

        if outer.api_version != 2 && outer.api_version != 3 {
            warn!(api_version = outer.api_version, "rejecting unsupported wire version");
            return Err(CommunicatorError::UnsupportedVersion(outer.api_version));
        }
        if outer.encrypted_cipher.is_empty() {
            warn!("rejecting frame with no encrypted_cipher (plaintext frame)");
            return Err(CommunicatorError::PlaintextRejected);
        }

        self.csprng.feed(&outer.encrypted);

        let mut session_key = self.resolve_envelope_session_key(&outer)?;
        let last_sent_timestamp = *self.last_sent_timestamp.lock().unwrap();

        let decoded = codec::decode_frame(
            &outer,
            &mut session_key,
            last_sent_timestamp,
            self.directory.as_ref(),
            self.metrics.as_ref(),
        );

        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "frame rejected during decode");
                if let Some(counter) = err.counter_name() {
                    self.metrics.inc(counter);
                }
                return Err(err);
            }
        };

        if session_key.signature_verified {
            self.envelope_cache
                .lock()
                .unwrap()
                .put(outer.encrypted_cipher.to_vec(), session_key);
        }

        let messages = codec.decode_batch(&decoded.message_list)?;

        debug!(
            source = decoded.source.as_deref().unwrap_or("<unknown>"),
            auth_state = ?decoded.auth_state,
            "frame decoded and attributed"
        );

        Ok(Decoded {
            messages,
            source: decoded.source,
            timestamp: decoded.timestamp,
            auth_state: decoded.auth_state,
        })
    }

    fn resolve_destination_session_key(&self, destination_cn: &str) -> Result<SessionKey> {
        {
            let cache = self.destination_cache.lock().unwrap();
            if let Some(entry) = cache.get(destination_cn) {
                if entry.inserted_at.elapsed() < self.config.destination_cache_ttl {
                    return Ok(entry.session_key.clone());
                }
            }
        }

        let session_key = SessionKey::build_local(
            self.identity.common_name(),
            destination_cn,
            self.identity.private_key(),
            self.directory.as_ref(),
            self.csprng.as_ref(),
            self.metrics.as_ref(),
        )?;

        self.destination_cache.lock().unwrap().insert(
            destination_cn.to_owned(),
            DestinationCacheEntry {
                session_key: session_key.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(session_key)
    }

    /// Looks up a previously-unwrapped `SessionKey` by its exact
    /// `encrypted_cipher` envelope bytes (spec.md §4.7 step 3); on a miss,
    /// unwraps it fresh via our own private key.
    fn resolve_envelope_session_key(&self, outer: &ClientCommunication) -> Result<SessionKey> {
        let key = outer.encrypted_cipher.to_vec();
        if let Some(session_key) = self.envelope_cache.lock().unwrap().get(&key) {
            return Ok(session_key.clone());
        }

        SessionKey::parse_remote(
            outer.api_version,
            &outer.encrypted_cipher,
            outer.encrypted_cipher_metadata.as_deref(),
            self.identity.private_key(),
            self.directory.as_ref(),
            self.metrics.as_ref(),
        )
    }
}
