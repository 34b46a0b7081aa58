//! Explicit configuration, constructed once by the host (spec.md §6, §9).
//! No knob here changes the wire contract — only the opportunistic
//! compression policy and the two cache lifetimes, exactly as spec.md §6
//! enumerates.

use std::time::Duration;

/// Compression policy for the inner `SignedMessageList.message_list`
/// (spec.md §6). Applied opportunistically: even with `Zcompress` selected,
/// the codec falls back to `Uncompressed` if deflating did not strictly
/// shrink the payload (spec.md §4.6 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPolicy {
    Zcompress,
    Uncompressed,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        CompressionPolicy::Zcompress
    }
}

/// Default capacity for both the public-key directory cache and the
/// envelope cache (spec.md §3, §4.1).
pub const DEFAULT_CACHE_CAPACITY: usize = 50_000;

#[derive(Debug, Clone)]
pub struct CommunicatorConfig {
    pub compression: CompressionPolicy,
    /// Wire version used by `Communicator::encode` when the caller doesn't
    /// override it.
    pub default_api_version: u32,
    /// How long a destination's `SessionKey` stays in the sender-side cache
    /// before a fresh one is derived (spec.md §3's destination cache,
    /// §5's `TimeBasedCache`).
    pub destination_cache_ttl: Duration,
    /// Bound on the receiver-side envelope cache, keyed by
    /// `encrypted_cipher` bytes (spec.md §3, §4.7 step 3).
    pub envelope_cache_capacity: usize,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        CommunicatorConfig {
            compression: CompressionPolicy::default(),
            default_api_version: 3,
            destination_cache_ttl: Duration::from_secs(60 * 60),
            envelope_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
