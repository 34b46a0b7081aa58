//! `PubKeyDirectory` (spec.md §4.1): an in-memory cache mapping peer common
//! name to RSA public key (DER). Grounded on the cache-wrapped-lookup shape
//! `nl_wallet_mdoc::utils::x509` uses for certificate parsing; the bound of
//! 50,000 entries is enforced with an `lru::LruCache`
//! (`tokamak-network-ethrex/crates/storage/store.rs`'s `LruCache` usage).

use std::{num::NonZeroUsize, sync::Mutex};

use lru::LruCache;

use crate::{
    collaborators::PublicKeyDirectory,
    config::DEFAULT_CACHE_CAPACITY,
    error::{CommunicatorError, Result},
};

/// `PublicKeyEntry` (spec.md §3): `{ cn, rsa_public_key }`, bounded LRU of
/// capacity 50,000 (spec.md §4.1). Eviction is opaque to callers.
pub struct InMemoryDirectory {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl InMemoryDirectory {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        InMemoryDirectory {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl PublicKeyDirectory for InMemoryDirectory {
    fn put(&self, cn: &str, public_key_der: Vec<u8>) {
        self.entries.lock().unwrap().put(cn.to_owned(), public_key_der);
    }

    fn get(&self, cn: &str) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(cn)
            .cloned()
            .ok_or_else(|| CommunicatorError::NoCertificate(cn.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_fails_with_no_certificate() {
        let directory = InMemoryDirectory::new(4);
        let err = directory.get("ghost").unwrap_err();
        assert!(matches!(err, CommunicatorError::NoCertificate(cn) if cn == "ghost"));
    }

    #[test]
    fn eviction_respects_capacity() {
        let directory = InMemoryDirectory::new(2);
        directory.put("a", vec![1]);
        directory.put("b", vec![2]);
        directory.put("c", vec![3]); // evicts "a" (least recently used)
        assert!(directory.get("a").is_err());
        assert!(directory.get("b").is_ok());
        assert!(directory.get("c").is_ok());
    }
}
