//! The metrics collaborator (spec.md §6): a sink of named counters. Kept as
//! an explicit trait handed to the `Communicator` at construction rather
//! than a process-global registry, per spec.md §9's design note on
//! process-wide state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Counter names the codec and communicator raise during encode/decode.
pub const AUTHENTICATED_MESSAGES: &str = "grr_authenticated_messages";
pub const UNAUTHENTICATED_MESSAGES: &str = "grr_unauthenticated_messages";
pub const RSA_OPERATIONS: &str = "grr_rsa_operations";
pub const DECODING_ERROR: &str = "grr_decoding_error";
pub const DECRYPTION_ERROR: &str = "grr_decryption_error";
pub const REKEY_ERROR: &str = "grr_rekey_error";
pub const CLIENT_UNKNOWN: &str = "grr_client_unknown";

/// A sink of named counters (spec.md §6: `metrics.inc(name)`).
pub trait MetricsSink: Send + Sync {
    fn inc(&self, name: &'static str);
}

/// In-memory counters, handy for tests and for hosts that haven't wired in
/// a real metrics backend yet. Logs at `debug` on every increment, matching
/// the observability level `configuration_server::server` uses for routine
/// request handling.
#[derive(Debug, Default, Clone)]
pub struct CountingMetrics {
    counts: Arc<Mutex<HashMap<&'static str, u64>>>,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &'static str) -> u64 {
        self.counts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl MetricsSink for CountingMetrics {
    fn inc(&self, name: &'static str) {
        tracing::debug!(counter = name, "metric incremented");
        *self.counts.lock().unwrap().entry(name).or_insert(0) += 1;
    }
}
