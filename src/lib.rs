//! A secure message-framing communicator: hybrid RSA/AES wire protocol
//! with HMAC-SHA1 attribution, deferred signature verification, and
//! replay defense against stale timestamps.
//!
//! The crate is organized the way `nl_wallet_mdoc` organizes its own
//! crypto layer: small, independently testable modules (`cipher`,
//! `wire`, `session_key`) composed by one orchestrator (`communicator`),
//! with every external dependency — certificate directory, clock,
//! randomness, metrics, application message codec — injected as a trait
//! rather than reached for globally.

pub mod cipher;
pub mod codec;
pub mod collaborators;
pub mod communicator;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod session_key;
pub mod wire;

#[cfg(feature = "mock")]
pub mod test_support;

pub use codec::AuthState;
pub use communicator::{Communicator, Decoded};
pub use config::{CommunicatorConfig, CompressionPolicy};
pub use error::{CommunicatorError, Result};
pub use identity::Identity;
