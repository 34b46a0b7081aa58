//! A minimal two-identity round trip, run from the command line.
//!
//! Stands in for the HTTP config-display surface the teacher repo built
//! around its communicator (out of scope here): this binary wires up two
//! in-process `Communicator`s, has one send a batch to the other, and
//! prints the decoded result and its attribution.

use communicator::{
    collaborators::{BytesCodec, OsCsprng, SystemClock},
    communicator::Communicator,
    config::CommunicatorConfig,
    directory::InMemoryDirectory,
    metrics::CountingMetrics,
};
use std::sync::Arc;
use tracing::info;

struct SharedDirectory(Arc<InMemoryDirectory>);

impl communicator::collaborators::PublicKeyDirectory for SharedDirectory {
    fn put(&self, cn: &str, public_key_der: Vec<u8>) {
        self.0.put(cn, public_key_der)
    }
    fn get(&self, cn: &str) -> communicator::Result<Vec<u8>> {
        self.0.get(cn)
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let directory = Arc::new(InMemoryDirectory::default());
    let alice = communicator::test_support::generate_identity("alice", &OsCsprng);
    let bob = communicator::test_support::generate_identity("bob", &OsCsprng);
    directory.put("alice", alice.public_key_der().expect("encode alice's public key"));
    directory.put("bob", bob.public_key_der().expect("encode bob's public key"));

    let alice_comm = Communicator::new(
        alice,
        CommunicatorConfig::default(),
        Box::new(SharedDirectory(directory.clone())),
        Box::new(SystemClock),
        Box::new(OsCsprng),
        Box::new(CountingMetrics::new()),
    );
    let bob_comm = Communicator::new(
        bob,
        CommunicatorConfig::default(),
        Box::new(SharedDirectory(directory)),
        Box::new(SystemClock),
        Box::new(OsCsprng),
        Box::new(CountingMetrics::new()),
    );

    let codec = BytesCodec;
    let messages = vec![b"hello from alice".to_vec()];

    let (frame, timestamp) = alice_comm
        .encode(&codec, &messages, "bob", None)
        .expect("encode failed");
    info!(frame_len = frame.len(), timestamp, "alice encoded a frame for bob");

    // Bob is expecting this exact timestamp back (spec's single-outstanding-
    // challenge replay model): seed it as if bob had issued the challenge.
    *bob_comm.last_sent_timestamp().lock().unwrap() = timestamp;

    let decoded = bob_comm.decode(&codec, &frame).expect("decode failed");
    info!(
        source = decoded.source.as_deref().unwrap_or("<unknown>"),
        auth_state = ?decoded.auth_state,
        "bob decoded alice's frame"
    );
    for message in &decoded.messages {
        println!("{}", String::from_utf8_lossy(message));
    }
}
