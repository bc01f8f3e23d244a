//! Shared test helpers
//!
//! This module provides the fixtures the integration suites share: test
//! validators with real ECDSA keys, message and commitment builders, a
//! config pointed at a WireMock server, and mock mounts for the chain REST
//! endpoints and archival checkpoint storage.

use std::collections::HashMap;

use k256::ecdsa::SigningKey;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ism_prover::config::{ChainConfig, Config, OriginChainConfig, ProverConfig};
use ism_prover::crypto::{checkpoint_digest, ethereum_address};
use ism_prover::types::{Address, Checkpoint, Commitment, Message, SignedCheckpoint, Signature65, B256};

pub const ORIGIN_DOMAIN: u32 = 1000;
pub const DESTINATION_DOMAIN: u32 = 2000;
pub const HOOK_ADDRESS: B256 = B256([0x33; 32]);

/// Initializes test logging once; repeat calls are no-ops.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ============================================================================
// TEST VALIDATORS
// ============================================================================

/// A validator with a real signing key, for producing checkpoints the
/// prover must accept.
pub struct TestValidator {
    pub key: SigningKey,
}

impl TestValidator {
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    pub fn address(&self) -> Address {
        ethereum_address(self.key.verifying_key()).expect("valid test key")
    }

    /// Signs a checkpoint the way a well-behaved validator would.
    pub fn sign(&self, checkpoint: Checkpoint) -> SignedCheckpoint {
        let digest = checkpoint_digest(&checkpoint);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .expect("signing cannot fail for a valid key");
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        SignedCheckpoint {
            value: checkpoint,
            signature: Signature65(bytes),
            signer: self.address(),
        }
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn test_message() -> Message {
    Message {
        version: 3,
        nonce: 5,
        origin_domain: ORIGIN_DOMAIN,
        sender: B256([0x11; 32]),
        destination_domain: DESTINATION_DOMAIN,
        recipient: B256([0x22; 32]),
        body: vec![0xde, 0xad, 0xbe, 0xef],
    }
}

pub fn test_commitment() -> Commitment {
    Commitment {
        origin_domain: ORIGIN_DOMAIN,
        hook_address: HOOK_ADDRESS,
        root: B256([0x44; 32]),
        index: 5,
    }
}

/// A checkpoint matching the test commitment, optionally message-id bound.
pub fn test_checkpoint(message_id: Option<B256>) -> Checkpoint {
    let commitment = test_commitment();
    Checkpoint {
        origin_domain: commitment.origin_domain,
        hook_address: commitment.hook_address,
        root: commitment.root,
        index: commitment.index,
        message_id,
    }
}

/// Builds a config whose chain endpoints and validator storage all point
/// at the given mock server. Validator locations are paths under the
/// server, one prefix per validator.
pub fn test_config(server: &MockServer, validators: &[(Address, String)]) -> Config {
    Config {
        origin_chain: OriginChainConfig {
            name: "testorigin".to_string(),
            rpc_url: server.uri(),
            domain: ORIGIN_DOMAIN,
            hook_address: HOOK_ADDRESS,
        },
        destination_chain: ChainConfig {
            name: "testdest".to_string(),
            rpc_url: server.uri(),
            domain: DESTINATION_DOMAIN,
        },
        prover: ProverConfig::default(),
        validators: validators
            .iter()
            .map(|(address, location)| (address.to_string(), location.clone()))
            .collect::<HashMap<_, _>>(),
    }
}

/// Storage prefix for the n-th validator on the mock server.
pub fn validator_location(server: &MockServer, n: usize) -> String {
    format!("{}/validators/{}", server.uri(), n)
}

// ============================================================================
// MOCK MOUNTS
// ============================================================================

/// Mounts the hook commitment endpoint the builder resolves first.
pub async fn mount_commitment(server: &MockServer, commitment: &Commitment) {
    Mock::given(method("GET"))
        .and(path(format!("/hooks/{}/commitment", HOOK_ADDRESS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(commitment))
        .mount(server)
        .await;
}

/// Mounts one archival checkpoint object for the n-th validator.
pub async fn mount_checkpoint(server: &MockServer, n: usize, key: &str, checkpoint: &SignedCheckpoint) {
    Mock::given(method("GET"))
        .and(path(format!("/validators/{}/{}", n, key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(checkpoint))
        .mount(server)
        .await;
}

/// Mounts the destination chain's default-module endpoint used by
/// fallback routing.
#[allow(dead_code)]
pub async fn mount_default_module(server: &MockServer, owner: Address, config: &serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/modules/default"))
        .and(query_param("owner", owner.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(config))
        .mount(server)
        .await;
}

/// The storage key of the checkpoint at a tree index.
pub fn index_key(index: u32) -> String {
    format!("checkpoint_{}_with_id.json", index)
}

/// The storage key of the checkpoint bound to a message id.
#[allow(dead_code)]
pub fn message_id_key(message_id: &B256) -> String {
    format!("checkpoint_{}.json", message_id)
}
