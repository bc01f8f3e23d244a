//! ISM Prover Library
//!
//! This crate is the off-chain counterpart of a cross-chain
//! message-verification protocol. Given a message dispatched on an origin
//! chain and the verification-module tree configured for it on the
//! destination chain, it assembles the byte-exact metadata blob the
//! on-chain verifier expects: signed checkpoints are gathered from
//! validator storage or live signing services, checked against the merkle
//! tree hook commitment, and encoded per module. A strict decoder runs the
//! reverse direction for self-verification.

pub mod chain_client;
pub mod checkpoint;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ism;
pub mod metadata;
pub mod quorum;
pub mod types;

// Re-export commonly used types
pub use chain_client::ChainClient;
pub use checkpoint::{CheckpointSource, CheckpointSourceConf};
pub use config::{ChainConfig, Config, OriginChainConfig, ProverConfig};
pub use error::{ProverError, SourceError};
pub use ism::{ModuleConfig, ModulePath, MultisigVariant};
pub use metadata::{decode_metadata, MetadataBuilder, StructuredProof};
pub use quorum::QuorumCollector;
pub use types::{Address, Checkpoint, Commitment, Message, SignedCheckpoint, Signature65, B256};
