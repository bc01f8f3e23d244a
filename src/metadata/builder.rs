//! Metadata Builder Module
//!
//! This module is the entry point of the prover: it resolves the hook
//! commitment for a dispatched message, walks the destination's
//! verification-module tree, gathers whatever cryptographic material each
//! leaf requires, and assembles the metadata bytes the on-chain verifier
//! expects.
//!
//! Evaluation is a single recursive match over the module tree. Composite
//! nodes evaluate their children concurrently where the children are
//! independent (aggregation) and sequentially where exactly one child is
//! relevant (routing). The whole tree is validated before any I/O, so
//! malformed configs and over-deep trees never cause network traffic.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use reqwest::Client;
use tracing::{info, warn};

use crate::chain_client::ChainClient;
use crate::checkpoint::{CheckpointSource, CheckpointSourceConf, RpcSource};
use crate::config::Config;
use crate::error::ProverError;
use crate::ism::{ModuleConfig, ModulePath, MultisigVariant};
use crate::quorum::QuorumCollector;
use crate::types::{Address, Commitment, Message, SignedCheckpoint, B256};

use super::{bitmap_len, bitmap_set};

// ============================================================================
// EVALUATION CONTEXT
// ============================================================================

/// State carried down the module tree during one build.
#[derive(Clone, Copy)]
struct EvalContext<'a> {
    message: &'a Message,
    /// Hook commitment at or after the message's inclusion point
    commitment: Commitment,
    /// Composite descents below the root so far
    depth: u32,
}

impl<'a> EvalContext<'a> {
    fn descend(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

// ============================================================================
// METADATA BUILDER
// ============================================================================

/// Builds verification metadata for dispatched messages.
pub struct MetadataBuilder {
    chain_client: ChainClient,
    collector: QuorumCollector,
    /// Shared HTTP client, reused for live signer sources created while
    /// evaluating remote-signer modules
    http: Client,
    max_depth: u32,
    fetch_parallelism: usize,
}

impl MetadataBuilder {
    /// Creates a builder from the service configuration: one checkpoint
    /// source per configured validator, a shared HTTP client with the
    /// configured timeout, and the chain REST client.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.prover.request_timeout_ms))
            .build()
            .context("When building the HTTP client")?;

        let mut sources = HashMap::new();
        for (validator, location) in config.validator_locations()? {
            let conf: CheckpointSourceConf = location.parse().map_err(|e| {
                anyhow::anyhow!("Invalid checkpoint location for validator {}: {}", validator, e)
            })?;
            sources.insert(validator, conf.build(&http));
        }

        Ok(Self {
            chain_client: ChainClient::new(config, http.clone()),
            collector: QuorumCollector::new(sources, config.prover.fetch_parallelism),
            http,
            max_depth: config.prover.max_depth,
            fetch_parallelism: config.prover.fetch_parallelism,
        })
    }

    /// Resolves the recipient's module config on the destination chain,
    /// then builds metadata against it.
    pub async fn build_for_recipient(&self, message: &Message) -> Result<Vec<u8>, ProverError> {
        let config = self
            .chain_client
            .get_module_config(message.recipient)
            .await
            .map_err(ProverError::Collaborator)?;
        self.build(message, &config).await
    }

    /// Builds the metadata bytes that satisfy `root_config` for `message`.
    ///
    /// The config tree is validated up front; all evaluation failures
    /// propagate unchanged with their module path attached.
    pub async fn build(
        &self,
        message: &Message,
        root_config: &ModuleConfig,
    ) -> Result<Vec<u8>, ProverError> {
        root_config.validate(self.max_depth)?;

        let commitment = self
            .chain_client
            .get_hook_commitment(message.nonce)
            .await
            .map_err(ProverError::Collaborator)?;

        info!(
            "Building metadata for message {} (origin {}, destination {}) via {} module",
            message.id(),
            message.origin_domain,
            message.destination_domain,
            root_config.kind()
        );

        let ctx = EvalContext {
            message,
            commitment,
            depth: 0,
        };
        let metadata = self.evaluate(root_config, &ModulePath::root(), ctx).await?;

        info!(
            "Built {} metadata bytes for message {}",
            metadata.len(),
            message.id()
        );
        Ok(metadata)
    }

    /// Evaluates one module node to its metadata fragment.
    fn evaluate<'a>(
        &'a self,
        config: &'a ModuleConfig,
        path: &'a ModulePath,
        ctx: EvalContext<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>, ProverError>> {
        async move {
            match config {
                ModuleConfig::Multisig {
                    variant,
                    validators,
                    threshold,
                } => {
                    // The message-id variant binds every checkpoint to this
                    // message; the merkle-root variant accepts any checkpoint
                    // for the commitment.
                    let binding = match variant {
                        MultisigVariant::MerkleRoot => None,
                        MultisigVariant::MessageId => Some(ctx.message.id()),
                    };
                    let checkpoints = self
                        .collector
                        .collect(
                            path,
                            ctx.message.id(),
                            validators,
                            *threshold,
                            &ctx.commitment,
                            binding,
                        )
                        .await?;
                    Ok(encode_quorum(*variant, &ctx.commitment, ctx.message.id(), &checkpoints))
                }

                ModuleConfig::RemoteSigner {
                    validators,
                    threshold,
                    rpc_endpoint,
                } => {
                    // Same fragment as a merkle-root multisig; the only
                    // difference is where the signatures come from.
                    let collector = self.live_collector(validators, rpc_endpoint);
                    let checkpoints = collector
                        .collect(
                            path,
                            ctx.message.id(),
                            validators,
                            *threshold,
                            &ctx.commitment,
                            Some(ctx.message.id()),
                        )
                        .await?;
                    Ok(encode_quorum(
                        MultisigVariant::MerkleRoot,
                        &ctx.commitment,
                        ctx.message.id(),
                        &checkpoints,
                    ))
                }

                ModuleConfig::Aggregation { modules, threshold } => {
                    let child_ctx = ctx.descend();
                    let evaluations = modules.iter().enumerate().map(|(i, module)| {
                        let child_path = path.child(&format!("child[{}]", i));
                        async move { self.evaluate(module, &child_path, child_ctx).await }
                    });
                    let results = join_all(evaluations).await;

                    let mut succeeded = 0u32;
                    for (i, result) in results.iter().enumerate() {
                        match result {
                            Ok(_) => succeeded += 1,
                            Err(e) => {
                                warn!("Aggregation child {} at {} failed: {}", i, path, e);
                            }
                        }
                    }
                    if succeeded < *threshold {
                        return Err(ProverError::InsufficientQuorum {
                            path: path.to_string(),
                            message_id: ctx.message.id(),
                            wanted: *threshold,
                            got: succeeded,
                            mismatched: 0,
                        });
                    }
                    Ok(encode_aggregation(&results))
                }

                ModuleConfig::Routing { default, domains } => {
                    let origin = ctx.message.origin_domain;
                    if let Some(module) = domains.get(&origin) {
                        let branch_path = path.child(&format!("domain[{}]", origin));
                        self.evaluate(module, &branch_path, ctx.descend()).await
                    } else if let Some(module) = default {
                        let branch_path = path.child("default");
                        self.evaluate(module, &branch_path, ctx.descend()).await
                    } else {
                        Err(ProverError::UnsupportedOrigin {
                            path: path.to_string(),
                            origin_domain: origin,
                        })
                    }
                }

                ModuleConfig::FallbackRouting { owner, domains } => {
                    let origin = ctx.message.origin_domain;
                    if let Some(module) = domains.get(&origin) {
                        let branch_path = path.child(&format!("domain[{}]", origin));
                        return self.evaluate(module, &branch_path, ctx.descend()).await;
                    }

                    // A miss is not an error here: the chain-wide default
                    // module stands in. It is resolved on demand and charged
                    // against the same depth limit as the declared tree.
                    let resolved = self
                        .chain_client
                        .get_default_module(*owner)
                        .await
                        .map_err(ProverError::Collaborator)?;
                    match resolved {
                        None => Err(ProverError::UnsupportedOrigin {
                            path: path.to_string(),
                            origin_domain: origin,
                        }),
                        Some(default_config) => {
                            let branch_path = path.child("default");
                            default_config.validate_from(
                                &branch_path,
                                ctx.depth + 1,
                                self.max_depth,
                            )?;
                            self.evaluate(&default_config, &branch_path, ctx.descend())
                                .await
                        }
                    }
                }

                // Enforced on chain by caller address; the verifier accepts
                // an empty fragment.
                ModuleConfig::TrustedRelayer { .. } => Ok(Vec::new()),

                ModuleConfig::NullVerifier => Ok(Vec::new()),

                // Unreachable after validation; kept as an error rather than
                // a panic so a resolver bug cannot take the process down.
                ModuleConfig::Unknown => Err(ProverError::InvalidModuleConfig {
                    path: path.to_string(),
                    reason: "unknown module kind".to_string(),
                }),
            }
        }
        .boxed()
    }

    /// A collector whose every validator is served by the given live
    /// signing endpoint.
    fn live_collector(&self, validators: &[Address], rpc_endpoint: &str) -> QuorumCollector {
        let sources = validators
            .iter()
            .map(|validator| {
                (
                    *validator,
                    CheckpointSource::Rpc(RpcSource::new(rpc_endpoint, *validator, self.http.clone())),
                )
            })
            .collect();
        QuorumCollector::new(sources, self.fetch_parallelism)
    }
}

// ============================================================================
// FRAGMENT ENCODING
// ============================================================================

/// Encodes a quorum fragment for the module variant:
/// `root || index || signatures` or `message_id || signatures`, signatures
/// in the validator-set order the collector preserved.
fn encode_quorum(
    variant: MultisigVariant,
    commitment: &Commitment,
    message_id: B256,
    checkpoints: &[SignedCheckpoint],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(36 + 65 * checkpoints.len());
    match variant {
        MultisigVariant::MerkleRoot => {
            out.extend_from_slice(&commitment.root.0);
            out.extend_from_slice(&commitment.index.to_be_bytes());
        }
        MultisigVariant::MessageId => {
            out.extend_from_slice(&message_id.0);
        }
    }
    for checkpoint in checkpoints {
        out.extend_from_slice(checkpoint.signature.as_bytes());
    }
    out
}

/// Encodes an aggregation fragment: presence bitmap, then each successful
/// child's fragment length-prefixed, in declared child order.
fn encode_aggregation(results: &[Result<Vec<u8>, ProverError>]) -> Vec<u8> {
    let mut bitmap = vec![0u8; bitmap_len(results.len())];
    let mut body = Vec::new();
    for (i, result) in results.iter().enumerate() {
        if let Ok(fragment) = result {
            bitmap_set(&mut bitmap, i);
            body.extend_from_slice(&(fragment.len() as u32).to_be_bytes());
            body.extend_from_slice(fragment);
        }
    }
    let mut out = bitmap;
    out.extend_from_slice(&body);
    out
}
