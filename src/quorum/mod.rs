//! Quorum Collector Module
//!
//! This module gathers the smallest valid set of signed checkpoints that
//! reaches a validator-set threshold for a target commitment. Fetches run
//! concurrently with bounded parallelism, but results are consumed in the
//! declared validator order, so the collected set (and therefore the
//! encoded metadata) is deterministic across repeated runs for the same
//! inputs.
//!
//! A checkpoint only counts toward the quorum after three checks: it binds
//! to the target commitment (and the requested message id, when one is
//! required), and its signature recovers to the queried validator's
//! address. Anything else is discarded with a log line; discards never
//! abort the search, they only show up in the final `InsufficientQuorum`
//! if the threshold ends up unreachable.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointSource;
use crate::crypto::{checkpoint_digest, recover_signer};
use crate::error::{Discard, ProverError};
use crate::ism::ModulePath;
use crate::types::{Address, Commitment, SignedCheckpoint, B256};

/// Outcome of querying one validator.
enum FetchOutcome {
    Valid(SignedCheckpoint),
    Discarded(Discard),
}

/// Collects threshold signatures for a commitment from a validator set.
pub struct QuorumCollector {
    /// Checkpoint transport per validator address
    sources: HashMap<Address, CheckpointSource>,
    /// Maximum concurrent fetches
    parallelism: usize,
}

impl QuorumCollector {
    pub fn new(sources: HashMap<Address, CheckpointSource>, parallelism: usize) -> Self {
        Self {
            sources,
            parallelism: parallelism.max(1),
        }
    }

    /// Gathers the first `threshold` valid checkpoints for `target` in
    /// declared validator order.
    ///
    /// `binding` is the message id the checkpoints must be bound to, or
    /// `None` when any checkpoint for the commitment is acceptable.
    /// `message_id` is carried for error context only.
    ///
    /// Fetches are issued through an in-order buffered stream: up to
    /// `parallelism` queries run at once, results arrive in declared
    /// order, and the stream is dropped as soon as the threshold is
    /// reached, cancelling whatever is still in flight.
    pub async fn collect(
        &self,
        path: &ModulePath,
        message_id: B256,
        validators: &[Address],
        threshold: u32,
        target: &Commitment,
        binding: Option<B256>,
    ) -> Result<Vec<SignedCheckpoint>, ProverError> {
        let wanted = threshold as usize;
        let mut collected: Vec<SignedCheckpoint> = Vec::with_capacity(wanted);
        let mut mismatched = 0u32;

        let mut outcomes = stream::iter(
            validators
                .iter()
                .copied()
                .map(|validator| self.fetch_one(validator, target, binding)),
        )
        .buffered(self.parallelism);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                FetchOutcome::Valid(checkpoint) => {
                    debug!(
                        "Validator {} contributed a checkpoint for index {} at {}",
                        checkpoint.signer, target.index, path
                    );
                    collected.push(checkpoint);
                    if collected.len() == wanted {
                        info!(
                            "Quorum of {} reached at {} for message {}",
                            threshold, path, message_id
                        );
                        return Ok(collected);
                    }
                }
                FetchOutcome::Discarded(discard) => {
                    if let Discard::Mismatch { .. } = discard {
                        mismatched += 1;
                    }
                    log_discard(&discard, path);
                }
            }
        }

        Err(ProverError::InsufficientQuorum {
            path: path.to_string(),
            message_id,
            wanted: threshold,
            got: collected.len() as u32,
            mismatched,
        })
    }

    /// Queries a single validator and validates whatever comes back.
    async fn fetch_one(
        &self,
        validator: Address,
        target: &Commitment,
        binding: Option<B256>,
    ) -> FetchOutcome {
        let Some(source) = self.sources.get(&validator) else {
            debug!("No checkpoint source configured for validator {}", validator);
            return FetchOutcome::Discarded(Discard::Missing { validator });
        };

        // Index-targeted collection can skip validators whose published
        // index is known to lag the target. A failed latest-index read is
        // not a reason to skip the fetch itself.
        if binding.is_none() {
            match source.latest_index().await {
                Ok(Some(latest)) if latest < target.index => {
                    debug!(
                        "Validator {} latest index {} is behind target {}",
                        validator, latest, target.index
                    );
                    return FetchOutcome::Discarded(Discard::Missing { validator });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read latest index for validator {}: {}", validator, e);
                }
            }
        }

        let fetched = match binding {
            Some(id) => source.fetch_by_message_id(target.index, id).await,
            None => source.fetch_by_index(target.index).await,
        };

        match fetched {
            Ok(Some(checkpoint)) => validate_checkpoint(validator, checkpoint, target, binding),
            Ok(None) => FetchOutcome::Discarded(Discard::Missing { validator }),
            Err(source_error) => FetchOutcome::Discarded(Discard::Transport {
                validator,
                source: source_error,
            }),
        }
    }
}

/// Checks binding and signature before a checkpoint may count toward a
/// quorum.
fn validate_checkpoint(
    validator: Address,
    checkpoint: SignedCheckpoint,
    target: &Commitment,
    binding: Option<B256>,
) -> FetchOutcome {
    if checkpoint.value.commitment() != *target {
        warn!(
            "Validator {} returned a checkpoint for root {} index {}, expected root {} index {}",
            validator,
            checkpoint.value.root,
            checkpoint.value.index,
            target.root,
            target.index
        );
        return FetchOutcome::Discarded(Discard::Mismatch { validator });
    }

    if let Some(required) = binding {
        if checkpoint.value.message_id != Some(required) {
            warn!(
                "Validator {} returned a checkpoint not bound to message {}",
                validator, required
            );
            return FetchOutcome::Discarded(Discard::Mismatch { validator });
        }
    }

    let digest = checkpoint_digest(&checkpoint.value);
    match recover_signer(&digest, &checkpoint.signature) {
        Ok(recovered) if recovered == checkpoint.signer && recovered == validator => {
            FetchOutcome::Valid(checkpoint)
        }
        Ok(recovered) => {
            warn!(
                "Checkpoint signature recovered to {}, claimed signer {}, queried validator {}",
                recovered, checkpoint.signer, validator
            );
            FetchOutcome::Discarded(Discard::BadSignature { validator })
        }
        Err(e) => {
            warn!("Checkpoint signature from validator {} is unusable: {}", validator, e);
            FetchOutcome::Discarded(Discard::BadSignature { validator })
        }
    }
}

fn log_discard(discard: &Discard, path: &ModulePath) {
    match discard {
        Discard::Missing { validator } => {
            debug!("No checkpoint from validator {} at {}", validator, path);
        }
        Discard::Mismatch { validator } | Discard::BadSignature { validator } => {
            debug!("Discarded checkpoint from validator {} at {}", validator, path);
        }
        Discard::Transport { validator, source } => {
            warn!(
                "Transport failure for validator {} at {}: {}; trying next validator",
                validator, path, source
            );
        }
    }
}
