//! Error Taxonomy Module
//!
//! This module defines the typed errors surfaced by the prover. Quorum and
//! config errors carry the module path from the root of the verification
//! tree plus enough message context to log and alert on; per-checkpoint
//! problems (a mismatched commitment, a bad signature, a transport failure
//! against one validator) are not errors at this level. They are discarded
//! by the quorum collector and only escalate to `InsufficientQuorum` when
//! they make the threshold unreachable.

use thiserror::Error;

use crate::types::{Address, B256};

/// Failure of a single checkpoint source request.
///
/// Transport errors are retryable against the next validator in the set,
/// never against the same validator indefinitely. A missing checkpoint is
/// expressed as `Ok(None)` by the sources, not as a `SourceError`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request against a storage endpoint or signer service failed
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Filesystem read against a local storage directory failed
    #[error("storage read failed: {0}")]
    Io(#[from] std::io::Error),
    /// Payload was present but did not parse as a signed checkpoint
    #[error("invalid checkpoint payload: {0}")]
    Json(#[from] serde_json::Error),
    /// Payload was present but structurally unusable (bad index file,
    /// rejected signer request, wrong content type)
    #[error("invalid source response: {0}")]
    Invalid(String),
}

/// Errors surfaced by `build` and `decode_metadata`.
#[derive(Debug, Error)]
pub enum ProverError {
    /// The module tree is malformed (threshold out of range, empty member
    /// set, unknown module kind). Caught before any I/O; never retried.
    #[error("invalid module config at {path}: {reason}")]
    InvalidModuleConfig { path: String, reason: String },

    /// The module tree nests composite modules deeper than the configured
    /// maximum. Caught before any network call for the offending subtree.
    #[error("module tree at {path} exceeds maximum depth {max_depth}")]
    IsmTreeTooDeep { path: String, max_depth: u32 },

    /// Fewer than `wanted` valid, matching checkpoints could be gathered
    /// after querying the whole validator set (or, for an aggregation,
    /// fewer than `wanted` child modules succeeded). The caller may retry
    /// later once more checkpoints become available.
    #[error(
        "insufficient quorum at {path} for message {message_id}: wanted {wanted}, got {got} \
         ({mismatched} mismatched)"
    )]
    InsufficientQuorum {
        path: String,
        message_id: B256,
        wanted: u32,
        got: u32,
        mismatched: u32,
    },

    /// A routing module has no branch for the message's origin domain and
    /// no default to fall back to.
    #[error("unsupported origin domain {origin_domain} at {path}")]
    UnsupportedOrigin { path: String, origin_domain: u32 },

    /// Metadata bytes are inconsistent with the declared module tree.
    /// Decoder only; always indicates a builder/verifier defect.
    #[error("malformed metadata at {path}: {reason}")]
    MalformedMetadata { path: String, reason: String },

    /// A collaborator lookup (hook commitment, module config, fallback
    /// default) failed.
    #[error("collaborator lookup failed: {0:#}")]
    Collaborator(anyhow::Error),
}

/// Why the quorum collector discarded one validator's checkpoint.
///
/// Kept for logging and for the `mismatched` counter carried by
/// `InsufficientQuorum`; a discard on its own never aborts the search.
#[derive(Debug)]
pub enum Discard {
    /// The checkpoint does not bind to the target commitment or the
    /// requested message id
    Mismatch { validator: Address },
    /// The signature does not recover to the claimed signer address
    BadSignature { validator: Address },
    /// The source had no checkpoint for this validator (terminal for the
    /// validator, the next one is tried)
    Missing { validator: Address },
    /// The source failed at the transport level
    Transport {
        validator: Address,
        source: SourceError,
    },
}
