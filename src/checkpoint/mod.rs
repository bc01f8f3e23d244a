//! Checkpoint Source Module
//!
//! This module abstracts where a validator's signed checkpoints come from.
//! Three transports share one contract: archival object storage over HTTP,
//! a local filesystem directory (used by local setups and tests), and a
//! live signature-request service for validators whose archival data lags
//! behind the live merkle tree state.
//!
//! A missing checkpoint is `Ok(None)`, terminal for that validator; a
//! `SourceError` is a transport problem, retried against the next
//! validator in the set. No source guarantees freshness or validity; the
//! quorum collector verifies signatures and commitment binding.

use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::error::SourceError;
use crate::types::{SignedCheckpoint, B256};

pub mod archive;
pub mod local;
pub mod rpc;

pub use archive::ArchiveSource;
pub use local::LocalSource;
pub use rpc::RpcSource;

// ============================================================================
// STORAGE KEY SCHEME
// ============================================================================

/// Storage key for the checkpoint at a tree index.
pub(crate) fn index_key(index: u32) -> String {
    format!("checkpoint_{}_with_id.json", index)
}

/// Storage key for the checkpoint bound to a message id.
pub(crate) fn message_id_key(message_id: &B256) -> String {
    format!("checkpoint_{}.json", message_id)
}

/// Storage key for the highest index a validator has published.
pub(crate) const LATEST_INDEX_KEY: &str = "checkpoint_latest_index.json";

// ============================================================================
// SOURCE LOCATION PARSING
// ============================================================================

/// A parsed checkpoint storage location.
///
/// Locations are configured as strings: `https://bucket.example/prefix`
/// for archival object storage, `file:///var/checkpoints/validator0` for a
/// local directory. Live signer endpoints are not configured here; they
/// come from the module config's rpc endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointSourceConf {
    /// Archival object storage reached over HTTP
    Archive { url: String },
    /// A directory of checkpoint files on the local filesystem
    Local { path: PathBuf },
}

impl FromStr for CheckpointSourceConf {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("file://") {
            if path.is_empty() {
                return Err(format!("empty path in storage location '{}'", s));
            }
            return Ok(CheckpointSourceConf::Local { path: path.into() });
        }

        let url = Url::parse(s).map_err(|e| format!("invalid storage location '{}': {}", s, e))?;
        match url.scheme() {
            "http" | "https" => Ok(CheckpointSourceConf::Archive {
                url: s.trim_end_matches('/').to_string(),
            }),
            other => Err(format!("unknown storage location scheme '{}'", other)),
        }
    }
}

impl CheckpointSourceConf {
    /// Turns the location into a live source sharing the given HTTP client.
    pub fn build(&self, client: &reqwest::Client) -> CheckpointSource {
        match self {
            CheckpointSourceConf::Archive { url } => {
                CheckpointSource::Archive(ArchiveSource::new(url.clone(), client.clone()))
            }
            CheckpointSourceConf::Local { path } => {
                CheckpointSource::Local(LocalSource::new(path.clone()))
            }
        }
    }
}

// ============================================================================
// CHECKPOINT SOURCE
// ============================================================================

/// One validator's checkpoint transport.
///
/// A closed set of strategies with a uniform contract; the quorum
/// collector neither knows nor cares which transport served a checkpoint.
#[derive(Debug, Clone)]
pub enum CheckpointSource {
    Archive(ArchiveSource),
    Local(LocalSource),
    Rpc(RpcSource),
}

impl CheckpointSource {
    /// Fetches the checkpoint at a tree index.
    pub async fn fetch_by_index(&self, index: u32) -> Result<Option<SignedCheckpoint>, SourceError> {
        match self {
            CheckpointSource::Archive(source) => source.fetch(&index_key(index)).await,
            CheckpointSource::Local(source) => source.fetch(&index_key(index)).await,
            CheckpointSource::Rpc(source) => source.request_signature(index, None).await,
        }
    }

    /// Fetches the checkpoint bound to a message id. The index is the
    /// expected inclusion point; archival transports key by message id
    /// alone, the live signer signs exactly the requested pair.
    pub async fn fetch_by_message_id(
        &self,
        index: u32,
        message_id: B256,
    ) -> Result<Option<SignedCheckpoint>, SourceError> {
        match self {
            CheckpointSource::Archive(source) => source.fetch(&message_id_key(&message_id)).await,
            CheckpointSource::Local(source) => source.fetch(&message_id_key(&message_id)).await,
            CheckpointSource::Rpc(source) => source.request_signature(index, Some(message_id)).await,
        }
    }

    /// The highest index this validator has published, if the transport
    /// tracks one. Live signers do not; they always sign fresh state.
    pub async fn latest_index(&self) -> Result<Option<u32>, SourceError> {
        match self {
            CheckpointSource::Archive(source) => source.latest_index().await,
            CheckpointSource::Local(source) => source.latest_index().await,
            CheckpointSource::Rpc(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test storage location parsing for each supported scheme
    #[test]
    fn test_location_parsing() {
        let conf: CheckpointSourceConf = "https://bucket.example/validator0/".parse().unwrap();
        assert_eq!(
            conf,
            CheckpointSourceConf::Archive {
                url: "https://bucket.example/validator0".to_string()
            }
        );

        let conf: CheckpointSourceConf = "file:///var/checkpoints/v0".parse().unwrap();
        assert_eq!(
            conf,
            CheckpointSourceConf::Local {
                path: "/var/checkpoints/v0".into()
            }
        );

        assert!("s3://bucket/region".parse::<CheckpointSourceConf>().is_err());
        assert!("file://".parse::<CheckpointSourceConf>().is_err());
        assert!("not a url".parse::<CheckpointSourceConf>().is_err());
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(index_key(5), "checkpoint_5_with_id.json");
        let id: B256 = B256([0xab; 32]);
        assert!(message_id_key(&id).starts_with("checkpoint_0xabab"));
        assert!(message_id_key(&id).ends_with(".json"));
    }
}
