//! Archival checkpoint storage over HTTP.
//!
//! Validators publish signed checkpoints to an object storage bucket
//! fronted by HTTP; this source reads them back by key. A 404 means the
//! validator never published that checkpoint (terminal for the validator),
//! anything else non-2xx is a transport error.

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::SourceError;
use crate::types::SignedCheckpoint;

use super::LATEST_INDEX_KEY;

/// HTTP object storage for one validator's published checkpoints.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    /// Base URL of the validator's storage prefix, no trailing slash
    base_url: String,
    client: Client,
}

impl ArchiveSource {
    pub fn new(base_url: String, client: Client) -> Self {
        Self { base_url, client }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Fetches and parses the signed checkpoint stored under `key`.
    pub(crate) async fn fetch(&self, key: &str) -> Result<Option<SignedCheckpoint>, SourceError> {
        let url = self.object_url(key);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No checkpoint at {}", url);
            return Ok(None);
        }
        let checkpoint = response.error_for_status()?.json::<SignedCheckpoint>().await?;
        Ok(Some(checkpoint))
    }

    /// Reads the highest published index, if the validator tracks one.
    pub(crate) async fn latest_index(&self) -> Result<Option<u32>, SourceError> {
        let url = self.object_url(LATEST_INDEX_KEY);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.bytes().await?;
        let index: u32 = serde_json::from_slice(&body)
            .map_err(|e| SourceError::Invalid(format!("bad latest index: {}", e)))?;
        Ok(Some(index))
    }
}
