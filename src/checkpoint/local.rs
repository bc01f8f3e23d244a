//! Local filesystem checkpoint storage.
//!
//! Same key scheme as the archival transport, as files under a directory.
//! Used when a validator publishes to a shared volume, and throughout the
//! test suite where it avoids standing up HTTP storage.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::SourceError;
use crate::types::SignedCheckpoint;

use super::LATEST_INDEX_KEY;

/// A directory of one validator's checkpoint files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    path: PathBuf,
}

impl LocalSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SourceError> {
        match tokio::fs::read(self.path.join(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads and parses the signed checkpoint stored under `key`.
    pub(crate) async fn fetch(&self, key: &str) -> Result<Option<SignedCheckpoint>, SourceError> {
        match self.read(key).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Reads the highest published index, if present.
    pub(crate) async fn latest_index(&self) -> Result<Option<u32>, SourceError> {
        match self.read(LATEST_INDEX_KEY).await? {
            Some(data) => {
                let index = serde_json::from_slice(&data)
                    .map_err(|e| SourceError::Invalid(format!("bad latest index: {}", e)))?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }
}
