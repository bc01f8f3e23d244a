//! Live signature-request transport.
//!
//! Used when archival storage lags behind the live merkle tree state: the
//! prover asks a remote signing service to produce a checkpoint signature
//! for a specific validator on demand. The service either returns a signed
//! checkpoint or reports the validator unavailable, which is treated the
//! same as a missing archival checkpoint.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::SourceError;
use crate::types::{Address, SignedCheckpoint, B256};

/// A live signing endpoint scoped to one validator.
#[derive(Debug, Clone)]
pub struct RpcSource {
    /// Base URL of the signing service, no trailing slash
    endpoint: String,
    /// The validator whose signature is requested
    validator: Address,
    client: Client,
}

/// Body of a signature request.
#[derive(Debug, Serialize)]
struct SignRequest {
    /// Correlation id for service-side logging and deduplication
    request_id: Uuid,
    validator: Address,
    index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<B256>,
}

/// Response of a signature request.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum SignResponse {
    /// The service produced a signed checkpoint
    Signed { checkpoint: SignedCheckpoint },
    /// The validator cannot sign right now; try the next one
    Unavailable,
}

impl RpcSource {
    pub fn new(endpoint: &str, validator: Address, client: Client) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            validator,
            client,
        }
    }

    /// Requests a live signature over the commitment at `index`,
    /// optionally bound to a message id.
    pub(crate) async fn request_signature(
        &self,
        index: u32,
        message_id: Option<B256>,
    ) -> Result<Option<SignedCheckpoint>, SourceError> {
        let request = SignRequest {
            request_id: Uuid::new_v4(),
            validator: self.validator,
            index,
            message_id,
        };

        let url = format!("{}/sign", self.endpoint);
        let response = self.client.post(&url).json(&request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Signer service at {} has no route for {}", url, self.validator);
            return Ok(None);
        }
        let response = response.error_for_status()?;

        match response.json::<SignResponse>().await? {
            SignResponse::Signed { checkpoint } => Ok(Some(checkpoint)),
            SignResponse::Unavailable => {
                debug!("Validator {} unavailable at signer service", self.validator);
                Ok(None)
            }
        }
    }
}
