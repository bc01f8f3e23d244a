//! Chain REST Client Module
//!
//! This module provides the client for the collaborator queries the prover
//! consumes: the merkle tree hook commitment on the origin chain, and the
//! verification-module configuration (per recipient, plus the chain-wide
//! default used by fallback routing) on the destination chain. Responses
//! are trusted to reflect on-chain state; the client only sanity-checks
//! that they answer the question that was asked.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::Config;
use crate::ism::ModuleConfig;
use crate::types::{Address, Commitment, B256};

/// REST client for origin and destination chain queries.
#[derive(Debug, Clone)]
pub struct ChainClient {
    origin_rpc: String,
    destination_rpc: String,
    origin_domain: u32,
    hook_address: B256,
    client: Client,
}

impl ChainClient {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            origin_rpc: config.origin_chain.rpc_url.trim_end_matches('/').to_string(),
            destination_rpc: config
                .destination_chain
                .rpc_url
                .trim_end_matches('/')
                .to_string(),
            origin_domain: config.origin_chain.domain,
            hook_address: config.origin_chain.hook_address,
            client,
        }
    }

    /// Fetches the hook commitment at or after `min_index`, the message's
    /// inclusion point in the origin merkle tree.
    pub async fn get_hook_commitment(&self, min_index: u32) -> Result<Commitment> {
        let url = format!("{}/hooks/{}/commitment", self.origin_rpc, self.hook_address);
        let commitment: Commitment = self
            .client
            .get(&url)
            .query(&[("min_index", min_index.to_string())])
            .send()
            .await
            .context("When requesting the hook commitment")?
            .error_for_status()
            .context("When requesting the hook commitment")?
            .json()
            .await
            .context("When parsing the hook commitment")?;

        if commitment.origin_domain != self.origin_domain
            || commitment.hook_address != self.hook_address
        {
            return Err(anyhow::anyhow!(
                "Hook commitment answers for domain {} hook {}, expected domain {} hook {}",
                commitment.origin_domain,
                commitment.hook_address,
                self.origin_domain,
                self.hook_address
            ));
        }
        if commitment.index < min_index {
            return Err(anyhow::anyhow!(
                "Hook commitment index {} is behind the message inclusion index {}",
                commitment.index,
                min_index
            ));
        }

        debug!(
            "Hook commitment at index {} root {}",
            commitment.index, commitment.root
        );
        Ok(commitment)
    }

    /// Resolves the verification-module configuration attached to a
    /// recipient on the destination chain.
    pub async fn get_module_config(&self, recipient: B256) -> Result<ModuleConfig> {
        let url = format!("{}/modules/{}", self.destination_rpc, recipient);
        self.client
            .get(&url)
            .send()
            .await
            .context("When requesting the recipient module config")?
            .error_for_status()
            .context("When requesting the recipient module config")?
            .json()
            .await
            .context("When parsing the recipient module config")
    }

    /// Resolves the chain-wide default module configured by `owner`, used
    /// when fallback routing has no branch for the message's origin.
    /// Returns `None` when no default is configured.
    pub async fn get_default_module(&self, owner: Address) -> Result<Option<ModuleConfig>> {
        let url = format!("{}/modules/default", self.destination_rpc);
        let response = self
            .client
            .get(&url)
            .query(&[("owner", owner.to_string())])
            .send()
            .await
            .context("When requesting the default module config")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let config = response
            .error_for_status()
            .context("When requesting the default module config")?
            .json()
            .await
            .context("When parsing the default module config")?;
        Ok(Some(config))
    }
}
