//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the prover.
//! Configuration includes chain endpoints, the merkle tree hook address on
//! the origin chain, per-validator checkpoint storage locations, and
//! evaluation limits (recursion depth, fetch parallelism, timeouts).
//!
//! Validator keys never appear here. The prover consumes only public
//! addresses; checkpoint signing is a validator-side responsibility.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Address, B256};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all prover settings.
///
/// This structure holds configuration for:
/// - Origin chain connection details and merkle tree hook address
/// - Destination chain connection details
/// - Evaluation limits (max depth, parallelism, request timeout)
/// - Checkpoint storage locations per validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin chain configuration (where messages are dispatched)
    pub origin_chain: OriginChainConfig,
    /// Destination chain configuration (where messages are delivered)
    pub destination_chain: ChainConfig,
    /// Prover evaluation limits
    #[serde(default)]
    pub prover: ProverConfig,
    /// Checkpoint storage location per validator address.
    ///
    /// Values are location strings: `https://...` for archival object
    /// storage, `file://...` for a local directory. Validators configured
    /// for live signing are addressed through the module config's rpc
    /// endpoint instead and need no entry here.
    #[serde(default)]
    pub validators: HashMap<String, String>,
}

/// Configuration for a blockchain connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// REST endpoint URL for chain queries
    pub rpc_url: String,
    /// Unique domain identifier
    pub domain: u32,
}

/// Configuration for the origin chain, including the merkle tree hook the
/// validator set attests to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// REST endpoint URL for chain queries
    pub rpc_url: String,
    /// Unique domain identifier
    pub domain: u32,
    /// Merkle tree hook address, padded to 32 bytes
    pub hook_address: B256,
}

/// Evaluation limits for the metadata builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Maximum nesting depth of composite verification modules
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Maximum concurrent checkpoint fetches per quorum collection
    #[serde(default = "default_fetch_parallelism")]
    pub fetch_parallelism: usize,
    /// Timeout for each checkpoint source or chain request in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_depth() -> u32 {
    5
}

fn default_fetch_parallelism() -> usize {
    4
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            fetch_parallelism: default_fetch_parallelism(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// This function ensures that:
    /// - Origin and destination domains differ
    /// - Every validator key parses as a 20-byte address
    /// - Every storage location string parses as a supported scheme
    /// - Limits are non-zero
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.origin_chain.domain == self.destination_chain.domain {
            return Err(anyhow::anyhow!(
                "Configuration error: origin and destination chains have the same domain {}. \
                 Each chain must have a unique domain.",
                self.origin_chain.domain
            ));
        }

        for (address, location) in &self.validators {
            address.parse::<Address>().map_err(|e| {
                anyhow::anyhow!("Invalid validator address '{}': {}", address, e)
            })?;
            location
                .parse::<crate::checkpoint::CheckpointSourceConf>()
                .map_err(|e| {
                    anyhow::anyhow!(
                        "Invalid checkpoint location '{}' for validator {}: {}",
                        location,
                        address,
                        e
                    )
                })?;
        }

        if self.prover.max_depth == 0 {
            return Err(anyhow::anyhow!("Configuration error: max_depth must be at least 1"));
        }
        if self.prover.fetch_parallelism == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: fetch_parallelism must be at least 1"
            ));
        }

        Ok(())
    }

    /// Loads configuration from the TOML file.
    ///
    /// This function:
    /// 1. Checks if config/ism-prover.toml exists (or the path given via
    ///    the ISM_PROVER_CONFIG_PATH environment variable)
    /// 2. If it exists, loads and parses the configuration
    /// 3. Validates the configuration
    /// 4. If it doesn't exist, returns an error asking user to copy template
    pub fn load() -> anyhow::Result<Self> {
        // Check for custom config path via environment variable (for tests)
        let config_path = std::env::var("ISM_PROVER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/ism-prover.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/ism-prover.template.toml config/ism-prover.toml\n\
                Then edit config/ism-prover.toml with your actual values.",
                config_path
            ))
        }
    }

    /// The parsed validator address table.
    ///
    /// Assumes `validate` has been called; unparseable entries are
    /// reported there, not here.
    pub fn validator_locations(&self) -> anyhow::Result<HashMap<Address, String>> {
        let mut out = HashMap::new();
        for (address, location) in &self.validators {
            let parsed = address
                .parse::<Address>()
                .map_err(|e| anyhow::anyhow!("Invalid validator address '{}': {}", address, e))?;
            out.insert(parsed, location.clone());
        }
        Ok(out)
    }
}
