//! Verification Module Configuration
//!
//! This module defines the tree of verification-module configurations a
//! destination chain attaches to a message recipient: multisig quorums,
//! aggregations of sub-modules, per-origin routing with or without a
//! fallback, trusted-relayer and null verifiers, and live-signed quorums.
//!
//! The tree is a closed tagged union. Evaluation and decoding are single
//! exhaustive matches over it, so a new module kind is an explicit,
//! compile-checked extension point. Configs are derived read-only from
//! on-chain state at evaluation time and never persisted here.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProverError;
use crate::types::Address;

// ============================================================================
// MODULE PATH
// ============================================================================

/// Position of a module inside the verification tree, used for error
/// context and logging ("root/child[1]/domain[1000]").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePath(String);

impl ModulePath {
    pub fn root() -> Self {
        ModulePath("root".to_string())
    }

    pub fn child(&self, segment: &str) -> Self {
        ModulePath(format!("{}/{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// MODULE CONFIG TREE
// ============================================================================

/// Which commitment a multisig quorum signs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MultisigVariant {
    /// Validators attest to the merkle root and index at the message's
    /// inclusion point
    MerkleRoot,
    /// Validators attest to the message id directly
    MessageId,
}

/// A verification-module configuration node.
///
/// The JSON representation is internally tagged, the shape the destination
/// chain's module-config endpoint serves. Unknown tags deserialize to
/// `Unknown` and are rejected by validation rather than at parse time, so
/// a single unrecognized module in a large tree produces a placed error
/// instead of a blind parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ModuleConfig {
    /// Threshold signatures from a fixed validator set
    Multisig {
        variant: MultisigVariant,
        validators: Vec<Address>,
        threshold: u32,
    },
    /// At least `threshold` of the child modules must verify
    Aggregation {
        modules: Vec<ModuleConfig>,
        threshold: u32,
    },
    /// Exactly one branch selected by the message's origin domain
    Routing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Box<ModuleConfig>>,
        #[serde(default, with = "domain_map")]
        domains: BTreeMap<u32, ModuleConfig>,
    },
    /// Routing whose misses resolve to the chain-wide default module,
    /// looked up on chain by owner at evaluation time
    FallbackRouting {
        owner: Address,
        #[serde(default, with = "domain_map")]
        domains: BTreeMap<u32, ModuleConfig>,
    },
    /// Verified on chain by caller address; needs no metadata
    TrustedRelayer { relayer: Address },
    /// Accepts unconditionally; test and bootstrap use only
    NullVerifier,
    /// Multisig whose signatures are requested live from a signing
    /// service instead of read from archival storage
    RemoteSigner {
        validators: Vec<Address>,
        threshold: u32,
        rpc_endpoint: String,
    },
    /// An unrecognized module kind; always fails validation
    #[serde(other)]
    Unknown,
}

impl ModuleConfig {
    /// Short name of the module kind for logs and error reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            ModuleConfig::Multisig { .. } => "multisig",
            ModuleConfig::Aggregation { .. } => "aggregation",
            ModuleConfig::Routing { .. } => "routing",
            ModuleConfig::FallbackRouting { .. } => "fallbackRouting",
            ModuleConfig::TrustedRelayer { .. } => "trustedRelayer",
            ModuleConfig::NullVerifier => "nullVerifier",
            ModuleConfig::RemoteSigner { .. } => "remoteSigner",
            ModuleConfig::Unknown => "unknown",
        }
    }

    /// Validates the whole tree before any I/O: quorum bounds, member
    /// sets, endpoint presence, unknown kinds, and nesting depth.
    pub fn validate(&self, max_depth: u32) -> Result<(), ProverError> {
        self.validate_from(&ModulePath::root(), 0, max_depth)
    }

    /// Validates the subtree rooted here, assuming it sits at `depth`
    /// composite descents below the tree root. Used directly for module
    /// trees resolved lazily during evaluation, which share the same
    /// depth limit as the tree that referenced them.
    pub(crate) fn validate_from(
        &self,
        path: &ModulePath,
        depth: u32,
        max_depth: u32,
    ) -> Result<(), ProverError> {
        if depth >= max_depth {
            return Err(ProverError::IsmTreeTooDeep {
                path: path.to_string(),
                max_depth,
            });
        }

        let invalid = |reason: String| ProverError::InvalidModuleConfig {
            path: path.to_string(),
            reason,
        };

        match self {
            ModuleConfig::Multisig {
                validators,
                threshold,
                ..
            } => validate_quorum(validators, *threshold).map_err(invalid),
            ModuleConfig::RemoteSigner {
                validators,
                threshold,
                rpc_endpoint,
            } => {
                if rpc_endpoint.is_empty() {
                    return Err(invalid("remote signer has empty rpc endpoint".to_string()));
                }
                validate_quorum(validators, *threshold).map_err(invalid)
            }
            ModuleConfig::Aggregation { modules, threshold } => {
                if modules.is_empty() {
                    return Err(invalid("aggregation has no modules".to_string()));
                }
                if *threshold == 0 || *threshold as usize > modules.len() {
                    return Err(invalid(format!(
                        "aggregation threshold {} out of range for {} modules",
                        threshold,
                        modules.len()
                    )));
                }
                for (i, module) in modules.iter().enumerate() {
                    module.validate_from(
                        &path.child(&format!("child[{}]", i)),
                        depth + 1,
                        max_depth,
                    )?;
                }
                Ok(())
            }
            ModuleConfig::Routing { default, domains } => {
                for (domain, module) in domains {
                    module.validate_from(
                        &path.child(&format!("domain[{}]", domain)),
                        depth + 1,
                        max_depth,
                    )?;
                }
                if let Some(module) = default {
                    module.validate_from(&path.child("default"), depth + 1, max_depth)?;
                }
                Ok(())
            }
            ModuleConfig::FallbackRouting { domains, .. } => {
                for (domain, module) in domains {
                    module.validate_from(
                        &path.child(&format!("domain[{}]", domain)),
                        depth + 1,
                        max_depth,
                    )?;
                }
                Ok(())
            }
            ModuleConfig::TrustedRelayer { .. } | ModuleConfig::NullVerifier => Ok(()),
            ModuleConfig::Unknown => Err(invalid("unknown module kind".to_string())),
        }
    }
}

/// Serde representation of the per-origin branch maps. JSON object keys
/// are strings, and the internally tagged enum buffers its content before
/// deserializing, which leaves no chance for integer-key coercion; the
/// keys are therefore written and parsed as decimal strings explicitly.
mod domain_map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::ModuleConfig;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<u32, ModuleConfig>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(domain, module)| (domain.to_string(), module)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<u32, ModuleConfig>, D::Error> {
        let raw = BTreeMap::<String, ModuleConfig>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(domain, module)| {
                domain
                    .parse::<u32>()
                    .map(|domain| (domain, module))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Threshold and member-set checks shared by quorum-bearing modules.
fn validate_quorum(validators: &[Address], threshold: u32) -> Result<(), String> {
    if validators.is_empty() {
        return Err("validator set is empty".to_string());
    }
    if threshold == 0 || threshold as usize > validators.len() {
        return Err(format!(
            "threshold {} out of range for {} validators",
            threshold,
            validators.len()
        ));
    }
    let mut seen = HashSet::new();
    for validator in validators {
        if !seen.insert(validator) {
            return Err(format!("duplicate validator {}", validator));
        }
    }
    Ok(())
}
