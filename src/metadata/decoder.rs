//! Metadata Decoder Module
//!
//! The structural inverse of the builder: given metadata bytes, the
//! message, and the module tree they were built for, reconstructs the
//! structured proof. Used as the round-trip oracle in tests and by
//! relayers that want to inspect a proof before submission.
//!
//! Decoding is strict. Fragment lengths and bitmap cardinality must be
//! exactly consistent with the declared tree; anything else is
//! `MalformedMetadata`, the primary defense against silently accepting a
//! truncated or corrupted blob.

use crate::error::ProverError;
use crate::ism::{ModuleConfig, ModulePath, MultisigVariant};
use crate::types::{Message, Signature65, B256};

use super::{
    bitmap_has, bitmap_len, StructuredProof, MERKLE_ROOT_PREFIX_LEN, MESSAGE_ID_PREFIX_LEN,
    SIGNATURE_LEN,
};

/// Decodes a metadata blob against the module tree it was built for.
///
/// The blob must be consumed exactly: every node checks its own fragment
/// length, and composite nodes account for every byte between fragments.
pub fn decode_metadata(
    metadata: &[u8],
    message: &Message,
    config: &ModuleConfig,
) -> Result<StructuredProof, ProverError> {
    decode_node(config, message, metadata, &ModulePath::root())
}

fn decode_node(
    config: &ModuleConfig,
    message: &Message,
    bytes: &[u8],
    path: &ModulePath,
) -> Result<StructuredProof, ProverError> {
    match config {
        ModuleConfig::Multisig {
            variant, threshold, ..
        } => decode_quorum(*variant, *threshold, bytes, path),

        // Remote-signer fragments share the merkle-root quorum layout.
        ModuleConfig::RemoteSigner { threshold, .. } => {
            decode_quorum(MultisigVariant::MerkleRoot, *threshold, bytes, path)
        }

        ModuleConfig::Aggregation { modules, threshold } => {
            decode_aggregation(modules, *threshold, message, bytes, path)
        }

        ModuleConfig::Routing { default, domains } => {
            let origin = message.origin_domain;
            let (branch, branch_path) = if let Some(module) = domains.get(&origin) {
                (module, path.child(&format!("domain[{}]", origin)))
            } else if let Some(module) = default {
                (module.as_ref(), path.child("default"))
            } else {
                return Err(ProverError::UnsupportedOrigin {
                    path: path.to_string(),
                    origin_domain: origin,
                });
            };
            let inner = decode_node(branch, message, bytes, &branch_path)?;
            Ok(StructuredProof::Routed {
                domain: origin,
                inner: Box::new(inner),
            })
        }

        ModuleConfig::FallbackRouting { domains, .. } => {
            let origin = message.origin_domain;
            match domains.get(&origin) {
                Some(module) => {
                    let branch_path = path.child(&format!("domain[{}]", origin));
                    let inner = decode_node(module, message, bytes, &branch_path)?;
                    Ok(StructuredProof::Routed {
                        domain: origin,
                        inner: Box::new(inner),
                    })
                }
                // The fragment belongs to the externally resolved default
                // module, whose shape is not part of the declared tree.
                None => Ok(StructuredProof::Opaque(bytes.to_vec())),
            }
        }

        ModuleConfig::TrustedRelayer { .. } | ModuleConfig::NullVerifier => {
            if !bytes.is_empty() {
                return Err(ProverError::MalformedMetadata {
                    path: path.to_string(),
                    reason: format!(
                        "{} module takes no metadata, found {} bytes",
                        config.kind(),
                        bytes.len()
                    ),
                });
            }
            Ok(StructuredProof::Empty)
        }

        ModuleConfig::Unknown => Err(ProverError::InvalidModuleConfig {
            path: path.to_string(),
            reason: "unknown module kind".to_string(),
        }),
    }
}

fn decode_quorum(
    variant: MultisigVariant,
    threshold: u32,
    bytes: &[u8],
    path: &ModulePath,
) -> Result<StructuredProof, ProverError> {
    let prefix_len = match variant {
        MultisigVariant::MerkleRoot => MERKLE_ROOT_PREFIX_LEN,
        MultisigVariant::MessageId => MESSAGE_ID_PREFIX_LEN,
    };
    let expected = prefix_len + SIGNATURE_LEN * threshold as usize;
    if bytes.len() != expected {
        return Err(ProverError::MalformedMetadata {
            path: path.to_string(),
            reason: format!(
                "quorum fragment must be {} bytes for threshold {}, got {}",
                expected,
                threshold,
                bytes.len()
            ),
        });
    }

    let mut signatures = Vec::with_capacity(threshold as usize);
    for chunk in bytes[prefix_len..].chunks_exact(SIGNATURE_LEN) {
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(chunk);
        signatures.push(Signature65(signature));
    }

    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes[..32]);
    match variant {
        MultisigVariant::MerkleRoot => {
            let mut index_bytes = [0u8; 4];
            index_bytes.copy_from_slice(&bytes[32..36]);
            Ok(StructuredProof::MerkleRootQuorum {
                root: B256(word),
                index: u32::from_be_bytes(index_bytes),
                signatures,
            })
        }
        MultisigVariant::MessageId => Ok(StructuredProof::MessageIdQuorum {
            message_id: B256(word),
            signatures,
        }),
    }
}

fn decode_aggregation(
    modules: &[ModuleConfig],
    threshold: u32,
    message: &Message,
    bytes: &[u8],
    path: &ModulePath,
) -> Result<StructuredProof, ProverError> {
    let malformed = |reason: String| ProverError::MalformedMetadata {
        path: path.to_string(),
        reason,
    };

    let bitmap_bytes = bitmap_len(modules.len());
    if bytes.len() < bitmap_bytes {
        return Err(malformed(format!(
            "aggregation needs a {}-byte bitmap, got {} bytes total",
            bitmap_bytes,
            bytes.len()
        )));
    }
    let bitmap = &bytes[..bitmap_bytes];

    // Padding bits past the child count must stay clear.
    for bit in modules.len()..bitmap_bytes * 8 {
        if bitmap_has(bitmap, bit) {
            return Err(malformed(format!("bitmap bit {} set beyond child count", bit)));
        }
    }

    let mut offset = bitmap_bytes;
    let mut children = Vec::with_capacity(modules.len());
    let mut present = 0u32;

    for (i, module) in modules.iter().enumerate() {
        if !bitmap_has(bitmap, i) {
            children.push(None);
            continue;
        }
        present += 1;

        if bytes.len() < offset + 4 {
            return Err(malformed(format!("truncated length prefix for child {}", i)));
        }
        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&bytes[offset..offset + 4]);
        let length = u32::from_be_bytes(length_bytes) as usize;
        offset += 4;

        if bytes.len() < offset + length {
            return Err(malformed(format!(
                "fragment of child {} overruns the buffer ({} bytes declared, {} remain)",
                i,
                length,
                bytes.len() - offset
            )));
        }
        let fragment = &bytes[offset..offset + length];
        offset += length;

        let child_path = path.child(&format!("child[{}]", i));
        children.push(Some(decode_node(module, message, fragment, &child_path)?));
    }

    if offset != bytes.len() {
        return Err(malformed(format!(
            "{} trailing bytes after the last fragment",
            bytes.len() - offset
        )));
    }
    if present < threshold {
        return Err(malformed(format!(
            "bitmap marks {} children present, threshold is {}",
            present, threshold
        )));
    }

    Ok(StructuredProof::Aggregated { children })
}
