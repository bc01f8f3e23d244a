//! Cryptographic Operations Module
//!
//! This module handles the cryptographic operations the prover needs:
//! keccak256 hashing, checkpoint digest construction, and recovery of
//! validator addresses from ECDSA (secp256k1) signatures. The prover never
//! holds private keys; it only ever consumes public addresses and
//! signatures produced by validators.

use anyhow::Result;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey};
use sha3::{Digest, Keccak256};

use crate::types::{Address, Checkpoint, Signature65};

/// Domain separator mixed into every checkpoint digest, preventing replay
/// of signatures produced for unrelated signing schemes.
const CHECKPOINT_DOMAIN: &[u8] = b"CHECKPOINT";

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Applies the Ethereum signed message prefix to a 32-byte hash.
///
/// keccak256("\x19Ethereum Signed Message:\n32" || hash)
pub fn eth_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    let prefix = b"\x19Ethereum Signed Message:\n32";
    let mut prefixed = Vec::with_capacity(prefix.len() + 32);
    prefixed.extend_from_slice(prefix);
    prefixed.extend_from_slice(hash);
    keccak256(&prefixed)
}

/// The digest a validator signs over for a checkpoint.
///
/// Two-stage construction, all integers big-endian:
///
/// ```text
/// domain_hash = keccak256(origin_domain || hook_address || "CHECKPOINT")
/// inner       = keccak256(domain_hash || root || index [|| message_id])
/// digest      = eth_signed_message_hash(inner)
/// ```
///
/// The message id is included exactly when the checkpoint carries one, so
/// id-bound and unbound checkpoints can never be confused for each other.
pub fn checkpoint_digest(checkpoint: &Checkpoint) -> [u8; 32] {
    let mut domain = Vec::with_capacity(4 + 32 + CHECKPOINT_DOMAIN.len());
    domain.extend_from_slice(&checkpoint.origin_domain.to_be_bytes());
    domain.extend_from_slice(&checkpoint.hook_address.0);
    domain.extend_from_slice(CHECKPOINT_DOMAIN);
    let domain_hash = keccak256(&domain);

    let mut inner = Vec::with_capacity(32 + 32 + 4 + 32);
    inner.extend_from_slice(&domain_hash);
    inner.extend_from_slice(&checkpoint.root.0);
    inner.extend_from_slice(&checkpoint.index.to_be_bytes());
    if let Some(message_id) = &checkpoint.message_id {
        inner.extend_from_slice(&message_id.0);
    }

    eth_signed_message_hash(&keccak256(&inner))
}

/// Derives the Ethereum address of an ECDSA public key.
///
/// keccak256 hash of the uncompressed public key (without the 0x04 point
/// prefix), last 20 bytes.
pub fn ethereum_address(verifying_key: &EcdsaVerifyingKey) -> Result<Address> {
    let point = verifying_key.to_encoded_point(false);
    let bytes = point.as_bytes();

    // Uncompressed format: 0x04 || x (32 bytes) || y (32 bytes)
    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(anyhow::anyhow!(
            "Invalid public key format: expected 65 bytes with 0x04 prefix"
        ));
    }

    let hash = keccak256(&bytes[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    Ok(Address(address))
}

/// Recovers the signer address of a 65-byte `r || s || v` signature over a
/// precomputed digest.
///
/// Accepts `v` in both Ethereum form (27/28) and raw recovery id form
/// (0/1). Any recovery failure means the signature does not count toward a
/// quorum; callers discard rather than retry.
pub fn recover_signer(digest: &[u8; 32], signature: &Signature65) -> Result<Address> {
    let bytes = signature.as_bytes();
    let v = bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| anyhow::anyhow!("Invalid recovery id: {}", v))?;

    let ecdsa_signature = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| anyhow::anyhow!("Invalid signature encoding: {}", e))?;

    let verifying_key =
        EcdsaVerifyingKey::recover_from_prehash(digest, &ecdsa_signature, recovery_id)
            .map_err(|e| anyhow::anyhow!("Signature recovery failed: {}", e))?;

    ethereum_address(&verifying_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::B256;
    use k256::ecdsa::SigningKey;

    fn sample_checkpoint(message_id: Option<B256>) -> Checkpoint {
        Checkpoint {
            origin_domain: 1000,
            hook_address: B256([0x33; 32]),
            root: B256([0x44; 32]),
            index: 5,
            message_id,
        }
    }

    fn sign(key: &SigningKey, digest: &[u8; 32]) -> Signature65 {
        let (signature, recovery_id) = key.sign_prehash_recoverable(digest).unwrap();
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        Signature65(out)
    }

    /// Test that a signed digest recovers to the signer's address
    #[test]
    fn test_sign_then_recover() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let expected = ethereum_address(key.verifying_key()).unwrap();

        let digest = checkpoint_digest(&sample_checkpoint(None));
        let signature = sign(&key, &digest);
        assert_eq!(recover_signer(&digest, &signature).unwrap(), expected);
    }

    /// Test that raw 0/1 recovery ids are accepted alongside 27/28
    #[test]
    fn test_recover_accepts_raw_recovery_id() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let expected = ethereum_address(key.verifying_key()).unwrap();

        let digest = checkpoint_digest(&sample_checkpoint(None));
        let mut signature = sign(&key, &digest);
        signature.0[64] -= 27;
        assert_eq!(recover_signer(&digest, &signature).unwrap(), expected);
    }

    /// Test that a signature over a different digest recovers to a
    /// different address
    #[test]
    fn test_recover_rejects_wrong_digest() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let expected = ethereum_address(key.verifying_key()).unwrap();

        let digest = checkpoint_digest(&sample_checkpoint(None));
        let signature = sign(&key, &digest);
        let other = checkpoint_digest(&sample_checkpoint(Some(B256([0x77; 32]))));
        match recover_signer(&other, &signature) {
            Ok(address) => assert_ne!(address, expected),
            Err(_) => {}
        }
    }

    /// Test that the digest distinguishes id-bound from unbound
    /// checkpoints and commits to every field
    #[test]
    fn test_digest_binding() {
        let unbound = checkpoint_digest(&sample_checkpoint(None));
        let bound = checkpoint_digest(&sample_checkpoint(Some(B256([0x77; 32]))));
        assert_ne!(unbound, bound);

        let mut other = sample_checkpoint(None);
        other.index = 6;
        assert_ne!(checkpoint_digest(&other), unbound);

        let mut other = sample_checkpoint(None);
        other.root = B256([0x45; 32]);
        assert_ne!(checkpoint_digest(&other), unbound);
    }
}
