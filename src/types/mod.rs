//! Core Wire Types Module
//!
//! This module defines the fixed-width primitives and message/checkpoint
//! records the prover operates on. Addresses and hashes serialize as
//! 0x-prefixed hex strings, signatures as base64, matching what the
//! checkpoint storage endpoints and chain REST APIs serve.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::keccak256;

// ============================================================================
// FIXED-WIDTH PRIMITIVES
// ============================================================================

/// 20-byte account address (keccak hash of an ECDSA public key, last 20
/// bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

/// 32-byte hash or padded address (merkle roots, message ids, hook
/// addresses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct B256(pub [u8; 32]);

/// 65-byte recoverable ECDSA signature, `r || s || v` with `v` in
/// {27, 28}.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature65(pub [u8; 65]);

fn parse_fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| format!("invalid hex: {}", e))?;
    if bytes.len() != N {
        return Err(format!("expected {} bytes, got {}", N, bytes.len()));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<20>(s).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for B256 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<32>(s).map(B256)
    }
}

impl fmt::Display for B256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for B256 {
    fn from(bytes: [u8; 32]) -> Self {
        B256(bytes)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl Signature65 {
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != 65 {
            return Err(format!("expected 65 signature bytes, got {}", bytes.len()));
        }
        let mut out = [0u8; 65];
        out.copy_from_slice(bytes);
        Ok(Signature65(out))
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(B256);

impl Serialize for Signature65 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature65 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)?;
        Signature65::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// A cross-chain message as observed dispatched on the origin chain.
///
/// Immutable once observed; the id is a content hash of the canonical wire
/// encoding, so two observers of the same dispatch always agree on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Wire format version
    pub version: u8,
    /// Dispatch nonce, doubles as the message's leaf index in the origin
    /// merkle tree hook
    pub nonce: u32,
    /// Domain id of the origin chain
    pub origin_domain: u32,
    /// Dispatching sender, padded to 32 bytes
    pub sender: B256,
    /// Domain id of the destination chain
    pub destination_domain: u32,
    /// Destination recipient, padded to 32 bytes
    pub recipient: B256,
    /// Opaque message body
    pub body: Vec<u8>,
}

impl Message {
    /// Canonical wire encoding, the content the message id commits to.
    /// All integers big-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(77 + self.body.len());
        buf.push(self.version);
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.origin_domain.to_be_bytes());
        buf.extend_from_slice(&self.sender.0);
        buf.extend_from_slice(&self.destination_domain.to_be_bytes());
        buf.extend_from_slice(&self.recipient.0);
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Content hash of the canonical encoding.
    pub fn id(&self) -> B256 {
        B256(keccak256(&self.encode()))
    }
}

// ============================================================================
// COMMITMENT AND CHECKPOINT
// ============================================================================

/// The merkle tree hook state a validator set attests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Domain id of the origin chain
    pub origin_domain: u32,
    /// Address of the merkle tree hook, padded to 32 bytes
    pub hook_address: B256,
    /// Merkle root at `index`
    pub root: B256,
    /// Leaf count minus one at the attested point
    pub index: u32,
}

/// A commitment as signed by a validator, optionally bound to the id of
/// the message dispatched at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub origin_domain: u32,
    pub hook_address: B256,
    pub root: B256,
    pub index: u32,
    /// Message-id-bound variant carries the dispatched message's id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<B256>,
}

impl Checkpoint {
    /// The commitment fields of this checkpoint, without the binding.
    pub fn commitment(&self) -> Commitment {
        Commitment {
            origin_domain: self.origin_domain,
            hook_address: self.hook_address,
            root: self.root,
            index: self.index,
        }
    }
}

/// A checkpoint paired with the validator's signature over its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCheckpoint {
    pub value: Checkpoint,
    /// Recoverable ECDSA signature over the checkpoint digest
    pub signature: Signature65,
    /// Address the signature claims to recover to
    pub signer: Address,
}
