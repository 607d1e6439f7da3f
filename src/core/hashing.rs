//! Content hashing strategies.
//!
//! A block's content hash covers its type tag and payload. Structural
//! placement (parent, sort key, indent, collapsed) is compared field by field
//! by the diff module instead, so moving a block leaves its hash untouched.

use serde_json::Value;

use crate::core::config::HashAlgorithm;

/// Deterministic hash over block content
pub trait ContentHasher: Send + Sync {
    /// Hex digest of `block_type` + canonical `payload`
    fn hash_content(&self, block_type: &str, payload: &Value) -> String;
}

/// Canonical byte form of the hashed content.
///
/// `serde_json` maps are ordered by key, so the encoding does not depend on
/// the order fields were inserted.
fn canonical_bytes(block_type: &str, payload: &Value) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(block_type.len() + 64);
    bytes.extend_from_slice(block_type.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(payload.to_string().as_bytes());
    bytes
}

/// BLAKE3 content hashes (default)
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash_content(&self, block_type: &str, payload: &Value) -> String {
        blake3::hash(&canonical_bytes(block_type, payload))
            .to_hex()
            .to_string()
    }
}

/// FNV-1a 64-bit content hashes: fast, not collision resistant
#[derive(Debug, Default, Clone, Copy)]
pub struct Fnv1aHasher;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl ContentHasher for Fnv1aHasher {
    fn hash_content(&self, block_type: &str, payload: &Value) -> String {
        let hash = canonical_bytes(block_type, payload)
            .iter()
            .fold(FNV_OFFSET_BASIS, |acc, b| {
                (acc ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
            });
        hex::encode(hash.to_be_bytes())
    }
}

/// Hasher for a configured algorithm
pub fn hasher_for(algorithm: HashAlgorithm) -> Box<dyn ContentHasher> {
    match algorithm {
        HashAlgorithm::Blake3 => Box::new(Blake3Hasher),
        HashAlgorithm::Fnv1a => Box::new(Fnv1aHasher),
    }
}
