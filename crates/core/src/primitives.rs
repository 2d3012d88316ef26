//! Hash primitives for krash
//!
//! Keccak-256 (narrow, digest width) and Keccak-512 (wide, node width) with
//! the original Keccak padding, plus the FNV-1 style word mix used to fold
//! rows together. Words are little-endian on every platform: bytes are
//! converted to words when a node is loaded and back when it is hashed.

use sha3::{Digest, Keccak256, Keccak512};

use crate::params::{H256_BYTES, HASH_BYTES, NODE_WORDS, WORD_BYTES};

/// 32-byte digest (header hash, seed, mix digest, result, boundary)
pub type H256 = [u8; H256_BYTES];

/// FNV prime used by the word mix
pub const FNV_PRIME: u32 = 0x0100_0193;

/// Keccak-256 of arbitrary input
#[inline]
pub fn keccak256(data: &[u8]) -> H256 {
    let mut out = [0u8; H256_BYTES];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Keccak-512 of arbitrary input
#[inline]
pub fn keccak512(data: &[u8]) -> [u8; HASH_BYTES] {
    let mut out = [0u8; HASH_BYTES];
    out.copy_from_slice(&Keccak512::digest(data));
    out
}

/// Keccak-512 over `header || nonce` (nonce little-endian), the mix seed
#[inline]
pub(crate) fn keccak512_header_nonce(header: &H256, nonce: u64) -> [u8; HASH_BYTES] {
    let mut hasher = Keccak512::new();
    hasher.update(header);
    hasher.update(nonce.to_le_bytes());
    let mut out = [0u8; HASH_BYTES];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Keccak-256 over `seed || mix_digest`, the final result hash
#[inline]
pub(crate) fn keccak256_seed_mix(seed: &[u8; HASH_BYTES], mix_digest: &H256) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(seed);
    hasher.update(mix_digest);
    let mut out = [0u8; H256_BYTES];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// FNV-1 style combine: `(x * FNV_PRIME) ^ y` on wrapping u32
#[inline(always)]
pub fn fnv(x: u32, y: u32) -> u32 {
    x.wrapping_mul(FNV_PRIME) ^ y
}

/// One 64-byte cache or dataset row, held as little-endian words
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Node {
    pub words: [u32; NODE_WORDS],
}

impl Node {
    pub const ZERO: Node = Node {
        words: [0u32; NODE_WORDS],
    };

    /// Load a node from its byte representation
    #[inline(always)]
    pub fn from_bytes(bytes: &[u8; HASH_BYTES]) -> Self {
        let mut words = [0u32; NODE_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_BYTES)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { words }
    }

    /// Byte representation, little-endian words
    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; HASH_BYTES] {
        let mut bytes = [0u8; HASH_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(WORD_BYTES).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Keccak-512 of this node, as a node
    #[inline(always)]
    pub fn hash(&self) -> Node {
        Node::from_bytes(&keccak512(&self.to_bytes()))
    }

    #[inline(always)]
    pub fn xor(&self, other: &Node) -> Node {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a ^= *b;
        }
        out
    }

    /// Word-wise `fnv(self, other)` in place
    #[inline(always)]
    pub fn fnv_mix(&mut self, other: &Node) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a = fnv(*a, *b);
        }
    }
}
