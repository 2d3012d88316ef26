//! Light cache generation
//!
//! The cache is a chain of Keccak-512 nodes seeded from the epoch seed,
//! followed by `cache_rounds` diffusion passes. Every dataset row is derived
//! from it, and it is all a verifier needs to hold in memory.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use tracing::debug;

use crate::dataset::reserve_nodes;
use crate::error::{KrashError, Result};
use crate::params::{H256_BYTES, HASH_BYTES, Params};
use crate::primitives::Node;

/// Pseudo-random cache for one epoch
#[derive(Clone, PartialEq, Eq)]
pub struct Cache {
    nodes: Vec<Node>,
    params: Params,
}

impl Cache {
    /// Build the cache for `seed` with `size` bytes using `params`' round counts
    ///
    /// `seed` must be 32 bytes and `size` a non-zero multiple of the node width.
    pub fn generate(seed: &[u8], size: u64, params: Params) -> Result<Self> {
        KrashError::check_len("seed", H256_BYTES, seed.len())?;
        if size == 0 || size % HASH_BYTES as u64 != 0 || size / HASH_BYTES as u64 > u32::MAX as u64
        {
            return Err(KrashError::InvalidCacheSize {
                size,
                node_bytes: HASH_BYTES,
            });
        }

        let n = (size / HASH_BYTES as u64) as usize;
        let mut nodes = reserve_nodes(n)?;

        // Sequential chain
        let mut node = Node::from_bytes(&crate::primitives::keccak512(seed));
        nodes.push(node);
        for _ in 1..n {
            node = node.hash();
            nodes.push(node);
        }

        // Diffusion: each node becomes the hash of its predecessor XOR a
        // node picked by its own first word
        for _ in 0..params.cache_rounds {
            for i in 0..n {
                let partner = nodes[i].words[0] as usize % n;
                let previous = nodes[(i + n - 1) % n];
                nodes[i] = previous.xor(&nodes[partner]).hash();
            }
        }

        debug!(size, nodes = n, rounds = params.cache_rounds, "built cache");

        Ok(Self { nodes, params })
    }

    /// Wrap nodes produced elsewhere (e.g. received across a binding boundary)
    pub fn from_nodes(nodes: Vec<Node>, params: Params) -> Result<Self> {
        if nodes.is_empty() || nodes.len() > u32::MAX as usize {
            return Err(KrashError::InvalidCacheSize {
                size: (nodes.len() * HASH_BYTES) as u64,
                node_bytes: HASH_BYTES,
            });
        }
        Ok(Self { nodes, params })
    }

    #[inline(always)]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cache size in bytes
    pub fn size(&self) -> u64 {
        (self.nodes.len() * HASH_BYTES) as u64
    }

    /// Parameters the cache was built with; dataset rows derived from it use
    /// the same parent count
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Owned byte copy of the whole cache
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nodes.len() * HASH_BYTES);
        for node in &self.nodes {
            out.extend_from_slice(&node.to_bytes());
        }
        out
    }
}

impl core::fmt::Debug for Cache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cache")
            .field("nodes", &self.nodes.len())
            .field("params", &self.params)
            .finish()
    }
}

/// Build a cache of `size` bytes from `seed` with production round counts
pub fn build_cache(seed: &[u8], size: u64) -> Result<Cache> {
    Cache::generate(seed, size, Params::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::keccak512;

    #[test]
    fn test_rejects_bad_sizes() {
        let seed = [0u8; 32];
        for size in [0u64, 63, 65, 100] {
            assert!(matches!(
                build_cache(&seed, size),
                Err(KrashError::InvalidCacheSize { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_bad_seed_length() {
        let err = build_cache(&[0u8; 31], 832).unwrap_err();
        assert!(matches!(
            err,
            KrashError::InputLength {
                what: "seed",
                expected: 32,
                actual: 31
            }
        ));
    }

    #[test]
    fn test_without_diffusion_is_a_hash_chain() {
        let mut params = Params::testing();
        params.cache_rounds = 0;
        let seed = [9u8; 32];
        let cache = Cache::generate(&seed, 4 * HASH_BYTES as u64, params).unwrap();

        let first = keccak512(&seed);
        assert_eq!(cache.nodes()[0].to_bytes(), first);
        assert_eq!(cache.nodes()[1].to_bytes(), keccak512(&first));
        assert_eq!(cache.nodes()[3], cache.nodes()[2].hash());
    }

    #[test]
    fn test_diffusion_changes_every_node() {
        let seed = [9u8; 32];
        let mut chain_params = Params::testing();
        chain_params.cache_rounds = 0;
        let chain = Cache::generate(&seed, 832, chain_params).unwrap();
        let mixed = Cache::generate(&seed, 832, Params::testing()).unwrap();

        assert_eq!(chain.len(), mixed.len());
        for (a, b) in chain.nodes().iter().zip(mixed.nodes()) {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_to_bytes_layout() {
        let cache = build_cache(&[1u8; 32], 832).unwrap();
        let bytes = cache.to_bytes();
        assert_eq!(bytes.len() as u64, cache.size());
        assert_eq!(&bytes[64..128], &cache.nodes()[1].to_bytes()[..]);
    }
}
