//! Krash algorithm parameters
//!
//! Node and mix widths are fixed by the Keccak-512 output width. Everything
//! that sizes the cache and dataset or counts rounds lives in [`Params`] so
//! that tests and private networks can run with tiny tables.

use crate::error::{KrashError, Result};

/// Algorithm revision, embedded in DAG file names
pub const REVISION: u32 = 23;

/// Bytes in a word (little-endian u32)
pub const WORD_BYTES: usize = 4;

/// Bytes in one cache/dataset row ("node"), the Keccak-512 output width
pub const HASH_BYTES: usize = 64;

/// Words per node
pub const NODE_WORDS: usize = HASH_BYTES / WORD_BYTES;

/// Width of the mix accumulator
pub const MIX_BYTES: usize = 128;

/// Words in the mix accumulator
pub const MIX_WORDS: usize = MIX_BYTES / WORD_BYTES;

/// Dataset nodes fetched per mix round
pub const MIX_NODES: usize = MIX_WORDS / NODE_WORDS;

/// Width of header hashes, seeds, mix digests and results
pub const H256_BYTES: usize = 32;

/// Magic number written at the start of a complete DAG file
pub const DAG_MAGIC_NUM: u64 = 0xFEE1_DEAD_BADD_CAFE;

/// Size of the DAG magic number prefix
pub const DAG_MAGIC_NUM_SIZE: usize = 8;

/// Blocks per epoch (production)
pub const EPOCH_LENGTH: u64 = 30_000;

/// Cache size at epoch 0, before prime adjustment (16 MB)
pub const CACHE_BYTES_INIT: u64 = 1 << 24;

/// Cache growth per epoch (128 KB)
pub const CACHE_BYTES_GROWTH: u64 = 1 << 17;

/// Dataset size at epoch 0, before prime adjustment (1 GB)
pub const DATASET_BYTES_INIT: u64 = 1 << 30;

/// Dataset growth per epoch (8 MB)
pub const DATASET_BYTES_GROWTH: u64 = 1 << 23;

/// Diffusion passes over the cache
pub const CACHE_ROUNDS: u32 = 3;

/// Cache parents mixed into each dataset row
pub const DATASET_PARENTS: u32 = 256;

/// Dataset fetches per hash
pub const ACCESSES: u32 = 64;

/// Largest cache or dataset the schedule produces: row indices are u32
pub const MAX_TABLE_BYTES: u64 = HASH_BYTES as u64 * u32::MAX as u64;

/// Sizing and round configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Params {
    /// Blocks per epoch
    pub epoch_length: u64,
    /// Cache size at epoch 0 in bytes
    pub cache_bytes_init: u64,
    /// Cache growth per epoch in bytes
    pub cache_bytes_growth: u64,
    /// Dataset size at epoch 0 in bytes
    pub dataset_bytes_init: u64,
    /// Dataset growth per epoch in bytes
    pub dataset_bytes_growth: u64,
    /// Diffusion passes over the cache
    pub cache_rounds: u32,
    /// Cache parents per dataset row
    pub dataset_parents: u32,
    /// Mix rounds per hash
    pub accesses: u32,
}

impl Params {
    /// Production parameters (16 MB cache / 1 GB dataset at epoch 0)
    pub const fn production() -> Self {
        Self {
            epoch_length: EPOCH_LENGTH,
            cache_bytes_init: CACHE_BYTES_INIT,
            cache_bytes_growth: CACHE_BYTES_GROWTH,
            dataset_bytes_init: DATASET_BYTES_INIT,
            dataset_bytes_growth: DATASET_BYTES_GROWTH,
            cache_rounds: CACHE_ROUNDS,
            dataset_parents: DATASET_PARENTS,
            accesses: ACCESSES,
        }
    }

    /// Tiny tables for tests and demos: 832 byte cache, 32128 byte dataset
    /// at epoch 0, 100 blocks per epoch. Round counts match production.
    pub const fn testing() -> Self {
        Self {
            epoch_length: 100,
            cache_bytes_init: 1024,
            cache_bytes_growth: 128,
            dataset_bytes_init: 32 * 1024,
            dataset_bytes_growth: 1024,
            cache_rounds: CACHE_ROUNDS,
            dataset_parents: DATASET_PARENTS,
            accesses: ACCESSES,
        }
    }

    /// Reject parameter sets the size search or mix loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.epoch_length == 0 {
            return Err(KrashError::InvalidParams("epoch_length must be non-zero"));
        }
        if self.cache_bytes_init < 2 * HASH_BYTES as u64 {
            return Err(KrashError::InvalidParams(
                "cache_bytes_init must hold at least two nodes",
            ));
        }
        if self.dataset_bytes_init < 2 * MIX_BYTES as u64 {
            return Err(KrashError::InvalidParams(
                "dataset_bytes_init must hold at least two mix pages",
            ));
        }
        if self.accesses == 0 {
            return Err(KrashError::InvalidParams("accesses must be non-zero"));
        }
        Ok(())
    }

    /// Epoch a block belongs to
    ///
    /// A zero `epoch_length` (rejected by [`Params::validate`]) puts every
    /// block in epoch 0.
    #[inline]
    pub fn epoch(&self, block_number: u64) -> u64 {
        block_number.checked_div(self.epoch_length).unwrap_or(0)
    }

    /// Cache size in bytes for a block's epoch
    ///
    /// Largest size at or below the linear schedule whose node count is prime.
    pub fn cache_size(&self, block_number: u64) -> u64 {
        let epoch = self.epoch(block_number);
        prime_size(
            schedule(self.cache_bytes_init, self.cache_bytes_growth, epoch),
            HASH_BYTES as u64,
        )
    }

    /// Dataset size in bytes for a block's epoch
    ///
    /// Largest size at or below the linear schedule whose mix page count is prime.
    pub fn full_size(&self, block_number: u64) -> u64 {
        let epoch = self.epoch(block_number);
        prime_size(
            schedule(self.dataset_bytes_init, self.dataset_bytes_growth, epoch),
            MIX_BYTES as u64,
        )
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::production()
    }
}

/// Linear size schedule, saturating at [`MAX_TABLE_BYTES`]
fn schedule(init: u64, growth: u64, epoch: u64) -> u64 {
    init.saturating_add(growth.saturating_mul(epoch))
        .min(MAX_TABLE_BYTES)
}

/// Step down from `target - unit` by `2 * unit` until `size / unit` is prime
///
/// An even starting count steps down by one unit first, so odd counts are
/// searched whatever the schedule's alignment.
fn prime_size(target: u64, unit: u64) -> u64 {
    let mut count = (target / unit).saturating_sub(1);
    while count >= 2 && !is_prime(count) {
        count -= if count % 2 == 0 { 1 } else { 2 };
    }
    count * unit
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
