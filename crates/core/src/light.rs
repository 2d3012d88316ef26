//! Light handle: one epoch's cache plus the dataset size it stands for

use tracing::debug;

use crate::cache::Cache;
use crate::dataset::{LightSource, check_full_size};
use crate::epoch::seed_hash;
use crate::error::{KrashError, Result};
use crate::hashimoto::{PowResult, hashimoto};
use crate::params::{H256_BYTES, Params};
use crate::primitives::H256;

/// Cache-only hasher, enough to verify any proof of its epoch
pub struct Light {
    cache: Cache,
    seed: H256,
    /// `None` for handles built outside the epoch schedule
    block_number: Option<u64>,
    full_size: u64,
}

impl Light {
    /// Light cache for `block_number` with production parameters
    pub fn new(block_number: u64) -> Result<Self> {
        Self::with_params(block_number, Params::default())
    }

    /// Light cache for `block_number` under `params`
    pub fn with_params(block_number: u64, params: Params) -> Result<Self> {
        params.validate()?;
        let seed = seed_hash(block_number, &params);
        let cache_size = params.cache_size(block_number);
        let full_size = params.full_size(block_number);
        debug!(block_number, cache_size, full_size, "creating light cache");

        let cache = Cache::generate(&seed, cache_size, params)?;
        Ok(Self {
            cache,
            seed,
            block_number: Some(block_number),
            full_size,
        })
    }

    /// Light cache for explicit sizes and seed, outside the epoch schedule
    ///
    /// The handle has no block number or epoch.
    pub fn from_parts(seed: &[u8], cache_size: u64, full_size: u64, params: Params) -> Result<Self> {
        check_full_size(full_size)?;
        let cache = Cache::generate(seed, cache_size, params)?;
        let mut fixed_seed = [0u8; H256_BYTES];
        fixed_seed.copy_from_slice(seed);
        Ok(Self {
            cache,
            seed: fixed_seed,
            block_number: None,
            full_size,
        })
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn seed(&self) -> &H256 {
        &self.seed
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }

    pub fn epoch(&self) -> Option<u64> {
        self.block_number.map(|n| self.cache.params().epoch(n))
    }

    /// Size of the dataset this cache expands to
    pub fn full_size(&self) -> u64 {
        self.full_size
    }

    pub fn params(&self) -> &Params {
        self.cache.params()
    }

    /// Row accessor that recomputes dataset rows from the cache
    pub fn source(&self) -> Result<LightSource<'_>> {
        LightSource::new(&self.cache, self.full_size)
    }

    /// Evaluate the proof-of-work without the full dataset
    pub fn compute(&self, header_hash: &[u8], nonce: u64) -> Result<PowResult> {
        hashimoto(&self.source()?, header_hash, nonce)
    }

    /// Recompute and compare against a claimed mix digest and result
    ///
    /// Returns [`KrashError::VerificationFailure`] on mismatch and the input
    /// error for malformed header hashes.
    pub fn check(
        &self,
        header_hash: &[u8],
        nonce: u64,
        mix_digest: &H256,
        result: &H256,
    ) -> Result<()> {
        let pow = self.compute(header_hash, nonce)?;
        if &pow.mix_digest == mix_digest && &pow.result == result {
            Ok(())
        } else {
            Err(KrashError::VerificationFailure)
        }
    }

    /// [`Light::check`] as a boolean; malformed input never verifies
    pub fn verify(&self, header_hash: &[u8], nonce: u64, mix_digest: &H256, result: &H256) -> bool {
        self.check(header_hash, nonce, mix_digest, result).is_ok()
    }
}

impl core::fmt::Debug for Light {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Light")
            .field("block_number", &self.block_number)
            .field("cache_size", &self.cache.size())
            .field("full_size", &self.full_size)
            .finish()
    }
}
